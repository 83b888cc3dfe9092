//! Rooms - two-party conversations with optional observers

mod registry;

pub use registry::RoomRegistry;

use crate::error::ChatError;
use crate::protocol::{chat_line, system_line};
use crate::session::{Role, Session};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Monotonic room identifier
pub type RoomId = u64;

#[derive(Default)]
struct Members {
    participants: Vec<Arc<Session>>,
    observers: Vec<Arc<Session>>,

    /// Set once, when participants drop below two
    closed: bool,
}

impl Members {
    fn everyone(&self) -> Vec<Arc<Session>> {
        self.participants
            .iter()
            .chain(self.observers.iter())
            .cloned()
            .collect()
    }
}

/// Result of removing a member
#[derive(Debug, Default)]
pub struct Departure {
    /// Role the removed session held, `None` if it was not a member
    pub role: Option<Role>,

    /// Members released by this removal closing the room; empty if it stays open
    pub released: Vec<(Arc<Session>, Role)>,

    /// Whether this removal closed the room
    pub closed: bool,
}

/// One active conversation
///
/// Membership changes are serialized by the room's own lock, so a concurrent
/// leave and observer join can never interleave.
pub struct Room {
    id: RoomId,
    members: Mutex<Members>,
}

impl Room {
    pub(crate) fn open(id: RoomId, a: Arc<Session>, b: Arc<Session>) -> Self {
        Self {
            id,
            members: Mutex::new(Members {
                participants: vec![a, b],
                observers: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Recipients are collected under the lock; lines are queued after it is released
    async fn recipients(&self) -> Vec<Arc<Session>> {
        self.members.lock().await.everyone()
    }

    /// Timestamped system notice to participants and observers
    pub async fn broadcast_system(&self, text: &str) {
        let line = system_line(text);
        for member in self.recipients().await {
            member.send(line.clone());
        }
    }

    /// Chat message from `sender` to participants and observers
    pub async fn broadcast_message(&self, sender: &Session, text: &str) {
        let line = chat_line(sender.label(), text);
        for member in self.recipients().await {
            member.send(line.clone());
        }
    }

    /// Add a read-only member
    pub async fn add_observer(&self, session: Arc<Session>) -> Result<(), ChatError> {
        let mut members = self.members.lock().await;
        if members.closed {
            return Err(ChatError::NoSuchRoom(self.id.to_string()));
        }
        if !members.observers.iter().any(|o| o.id() == session.id()) {
            members.observers.push(session);
        }
        Ok(())
    }

    /// Remove `session` from whichever set holds it
    ///
    /// When participants fall below two the room closes and every remaining
    /// member is handed back for release. Closing happens at most once.
    pub async fn remove(&self, session: &Session) -> Departure {
        let mut guard = self.members.lock().await;
        let members = &mut *guard;
        let mut departure = Departure::default();

        let before = members.participants.len();
        members.participants.retain(|p| p.id() != session.id());
        if members.participants.len() != before {
            departure.role = Some(Role::Participant);
        } else {
            let before = members.observers.len();
            members.observers.retain(|o| o.id() != session.id());
            if members.observers.len() != before {
                departure.role = Some(Role::Observer);
            }
        }

        if !members.closed && members.participants.len() < 2 {
            members.closed = true;
            departure.closed = true;
            departure.released = members
                .participants
                .drain(..)
                .map(|p| (p, Role::Participant))
                .chain(members.observers.drain(..).map(|o| (o, Role::Observer)))
                .collect();
        }

        departure
    }

    pub async fn participant_count(&self) -> usize {
        self.members.lock().await.participants.len()
    }

    pub async fn observer_count(&self) -> usize {
        self.members.lock().await.observers.len()
    }

    pub async fn is_closed(&self) -> bool {
        self.members.lock().await.closed
    }

    /// Member names, observers prefixed with `SUP:`
    pub async fn summary(&self) -> String {
        let members = self.members.lock().await;
        members
            .participants
            .iter()
            .map(|p| p.label().to_string())
            .chain(members.observers.iter().map(|o| format!("SUP:{}", o.label())))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

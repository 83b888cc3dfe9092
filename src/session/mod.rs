//! Session management - one live session per connection and the name registry

mod registry;

pub use registry::SessionRegistry;

use crate::room::RoomId;
use std::sync::OnceLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Opaque session handle
pub type SessionId = Uuid;

/// How a session belongs to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Participant,
    Observer,
}

/// Room membership of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub room: RoomId,
    pub role: Role,
}

/// Mutable availability state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Unavailable for new chats
    pub busy: bool,

    /// Room this session currently belongs to
    pub membership: Option<Membership>,

    /// Connection is tearing down; never pair again
    pub departed: bool,
}

impl SessionState {
    /// Free and outside any room
    pub fn is_available(&self) -> bool {
        !self.busy && self.membership.is_none() && !self.departed
    }

    pub fn room(&self) -> Option<RoomId> {
        self.membership.map(|m| m.room)
    }

    /// Return to free with no room
    pub fn release(&mut self) {
        self.busy = false;
        self.membership = None;
    }

    /// Release only if still bound to `room`
    pub fn release_from(&mut self, room: RoomId) -> bool {
        if self.room() == Some(room) {
            self.release();
            true
        } else {
            false
        }
    }

    pub fn status(&self) -> &'static str {
        if self.busy {
            "BUSY"
        } else {
            "FREE"
        }
    }
}

/// A connected client
///
/// Sessions are shared as `Arc<Session>` and compared by [`Session::id`], never by
/// name: the name is unset until negotiation completes.
#[derive(Debug)]
pub struct Session {
    id: SessionId,

    /// Peer address, for logging
    addr: String,

    /// Handle, written once by the registry
    name: OnceLock<String>,

    state: Mutex<SessionState>,

    /// Bounded queue drained by the connection's writer task
    outbox: mpsc::Sender<String>,
}

impl Session {
    /// Create an unnamed session writing into `outbox`
    pub fn new(addr: impl Into<String>, outbox: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr: addr.into(),
            name: OnceLock::new(),
            state: Mutex::new(SessionState::default()),
            outbox,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Registered name, `None` before negotiation
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Name if assigned, otherwise the peer address
    pub fn label(&self) -> &str {
        self.name().unwrap_or(&self.addr)
    }

    pub(crate) fn assign_name(&self, name: &str) -> bool {
        self.name.set(name.to_string()).is_ok()
    }

    /// Copy of the current state
    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Queue a line for this client without waiting
    ///
    /// A full outbox drops the line; a slow reader only loses its own output.
    pub fn send(&self, line: impl Into<String>) {
        match self.outbox.try_send(line.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Outbox full for {}, dropping line", self.label());
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Outbox closed for {}", self.label());
            }
        }
    }
}

/// Lock two distinct sessions' state in id order
pub(crate) async fn lock_pair<'a>(
    a: &'a Session,
    b: &'a Session,
) -> (MutexGuard<'a, SessionState>, MutexGuard<'a, SessionState>) {
    if a.id() < b.id() {
        let ga = a.lock_state().await;
        let gb = b.lock_state().await;
        (ga, gb)
    } else {
        let gb = b.lock_state().await;
        let ga = a.lock_state().await;
        (ga, gb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_assigned_once() {
        let (tx, _rx) = mpsc::channel(4);
        let session = Session::new("127.0.0.1:1", tx);
        assert_eq!(session.name(), None);
        assert_eq!(session.label(), "127.0.0.1:1");

        assert!(session.assign_name("BOB"));
        assert!(!session.assign_name("ALICE"));
        assert_eq!(session.name(), Some("BOB"));
        assert_eq!(session.label(), "BOB");
    }

    #[test]
    fn test_release_from_other_room_is_noop() {
        let mut state = SessionState {
            busy: true,
            membership: Some(Membership {
                room: 2,
                role: Role::Participant,
            }),
            departed: false,
        };
        assert!(!state.release_from(1));
        assert_eq!(state.room(), Some(2));
        assert!(state.release_from(2));
        assert!(state.is_available());

        state.departed = true;
        assert!(!state.is_available());
    }

    #[test]
    fn test_send_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let session = Session::new("peer", tx);
        session.send("first");
        session.send("second");

        assert_eq!(rx.try_recv().ok(), Some("first".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lock_pair_is_order_independent() {
        let (tx, _rx) = mpsc::channel(4);
        let a = Session::new("a", tx.clone());
        let b = Session::new("b", tx);

        {
            let (mut ga, gb) = lock_pair(&a, &b).await;
            ga.busy = true;
            assert!(!gb.busy);
        }
        let (gb, ga) = lock_pair(&b, &a).await;
        assert!(ga.busy);
        assert!(!gb.busy);
    }
}

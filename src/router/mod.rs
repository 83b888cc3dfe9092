//! Router - interprets inbound lines and authorizes every state transition
//!
//! Per-session state moves through `UNNAMED -> FREE <-> BUSY | OBSERVING`. Only the
//! router mutates the session registry, the room registry and the pending queues,
//! and it publishes presence after every change it makes.

mod presence;

pub use presence::Presence;

use crate::config::IdentityPolicy;
use crate::error::ChatError;
use crate::pending::PendingQueues;
use crate::protocol::{help_text, is_exit_line, parse_line, system_line, Command, Input};
use crate::room::{Room, RoomId, RoomRegistry};
use crate::session::{lock_pair, Membership, Role, Session, SessionRegistry};
use std::sync::Arc;

/// Whether the connection should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Outcome of a start-chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStart {
    /// A room was opened
    Opened(RoomId),

    /// The target is unavailable; the caller now waits in its pending queue
    Queued { target: String, online: bool },
}

/// Command interpreter shared by every connection task
#[derive(Clone)]
pub struct Router {
    policy: Arc<IdentityPolicy>,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry>,
    pending: Arc<PendingQueues>,
    presence: Presence,
}

impl Router {
    /// Create a router over explicit stores
    pub fn new(
        policy: IdentityPolicy,
        sessions: Arc<SessionRegistry>,
        rooms: Arc<RoomRegistry>,
        pending: Arc<PendingQueues>,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            presence: Presence::new(Arc::clone(&sessions)),
            sessions,
            rooms,
            pending,
        }
    }

    /// Create a router with fresh, empty stores
    pub fn with_policy(policy: IdentityPolicy) -> Self {
        Self::new(
            policy,
            Arc::new(SessionRegistry::new()),
            Arc::new(RoomRegistry::new()),
            Arc::new(PendingQueues::new()),
        )
    }

    pub fn policy(&self) -> &IdentityPolicy {
        &self.policy
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn pending(&self) -> &PendingQueues {
        &self.pending
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Validate a negotiation answer and claim the name for `session`
    pub async fn register(&self, session: &Arc<Session>, answer: &str) -> Result<String, ChatError> {
        let name = answer.trim().to_uppercase();
        if !self.policy.is_allowed(&name) {
            return Err(ChatError::InvalidName {
                name,
                allowed: self.policy.allowed().to_vec(),
            });
        }

        self.sessions.register(&name, session).await?;
        tracing::info!("{} logged in from {}", name, session.addr());
        Ok(name)
    }

    /// Announce a freshly named session to everyone
    pub async fn announce_join(&self, session: &Session) {
        self.broadcast_all(&format!(
            "{} joined. Type /menu for commands.",
            session.label()
        ))
        .await;
        self.presence.publish().await;
    }

    /// Handle one inbound line from a named session
    pub async fn dispatch(&self, session: &Arc<Session>, line: &str) -> Flow {
        if is_exit_line(line) {
            session.send(system_line("Goodbye!"));
            return Flow::Quit;
        }

        let result = match parse_line(line) {
            Input::Empty => Ok(Flow::Continue),
            Input::Chat(text) => self
                .post_message(session, &text)
                .await
                .map(|_| Flow::Continue),
            Input::Command(command) => self.execute(session, command).await,
        };

        match result {
            Ok(flow) => flow,
            Err(e) => {
                tracing::debug!("Rejected input from {}: {}", session.label(), e);
                session.send(system_line(&e.to_string()));
                Flow::Continue
            }
        }
    }

    async fn execute(&self, session: &Arc<Session>, command: Command) -> Result<Flow, ChatError> {
        match command {
            Command::Help => session.send(system_line(&help_text())),
            Command::List => self.presence.send_to(session).await,
            Command::WhoAmI => session.send(system_line(&self.whoami(session).await)),
            Command::Busy => self.set_busy(session, true).await?,
            Command::Free => self.set_busy(session, false).await?,
            Command::Chat(None) => session.send(system_line("Usage: /chat <USER>")),
            Command::Chat(Some(target)) => match self.start_chat(session, &target).await? {
                ChatStart::Opened(_) => {}
                ChatStart::Queued { target, online } => {
                    let why = if online { "busy" } else { "offline" };
                    session.send(system_line(&format!(
                        "{} is {}. Added to their pending queue.",
                        target, why
                    )));
                }
            },
            Command::Leave => self.leave_chat(session).await?,
            Command::Rooms => session.send(system_line(&self.rooms_summary().await)),
            Command::Join(None) => session.send(system_line("Usage: /join <ROOM_ID>")),
            Command::Join(Some(room)) => {
                self.join_as_supervisor(session, &room).await?;
            }
            Command::Quit => {
                session.send(system_line("Goodbye!"));
                return Ok(Flow::Quit);
            }
            Command::Unknown(word) => session.send(system_line(&format!(
                "Unknown command: /{}. Type /menu to see available commands.",
                word
            ))),
        }
        Ok(Flow::Continue)
    }

    /// Route chat content to the session's active room
    pub async fn post_message(&self, session: &Arc<Session>, text: &str) -> Result<(), ChatError> {
        let membership = session
            .state()
            .await
            .membership
            .ok_or(ChatError::NoActiveChat)?;

        if membership.role == Role::Observer {
            return Err(ChatError::ObserverReadOnly(membership.room));
        }

        match self.rooms.get(membership.room).await {
            Some(room) => room.broadcast_message(session, text).await,
            None => {
                session.lock_state().await.release_from(membership.room);
                session.send(system_line(
                    "Chat ended. Start a new one with /chat <USER>.",
                ));
                self.presence.publish().await;
            }
        }
        Ok(())
    }

    /// Pair `caller` with `target`, or queue the caller if the target is unavailable
    ///
    /// Both sessions' state is checked and claimed under their locks, so of two
    /// racing requests for the same free user exactly one opens a room.
    pub async fn start_chat(
        &self,
        caller: &Arc<Session>,
        target: &str,
    ) -> Result<ChatStart, ChatError> {
        let target_name = target.trim().to_uppercase();
        let caller_name = caller.label().to_string();

        if let Some(room) = caller.state().await.room() {
            return Err(ChatError::AlreadyInRoom(room));
        }
        if caller_name == target_name {
            return Err(ChatError::SelfChat);
        }
        if !self.policy.is_allowed(&target_name) {
            return Err(ChatError::UnknownUser(target_name));
        }

        let Some(target) = self.sessions.lookup(&target_name).await else {
            self.pending.enqueue(&target_name, &caller_name).await;
            return Ok(ChatStart::Queued {
                target: target_name,
                online: false,
            });
        };

        let opened = {
            let (mut caller_state, mut target_state) = lock_pair(caller, &target).await;

            if let Some(room) = caller_state.room() {
                return Err(ChatError::AlreadyInRoom(room));
            }

            if target_state.is_available() && !caller_state.departed {
                let room = self
                    .rooms
                    .open(Arc::clone(caller), Arc::clone(&target))
                    .await;
                let membership = Some(Membership {
                    room: room.id(),
                    role: Role::Participant,
                });
                caller_state.busy = true;
                caller_state.membership = membership;
                target_state.busy = true;
                target_state.membership = membership;
                Some(room)
            } else {
                // Queued before the target's lock drops, so a release that
                // follows always finds this entry when it drains
                self.pending.enqueue(&target_name, &caller_name).await;
                None
            }
        };

        let Some(room) = opened else {
            return Ok(ChatStart::Queued {
                target: target_name,
                online: true,
            });
        };

        tracing::info!(
            "Room {} opened between {} and {}",
            room.id(),
            caller_name,
            target_name
        );
        room.broadcast_system(&format!(
            "Chat room {} opened between {} and {}",
            room.id(),
            caller_name,
            target_name
        ))
        .await;
        self.presence.publish().await;

        Ok(ChatStart::Opened(room.id()))
    }

    /// Leave the active room, closing it if fewer than two participants remain
    pub async fn leave_chat(&self, session: &Arc<Session>) -> Result<(), ChatError> {
        let room_id = session.state().await.room().ok_or(ChatError::NoActiveChat)?;
        let name = session.label().to_string();

        let Some(room) = self.rooms.get(room_id).await else {
            // Stale reference: the room is already gone
            session.lock_state().await.release_from(room_id);
            session.send(system_line("Chat ended."));
            self.presence.publish().await;
            return Ok(());
        };

        let released = self
            .depart(session, &room, &format!("{} left the chat.", name))
            .await;
        session.send(system_line(&format!("Left chat room {}.", room_id)));
        self.presence.publish().await;

        self.drain_one(&name).await;
        for participant in released {
            self.drain_one(&participant).await;
        }
        Ok(())
    }

    /// Remove `session` from `room` and release it
    ///
    /// Closes the room when it drops below two participants. Returns the names of
    /// the participants released by the closure.
    async fn depart(&self, session: &Session, room: &Room, notice: &str) -> Vec<String> {
        room.broadcast_system(notice).await;
        let departure = room.remove(session).await;
        session.lock_state().await.release_from(room.id());

        if !departure.closed {
            return Vec::new();
        }

        self.rooms.remove(room.id()).await;
        tracing::info!("Room {} closed", room.id());

        let closed = system_line(&format!("Chat room {} closed.", room.id()));
        let mut participants = Vec::new();
        for (member, role) in departure.released {
            member.lock_state().await.release_from(room.id());
            member.send(closed.clone());
            if role == Role::Participant {
                if let Some(name) = member.name() {
                    participants.push(name.to_string());
                }
            }
        }
        participants
    }

    /// Observe an existing room; reserved for the supervisor
    pub async fn join_as_supervisor(
        &self,
        session: &Arc<Session>,
        room_arg: &str,
    ) -> Result<RoomId, ChatError> {
        let name = session.label().to_string();
        if !self.policy.is_supervisor(&name) {
            return Err(ChatError::NotAuthorized {
                supervisor: self.policy.supervisor().to_string(),
            });
        }

        let no_such_room = || ChatError::NoSuchRoom(room_arg.trim().to_string());
        let room_id = parse_room_id(room_arg).ok_or_else(no_such_room)?;

        let room = {
            let mut state = session.lock_state().await;
            if let Some(current) = state.room() {
                return Err(ChatError::AlreadyInRoom(current));
            }

            let room = self.rooms.get(room_id).await.ok_or_else(no_such_room)?;
            room.add_observer(Arc::clone(session)).await?;
            state.busy = true;
            state.membership = Some(Membership {
                room: room_id,
                role: Role::Observer,
            });
            room
        };

        tracing::info!("{} observing room {}", name, room_id);
        room.broadcast_system(&format!("Supervisor {} joined room {}", name, room_id))
            .await;
        self.presence.publish().await;

        Ok(room_id)
    }

    /// Mark the session busy or free
    ///
    /// Going free while holding a room would break the busy-participant invariant
    /// and is rejected.
    pub async fn set_busy(&self, session: &Arc<Session>, busy: bool) -> Result<(), ChatError> {
        {
            let mut state = session.lock_state().await;
            if !busy {
                if let Some(room) = state.room() {
                    return Err(ChatError::AlreadyInRoom(room));
                }
            }
            state.busy = busy;
        }

        let status = if busy { "BUSY" } else { "FREE" };
        session.send(system_line(&format!("Status set to {}", status)));
        self.presence.publish().await;

        if !busy {
            if let Some(name) = session.name() {
                self.drain_one(name).await;
            }
        }
        Ok(())
    }

    /// Try to pair the oldest eligible requester waiting for `freed`
    ///
    /// Work is bounded by the queue length at entry. Disconnected requesters are
    /// dropped; a still-unavailable target puts its head back at the tail and stops.
    pub async fn drain_one(&self, freed: &str) {
        let attempts = self.pending.len(freed).await;

        for _ in 0..attempts {
            let Some(requester_name) = self.pending.take_head(freed).await else {
                break;
            };

            let requester = self.sessions.lookup(&requester_name).await;
            let target = self.sessions.lookup(freed).await;
            let (Some(requester), Some(target)) = (requester, target) else {
                tracing::debug!("Dropping stale request {} -> {}", requester_name, freed);
                continue;
            };

            if !target.state().await.is_available() {
                self.pending.requeue(freed, requester_name).await;
                break;
            }

            if !requester.state().await.is_available() {
                self.pending.requeue(freed, requester_name).await;
                continue;
            }

            requester.send(system_line(&format!(
                "{} is now free. Opening chat...",
                freed
            )));
            match self.start_chat(&requester, freed).await {
                Ok(ChatStart::Opened(room)) => {
                    tracing::debug!("Pending {} -> {} paired in room {}", requester_name, freed, room);
                }
                Ok(ChatStart::Queued { .. }) => {
                    requester.send(system_line(&format!(
                        "{} is busy again. You are back in their pending queue.",
                        freed
                    )));
                }
                Err(e) => requester.send(system_line(&e.to_string())),
            }
            break;
        }
    }

    /// Tear down a closed connection's session
    ///
    /// Best-effort: releases any room, frees the name and tells everyone. Nothing
    /// escapes from here.
    pub async fn disconnect(&self, session: &Arc<Session>) {
        let room_id = {
            let mut state = session.lock_state().await;
            state.departed = true;
            state.room()
        };

        self.sessions.unregister(session).await;

        let mut released = Vec::new();
        if let Some(room_id) = room_id {
            if let Some(room) = self.rooms.get(room_id).await {
                released = self
                    .depart(session, &room, &format!("{} disconnected.", session.label()))
                    .await;
            }
        }

        if session.name().is_some() {
            self.broadcast_all(&format!("{} left.", session.label()))
                .await;
            self.presence.publish().await;
        }

        for participant in released {
            self.drain_one(&participant).await;
        }

        tracing::info!("Session {} ({}) closed", session.label(), session.addr());
    }

    /// `/whoami` reply
    pub async fn whoami(&self, session: &Session) -> String {
        let state = session.state().await;
        let mut line = format!("You are {} | status: {}", session.label(), state.status());
        if let Some(membership) = state.membership {
            line.push_str(&format!(" | in room {}", membership.room));
            if membership.role == Role::Observer {
                line.push_str(" (observing)");
            }
        }
        line
    }

    /// `/rooms` reply
    pub async fn rooms_summary(&self) -> String {
        let rooms = self.rooms.list().await;
        if rooms.is_empty() {
            return "No active rooms.".to_string();
        }

        let mut lines = vec!["Active rooms:".to_string()];
        for room in rooms {
            lines.push(format!("- room {} : {}", room.id(), room.summary().await));
        }
        lines.join("\n")
    }

    /// System notice to every named session
    async fn broadcast_all(&self, text: &str) {
        let line = system_line(text);
        for session in self.sessions.all_active().await {
            session.send(line.clone());
        }
    }
}

/// Accepts `3`, `room 3` and `R3`
fn parse_room_id(arg: &str) -> Option<RoomId> {
    let arg = arg.trim();
    let lower = arg.to_ascii_lowercase();
    let digits = lower
        .strip_prefix("room")
        .or_else(|| lower.strip_prefix('r'))
        .unwrap_or(&lower)
        .trim();
    digits.parse().ok()
}

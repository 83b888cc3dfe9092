//! User-facing error taxonomy
//!
//! Every variant is recoverable: the router renders it as a system line to the
//! offending session and carries on.

use crate::room::RoomId;
use thiserror::Error;

/// Errors produced while handling a session's input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("{0} is already logged in elsewhere.")]
    NameTaken(String),

    #[error("'{name}' is not allowed. Choose from: [{}]", .allowed.join(", "))]
    InvalidName { name: String, allowed: Vec<String> },

    #[error("Unknown user: {0}.")]
    UnknownUser(String),

    #[error("You cannot chat with yourself.")]
    SelfChat,

    #[error("You are already in room {0}. Use /leave first.")]
    AlreadyInRoom(RoomId),

    #[error("Only {supervisor} can join rooms.")]
    NotAuthorized { supervisor: String },

    #[error("No such room: {0}.")]
    NoSuchRoom(String),

    #[error("No active chat. Use /chat <USER> first.")]
    NoActiveChat,

    #[error("You are observing room {0} and cannot post messages.")]
    ObserverReadOnly(RoomId),

    #[error("Line too long (limit {0} bytes). Ignored.")]
    LineTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_lists_allowed() {
        let err = ChatError::InvalidName {
            name: "ZED".to_string(),
            allowed: vec!["BOB".to_string(), "ALICE".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "'ZED' is not allowed. Choose from: [BOB, ALICE]"
        );
    }

    #[test]
    fn test_already_in_room_mentions_leave() {
        assert!(ChatError::AlreadyInRoom(3)
            .to_string()
            .contains("room 3. Use /leave"));
    }
}

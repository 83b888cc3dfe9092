//! Line protocol - classification of inbound lines and formatting of outbound ones
//!
//! The wire is plain newline-delimited text. Inbound lines are either `/`-prefixed
//! commands or chat content; outbound lines are system notices or chat messages,
//! both stamped with the local `HH:MM` time.

mod command;

pub use command::{parse_line, Command, Input};

use chrono::Local;

/// Literal line that ends a session, equivalent to `/quit`
pub const GOODBYE: &str = "goodbye";

/// Default TCP port of the server
pub const DEFAULT_PORT: u16 = 7000;

/// Current wall-clock stamp used as a line prefix
fn stamp() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Format a system notice: `[HH:MM] * text`
pub fn system_line(text: &str) -> String {
    format!("[{}] * {}", stamp(), text)
}

/// Format a chat message: `[HH:MM] NAME: text`
pub fn chat_line(sender: &str, text: &str) -> String {
    format!("[{}] {}: {}", stamp(), sender, text)
}

/// Whether a raw line asks to end the session
pub fn is_exit_line(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case(GOODBYE) || line.eq_ignore_ascii_case("/quit")
}

/// Help text listing every command
pub fn help_text() -> String {
    [
        "Available commands:",
        "  /menu            - Show this help message (alias: /help)",
        "  /list            - Show who is online",
        "  /whoami          - Show your name and status",
        "  /busy            - Mark yourself as busy",
        "  /free            - Mark yourself as free",
        "  /chat <USER>     - Start chat with a user",
        "  /leave           - Leave the current chat",
        "  /rooms           - List all active chat rooms",
        "  /join <ROOM_ID>  - Join a room as supervisor",
        "  /quit            - Disconnect from server",
    ]
    .join("\n")
}

//! Presence broadcaster - the global online/status list

use crate::protocol::system_line;
use crate::session::{Session, SessionRegistry};
use std::sync::Arc;

/// Renders and fans out `Online: ...` lines
#[derive(Clone)]
pub struct Presence {
    sessions: Arc<SessionRegistry>,
}

impl Presence {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// `Online: NAME(STATUS)[in room N], ...` in join order
    pub async fn render(&self) -> String {
        let mut entries = Vec::new();
        for session in self.sessions.all_active().await {
            let Some(name) = session.name() else {
                continue;
            };
            let state = session.state().await;
            let room = state
                .room()
                .map(|id| format!("[in room {}]", id))
                .unwrap_or_default();
            entries.push(format!("{}({}){}", name, state.status(), room));
        }

        if entries.is_empty() {
            "Online: (nobody)".to_string()
        } else {
            format!("Online: {}", entries.join(", "))
        }
    }

    /// Queue the current list on every named session
    pub async fn publish(&self) {
        let line = system_line(&self.render().await);
        for session in self.sessions.all_active().await {
            session.send(line.clone());
        }
    }

    /// Send the current list to one session
    pub async fn send_to(&self, session: &Session) {
        session.send(system_line(&self.render().await));
    }
}

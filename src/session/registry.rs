//! Name registry - maps unique handles to live sessions

use super::Session;
use crate::error::ChatError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct Registered {
    /// Join order, used for stable presence rendering
    seq: u64,
    session: Arc<Session>,
}

#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<String, Registered>,
    next_seq: u64,
}

/// Every named session, keyed by handle
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for `session`
    ///
    /// The takenness check and the insert happen under one write lock.
    pub async fn register(&self, name: &str, session: &Arc<Session>) -> Result<(), ChatError> {
        let mut inner = self.inner.write().await;

        if inner.by_name.contains_key(name) || !session.assign_name(name) {
            return Err(ChatError::NameTaken(name.to_string()));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.by_name.insert(
            name.to_string(),
            Registered {
                seq,
                session: Arc::clone(session),
            },
        );

        tracing::debug!("Registered {} ({})", name, session.addr());
        Ok(())
    }

    /// Release the session's name if it still maps to this session
    pub async fn unregister(&self, session: &Session) {
        let Some(name) = session.name() else {
            return;
        };

        let mut inner = self.inner.write().await;
        let owned = inner
            .by_name
            .get(name)
            .is_some_and(|r| r.session.id() == session.id());
        if owned {
            inner.by_name.remove(name);
            tracing::debug!("Unregistered {}", name);
        }
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<Session>> {
        self.inner
            .read()
            .await
            .by_name
            .get(name)
            .map(|r| Arc::clone(&r.session))
    }

    /// Snapshot of all named sessions in join order
    pub async fn all_active(&self) -> std::vec::IntoIter<Arc<Session>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .by_name
            .values()
            .map(|r| (r.seq, Arc::clone(&r.session)))
            .collect();
        drop(inner);

        entries.sort_by_key(|(seq, _)| *seq);
        entries
            .into_iter()
            .map(|(_, s)| s)
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_name.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session(addr: &str) -> Arc<Session> {
        let (tx, _rx) = mpsc::channel(8);
        Arc::new(Session::new(addr, tx))
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = SessionRegistry::new();
        let bob = session("a");

        registry.register("BOB", &bob).await.unwrap();

        let found = registry.lookup("BOB").await.unwrap();
        assert_eq!(found.id(), bob.id());
        assert_eq!(bob.name(), Some("BOB"));
        assert!(registry.lookup("ALICE").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let registry = SessionRegistry::new();
        registry.register("BOB", &session("a")).await.unwrap();

        let second = session("b");
        let result = registry.register("BOB", &second).await;
        assert_eq!(result, Err(ChatError::NameTaken("BOB".into())));
        assert_eq!(second.name(), None);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_only_removes_owner() {
        let registry = SessionRegistry::new();
        let bob = session("a");
        registry.register("BOB", &bob).await.unwrap();

        // Never registered, so it must not evict BOB
        let stranger = session("b");
        registry.unregister(&stranger).await;
        assert_eq!(registry.len().await, 1);

        registry.unregister(&bob).await;
        assert!(registry.is_empty().await);

        // Absent name is a no-op
        registry.unregister(&bob).await;
    }

    #[tokio::test]
    async fn test_all_active_in_join_order() {
        let registry = SessionRegistry::new();
        for (name, addr) in [("MIKE", "1"), ("ALICE", "2"), ("BOB", "3")] {
            registry.register(name, &session(addr)).await.unwrap();
        }

        let names: Vec<String> = registry
            .all_active()
            .await
            .filter_map(|s| s.name().map(String::from))
            .collect();
        assert_eq!(names, vec!["MIKE", "ALICE", "BOB"]);
    }

    #[tokio::test]
    async fn test_concurrent_register_single_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.register("EVA", &session(&i.to_string())).await.is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}

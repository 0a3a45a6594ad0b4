//! Memory store contract and the in-memory backend
//!
//! Per-user conversation turns plus the latest portfolio snapshot.
//! Turns are append-only; the snapshot is last-write-wins.

use crate::models::{ConversationTurn, MemoryContext, PortfolioSnapshot};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for memory persistence
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append a turn. When `extra` carries a `portfolio_data` payload the
    /// user's snapshot is replaced.
    async fn save(
        &self,
        user_id: &str,
        input_text: &str,
        output_text: &str,
        extra: Option<&Value>,
    ) -> Result<()>;

    async fn load(&self, user_id: &str) -> Result<MemoryContext>;

    async fn get_portfolio(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>>;
}

#[derive(Default)]
struct UserMemory {
    turns: Vec<ConversationTurn>,
    portfolio: Option<PortfolioSnapshot>,
}

/// In-memory store for development and tests
pub struct InMemoryMemoryStore {
    users: Arc<RwLock<HashMap<String, UserMemory>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn save(
        &self,
        user_id: &str,
        input_text: &str,
        output_text: &str,
        extra: Option<&Value>,
    ) -> Result<()> {
        let snapshot = extra.and_then(|payload| PortfolioSnapshot::from_payload(user_id, payload));

        let mut users = self.users.write().await;
        let memory = users.entry(user_id.to_string()).or_default();

        memory
            .turns
            .push(ConversationTurn::new(user_id, input_text, output_text));

        if let Some(snapshot) = snapshot {
            debug!(user_id = %user_id, digest = %snapshot.digest, "Portfolio snapshot replaced");
            memory.portfolio = Some(snapshot);
        }

        Ok(())
    }

    async fn load(&self, user_id: &str) -> Result<MemoryContext> {
        let users = self.users.read().await;

        Ok(users
            .get(user_id)
            .map(|memory| MemoryContext {
                turns: memory.turns.clone(),
                portfolio: memory.portfolio.clone(),
            })
            .unwrap_or_default())
    }

    async fn get_portfolio(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>> {
        let users = self.users.read().await;
        Ok(users.get(user_id).and_then(|memory| memory.portfolio.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_turns_append_in_order() {
        let store = InMemoryMemoryStore::new();
        store.save("alice", "hi", "hello", None).await.unwrap();
        store.save("alice", "plan?", "sure", None).await.unwrap();

        let context = store.load("alice").await.unwrap();
        assert_eq!(context.turns.len(), 2);
        assert_eq!(context.turns[0].input_text, "hi");
        assert_eq!(context.turns[1].output_text, "sure");
        assert!(context.portfolio.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_is_empty() {
        let store = InMemoryMemoryStore::new();
        let context = store.load("nobody").await.unwrap();
        assert!(context.is_empty());
        assert!(store.get_portfolio("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_last_write_wins() {
        let store = InMemoryMemoryStore::new();
        let first = json!({"portfolio_data": {"stocks": "AAPL: 100"}});
        let second = json!({"portfolio_data": {"stocks": "MSFT: 5"}});

        store.save("c1", "fetch", "ok", Some(&first)).await.unwrap();
        store.save("c1", "fetch", "ok", Some(&second)).await.unwrap();

        let snapshot = store.get_portfolio("c1").await.unwrap().unwrap();
        assert_eq!(snapshot.stocks, json!("MSFT: 5"));
    }

    #[tokio::test]
    async fn test_extra_without_portfolio_keeps_snapshot() {
        let store = InMemoryMemoryStore::new();
        let payload = json!({"portfolio_data": {"stocks": "AAPL: 100"}});
        store.save("c1", "fetch", "ok", Some(&payload)).await.unwrap();
        store
            .save("c1", "later", "ok", Some(&json!({"status": "success"})))
            .await
            .unwrap();

        let snapshot = store.get_portfolio("c1").await.unwrap().unwrap();
        assert_eq!(snapshot.stocks, json!("AAPL: 100"));
    }

    #[tokio::test]
    async fn test_users_are_isolated_under_concurrency() {
        let store = Arc::new(InMemoryMemoryStore::new());
        let mut handles = Vec::new();

        for user in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let user_id = format!("user-{}", user);
                for turn in 0..10 {
                    store
                        .save(&user_id, &format!("q{}", turn), "a", None)
                        .await
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        for user in 0..8 {
            let context = store.load(&format!("user-{}", user)).await.unwrap();
            assert_eq!(context.turns.len(), 10);
            assert!(context.turns.iter().all(|t| t.user_id == format!("user-{}", user)));
            assert_eq!(context.turns[9].input_text, "q9");
        }
    }
}

//! In-memory conversation log — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use atlas_core::memory::ConversationLog;
use atlas_core::message::{Role, Turn};
use tokio::sync::Mutex;

use crate::enforce_cap;

/// A conversation log that lives only as long as the process.
pub struct InMemoryBackend {
    cap: usize,
    entries: Mutex<Vec<Turn>>,
}

impl InMemoryBackend {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[async_trait]
impl ConversationLog for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, user: String, assistant: String) {
        let mut entries = self.entries.lock().await;
        entries.push(Turn::user(user));
        entries.push(Turn::assistant(assistant));
        enforce_cap(&mut *entries, self.cap);
    }

    async fn recent(&self, limit: usize) -> Vec<Turn> {
        let entries = self.entries.lock().await;
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    async fn last_with_role(&self, role: Role) -> Option<Turn> {
        self.entries
            .lock()
            .await
            .iter()
            .rev()
            .find(|t| t.role == role)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_is_chronological() {
        let log = InMemoryBackend::default();
        log.append("q1".into(), "a1".into()).await;
        log.append("q2".into(), "a2".into()).await;

        assert_eq!(
            log.recent(3).await,
            vec![Turn::assistant("a1"), Turn::user("q2"), Turn::assistant("a2")]
        );
        assert_eq!(log.recent(100).await.len(), 4);
        assert!(log.recent(0).await.is_empty());
    }

    #[tokio::test]
    async fn cap_drops_oldest() {
        let log = InMemoryBackend::new(4);
        for i in 0..3 {
            log.append(format!("q{i}"), format!("a{i}")).await;
        }
        assert_eq!(log.len().await, 4);
        assert_eq!(log.recent(1).await, vec![Turn::assistant("a2")]);
        assert_eq!(log.recent(4).await[0], Turn::user("q1"));
    }
}

//! File-based conversation log — a pretty-printed JSON array of
//! `{role, content}` entries.
//!
//! Entries are loaded into memory on creation and the most recent `cap` of
//! them are written back after every exchange. Writes go to a sibling temp
//! file that is then renamed over the artifact, so a crash mid-write never
//! leaves a truncated log behind.

use async_trait::async_trait;
use atlas_core::error::MemoryError;
use atlas_core::memory::ConversationLog;
use atlas_core::message::{Role, Turn};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::enforce_cap;

/// A file-backed conversation log.
///
/// Append and persist happen under one lock, so exchanges from concurrent
/// requests never interleave, neither in memory nor on disk.
pub struct FileBackend {
    path: PathBuf,
    cap: usize,
    entries: Mutex<Vec<Turn>>,
}

impl FileBackend {
    /// Open the log at `path`, keeping at most `cap` entries.
    ///
    /// A missing, empty or malformed file starts an empty log.
    pub fn new(path: PathBuf, cap: usize) -> Self {
        let mut entries = Self::load_from_disk(&path);
        enforce_cap(&mut entries, cap);
        debug!(path = %path.display(), count = entries.len(), "Conversation log loaded");
        Self {
            path,
            cap,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<Turn> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // not written yet
        };
        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<Turn>>(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Conversation log malformed, starting empty");
                Vec::new()
            }
        }
    }

    async fn flush(&self, entries: &[Turn]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            MemoryError::Storage(format!("Failed to replace memory file: {e}"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ConversationLog for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, user: String, assistant: String) {
        let mut entries = self.entries.lock().await;
        entries.push(Turn::user(user));
        entries.push(Turn::assistant(assistant));
        enforce_cap(&mut *entries, self.cap);

        if let Err(e) = self.flush(&entries).await {
            warn!(path = %self.path.display(), error = %e, "Failed to persist conversation log");
        }
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
    use std::sync::Arc;

    fn on_disk(path: &Path) -> Vec<Turn> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn append_persists_pair_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let log = FileBackend::new(path.clone(), 1_000);

        log.append("hello".into(), "hi there".into()).await;

        assert_eq!(on_disk(&path), vec![Turn::user("hello"), Turn::assistant("hi there")]);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  "), "expected pretty-printed JSON");
    }

    #[tokio::test]
    async fn reopened_log_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        {
            let log = FileBackend::new(path.clone(), 1_000);
            log.append("q1".into(), "a1".into()).await;
            log.append("q2".into(), "a2".into()).await;
        }

        let log = FileBackend::new(path, 1_000);
        assert_eq!(log.len().await, 4);
        assert_eq!(log.recent(2).await, vec![Turn::user("q2"), Turn::assistant("a2")]);
    }

    #[tokio::test]
    async fn visible_length_is_min_of_twice_n_and_cap() {
        let dir = tempfile::tempdir().unwrap();
        for n in [0usize, 1, 3, 5, 6, 11] {
            let path = dir.path().join(format!("memory-{n}.json"));
            let log = FileBackend::new(path.clone(), 10);
            for i in 0..n {
                log.append(format!("u{i}"), format!("a{i}")).await;
            }
            assert_eq!(log.len().await, (2 * n).min(10), "n = {n}");
            if n > 0 {
                assert_eq!(on_disk(&path).len(), (2 * n).min(10), "n = {n}");
            }
        }
    }

    #[tokio::test]
    async fn thousand_and_one_appends_drop_oldest_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let log = FileBackend::new(path.clone(), 1_000);

        for i in 0..1_001 {
            log.append(format!("question {i}"), format!("answer {i}")).await;
        }

        let persisted = on_disk(&path);
        assert_eq!(persisted.len(), 1_000);
        assert!(!persisted.iter().any(|t| t.content == "question 0"));
        assert!(!persisted.iter().any(|t| t.content == "answer 500"));
        assert_eq!(persisted[0], Turn::user("question 501"));
        assert_eq!(persisted[999], Turn::assistant("answer 1000"));
    }

    #[tokio::test]
    async fn handles_missing_empty_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = FileBackend::new(dir.path().join("missing.json"), 1_000);
        assert!(missing.is_empty().await);

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "  \n").unwrap();
        assert!(FileBackend::new(empty, 1_000).is_empty().await);

        let malformed = dir.path().join("malformed.json");
        std::fs::write(&malformed, "{ not json").unwrap();
        assert!(FileBackend::new(malformed, 1_000).is_empty().await);

        let wrong_role = dir.path().join("role.json");
        std::fs::write(&wrong_role, r#"[{"role":"tool","content":"x"}]"#).unwrap();
        assert!(FileBackend::new(wrong_role, 1_000).is_empty().await);
    }

    #[tokio::test]
    async fn oversized_file_is_trimmed_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let turns: Vec<Turn> = (0..8).map(|i| Turn::user(format!("m{i}"))).collect();
        std::fs::write(&path, serde_json::to_string(&turns).unwrap()).unwrap();

        let log = FileBackend::new(path, 4);
        assert_eq!(log.len().await, 4);
        assert_eq!(log.recent(1).await, vec![Turn::user("m7")]);
    }

    #[tokio::test]
    async fn persistence_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes the rename fail
        let path = dir.path().join("memory.json");
        std::fs::create_dir(&path).unwrap();

        let log = FileBackend::new(path, 1_000);
        log.append("still".into(), "works".into()).await;
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn last_turn_by_role() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileBackend::new(dir.path().join("memory.json"), 1_000);
        assert!(log.last_with_role(Role::User).await.is_none());

        log.append("q".into(), "a".into()).await;
        assert_eq!(log.last_with_role(Role::User).await, Some(Turn::user("q")));
        assert_eq!(log.last_with_role(Role::Assistant).await, Some(Turn::assistant("a")));
    }

    #[tokio::test]
    async fn last_turn_by_role_scans_past_unpaired_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let turns = vec![Turn::user("q1"), Turn::assistant("a1"), Turn::assistant("a2")];
        std::fs::write(&path, serde_json::to_string(&turns).unwrap()).unwrap();

        let log = FileBackend::new(path, 1_000);
        assert_eq!(log.last_with_role(Role::User).await, Some(Turn::user("q1")));
        assert_eq!(log.last_with_role(Role::Assistant).await, Some(Turn::assistant("a2")));
    }

    #[tokio::test]
    async fn concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let log = Arc::new(FileBackend::new(path.clone(), 1_000));

        let mut handles = Vec::new();
        for i in 0..20 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                log.append(format!("u{i}"), format!("a{i}")).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let persisted = on_disk(&path);
        assert_eq!(persisted.len(), 40);
        for pair in persisted.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}

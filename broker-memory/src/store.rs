//! Fire-and-forget conversation memory (spec §4.9).
//!
//! Grounded on the original implementation's `safe_store_conversation_memory`
//! wrapper (`original_source/mcp_the_force/tools/safe_memory.py`): a thin
//! shell around the real write that swallows every error and never
//! propagates to the caller, so a broken memory backend can never fail a
//! successful tool call. Here that contract is expressed as a bounded,
//! detached `tokio::spawn` rather than Python's background-task pattern.

use crate::backend::{MemoryBackend, MemoryHit};
use crate::error::MemoryError;
use crate::repository::MemoryRepository;
use crate::summarize::Summarizer;
use broker_types::{now_epoch, CompactedTurn, MemoryEntry, MemoryId, SessionId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Memory writes get a separate, short timeout (spec §9: "Memory writes
/// have a separate short timeout (≈ 5 s)").
const MEMORY_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the backend/repository pair and exposes both the fire-and-forget
/// write path and the two retrieval tools (spec §4.9).
pub struct MemoryStore {
    backend: Arc<dyn MemoryBackend>,
    repository: Arc<dyn MemoryRepository>,
    summarizer: Arc<dyn Summarizer>,
}

impl MemoryStore {
    /// Construct a store over a backend/repository pair with the default
    /// summarizer.
    pub fn new(backend: Arc<dyn MemoryBackend>, repository: Arc<dyn MemoryRepository>) -> Self {
        Self {
            backend,
            repository,
            summarizer: Arc::new(crate::summarize::ConcatSummarizer),
        }
    }

    /// Override the summarizer (tests, or a future richer summarization
    /// strategy).
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Summarize and index one exchange, persisting the resulting entry.
    /// Propagates errors — callers on the hot path should use
    /// [`Self::store_in_background`] instead.
    pub async fn store_conversation_memory(
        &self,
        session_id: Option<SessionId>,
        tool_name: &str,
        messages: &[CompactedTurn],
        response: &str,
    ) -> Result<MemoryId, MemoryError> {
        let summary_text = self.summarizer.summarize(tool_name, messages, response);
        let embedding_handle = self.backend.index(&summary_text).await?;

        let entry = MemoryEntry {
            memory_id: MemoryId::new(uuid::Uuid::new_v4().to_string()),
            session_id,
            tool_name: tool_name.to_string(),
            summary_text,
            embedding_handle,
            created_epoch: now_epoch(),
        };
        self.repository.insert(&entry).await?;
        Ok(entry.memory_id)
    }

    /// Spawn the write as a detached task bounded by
    /// [`MEMORY_WRITE_TIMEOUT`], swallowing every failure (spec §4.9:
    /// "Failures here are swallowed — memory storage is never allowed to
    /// fail a successful user call, and never to delay the response").
    ///
    /// Per spec §3.3 item 3, a cancelled call must skip this entirely —
    /// callers should not invoke this for a cancelled invocation.
    pub fn store_in_background(
        self: &Arc<Self>,
        session_id: Option<SessionId>,
        tool_name: String,
        messages: Vec<CompactedTurn>,
        response: String,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                MEMORY_WRITE_TIMEOUT,
                this.store_conversation_memory(session_id, &tool_name, &messages, &response),
            )
            .await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(tool_name, error = %err, "failed to store conversation memory"),
                Err(_) => warn!(tool_name, "conversation memory store timed out after {MEMORY_WRITE_TIMEOUT:?}"),
            }
        });
    }

    /// `search_project_memory`: search across every session's stored
    /// exchanges (spec §4.9).
    pub async fn search_project_memory(&self, query: &str, max_results: usize) -> Result<Vec<MemoryHit>, MemoryError> {
        self.backend.search(query, max_results).await
    }

    /// `search_session_attachments`: search restricted to entries
    /// belonging to one session (spec §4.9).
    pub async fn search_session_attachments(
        &self,
        session_id: &SessionId,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MemoryHit>, MemoryError> {
        let scoped: HashSet<String> = self
            .repository
            .list_for_session(session_id)
            .await?
            .into_iter()
            .map(|e| e.embedding_handle)
            .collect();

        let hits = self.backend.search(query, max_results).await?;
        Ok(hits.into_iter().filter(|h| scoped.contains(&h.embedding_handle)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        indexed: Mutex<Vec<String>>,
        fail_index: bool,
        hits: Vec<MemoryHit>,
    }

    #[async_trait]
    impl MemoryBackend for FakeBackend {
        async fn index(&self, text: &str) -> Result<String, MemoryError> {
            if self.fail_index {
                return Err(MemoryError::IndexFailed("boom".into()));
            }
            self.indexed.lock().unwrap().push(text.to_string());
            Ok(format!("handle-{}", self.indexed.lock().unwrap().len()))
        }

        async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<MemoryHit>, MemoryError> {
            Ok(self.hits.clone())
        }
    }

    #[derive(Default)]
    struct FakeRepository {
        entries: Mutex<Vec<MemoryEntry>>,
    }

    #[async_trait]
    impl MemoryRepository for FakeRepository {
        async fn insert(&self, entry: &MemoryEntry) -> Result<(), MemoryError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<MemoryEntry>, MemoryError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.session_id.as_ref() == Some(session_id))
                .cloned()
                .collect())
        }

        async fn list_all(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    fn turns() -> Vec<CompactedTurn> {
        vec![CompactedTurn {
            role: "user".into(),
            text: "remember ELEPHANT".into(),
        }]
    }

    #[tokio::test]
    async fn store_conversation_memory_indexes_and_persists() {
        let backend = Arc::new(FakeBackend::default());
        let repo = Arc::new(FakeRepository::default());
        let store = MemoryStore::new(backend.clone(), repo.clone());

        let id = store
            .store_conversation_memory(Some(SessionId::new("s1")), "chat_with_gpt", &turns(), "ack")
            .await
            .unwrap();

        let entries = repo.list_for_session(&SessionId::new("s1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].memory_id, id);
        assert!(entries[0].summary_text.contains("ELEPHANT"));
    }

    #[tokio::test]
    async fn background_store_swallows_backend_failure() {
        let backend = Arc::new(FakeBackend {
            fail_index: true,
            ..Default::default()
        });
        let repo = Arc::new(FakeRepository::default());
        let store = Arc::new(MemoryStore::new(backend, repo.clone()));

        store.store_in_background(Some(SessionId::new("s1")), "chat_with_gpt".into(), turns(), "ack".into());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_session_attachments_is_scoped_to_the_session() {
        let backend = Arc::new(FakeBackend {
            hits: vec![
                MemoryHit {
                    embedding_handle: "handle-1".into(),
                    summary_text: "in scope".into(),
                    score: Some(0.9),
                },
                MemoryHit {
                    embedding_handle: "handle-2".into(),
                    summary_text: "other session".into(),
                    score: Some(0.8),
                },
            ],
            ..Default::default()
        });
        let repo = Arc::new(FakeRepository::default());
        repo.insert(&MemoryEntry {
            memory_id: MemoryId::new("m1"),
            session_id: Some(SessionId::new("s1")),
            tool_name: "chat_with_gpt".into(),
            summary_text: "in scope".into(),
            embedding_handle: "handle-1".into(),
            created_epoch: 0,
        })
        .await
        .unwrap();

        let store = MemoryStore::new(backend, repo);
        let hits = store
            .search_session_attachments(&SessionId::new("s1"), "query", 10)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding_handle, "handle-1");
    }
}

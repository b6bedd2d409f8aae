//! Concrete [`MemoryBackend`] against OpenAI's vector-store search API.
//!
//! Spec §4.9 describes memory as "also implemented as a provider-side
//! vector index" with retrieval "delegated to provider APIs" as a
//! Non-goal on in-process indexing; this reuses the same vector-store
//! primitives as [`crate::vectorstore_backend::OpenAiVectorStoreBackend`]
//! against a single dedicated store rather than one per session.

use async_trait::async_trait;
use broker_memory::{MemoryBackend, MemoryError, MemoryHit};
use serde::Deserialize;

/// Indexes and searches free text against one fixed OpenAI vector store,
/// created once at startup and reused for every memory write.
pub struct OpenAiMemoryBackend {
    api_key: String,
    base_url: String,
    vector_store_id: String,
    client: reqwest::Client,
}

impl OpenAiMemoryBackend {
    /// Build a backend over an already-created vector store id.
    pub fn new(api_key: impl Into<String>, vector_store_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            vector_store_id: vector_store_id.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL (tests, proxies).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a fresh vector store to back this backend, returning its id.
    /// Intended for one-time use during startup wiring before constructing
    /// the backend proper.
    pub async fn create_memory_store(api_key: &str, base_url: &str) -> Result<String, MemoryError> {
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        let client = reqwest::Client::new();
        let created: Created = client
            .post(format!("{base_url}/v1/vector_stores"))
            .bearer_auth(api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&serde_json::json!({"name": "broker-memory"}))
            .send()
            .await
            .map_err(|e| MemoryError::IndexFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| MemoryError::IndexFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemoryError::IndexFailed(e.to_string()))?;
        Ok(created.id)
    }
}

#[derive(Deserialize)]
struct UploadFileResponse {
    id: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    file_id: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    content: Vec<SearchHitContent>,
}

#[derive(Deserialize)]
struct SearchHitContent {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl MemoryBackend for OpenAiMemoryBackend {
    async fn index(&self, text: &str) -> Result<String, MemoryError> {
        let part = reqwest::multipart::Part::bytes(text.as_bytes().to_vec()).file_name("memory.txt");
        let form = reqwest::multipart::Form::new().part("file", part).text("purpose", "assistants");

        let uploaded: UploadFileResponse = self
            .client
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MemoryError::IndexFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemoryError::IndexFailed(e.to_string()))?;

        self.client
            .post(format!("{}/v1/vector_stores/{}/files", self.base_url, self.vector_store_id))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&serde_json::json!({"file_id": uploaded.id}))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MemoryError::IndexFailed(e.to_string()))?;

        Ok(uploaded.id)
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<MemoryHit>, MemoryError> {
        let response: SearchResponse = self
            .client
            .post(format!("{}/v1/vector_stores/{}/search", self.base_url, self.vector_store_id))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&serde_json::json!({"query": query, "max_num_results": max_results}))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MemoryError::SearchFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemoryError::SearchFailed(e.to_string()))?;

        Ok(response
            .data
            .into_iter()
            .map(|hit| MemoryHit {
                embedding_handle: hit.file_id,
                summary_text: hit.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("\n"),
                score: hit.score,
            })
            .collect())
    }
}

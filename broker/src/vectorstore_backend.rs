//! Concrete [`VectorStoreBackend`] against OpenAI's vector-store API.
//!
//! Grounded on `broker_adapter::openai::OpenAiAdapter`'s `reqwest` client
//! setup and bearer-auth convention; this is the only concrete backend the
//! broker ships (local-only deployments that never use `vector_store_ids`
//! never construct it — see DESIGN.md for the scope note).

use async_trait::async_trait;
use broker_types::{FileRef, VectorStoreId};
use broker_vectorstore::{VectorStoreBackend, VectorStoreError};
use serde::Deserialize;
use tracing::instrument;

/// Vector-store management backed by `POST/GET/DELETE /v1/vector_stores`
/// and `/v1/files`.
pub struct OpenAiVectorStoreBackend {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    capacity: u64,
}

impl OpenAiVectorStoreBackend {
    /// Build a backend over the given API key, honoring `capacity` as the
    /// provider-side cap the manager should stay under (spec §4.5).
    pub fn new(api_key: impl Into<String>, capacity: u64) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            client: reqwest::Client::new(),
            capacity,
        }
    }

    /// Override the API base URL (tests, proxies).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn repository_err(err: impl std::error::Error + Send + Sync + 'static) -> VectorStoreError {
        VectorStoreError::Repository(Box::new(err))
    }
}

#[derive(Deserialize)]
struct CreateVectorStoreResponse {
    id: String,
}

#[derive(Deserialize)]
struct UploadFileResponse {
    id: String,
}

#[derive(Deserialize)]
struct ListVectorStoresResponse {
    data: Vec<serde_json::Value>,
}

#[async_trait]
impl VectorStoreBackend for OpenAiVectorStoreBackend {
    #[instrument(skip(self))]
    async fn create_store(&self) -> Result<VectorStoreId, VectorStoreError> {
        let response = self
            .client
            .post(format!("{}/v1/vector_stores", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(Self::repository_err)?
            .error_for_status()
            .map_err(Self::repository_err)?
            .json::<CreateVectorStoreResponse>()
            .await
            .map_err(Self::repository_err)?;
        Ok(VectorStoreId::new(response.id))
    }

    #[instrument(skip(self, file))]
    async fn upload(&self, vs_id: &VectorStoreId, file: &FileRef) -> Result<(), VectorStoreError> {
        let bytes = tokio::fs::read(&file.abs_path).await.map_err(|e| VectorStoreError::UploadFailed {
            message: e.to_string(),
            uploaded_so_far: 0,
            requested: 1,
        })?;
        let file_name = file
            .abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("purpose", "assistants");

        let uploaded = self
            .client
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VectorStoreError::UploadFailed {
                message: e.to_string(),
                uploaded_so_far: 0,
                requested: 1,
            })?;
        let uploaded: UploadFileResponse = uploaded.json().await.map_err(|e| VectorStoreError::UploadFailed {
            message: e.to_string(),
            uploaded_so_far: 0,
            requested: 1,
        })?;

        self.client
            .post(format!("{}/v1/vector_stores/{}/files", self.base_url, vs_id.as_str()))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&serde_json::json!({"file_id": uploaded.id}))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VectorStoreError::UploadFailed {
                message: e.to_string(),
                uploaded_so_far: 0,
                requested: 1,
            })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_store(&self, vs_id: &VectorStoreId) -> Result<(), VectorStoreError> {
        self.client
            .delete(format!("{}/v1/vector_stores/{}", self.base_url, vs_id.as_str()))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Self::repository_err)?;
        Ok(())
    }

    async fn store_count(&self) -> Result<u64, VectorStoreError> {
        let response = self
            .client
            .get(format!("{}/v1/vector_stores?limit=100", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(Self::repository_err)?
            .error_for_status()
            .map_err(Self::repository_err)?
            .json::<ListVectorStoresResponse>()
            .await
            .map_err(Self::repository_err)?;
        Ok(response.data.len() as u64)
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

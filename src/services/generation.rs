use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::DifficultyLevel;

/// Parameters sent to the generation backend for one employee.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub employee_id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty_level: DifficultyLevel,
    pub skills_to_address: Vec<String>,
}

/// Artifact reference returned by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub content_id: String,
}

/// Turns a personalized course request into generated content.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedContent, GenerationError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationResponse {
    success: bool,
    content_id: Option<String>,
    error: Option<String>,
}

/// HTTP client for the hosted course generation endpoint.
pub struct HttpGenerationClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGenerationClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, GenerationError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build().map_err(GenerationError::Http)?,
            endpoint: endpoint.to_string(),
            api_key: api_key.map(str::to_string),
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent, GenerationError> {
        let mut call = self.http.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(GenerationError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let parsed: GenerationResponse = response.json().await.map_err(GenerationError::Http)?;
        into_content(parsed)
    }
}

fn into_content(response: GenerationResponse) -> Result<GeneratedContent, GenerationError> {
    if !response.success {
        return Err(GenerationError::Rejected(
            response
                .error
                .unwrap_or_else(|| "generation backend reported failure".to_string()),
        ));
    }

    match response.content_id {
        Some(content_id) if !content_id.trim().is_empty() => Ok(GeneratedContent { content_id }),
        _ => Err(GenerationError::MissingContent),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation rejected: {0}")]
    Rejected(String),

    #[error("Generation succeeded without a content id")]
    MissingContent,
}

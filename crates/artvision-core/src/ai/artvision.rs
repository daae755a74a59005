use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ArtService;
use crate::error::ServiceError;
use crate::state::{ChatTurn, ImageRef};

const ANALYZE_PATH: &str = "/analyze";
const CHAT_PATH: &str = "/chat";

// The service expects every upload as a JPEG named image.jpg, whatever the
// file on disk is called.
const IMAGE_FIELD: &str = "file";
const IMAGE_FILE_NAME: &str = "image.jpg";
const IMAGE_MIME: &str = "image/jpeg";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [ChatTurn],
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    analysis_report: String,
}

/// HTTP client for the ArtVision analysis service
#[derive(Clone)]
pub struct ArtVisionClient {
    client: Client,
    base_url: String,
}

impl ArtVisionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client whose requests fail once `timeout` elapses
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ServiceError::Transport {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ArtService for ArtVisionClient {
    async fn analyze(&self, image: &ImageRef) -> Result<String, ServiceError> {
        let url = self.url(ANALYZE_PATH);
        let bytes = image.read().await?;
        tracing::debug!(%url, bytes = bytes.len(), image = %image.path().display(), "uploading image");

        let part = Part::bytes(bytes)
            .file_name(IMAGE_FILE_NAME)
            .mime_str(IMAGE_MIME)
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;

        let body: AnalyzeResponse = read_json(&url, response).await?;
        Ok(body.analysis_report)
    }

    async fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<String, ServiceError> {
        let url = self.url(CHAT_PATH);
        tracing::debug!(%url, turns = history.len(), "sending chat message");

        let request = ChatRequest { message, history };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;

        let body: ChatResponse = read_json(&url, response).await?;
        Ok(body.response)
    }
}

/// Check the status, then decode the body, keeping both failure kinds apart
async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| ServiceError::Transport {
            url: url.to_string(),
            source,
        })?;

    if !status.is_success() {
        return Err(ServiceError::Status { status, body: text });
    }

    serde_json::from_str(&text).map_err(|e| ServiceError::MalformedBody(e.to_string()))
}

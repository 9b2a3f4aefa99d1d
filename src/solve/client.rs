use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::{
    error::SolveError,
    models::{ModelHealth, SolveOutcome, SolveRequest},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const SOLVE_PATH: &str = "/api/solve";
pub const HEALTH_PATH: &str = "/api/health";

/// The remote recognition service, seen as a plain request/response call.
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    async fn solve(&self, request: &SolveRequest) -> Result<SolveOutcome, SolveError>;

    async fn health(&self) -> Result<ModelHealth, SolveError>;
}

pub struct HttpRecognitionClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecognitionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RecognitionClient for HttpRecognitionClient {
    async fn solve(&self, request: &SolveRequest) -> Result<SolveOutcome, SolveError> {
        let image = &request.image;
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.mime())?;

        let form = Form::new()
            .part("file", part)
            .text("type", request.mode.as_str());

        log_debug!(
            "[{}] POST {} ({} bytes, mode {})",
            request.attempt_id,
            self.endpoint(SOLVE_PATH),
            image.bytes().len(),
            request.mode
        );

        let response = self
            .client
            .post(self.endpoint(SOLVE_PATH))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            log_warn!("[{}] server error: {} - {}", request.attempt_id, status, body);
            return Err(SolveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        SolveOutcome::from_body(&body).map_err(SolveError::MalformedResponse)
    }

    async fn health(&self) -> Result<ModelHealth, SolveError> {
        let response = self.client.get(self.endpoint(HEALTH_PATH)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SolveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|err| SolveError::MalformedResponse(format!("unexpected health body: {err}")))
    }
}

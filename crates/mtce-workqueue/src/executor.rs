//! The seam between the work queue and the actual HTTP transport, so
//! dispatcher logic can be exercised against a fake executor in tests
//! without opening a socket.

use crate::request::{WorkOutcome, WorkRequest};
use async_trait::async_trait;
use mtce_common::MtceError;

#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &WorkRequest) -> Result<WorkOutcome, MtceError>;
}

/// The production executor: a shared `reqwest::Client` reused across
/// requests rather than built per call.
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &WorkRequest) -> Result<WorkOutcome, MtceError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| MtceError::NotConnected(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await.ok();
        Ok(WorkOutcome { status, body })
    }
}

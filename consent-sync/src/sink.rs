//! Remote consent sink.
//!
//! [`HttpSink`] POSTs the JSON transmission to the configured endpoint.
//! HTTP error statuses come back as a [`SinkResponse`]; only failures that
//! never produced a status (DNS, connect, TLS, timeout) are a
//! [`TransportError`].

use std::time::Duration;

use async_trait::async_trait;

use consent_core::{Config, ConsentTransmission};

use crate::error::TransportError;

/// What the remote side answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkResponse {
    pub status_code: u16,
}

impl SinkResponse {
    pub fn succeeded(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Accepts one consent transmission per call.
#[async_trait]
pub trait ConsentSink: Send + Sync {
    async fn submit(&self, payload: &ConsentTransmission) -> Result<SinkResponse, TransportError>;
}

/// JSON-over-HTTP sink backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpSink {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("consent-sync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.endpoint.clone(), config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConsentSink for HttpSink {
    async fn submit(&self, payload: &ConsentTransmission) -> Result<SinkResponse, TransportError> {
        let body = payload
            .to_json()
            .map_err(|e| TransportError(format!("encode payload: {e}")))?;
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();

        tracing::debug!(endpoint = %endpoint, body = %body, "POST consent");
        let response = tokio::task::spawn_blocking(move || post(&agent, &endpoint, &body))
            .await
            .map_err(|e| TransportError(format!("request task failed: {e}")))??;
        tracing::debug!(status = response.status_code, "consent endpoint responded");
        Ok(response)
    }
}

fn post(agent: &ureq::Agent, endpoint: &str, body: &str) -> Result<SinkResponse, TransportError> {
    match agent
        .post(endpoint)
        .set("Content-Type", "application/json")
        .send_string(body)
    {
        Ok(resp) => Ok(SinkResponse {
            status_code: resp.status(),
        }),
        Err(ureq::Error::Status(code, _)) => Ok(SinkResponse { status_code: code }),
        Err(ureq::Error::Transport(t)) => Err(TransportError(t.to_string())),
    }
}

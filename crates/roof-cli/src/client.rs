//! HTTP client for talking to `roofd`.

use std::time::Duration;

use anyhow::Result;
use roof_controller::{HealthReport, StatusSnapshot, StopReason};
use serde::Serialize;
use serde_json::json;

use crate::error::CliError;

/// Thin `reqwest` wrapper over roofd's `/v1/*` API.
pub struct RoofClient {
    endpoint: String,
    http: reqwest::Client,
}

impl RoofClient {
    /// Build a client for `endpoint` (defaults to `http://127.0.0.1:8787`).
    pub fn connect(endpoint: Option<&str>) -> Result<Self> {
        let endpoint = endpoint.unwrap_or("http://127.0.0.1:8787").to_string();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(CliError::InvalidEndpoint(endpoint).into());
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { endpoint, http })
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.get("/v1/status").await
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.get("/v1/health").await
    }

    pub async fn open(&self) -> Result<StatusSnapshot> {
        self.post_empty("/v1/open").await
    }

    pub async fn close(&self) -> Result<StatusSnapshot> {
        self.post_empty("/v1/close").await
    }

    pub async fn stop(&self, reason: Option<StopReason>) -> Result<StatusSnapshot> {
        self.post_json("/v1/stop", &json!({ "reason": reason })).await
    }

    pub async fn clear_fault(&self, pulse_ms: u64) -> Result<StatusSnapshot> {
        self.post_json("/v1/clear-fault", &json!({ "pulse_ms": pulse_ms }))
            .await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CliError::ServiceUnavailable(self.endpoint.clone(), e.to_string()))?;
        Self::parse(response).await
    }

    async fn post_empty<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| CliError::ServiceUnavailable(self.endpoint.clone(), e.to_string()))?;
        Self::parse(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize,
    {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CliError::ServiceUnavailable(self.endpoint.clone(), e.to_string()))?;
        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let body: serde_json::Value = response.json().await.unwrap_or(json!({}));
            let message = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let code = body
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Err(CliError::ApiError { code, message }.into())
        }
    }
}

use std::time::Duration;

use reqwest::{Client, StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio_retry::{RetryIf, strategy::FixedInterval};
use tracing::debug;

use crate::query::Query;

/// Token the server accepts when it runs with test credentials.
pub const DEFAULT_API_TOKEN: &str = "test";

/// Body the server answers with while a query result is still being built.
const CONTINUE_WAIT: &str = "Continue wait";

const CONTINUE_WAIT_INTERVAL: Duration = Duration::from_millis(500);
const CONTINUE_WAIT_ATTEMPTS: usize = 120;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("sending load request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("load request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("server did not finish the query within the polling budget")]
    ContinueWait,

    #[error("malformed load response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// Result of a load call, exposing rows as plain tabular data.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoadResponse {
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

impl LoadResponse {
    pub fn raw_data(&self) -> &[Map<String, Value>] {
        &self.data
    }
}

/// HTTP client for the server's query API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Client,
    api_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            inner: Client::new(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    /// Run one query and return its row data.
    ///
    /// A 200 whose body carries "Continue wait" means the result is not
    /// ready yet; the call polls again on a fixed interval until the server
    /// answers or the attempt budget runs out.
    pub async fn load(&self, query: &Query) -> Result<LoadResponse, ClientError> {
        RetryIf::spawn(
            FixedInterval::new(CONTINUE_WAIT_INTERVAL).take(CONTINUE_WAIT_ATTEMPTS),
            || self.load_once(query),
            |e: &ClientError| matches!(e, ClientError::ContinueWait),
        )
        .await
    }

    async fn load_once(&self, query: &Query) -> Result<LoadResponse, ClientError> {
        let url = format!("{}/v1/load", self.api_url);
        let response = self
            .inner
            .post(&url)
            .header(AUTHORIZATION, self.token.as_str())
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }

        let value: Value = serde_json::from_str(&body).map_err(ClientError::MalformedResponse)?;
        if value.get("error").and_then(Value::as_str) == Some(CONTINUE_WAIT) {
            debug!(%url, "query still building, polling again");
            return Err(ClientError::ContinueWait);
        }

        serde_json::from_value(value).map_err(ClientError::MalformedResponse)
    }
}

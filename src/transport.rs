//! HTTP reference transport
//!
//! Replays an action by POSTing its payload as JSON to a per-kind endpoint. The action
//! id travels in an `Idempotency-Key` header so the backend can discard a replay it
//! has already applied.

use crate::action::PendingAction;
use crate::config::EndpointConfig;
use crate::error::{ExecutionError, RegistrationError};
use crate::executor::{ActionHandler, DispatchTable};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const KIND_HEADER: &str = "X-Standby-Action-Kind";
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Map transport errors to replay failures
fn map_http_error(error: reqwest::Error) -> ExecutionError {
    if error.is_timeout() {
        ExecutionError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ExecutionError::Transport(format!("Connection error: {}", error))
    } else {
        ExecutionError::Transport(format!("HTTP error: {}", error))
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
}

/// Handler that posts one action kind to a fixed URL
pub struct HttpHandler {
    client: Client,
    url: reqwest::Url,
}

impl HttpHandler {
    pub fn new(kind: &str, endpoint: &EndpointConfig) -> Result<Self, RegistrationError> {
        let invalid = |message: String| RegistrationError::InvalidEndpoint {
            kind: kind.to_string(),
            message,
        };
        let url = reqwest::Url::parse(&endpoint.url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        let client = build_http_client(Duration::from_millis(endpoint.timeout_ms))
            .map_err(|e| invalid(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

#[async_trait]
impl ActionHandler for HttpHandler {
    async fn handle(&self, action: &PendingAction) -> Result<(), ExecutionError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(IDEMPOTENCY_HEADER, action.id.as_str())
            .header(KIND_HEADER, action.kind.as_str())
            .json(&action.payload)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        debug!(
            action_id = %action.id,
            kind = %action.kind,
            status = status.as_u16(),
            "Replay request completed"
        );
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, body.chars().take(200).collect::<String>())
        };
        if status.is_server_error() || status.as_u16() == 429 || status.as_u16() == 408 {
            Err(ExecutionError::Transport(detail))
        } else {
            Err(ExecutionError::Rejected(detail))
        }
    }
}

/// Build a dispatch table with one HTTP handler per configured endpoint.
pub fn dispatch_table_from_endpoints(
    endpoints: &HashMap<String, EndpointConfig>,
) -> Result<DispatchTable, RegistrationError> {
    let mut kinds: Vec<&String> = endpoints.keys().collect();
    kinds.sort();

    let mut table = DispatchTable::new();
    for kind in kinds {
        let handler = HttpHandler::new(kind, &endpoints[kind])?;
        table.register(kind.clone(), Arc::new(handler))?;
    }
    Ok(table)
}

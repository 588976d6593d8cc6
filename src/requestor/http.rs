//! Requestor over HTTP.

use super::{ApiRequest, Completion, Method, Requestor};
use crate::error::{Result, TailError};
use crate::model::ModelConfig;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

/// Issues requests with reqwest on a tokio runtime.
///
/// Completions run on a runtime worker thread.
pub struct HttpRequestor {
    client: reqwest::Client,
    api_root: String,
    runtime: Handle,
}

impl HttpRequestor {
    pub fn new(config: &ModelConfig, runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TailError::TransportUnsupported(e.to_string()))?;

        Ok(Self {
            client,
            api_root: config.api_root.trim_end_matches('/').to_string(),
            runtime,
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn supports_root(&self) -> bool {
        self.api_root.starts_with("http://") || self.api_root.starts_with("https://")
    }
}

impl Requestor for HttpRequestor {
    fn request(&self, request: ApiRequest, on_complete: Completion) {
        if !self.supports_root() {
            on_complete(Err(TailError::TransportUnsupported(format!(
                "no HTTP transport for {}",
                self.api_root
            ))));
            return;
        }

        let url = format!("{}{}", self.api_root, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, url = %url, "request");
        let completion = PendingCompletion(Some(on_complete));
        self.runtime.spawn(async move {
            completion.finish(execute(builder).await);
        });
    }
}

/// Completion carried by a spawned request.
///
/// If the future is dropped before finishing (runtime shut down, or never
/// polled), the completion still runs with [`TailError::RequestFailed`].
struct PendingCompletion(Option<Completion>);

impl PendingCompletion {
    fn finish(mut self, outcome: Result<Value>) {
        if let Some(on_complete) = self.0.take() {
            on_complete(outcome);
        }
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if let Some(on_complete) = self.0.take() {
            debug!("request dropped before completing");
            on_complete(Err(TailError::RequestFailed));
        }
    }
}

async fn execute(builder: reqwest::RequestBuilder) -> Result<Value> {
    let response = builder.send().await.map_err(|e| {
        debug!(error = %e, "request failed");
        TailError::RequestFailed
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TailError::Status {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| TailError::Decode(e.to_string()))
}

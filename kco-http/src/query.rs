//! State-query layer on top of [`HttpClient`], with the transport-vs-logical
//! error split a Supervisor needs to decide whether a poll failure is worth
//! retrying or worth surfacing as a `Warning` event.

use crate::{HttpClient, HttpError, RequestOpts};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// What a Supervisor saw trying to poll its TApp's state endpoint.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Network/connection/TLS failure, or a 5xx/429 that exhausted retries —
    /// worth logging at `warn` but not worth failing the whole Supervisor.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered but the response was not well-formed for the
    /// query that was sent (decode failure, or a non-retryable 4xx).
    #[error("logical error: {0}")]
    Logical(String),
    /// No pod currently matches the TApp's selector.
    #[error("pod discovery failed: {0}")]
    Discovery(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<HttpError> for QueryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Network(msg) => QueryError::Transport(msg),
            HttpError::Api { status, message, .. } if status.is_server_error() => {
                QueryError::Transport(message)
            }
            HttpError::Api { message, .. } => QueryError::Logical(message),
            HttpError::Decode(msg, _) => QueryError::Logical(msg),
            HttpError::Url(msg) | HttpError::Build(msg) => QueryError::Logical(msg),
        }
    }
}

impl From<QueryError> for kco_common::KcoError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Transport(msg) => kco_common::KcoError::Transport(msg),
            QueryError::Logical(msg) => kco_common::KcoError::Logical(msg),
            QueryError::Discovery(msg) => kco_common::KcoError::Discovery(msg),
            QueryError::Timeout(d) => {
                kco_common::KcoError::Transport(format!("timed out after {d:?}"))
            }
        }
    }
}

/// A resolved address to poll. Pods are discovered once at Supervisor start
/// (and on config update) rather than on every poll tick, per the reference
/// operator's "rediscover only on (re)start" behavior.
#[derive(Debug, Clone)]
pub struct PodAddress {
    pub pod_name: String,
    pub base_url: String,
}

/// Resolves a TApp's label selector to a pollable address. Implemented by
/// `kco-kube`'s real cluster client and by test fakes.
#[async_trait]
pub trait PodDiscovery: Send + Sync {
    async fn discover(
        &self,
        namespace: &str,
        selector: &std::collections::BTreeMap<String, String>,
    ) -> Result<PodAddress, QueryError>;
}

/// Issues a TApp's configured state query against a discovered pod and
/// returns the raw JSON payload for the State Store to snapshot.
pub struct QueryClient {
    http: HttpClient,
}

impl QueryClient {
    pub fn new(base_url: &str) -> Result<Self, QueryError> {
        let http = HttpClient::new(base_url).map_err(QueryError::from)?;
        Ok(Self { http })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.http = self.http.with_retries(retries);
        self
    }

    /// POST `query` as a GraphQL-shaped body to this client's base URL and
    /// return the decoded JSON response body.
    pub async fn query_state(&self, query: &str) -> Result<serde_json::Value, QueryError> {
        let body = serde_json::json!({ "query": query });
        self.http
            .post_json_opts("", &body, RequestOpts::default())
            .await
            .map_err(QueryError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_maps_to_transport() {
        let err = HttpError::Api {
            status: reqwest::StatusCode::BAD_GATEWAY,
            message: "boom".into(),
            request_id: "-".into(),
        };
        assert!(matches!(QueryError::from(err), QueryError::Transport(_)));
    }

    #[test]
    fn client_error_maps_to_logical() {
        let err = HttpError::Api {
            status: reqwest::StatusCode::BAD_REQUEST,
            message: "bad query".into(),
            request_id: "-".into(),
        };
        assert!(matches!(QueryError::from(err), QueryError::Logical(_)));
    }
}

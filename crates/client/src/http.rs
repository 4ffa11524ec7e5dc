//! `reqwest` implementation of the [`Transport`] port.

use std::time::Duration;

use async_trait::async_trait;
use colab::{ApiRequest, ApiResponse, ColabError, HttpMethod, Transport};
use reqwest::header::RETRY_AFTER;
use tracing::{instrument, warn};

use crate::ClientConfig;

/// HTTP transport over a pooled `reqwest::Client`.
///
/// Every request carries the configured timeout; an elapsed timeout surfaces
/// as [`ColabError::Transport`] with `timed_out` set.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport from client settings.
    pub fn new(config: &ClientConfig) -> Result<Self, ColabError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ColabError::configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client (e.g. one with a custom TLS setup).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ColabError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.map_err(transport_error)?;

        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }
}

fn transport_error(error: reqwest::Error) -> ColabError {
    let timed_out = error.is_timeout();
    if timed_out {
        warn!("request timed out");
    }
    ColabError::Transport {
        message: error.to_string(),
        timed_out,
    }
}

/// Parses the delta-seconds form of `Retry-After`. HTTP-date values are
/// ignored and the caller's own schedule applies.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

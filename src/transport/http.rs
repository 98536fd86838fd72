use crate::config::ClientConfig;
use crate::Result;
use reqwest::Proxy;
use std::time::Duration;
use url::Url;

/// Pooled HTTP client bound to one completions endpoint.
///
/// No overall request timeout is set on the reqwest client: the per-attempt
/// deadline is enforced by the caller so it also covers body streaming.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            // Conservative HTTP/2 keepalive defaults for long-lived streams.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = config.proxy_url.as_deref() {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                crate::Error::configuration_with_context(
                    format!("invalid proxy url: {}", e),
                    crate::ErrorContext::new().with_field_path("config.proxy_url"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST the request document. Any HTTP status is returned as a response;
    /// only failures to reach the service become errors here.
    pub async fn post(
        &self,
        request_body: &serde_json::Value,
        stream: bool,
        request_id: &str,
    ) -> Result<reqwest::Response> {
        let mut req = self.client.post(self.endpoint.clone()).json(request_body);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        req = req.header(
            "accept",
            if stream {
                "text/event-stream"
            } else {
                "application/json"
            },
        );
        // Correlation id for log linkage; the service may ignore it.
        req = req.header("x-request-id", request_id);

        req.send()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

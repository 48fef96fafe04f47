use std::time::Duration;

use url::Url;

use crate::config::GenerationConfig;
use crate::generate::{
    GENERIC_FAILURE_MESSAGE, GenerationClient, GenerationError, GenerationRequest,
    GenerationResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("invalid generation endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Posts generation requests as JSON to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    client: reqwest::Client,
    url: Url,
    timeout: Option<Duration>,
}

pub fn resolve_endpoint(config: &GenerationConfig) -> Result<Url, HttpClientError> {
    let url = match &config.base_url {
        Some(base) => Url::parse(base)?.join(&config.endpoint)?,
        None => Url::parse(&config.endpoint)?,
    };
    Ok(url)
}

impl HttpGenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, HttpClientError> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: resolve_endpoint(config)?,
            timeout: config.request_timeout_ms.map(Duration::from_millis),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn transport_failure(err: reqwest::Error) -> GenerationError {
    tracing::warn!(%err, "generation request failed");
    GenerationError::Transport(GENERIC_FAILURE_MESSAGE.to_string())
}

impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let mut builder = self.client.post(self.url.clone()).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        tracing::debug!(url = %self.url, mode = request.mode.as_str(), "posting generation request");

        // The body is read whatever the status; a failing endpoint still reports `{error}`.
        let response = builder.send().await.map_err(transport_failure)?;
        response
            .json::<GenerationResponse>()
            .await
            .map_err(transport_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let config = GenerationConfig {
            base_url: Some("http://localhost:8080/app/".to_string()),
            ..GenerationConfig::default()
        };
        assert_eq!(
            resolve_endpoint(&config).unwrap().as_str(),
            "http://localhost:8080/api/generate-content"
        );
    }

    #[test]
    fn relative_endpoint_needs_a_base() {
        assert!(matches!(
            resolve_endpoint(&GenerationConfig::default()),
            Err(HttpClientError::InvalidUrl(url::ParseError::RelativeUrlWithoutBase))
        ));
    }

    #[test]
    fn absolute_endpoint_stands_alone() {
        let config = GenerationConfig {
            endpoint: "https://gen.example.com/v1/generate".to_string(),
            request_timeout_ms: Some(30_000),
            ..GenerationConfig::default()
        };
        let client = HttpGenerationClient::new(&config).unwrap();
        assert_eq!(client.url().host_str(), Some("gen.example.com"));
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
    }
}

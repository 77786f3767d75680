use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::endpoints::EndpointId;
use crate::models::ApiResponse;

/// Message stored when a failure carries no description of its own.
pub const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    /// A failure described only by its message.
    #[error("{0}")]
    Message(String),
}

impl FetchError {
    /// Text stored as the `error` of a failed response.
    pub fn message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        }
    }
}

#[async_trait]
pub trait ApiClient: Clone + Send + Sync + 'static {
    async fn fetch(&self, endpoint: EndpointId) -> Result<ApiResponse, FetchError>;
}

/// Fetches probe results over HTTP.
///
/// The status code is not checked: any body that parses as JSON is a
/// response, including error payloads sent with a 4xx or 5xx status.
#[derive(Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: EndpointId) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("path", endpoint.as_str());
        url
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    async fn fetch(&self, endpoint: EndpointId) -> Result<ApiResponse, FetchError> {
        let url = self.endpoint_url(endpoint);
        debug!(url = %url, "Requesting probe endpoint");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = %status, body_length = body.len(), "Probe endpoint answered");

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpApiClient {
        HttpApiClient::new(Url::parse(base).unwrap())
    }

    #[test]
    fn test_endpoint_url_appends_path_parameter() {
        let client = client("https://functions.example.com/066b4d3b");
        assert_eq!(
            client.endpoint_url(EndpointId::Cursor).as_str(),
            "https://functions.example.com/066b4d3b?path=cursor"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_existing_query() {
        let client = client("http://localhost:3000/api/v1/probe?region=eu");
        assert_eq!(
            client.endpoint_url(EndpointId::Info).as_str(),
            "http://localhost:3000/api/v1/probe?region=eu&path=info"
        );
    }

    #[test]
    fn test_endpoint_url_does_not_mutate_base() {
        let client = client("http://localhost:3000/api/v1/probe");
        client.endpoint_url(EndpointId::Conn);
        client.endpoint_url(EndpointId::Conn);
        assert_eq!(client.base_url().query(), None);
    }

    #[test]
    fn test_message_uses_description() {
        let err = FetchError::Message("Failed to fetch".to_string());
        assert_eq!(err.message(), "Failed to fetch");
    }

    #[test]
    fn test_message_falls_back_when_empty() {
        let err = FetchError::Message(String::new());
        assert_eq!(err.message(), UNKNOWN_ERROR);
    }

    #[test]
    fn test_decode_error_message() {
        let err: FetchError = serde_json::from_str::<ApiResponse>("<html>")
            .unwrap_err()
            .into();
        assert!(err.message().contains("expected value"));
    }
}

//! Production transport backed by reqwest
//!
//! Two reqwest clients share one cookie jar: the buffered client carries
//! the request timeout, the streaming client only a connect timeout so a
//! long-lived event stream is not cut off. The jar holds the HttpOnly
//! refresh-token cookie between calls.

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::transport::{
    reason_phrase, HttpRequest, HttpResponse, HttpTransport, Method, StreamResponse,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::cookie::Jar;
use std::sync::Arc;

/// reqwest-based [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build transport from client configuration
    ///
    /// # Errors
    /// - `TransportError::InvalidRequest` if the TLS backend cannot be initialised
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());

        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        let stream_client = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            stream_client,
        })
    }

    fn build(client: &reqwest::Client, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
    }

    fn headers_of(response: &reqwest::Response) -> Vec<(String, String)> {
        response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = Self::build(&self.client, request).send().await?;

        let status = response.status();
        let headers = Self::headers_of(&response);
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: reason_phrase(status.as_u16()).to_string(),
            headers,
            body,
        })
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<StreamResponse, TransportError> {
        let response = Self::build(&self.stream_client, request).send().await?;

        let status = response.status();
        let headers = Self::headers_of(&response);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from))
            .boxed();

        Ok(StreamResponse {
            status: status.as_u16(),
            status_text: reason_phrase(status.as_u16()).to_string(),
            headers,
            body,
        })
    }
}

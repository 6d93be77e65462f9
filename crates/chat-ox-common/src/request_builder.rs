use crate::{
    error::{self, CommonRequestError},
    streaming::{SseEvent, SseParser},
};
use async_stream::try_stream;
use futures_util::stream::BoxStream;
use reqwest::{Method, RequestBuilder as ReqwestRequestBuilder, Response};
use serde::{Deserialize, Serialize};

/// HTTP method for API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

/// Authentication method for API requests
#[derive(Clone)]
pub enum AuthMethod {
    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer(String),
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Represents an API endpoint with its configuration
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub auth: Option<AuthMethod>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Absolute URL of `endpoint` under the base URL
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        )
    }
}

/// Generic request builder that handles common HTTP patterns
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    /// Build a reqwest `RequestBuilder` for the given endpoint
    pub fn build_request(&self, endpoint: &Endpoint) -> ReqwestRequestBuilder {
        let url = self.config.url_for(endpoint);
        let mut req = self.client.request(endpoint.method.into(), &url);

        if let Some(AuthMethod::Bearer(token)) = &self.config.auth {
            req = req.bearer_auth(token);
        }

        if endpoint.method == HttpMethod::Post {
            req = req.header("content-type", "application/json");
        }

        req
    }

    /// Execute a request with an optional JSON body and return the deserialized response
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success status, or an undecodable body.
    pub async fn request_json<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<T, CommonRequestError> {
        let mut req = self.build_request(endpoint);

        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        Self::handle_response(res).await
    }

    /// Execute a streaming request and yield raw server-sent events.
    ///
    /// Nothing is sent until the returned stream is first polled.
    pub fn stream_events<B: Serialize>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> BoxStream<'static, Result<SseEvent, CommonRequestError>> {
        let body = body.map(serde_json::to_vec).transpose();
        let req = self.build_request(endpoint);
        let path = endpoint.path.clone();

        Box::pin(try_stream! {
            let mut req = req.header("accept", "text/event-stream");
            if let Some(body) = body? {
                req = req.body(body);
            }

            let response = req.send().await?;
            let status = response.status();

            if status.is_success() {
                log::debug!("event stream opened on {path} (HTTP {})", status.as_u16());
                let mut parser = SseParser::new(response);

                while let Some(event) = parser.next_event().await? {
                    yield event;
                }
            } else {
                let bytes = response.bytes().await?;
                Err::<(), _>(error::parse_error_response(status, &bytes))?;
            }
        })
    }

    /// Handle response and parse errors
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        res: Response,
    ) -> Result<T, CommonRequestError> {
        let status = res.status();
        let bytes = res.bytes().await?;

        if status.is_success() {
            serde_json::from_slice::<T>(&bytes).map_err(|e| {
                CommonRequestError::UnexpectedResponse(format!(
                    "HTTP {} but failed to decode JSON: {}; body: {}",
                    status.as_u16(),
                    e,
                    String::from_utf8_lossy(&bytes)
                ))
            })
        } else {
            Err(error::parse_error_response(status, &bytes))
        }
    }
}

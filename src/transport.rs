//! The network boundary. The store drives every request through the
//! [`Transport`] trait and interprets only the status code and JSON body of
//! what comes back; retry and timeout policy belong to the implementation
//! behind the trait. The `http` feature ships [`HttpTransport`], a thin
//! `reqwest` adapter; tests script a mock instead.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request: method, headers in send order, optional JSON body.
#[derive(Clone, Debug, Default)]
pub struct FetchRequest {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// What the store needs back: the status code and the parsed JSON body,
/// `None` when the response had no body.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl FetchResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        FetchResponse { status, body }
    }

    pub fn json(&self) -> Result<Value, TransportError> {
        self.body
            .clone()
            .ok_or_else(|| TransportError::Body("response has no body".to_string()))
    }
}

/// Failure below the HTTP layer. A response that arrived, whatever its
/// status, is not a transport error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The request never completed.
    Request(String),
    /// The response body could not be read or parsed as JSON.
    Body(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(msg) => write!(f, "request failed: {}", msg),
            TransportError::Body(msg) => write!(f, "invalid response body: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// The collaborator that actually talks to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// Stock transport over a shared `reqwest` client.
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

#[cfg(feature = "http")]
impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;
        let body = if text.is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).map_err(|e| TransportError::Body(e.to_string()))?)
        };
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_names() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn json_requires_a_body() {
        let ok = FetchResponse::new(200, Some(json!({"data": null})));
        assert_eq!(ok.json().unwrap(), json!({"data": null}));

        let empty = FetchResponse::new(204, None);
        assert!(matches!(empty.json(), Err(TransportError::Body(_))));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            TransportError::Request("refused".to_string()).to_string(),
            "request failed: refused"
        );
        assert_eq!(
            TransportError::Body("EOF".to_string()).to_string(),
            "invalid response body: EOF"
        );
    }
}

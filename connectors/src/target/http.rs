use async_trait::async_trait;
use binding_core::config::parse_property;
use binding_core::{
    ConnectorContext, ConnectorSpec, Error, Metadata, Request, Response, Result, Stage, Target,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Forwards request payloads to an HTTP endpoint
///
/// Properties: `url` (required), `method` (default `POST`), `headers`
/// (JSON object), `timeout_seconds` (default 30). Transport failures and
/// 5xx answers are retryable; 4xx answers are not.
#[derive(Debug, Default)]
pub struct HttpTarget {
    client: Option<Client>,
    url: String,
    method: Option<Method>,
}

impl HttpTarget {
    /// Create target
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_headers(raw: &str) -> Result<HeaderMap> {
        let parsed: Metadata = serde_json::from_str(raw)
            .map_err(|e| Error::config("headers", format!("invalid JSON object: {}", e)))?;
        let mut headers = HeaderMap::new();
        for (name, value) in parsed {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config("headers", e.to_string()))?;
            let value =
                HeaderValue::from_str(&value).map_err(|e| Error::config("headers", e.to_string()))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::InvalidState("http target not initialized".into()))?;
        let method = self.method.clone().unwrap_or(Method::POST);

        let mut builder = client.request(method, &self.url).body(request.data.clone());
        for (key, value) in &request.metadata {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                builder = builder.header(name, value);
            }
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::Connector(format!("http request failed: {}", e)))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Connector(format!("http body read failed: {}", e)))?;
        debug!(url = %self.url, status = status.as_u16(), bytes = body.len(), "HTTP target answered");

        if status.is_server_error() {
            return Err(Error::Connector(format!(
                "{} answered {}: {}",
                self.url,
                status,
                String::from_utf8_lossy(&body)
            )));
        }
        if status.is_client_error() {
            return Err(Error::Unrecoverable(format!(
                "{} answered {}: {}",
                self.url,
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        Ok(Response::new(body).with_metadata("status", status.as_u16().to_string()))
    }
}

#[async_trait]
impl Stage for HttpTarget {
    async fn invoke(&self, cancel: &CancellationToken, request: Request) -> Result<Response> {
        tokio::select! {
            result = self.call(request) => result,
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}

#[async_trait]
impl Target for HttpTarget {
    fn kind(&self) -> &str {
        "http"
    }

    async fn init(&mut self, spec: &ConnectorSpec, _ctx: &ConnectorContext) -> Result<()> {
        let url = spec
            .properties
            .get("url")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::config("url", "required"))?;
        reqwest::Url::parse(url).map_err(|e| Error::config("url", e.to_string()))?;

        let method = match spec.properties.get("method").map(|s| s.trim()) {
            None | Some("") => Method::POST,
            Some(m) => Method::from_bytes(m.to_uppercase().as_bytes())
                .map_err(|e| Error::config("method", e.to_string()))?,
        };
        let headers = match spec.properties.get("headers") {
            Some(raw) if !raw.trim().is_empty() => Self::parse_headers(raw)?,
            _ => HeaderMap::new(),
        };
        let timeout = parse_property::<u64>(&spec.properties, "timeout_seconds", 30)?;

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| Error::config("http", e.to_string()))?;

        self.url = url.to_string();
        self.method = Some(method);
        self.client = Some(client);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn target(url: String) -> HttpTarget {
        let mut target = HttpTarget::new();
        let spec = ConnectorSpec::new("http")
            .with_property("url", url)
            .with_property("headers", r#"{"x-api-key": "secret"}"#);
        target
            .init(&spec, &ConnectorContext::new("b1", CancellationToken::new()))
            .await
            .unwrap();
        target
    }

    #[tokio::test]
    async fn test_init_requires_url() {
        let mut target = HttpTarget::new();
        let err = target
            .init(
                &ConnectorSpec::new("http"),
                &ConnectorContext::new("b1", CancellationToken::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { ref field, .. } if field == "url"));
    }

    #[tokio::test]
    async fn test_forwards_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("x-api-key", "secret"))
            .and(body_string("hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let target = target(format!("{}/orders", server.uri())).await;
        let resp = target
            .invoke(&CancellationToken::new(), Request::new("hello"))
            .await
            .unwrap();

        assert_eq!(resp.data, "accepted");
        assert_eq!(resp.metadata["status"], "200");
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/bad"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let busy = target(format!("{}/busy", server.uri())).await;
        let err = busy
            .invoke(&CancellationToken::new(), Request::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());

        let bad = target(format!("{}/bad", server.uri())).await;
        let err = bad
            .invoke(&CancellationToken::new(), Request::new("x"))
            .await
            .unwrap_err();
        assert!(!err.is_recoverable());
    }
}

use super::{SyncRequest, SyncResponse, Transport};
use crate::connection::ClientConfig;
use crate::core::{RecordError, Result, TransportError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{Level, event};

/// JSON-over-HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate().map_err(RecordError::Configuration)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let (name, value) = header_pair(name, value)?;
            headers.insert(name, value);
        }
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|err| RecordError::Configuration(err.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| RecordError::Configuration(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| RecordError::Configuration(format!("invalid header name '{}': {}", name, err)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|err| RecordError::Configuration(format!("invalid header value: {}", err)))?;
    Ok((name, value))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, request: SyncRequest) -> std::result::Result<SyncResponse, TransportError> {
        let url = self.config.resolve_url(&request.url);
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|err| TransportError::Rejected(err.to_string()))?;

        event!(Level::DEBUG, method = %method, url = %url, operation = %request.operation, "http request");

        let mut builder = self.client.request(method, &url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let success = (200..300).contains(&status);
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                Err(err) if success => return Err(err.into()),
                Err(_) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            }
        };

        if !success {
            event!(Level::WARN, status, url = %url, "http request failed");
            return Err(TransportError::Status { status, body });
        }
        Ok(SyncResponse { status, body })
    }
}

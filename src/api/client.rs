use super::documents::DocumentBackend;
use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::{ApiMessage, ApprovalRequest};
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// What the session asked the transport for; handed to test producers.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum MockRequest {
    Chat {
        thread_id: String,
        messages: Vec<ApiMessage>,
    },
    Resume {
        thread_id: String,
        approval: ApprovalRequest,
    },
}

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, request: MockRequest) -> Result<ByteStream>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            #[cfg(test)]
            mock_stream_producer: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            api_url: "http://localhost:8000/api".to_string(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    /// Starts an agent turn and returns its NDJSON event stream.
    pub async fn create_stream(
        &self,
        thread_id: &str,
        messages: &[ApiMessage],
    ) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(MockRequest::Chat {
                    thread_id: thread_id.to_string(),
                    messages: messages.to_vec(),
                });
            }
        }

        let payload = json!({
            "thread_id": thread_id,
            "messages": messages,
            "stream": true,
        });
        self.post_stream("chat/stream", &payload).await
    }

    /// Posts an approve/reject decision. The response body is the continuation
    /// of the paused turn.
    pub async fn resume_stream(
        &self,
        thread_id: &str,
        approval: &ApprovalRequest,
    ) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(MockRequest::Resume {
                    thread_id: thread_id.to_string(),
                    approval: approval.clone(),
                });
            }
        }

        let mut payload = serde_json::to_value(approval)?;
        if let Some(object) = payload.as_object_mut() {
            object.insert("thread_id".to_string(), json!(thread_id));
        }
        self.post_stream("chat/resume", &payload).await
    }

    async fn post_stream(&self, endpoint: &str, payload: &Value) -> Result<ByteStream> {
        let request_url = self.endpoint_url(endpoint);
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, payload);
        }

        let request = self
            .authorize(self.http.post(&request_url))
            .header("content-type", "application/json")
            .header("accept", "application/x-ndjson")
            .json(payload);

        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    async fn fetch_document(&self, document_id: &str) -> Result<Option<String>> {
        let request_url = self.endpoint_url("documents");
        let response = self
            .authorize(self.http.get(&request_url))
            .query(&[("path", document_id)])
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?
            .text()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;
        Ok(Some(body))
    }

    async fn save_document(&self, document_id: &str, content: &str) -> Result<()> {
        let request_url = self.endpoint_url("documents");
        let payload = json!({ "path": document_id, "content": content });
        self.authorize(self.http.put(&request_url))
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;
        Ok(())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.header("authorization", format!("Bearer {api_key}")),
            None => request,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.api_url)
    }
}

impl DocumentBackend for ApiClient {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(self.fetch_document(document_id))
    }

    fn save<'a>(&'a self, document_id: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.save_document(document_id, content))
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local API endpoint '{}': {}. Start the editor server or update MARKPILOT_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach API endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("API request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "API endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("API request to '{}' failed: {}", request_url, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_without_double_slash() {
        let config = Config {
            api_url: "http://localhost:8000/api/".to_string(),
            ..Config::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint_url("chat/stream"),
            "http://localhost:8000/api/chat/stream"
        );
        assert!(client.is_local_endpoint());
    }
}

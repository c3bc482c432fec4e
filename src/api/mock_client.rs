use crate::api::client::{ByteStream, MockRequest, MockStreamProducer};
use anyhow::Result;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::sync::{Arc, Mutex};

/// Scripted response for one transport call.
pub enum MockResponse {
    /// NDJSON lines, each delivered as its own chunk.
    Lines(Vec<String>),
    /// Raw chunks delivered verbatim (for split-line cases).
    Chunks(Vec<String>),
    /// NDJSON lines, then the connection stays open without sending more.
    Hang(Vec<String>),
    /// The request itself fails, as a dropped connection would.
    Fail(String),
}

#[derive(Clone)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, request: MockRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request);

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!(
                "MockApiClient: No more responses configured"
            ));
        }

        let (chunks, hang) = match responses_guard.remove(0) {
            MockResponse::Fail(message) => return Err(anyhow::anyhow!(message)),
            MockResponse::Chunks(chunks) => (chunks, false),
            MockResponse::Lines(lines) => (terminate_lines(lines), false),
            MockResponse::Hang(lines) => (terminate_lines(lines), true),
        };

        let byte_chunks: Vec<Result<Bytes>> =
            chunks.into_iter().map(|s| Ok(Bytes::from(s))).collect();
        if hang {
            return Ok(Box::pin(stream::iter(byte_chunks).chain(stream::pending())));
        }
        Ok(Box::pin(stream::iter(byte_chunks)))
    }
}

fn terminate_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            if line.ends_with('\n') {
                line
            } else {
                format!("{line}\n")
            }
        })
        .collect()
}

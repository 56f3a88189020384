//! Mock transport for unit testing
//!
//! Replies are scripted per method and URI and consumed in order. Every call
//! is recorded so tests can assert on the exact requests a watch issued.

use crate::error::TransportError;
use crate::transport::{ByteStream, HttpTransport};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted reply to a plain request
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 2xx with the given body
    Body(Bytes),
    /// Non-success status
    Status(u16, String),
    /// Connection failure
    Connection(String),
}

impl MockReply {
    fn into_result(self) -> Result<Bytes, TransportError> {
        match self {
            MockReply::Body(body) => Ok(body),
            MockReply::Status(status, body) => Err(TransportError::Status { status, body }),
            MockReply::Connection(message) => Err(TransportError::Connection(message)),
        }
    }
}

/// One piece of a scripted streaming body
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// Bytes delivered to the reader
    Data(Bytes),
    /// Read failure (connection reset, timeout, ...)
    Fail(String),
    /// Never resolves, like an idle watch connection
    Pending,
}

impl MockChunk {
    /// Data chunk from a string
    pub fn data(data: impl Into<String>) -> Self {
        MockChunk::Data(Bytes::from(data.into()))
    }
}

#[derive(Debug, Clone)]
enum MockStream {
    Body(Vec<MockChunk>),
    Refused(MockReply),
}

/// A request seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: Method,
    /// Path and query, as passed to the transport
    pub uri: String,
    /// JSON body, if any
    pub body: Option<Value>,
    /// `true` for watch stream requests
    pub streaming: bool,
}

/// Mock HttpTransport for testing
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<HashMap<(Method, String), VecDeque<MockReply>>>>,
    streams: Arc<Mutex<HashMap<String, VecDeque<MockStream>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    chunks_read: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a mock with nothing scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `method uri`
    pub fn respond(&self, method: Method, uri: impl Into<String>, body: impl Into<String>) {
        self.reply(method, uri, MockReply::Body(Bytes::from(body.into())));
    }

    /// Queue an arbitrary reply for `method uri`
    pub fn reply(&self, method: Method, uri: impl Into<String>, reply: MockReply) {
        self.replies
            .lock()
            .unwrap()
            .entry((method, uri.into()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a streaming body for `GET uri`
    pub fn stream_chunks(&self, uri: impl Into<String>, chunks: Vec<MockChunk>) {
        self.push_stream(uri.into(), MockStream::Body(chunks));
    }

    /// Queue a streaming body made of newline-terminated lines, one chunk each
    pub fn stream_lines(&self, uri: impl Into<String>, lines: &[&str]) {
        let chunks = lines
            .iter()
            .map(|line| MockChunk::data(format!("{}\n", line)))
            .collect();
        self.stream_chunks(uri, chunks);
    }

    /// Queue a refused streaming request for `GET uri`
    pub fn refuse_stream(&self, uri: impl Into<String>, reply: MockReply) {
        self.push_stream(uri.into(), MockStream::Refused(reply));
    }

    /// All requests issued so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// URIs of the streaming requests issued so far
    pub fn stream_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.streaming)
            .map(|r| r.uri)
            .collect()
    }

    /// Number of streaming chunks handed to readers
    pub fn chunks_read(&self) -> usize {
        self.chunks_read.load(Ordering::SeqCst)
    }

    fn push_stream(&self, uri: String, stream: MockStream) {
        self.streams
            .lock()
            .unwrap()
            .entry(uri)
            .or_default()
            .push_back(stream);
    }

    fn record(&self, method: Method, uri: &str, body: Option<&Value>, streaming: bool) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            uri: uri.to_string(),
            body: body.cloned(),
            streaming,
        });
    }
}

fn unscripted(method: &Method, uri: &str) -> TransportError {
    TransportError::Status {
        status: 404,
        body: format!("no mock reply for {} {}", method, uri),
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> Result<Bytes, TransportError> {
        self.record(method.clone(), uri, body, false);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&(method.clone(), uri.to_string()))
            .and_then(VecDeque::pop_front);
        match reply {
            Some(reply) => reply.into_result(),
            None => Err(unscripted(&method, uri)),
        }
    }

    async fn stream(&self, uri: &str) -> Result<ByteStream, TransportError> {
        self.record(Method::GET, uri, None, true);

        let scripted = self
            .streams
            .lock()
            .unwrap()
            .get_mut(uri)
            .and_then(VecDeque::pop_front);
        let chunks = match scripted {
            Some(MockStream::Body(chunks)) => chunks,
            Some(MockStream::Refused(reply)) => {
                reply.into_result()?;
                Vec::new()
            }
            None => return Err(unscripted(&Method::GET, uri)),
        };

        let chunks_read = Arc::clone(&self.chunks_read);
        let body = futures::stream::iter(chunks).then(move |chunk| {
            let chunks_read = Arc::clone(&chunks_read);
            async move {
                match chunk {
                    MockChunk::Data(data) => {
                        chunks_read.fetch_add(1, Ordering::SeqCst);
                        Ok(data)
                    }
                    MockChunk::Fail(message) => {
                        chunks_read.fetch_add(1, Ordering::SeqCst);
                        Err(TransportError::Connection(message))
                    }
                    MockChunk::Pending => futures::future::pending().await,
                }
            }
        });
        Ok(Box::pin(body))
    }
}

//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::Value;

use parallel_web::transport::ByteStream;
use parallel_web::{Connection, Error, HttpRequest, HttpTransport, Result};

pub const TEST_KEY: &str = "test-api-key";

/// Records every request and replays queued responses in order
#[derive(Debug, Default)]
pub struct MockTransport {
    json: Mutex<VecDeque<Result<Value>>>,
    streams: Mutex<VecDeque<Result<Vec<Vec<u8>>>>>,
    requests: Mutex<Vec<HttpRequest>>,
    stream_dropped: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, response: Result<Value>) {
        self.json.lock().unwrap().push_back(response);
    }

    /// Queue a streamed body, delivered as the given byte chunks
    pub fn push_stream(&self, chunks: Vec<&str>) {
        let chunks = chunks.into_iter().map(|c| c.as_bytes().to_vec()).collect();
        self.streams.lock().unwrap().push_back(Ok(chunks));
    }

    pub fn push_stream_error(&self, error: Error) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Value {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.body.clone())
            .expect("no request recorded")
    }

    /// True once the most recently returned stream has been dropped
    pub fn stream_dropped(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request);
        self.json
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Connection("no scripted response".into())))
    }

    async fn post_stream(&self, request: HttpRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request);
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Connection("no scripted stream".into())))?;

        self.stream_dropped.store(false, Ordering::SeqCst);
        let flag = DropFlag(self.stream_dropped.clone());
        let body = stream::iter(chunks).map(move |chunk| {
            let _held = &flag;
            Ok::<_, Error>(chunk)
        });
        Ok(Box::pin(body))
    }
}

/// Connection with a fixed key over the given mock
pub fn connection(mock: &Arc<MockTransport>) -> Connection {
    Connection::builder()
        .api_key(TEST_KEY)
        .transport(mock.clone())
        .build()
        .unwrap()
}

//! In-memory transport for tests.
//!
//! `FakeTransport` answers from a table of canned bodies keyed by URL and
//! counts every request it sees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AssetError;
use crate::kind::ExportRequest;
use crate::transport::HttpTransport;
use crate::Result;

#[derive(Debug, Clone)]
enum Canned {
    Body(Vec<u8>),
    Status(u16),
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<ExportRequest>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `body` and a 200.
    pub fn respond(self, url: &str, body: &[u8]) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Body(body.to_vec()));
        self
    }

    /// Answer `url` with an error status.
    pub fn fail(self, url: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Status(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ExportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, request: &ExportRequest) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let canned = self.responses.lock().unwrap().get(&request.url).cloned();
        match canned {
            Some(Canned::Body(body)) => Ok(body),
            Some(Canned::Status(status)) => Err(AssetError::HttpStatus {
                status,
                url: request.url.clone(),
            }),
            None => Err(AssetError::HttpStatus {
                status: 404,
                url: request.url.clone(),
            }),
        }
    }
}

//! # Mock Transport & Testing Guide
//!
//! [`MockTransport`] implements [`HttpTransport`] entirely in memory. Tests queue the
//! exchanges they expect, in order, and the mock answers each request with the next
//! queued response. Every request is recorded so tests can assert on headers, bodies
//! and request counts.
//!
//! | Feature | MockTransport | Real server |
//! |---------|---------------|-------------|
//! | **Speed** | Instant (in-memory) | Network bound |
//! | **Determinism** | Ordered expectations, gated replies | Subject to the network |
//! | **Error Injection** | `respond_status`, `fail_network` | Hard |
//!
//! ```rust
//! use crud_sync::mock::MockTransport;
//! use crud_sync::transport::Method;
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.expect(Method::Get, "/room").respond_json(200, json!([]));
//! mock.expect(Method::Delete, "/room/r1").respond_status(404);
//! ```
//!
//! ## Holding a response
//!
//! Race tests need a response to arrive *later* than another. [`gate`] returns a pair:
//! attach the [`Gate`] to an expectation with [`ExpectationBuilder::after`], and the
//! matching request stays pending until the [`Release`] is opened (or dropped).

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

enum Reply {
    Respond(HttpResponse),
    Fail(String),
}

struct Expectation {
    method: Method,
    path: String,
    gate: Option<Gate>,
    reply: Reply,
}

/// Holds a queued response until released.
pub struct Gate(oneshot::Receiver<()>);

/// Opens the paired [`Gate`].
pub struct Release(oneshot::Sender<()>);

impl Release {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

pub fn gate() -> (Gate, Release) {
    let (tx, rx) = oneshot::channel();
    (Gate(rx), Release(tx))
}

/// An in-memory HTTP server with an ordered expectation queue.
#[derive(Clone, Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport as the trait object the clients take.
    pub fn shared(&self) -> Arc<dyn HttpTransport> {
        Arc::new(self.clone())
    }

    /// Expects the next request to be `method path`.
    pub fn expect(&self, method: Method, path: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            path: path.to_string(),
            gate: None,
            expectations: self.expectations.clone(),
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `"METHOD /path"` for every request received so far.
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path()))
            .collect()
    }

    /// Waits until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let call = format!("{} {}", request.method, request.path());
        self.requests.lock().unwrap().push(request.clone());

        let expectation = self.expectations.lock().unwrap().pop_front();
        let Some(expectation) = expectation else {
            panic!("Unexpected request: {call}");
        };
        let expected = format!("{} {}", expectation.method, expectation.path);
        assert_eq!(call, expected, "Request does not match the next expectation");

        if let Some(Gate(gate)) = expectation.gate {
            let _ = gate.await;
        }
        match expectation.reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(TransportError(message)),
        }
    }
}

/// Builder returned by [`MockTransport::expect`].
pub struct ExpectationBuilder {
    method: Method,
    path: String,
    gate: Option<Gate>,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ExpectationBuilder {
    /// Holds the response until the gate's [`Release`] is opened.
    pub fn after(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn respond(self, response: HttpResponse) {
        self.push(Reply::Respond(response));
    }

    pub fn respond_json(self, status: u16, body: Value) {
        self.respond(HttpResponse::json(status, &body));
    }

    /// A response with an empty body.
    pub fn respond_status(self, status: u16) {
        self.respond(HttpResponse::empty(status));
    }

    pub fn respond_text(self, status: u16, body: &str) {
        self.respond(HttpResponse::new(status, body.as_bytes().to_vec()));
    }

    /// No response at all: the transport fails.
    pub fn fail_network(self, message: &str) {
        self.push(Reply::Fail(message.to_string()));
    }

    fn push(self, reply: Reply) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation {
            method: self.method,
            path: self.path,
            gate: self.gate,
            reply,
        });
    }
}

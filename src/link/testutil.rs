use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum_server::Handle;
use serde_json::Value;

use crate::link::client::{RemoteOutcome, RemoteSwitch};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch,
    Set(bool),
}

/// Scripted in-memory remote switch.
///
/// Writes take effect on the remote value immediately, unless `lagging` is
/// set. Reads pop from `reads` first, and fall back to the remote value.
#[derive(Default)]
pub struct FakeRemote {
    remote_on: Mutex<Option<bool>>,
    reads: Mutex<VecDeque<RemoteOutcome<bool>>>,
    calls: Mutex<Vec<RemoteCall>>,
    lagging: bool,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn new(remote_on: Option<bool>) -> Self {
        Self {
            remote_on: Mutex::new(remote_on),
            ..Self::default()
        }
    }

    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub const fn lagging(mut self) -> Self {
        self.lagging = true;
        self
    }

    pub fn push_read(&self, outcome: RemoteOutcome<bool>) {
        self.reads.lock().unwrap().push_back(outcome);
    }

    pub fn set_remote(&self, on: Option<bool>) {
        *self.remote_on.lock().unwrap() = on;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Set(on) => Some(on),
                RemoteCall::Fetch => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: RemoteCall) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteSwitch for FakeRemote {
    async fn fetch_state(&self) -> RemoteOutcome<bool> {
        self.enter(RemoteCall::Fetch).await;
        let scripted = self.reads.lock().unwrap().pop_front();
        let res = scripted.unwrap_or_else(|| match *self.remote_on.lock().unwrap() {
            Some(on) => RemoteOutcome::Confirmed(on),
            None => RemoteOutcome::Unreachable("fake remote is offline".to_string()),
        });
        self.leave();
        res
    }

    async fn set_state(&self, on: bool) -> RemoteOutcome<()> {
        self.enter(RemoteCall::Set(on)).await;
        if !self.lagging {
            self.set_remote(Some(on));
        }
        self.leave();
        RemoteOutcome::Confirmed(())
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

struct FakeRemoteServerState {
    requests: Vec<RecordedRequest>,
    state_response: (StatusCode, String),
    service_status: StatusCode,
}

/// In-process http server that records every request, and answers state
/// reads and service calls with canned responses.
pub struct FakeRemoteServer {
    addr: SocketAddr,
    state: Arc<Mutex<FakeRemoteServerState>>,
    handle: Handle,
}

async fn record(
    State(state): State<Arc<Mutex<FakeRemoteServerState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut lock = state.lock().unwrap();
    lock.requests.push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    if method == Method::GET {
        let (status, body) = lock.state_response.clone();
        (status, body).into_response()
    } else {
        (lock.service_status, "[]").into_response()
    }
}

impl FakeRemoteServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeRemoteServerState {
            requests: vec![],
            state_response: (StatusCode::OK, r#"{"state": "off"}"#.to_string()),
            service_status: StatusCode::OK,
        }));
        let app = Router::new().fallback(record).with_state(state.clone());

        let handle = Handle::new();
        let server = axum_server::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .handle(handle.clone())
            .serve(app.into_make_service());
        tokio::spawn(server);

        let addr = handle
            .listening()
            .await
            .expect("fake remote server failed to listen");

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn respond_state(&self, status: StatusCode, body: String) {
        self.state.lock().unwrap().state_response = (status, body);
    }

    pub fn respond_service(&self, status: StatusCode) {
        self.state.lock().unwrap().service_status = status;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Drop for FakeRemoteServer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

/// Wait (up to `limit`) for `check` to become true.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

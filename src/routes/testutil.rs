use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use camino::Utf8PathBuf;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::{AppConfig, HasslinkConfig, ServerConfig};
use crate::routes::router;
use crate::server::appstate::AppState;

/// A full router over a fresh app state, with its own links file.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub links_file: Utf8PathBuf,
}

impl TestApp {
    pub async fn new(api_token: Option<&str>) -> Self {
        let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap();
        let links_file = dir.join(format!("hasslink-api-{}.yaml", Uuid::new_v4()));

        let config = AppConfig {
            server: ServerConfig {
                address: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0,
                api_token: api_token.map(ToString::to_string),
            },
            hasslink: HasslinkConfig {
                links_file: links_file.clone(),
            },
            links: BTreeMap::new(),
        };

        let state = AppState::from_config(config).await.unwrap();
        Self {
            router: router(state.clone()),
            state,
            links_file,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn build(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => req
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Self::build(method, uri, None, body)).await
    }

    pub async fn request_with_token(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send(Self::build(method, uri, Some(token), body)).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.links_file);
    }
}

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{ApiError, ApiResult};
use crate::server::appstate::AppState;

/// Reject requests without the configured bearer token. Without a
/// configured token, everything is let through.
pub async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    let config = state.config();
    if let Some(expected) = &config.server.api_token {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if token != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::routes::testutil::TestApp;

    #[tokio::test]
    async fn open_without_token() {
        let app = TestApp::new(None).await;
        let (status, _) = app.request(Method::GET, "/api/", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn token_is_required_when_configured() {
        let app = TestApp::new(Some("s3cret")).await;

        let (status, body) = app.request(Method::GET, "/api/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].is_string());

        let (status, _) = app
            .request_with_token(Method::GET, "/api/", "wrong", None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .request_with_token(Method::GET, "/api/", "s3cret", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API running.");
    }
}

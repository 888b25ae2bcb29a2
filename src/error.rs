use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use hasslink_api::link::FormErrors;

#[derive(Error, Debug)]
pub enum ApiError {
    /* mapped errors */
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    AxumError(#[from] axum::Error),

    #[error(transparent)]
    InvalidLink(#[from] FormErrors),

    /* hasslink errors */
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Link entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Link entry {0} is declared in the config file, and cannot be changed")]
    EntryReadOnly(Uuid),

    #[error("Unsupported switch service: {0}")]
    UnsupportedService(String),

    #[error("Missing or invalid access token")]
    Unauthorized,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidLink(_) | Self::UnsupportedService(_) => StatusCode::BAD_REQUEST,
            Self::EntityNotFound(_) | Self::EntryNotFound(_) => StatusCode::NOT_FOUND,
            Self::EntryReadOnly(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::debug!("Request rejected: {self}");
        }

        let body = match self {
            Self::InvalidLink(errors) => json!({"errors": errors}),
            other => json!({"message": other.to_string()}),
        };

        (status, Json(body)).into_response()
    }
}

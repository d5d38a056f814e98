use std::io::Error as IoError;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use egress::{ConfigurationError, ValidationError, config};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Startup failures; the process exits on any of these
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Config error: {0}")]
    Config(#[from] config::Error),
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Request failures, rendered as `{error, details?}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid request")]
    BadRequest(String),
    #[error("Test not found")]
    NotFound(Option<Uuid>),
    #[error("Failed to render export")]
    Export(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let details = match self {
            ApiError::BadRequest(details) => Some(details.clone()),
            ApiError::NotFound(Some(id)) => Some(format!("no test with id {id}")),
            ApiError::Export(e) => Some(e.to_string()),
            ApiError::Validation(_) | ApiError::NotFound(None) => None,
        };

        HttpResponse::build(self.status_code()).json(ErrorBody { error: self.to_string(), details })
    }
}

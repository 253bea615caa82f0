use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures while scanning the uploads root. Any of these aborts startup.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk uploads directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Root path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Why an identifier could not be resolved to a readable file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("File not found")]
    UnknownIdentifier,

    #[error("File missing on disk")]
    MissingOnDisk,
}

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LookupError> for FileServerError {
    fn from(err: LookupError) -> Self {
        FileServerError::NotFound(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            FileServerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            FileServerError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}

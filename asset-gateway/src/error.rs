// asset-gateway/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::asset_store::AssetStoreError;

/// Failures that end a request with a 500. Details stay in the logs.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("asset store binding is not configured")]
    StoreUnavailable,
    #[error(transparent)]
    Store(#[from] AssetStoreError),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            GatewayError::StoreUnavailable => "Assets binding not found",
            GatewayError::Store(_) => "Internal server error",
        };
        HttpResponse::InternalServerError()
            .content_type("text/plain; charset=utf-8")
            .body(body)
    }
}

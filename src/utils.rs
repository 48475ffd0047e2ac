// src/utils.rs
use std::fmt;

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::offset::sandbox::OffsetError;

#[derive(Debug)]
pub enum ApiError {
    /// Request body was not the expected JSON shape.
    InvalidPayload(String),
    /// Any offset validation/apply failure, surfaced as a 400 message.
    Offset(OffsetError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload(msg) => write!(f, "{}", msg),
            Self::Offset(e) => write!(f, "{}", e),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(json!({ "error": self.to_string() }))
    }
}

impl From<OffsetError> for ApiError {
    fn from(e: OffsetError) -> Self {
        ApiError::Offset(e)
    }
}

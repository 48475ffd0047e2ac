// src/handlers/offset.rs
use actix_web::{web, HttpResponse};
use log::info;
use serde_json::{json, Value};

use crate::offset::sandbox::DEFAULT_SOURCE;
use crate::state::AppState;
use crate::utils::ApiError;

/// Body key carrying the function source. `fn` is accepted as an alias.
const FN_KEY: &str = "__fn__";
const FN_KEY_ALIAS: &str = "fn";

/// GET /offset — the active function's source.
pub async fn get_offset(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "__fn__": state.offset.source() }))
}

fn extract_source(body: &[u8]) -> Result<String, ApiError> {
    let parsed: Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::InvalidPayload("Invalid JSON payload".to_string()))?;
    parsed
        .get(FN_KEY)
        .or_else(|| parsed.get(FN_KEY_ALIAS))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::InvalidPayload(format!(
                "expected a string under \"{}\" or \"{}\"",
                FN_KEY, FN_KEY_ALIAS
            ))
        })
}

/// PUT /offset — validate a candidate source against live data and swap it
/// in. Every failure comes back as 400 with a message; the previously
/// active function stays in place.
pub async fn put_offset(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let source = extract_source(&body)?;
    state.apply_offset(&source).await?;
    info!("offset function updated via PUT /offset");
    Ok(HttpResponse::Ok().finish())
}

/// GET /offset/testput — reset to the built-in default and return it.
pub async fn reset_offset(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    state.apply_offset(DEFAULT_SOURCE).await?;
    Ok(HttpResponse::Ok().json(json!({ "__fn__": state.offset.source() })))
}

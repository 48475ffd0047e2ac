// src/handlers/status.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::protocol::versions::DEFAULT_PROTOCOL;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ServerListQuery {
    #[serde(rename = "protocolVersion")]
    protocol_version: Option<String>,
}

/// GET /serverlist — the aggregated, transformed status a Minecraft client
/// would see, with the protocol number taken from the query string.
pub async fn get_server_list(
    state: web::Data<AppState>,
    query: web::Query<ServerListQuery>,
) -> HttpResponse {
    let protocol = query
        .protocol_version
        .as_deref()
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PROTOCOL);

    HttpResponse::Ok().json(state.status_json(protocol).await)
}

/// GET /server — the raw per-backend statuses; failed backends are omitted.
pub async fn get_servers(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.fetch_backends().await)
}

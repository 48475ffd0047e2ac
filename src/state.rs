// src/state.rs
use std::io;
use std::sync::Arc;

use log::error;
use parking_lot::Mutex;
use serde_json::Value;
use sysinfo::System;

use crate::aggregate::{fetch_statuses, synthesize};
use crate::config::Config;
use crate::models::status::ServerStatus;
use crate::offset::sandbox::{compile_record, OffsetError, OffsetStore};

/// Everything the HTTP handlers and the TCP path share. Handed around as
/// an Arc; actix wraps the same Arc in web::Data.
pub struct AppState {
    pub config: Config,
    pub offset: Arc<OffsetStore>,
    /// sysinfo sampler for /health. Refreshing mutates it, hence the lock.
    pub system: Mutex<System>,
}

impl AppState {
    pub fn new(config: Config) -> io::Result<Arc<Self>> {
        let offset = Arc::new(OffsetStore::load(
            config.offset_file.clone(),
            config.validate_budget(),
            config.transform_budget(),
        )?);
        Ok(Arc::new(Self {
            config,
            offset,
            system: Mutex::new(System::new_all()),
        }))
    }

    /// Raw per-backend statuses, failures omitted.
    pub async fn fetch_backends(&self) -> Vec<ServerStatus> {
        fetch_statuses(&self.config).await
    }

    /// The full response pipeline: aggregate, synthesize, transform.
    /// Transform failures degrade to the untransformed origin, so this
    /// always yields a status.
    pub async fn status_json(&self, protocol: i32) -> Value {
        let backends = self.fetch_backends().await;
        let origin = synthesize(&backends, protocol);

        let origin_json = match serde_json::to_value(&origin) {
            Ok(v) => v,
            Err(e) => {
                // Serializing our own model cannot realistically fail, but
                // the request path must still produce something.
                error!("failed to serialize origin status: {}", e);
                return Value::Null;
            }
        };
        let backends_json = serde_json::to_value(&backends).unwrap_or(Value::Array(Vec::new()));

        let offset = Arc::clone(&self.offset);
        let fallback = origin_json.clone();
        match tokio::task::spawn_blocking(move || offset.transform(origin_json, backends_json))
            .await
        {
            Ok(transformed) => transformed,
            Err(e) => {
                error!("offset transform task failed: {}", e);
                fallback
            }
        }
    }

    /// Validate-then-persist-then-swap of a candidate offset source.
    /// Fails fast with Busy when another apply is in flight.
    pub async fn apply_offset(&self, candidate: &str) -> Result<(), OffsetError> {
        let ticket = OffsetStore::begin_apply(&self.offset)?;
        let record = compile_record(candidate)?;

        // Live sample for validation, same pipeline as a real request.
        let backends = self.fetch_backends().await;
        let origin = synthesize(&backends, crate::protocol::versions::DEFAULT_PROTOCOL);
        let origin_json = serde_json::to_value(&origin)
            .map_err(|e| OffsetError::Runtime(format!("sample serialization failed: {}", e)))?;
        let backends_json = serde_json::to_value(&backends)
            .map_err(|e| OffsetError::Runtime(format!("sample serialization failed: {}", e)))?;

        tokio::task::spawn_blocking(move || ticket.commit(record, origin_json, backends_json))
            .await
            .map_err(|e| OffsetError::Runtime(format!("apply task failed: {}", e)))?
    }
}

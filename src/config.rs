// src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// One configured upstream Minecraft server.
#[derive(Debug, Clone)]
pub struct BackendTarget {
    pub host: String,
    pub port: u16,
    /// Release version hint used for the handshake protocol number.
    pub version: String,
}

#[derive(Clone)]
pub struct Config {
    // Listener
    pub bind_address: String,
    pub port: u16,
    /// Loopback port the internal actix server binds; HTTP-classified
    /// connections are proxied here by the multiplexer.
    pub http_backend_port: u16,

    // Upstreams
    pub targets: Vec<BackendTarget>,
    pub query_timeout_ms: u64,

    // Wire limits
    pub max_packet_len: usize,

    // Offset function
    pub offset_file: PathBuf,
    pub offset_validate_budget_ms: u64,
    pub offset_transform_budget_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 25565,
            http_backend_port: 24680,
            targets: Vec::new(),
            query_timeout_ms: 3000,
            max_packet_len: 2 * 1024 * 1024,
            offset_file: PathBuf::from("data/offset.rhai"),
            offset_validate_budget_ms: 2000,
            offset_transform_budget_ms: 200,
        }
    }
}

/// Parses "host:port:version" entries separated by commas, e.g.
/// `play.a.net:25565:1.16.5,play.b.net:25566:1.20.1`. Port defaults to
/// 25565 and version to 1.16.5 when omitted. Malformed entries are skipped.
fn parse_server_list(raw: &str) -> Vec<BackendTarget> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.split(':');
            let host = parts.next()?.trim();
            if host.is_empty() {
                return None;
            }
            let port = match parts.next() {
                Some(p) => p.trim().parse().ok()?,
                None => 25565,
            };
            let version = parts
                .next()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "1.16.5".to_string());
            Some(BackendTarget {
                host: host.to_string(),
                port,
                version,
            })
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("MC_BIND_ADDRESS").unwrap_or(defaults.bind_address),

            port: env::var("MC_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),

            http_backend_port: env::var("MC_HTTP_BACKEND_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_backend_port),

            targets: env::var("MC_SERVER_LIST")
                .map(|v| parse_server_list(&v))
                .unwrap_or_default(),

            query_timeout_ms: env::var("MC_QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.query_timeout_ms),

            max_packet_len: env::var("MC_MAX_PACKET_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_packet_len),

            offset_file: env::var("MC_OFFSET_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.offset_file),

            offset_validate_budget_ms: env::var("MC_OFFSET_VALIDATE_BUDGET_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.offset_validate_budget_ms),

            offset_transform_budget_ms: env::var("MC_OFFSET_TRANSFORM_BUDGET_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.offset_transform_budget_ms),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate_budget(&self) -> Duration {
        Duration::from_millis(self.offset_validate_budget_ms)
    }

    pub fn transform_budget(&self) -> Duration {
        Duration::from_millis(self.offset_transform_budget_ms)
    }
}

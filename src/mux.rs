// src/mux.rs
//
// Single-port protocol multiplexer. New connections are sniffed with
// TcpStream::peek, which never consumes from the kernel buffer, so the
// chosen handler sees every byte the peer sent. Streams that open like an
// HTTP request line are proxied to the internal actix listener; everything
// else is treated as a Minecraft handshake.
use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::server::serve_connection;
use crate::state::AppState;

/// Method tokens (with the mandatory trailing space) that mark a stream as
/// HTTP. `PRI ` is the HTTP/2 connection preface.
const HTTP_METHODS: [&[u8]; 8] = [
    b"GET ", b"POST ", b"PUT ", b"DELETE ", b"OPTIONS ", b"HEAD ", b"PATCH ", b"PRI ",
];

/// Longest token is `OPTIONS ` at 8 bytes; 8 peeked bytes always decide.
const SNIFF_LEN: usize = 8;

/// Stalled undecided peeks tolerated before falling through to the
/// Minecraft path (a real handshake arrives in a single segment).
const SNIFF_MAX_ROUNDS: u32 = 100;
const SNIFF_RETRY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Http,
    Minecraft,
}

/// Classifies the peeked head of a stream. None means the bytes so far are
/// a strict prefix of a method token and more are needed to decide.
pub fn classify(head: &[u8]) -> Option<Route> {
    if head.is_empty() {
        return None;
    }
    let mut ambiguous = false;
    for method in HTTP_METHODS {
        if head.len() >= method.len() {
            if &head[..method.len()] == method {
                return Some(Route::Http);
            }
        } else if &method[..head.len()] == head {
            ambiguous = true;
        }
    }
    if ambiguous {
        None
    } else {
        Some(Route::Minecraft)
    }
}

async fn sniff(stream: &TcpStream) -> io::Result<Route> {
    let mut buf = [0u8; SNIFF_LEN];
    for _ in 0..SNIFF_MAX_ROUNDS {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed before sending any bytes",
            ));
        }
        if let Some(route) = classify(&buf[..n]) {
            return Ok(route);
        }
        // Prefix of a method token; wait for the rest of the segment.
        tokio::time::sleep(SNIFF_RETRY).await;
    }
    Ok(Route::Minecraft)
}

async fn route_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    let route = match sniff(&stream).await {
        Ok(route) => route,
        Err(e) => {
            debug!("{}: dropped during sniff ({})", peer, e);
            return;
        }
    };

    match route {
        Route::Minecraft => {
            debug!("{}: minecraft connection", peer);
            serve_connection(stream, state).await;
        }
        Route::Http => {
            debug!("{}: http connection", peer);
            let backend = ("127.0.0.1", state.config.http_backend_port);
            let mut upstream = match TcpStream::connect(backend).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("{}: internal http backend unreachable: {}", peer, e);
                    return;
                }
            };
            if let Err(e) = copy_bidirectional(&mut stream, &mut upstream).await {
                debug!("{}: http proxy ended: {}", peer, e);
            }
        }
    }
}

/// Accept loop on the single public port.
pub async fn run_listener(listener: TcpListener, state: Arc<AppState>) -> io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(route_connection(stream, state));
    }
}

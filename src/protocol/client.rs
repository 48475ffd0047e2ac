// src/protocol/client.rs
//
// Client-role SLP query against one backend: connect, handshake (next
// state = status), status request/response, ping/pong, disconnect. The
// whole attempt runs under the caller's deadline; any failure collapses
// into a QueryError and never past it.
use std::fmt;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::models::status::ServerStatus;
use crate::protocol::codec::{
    self, read_packet, read_string_slice, write_packet, write_string, CodecError,
};

const PACKET_HANDSHAKE: i32 = 0x00;
const PACKET_STATUS_REQUEST: i32 = 0x00;
const PACKET_STATUS_RESPONSE: i32 = 0x00;
const PACKET_PING: i32 = 0x01;
const PACKET_PONG: i32 = 0x01;

const NEXT_STATE_STATUS: i32 = 1;

#[derive(Debug)]
pub enum QueryError {
    /// The attempt did not reach a status response within the deadline.
    Timeout,
    Connect(io::Error),
    Codec(CodecError),
    /// The backend answered with something other than the expected packet.
    UnexpectedPacket { state: &'static str, id: i32 },
    BadStatusJson(serde_json::Error),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "status query timed out"),
            Self::Connect(e) => write!(f, "connect failed: {}", e),
            Self::Codec(e) => write!(f, "codec failure: {}", e),
            Self::UnexpectedPacket { state, id } => {
                write!(f, "unexpected packet id {:#04x} while {}", id, state)
            }
            Self::BadStatusJson(e) => write!(f, "status payload is not valid JSON: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<CodecError> for QueryError {
    fn from(e: CodecError) -> Self {
        QueryError::Codec(e)
    }
}

fn handshake_payload(protocol: i32, host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    codec::write_var_int(&mut payload, protocol);
    write_string(&mut payload, host);
    // infallible: Vec<u8> as io::Write never errors
    let _ = WriteBytesExt::write_u16::<BigEndian>(&mut payload, port);
    codec::write_var_int(&mut payload, NEXT_STATE_STATUS);
    payload
}

async fn run_query(
    host: &str,
    port: u16,
    protocol: i32,
    max_packet_len: usize,
) -> Result<ServerStatus, QueryError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(QueryError::Connect)?;

    stream
        .write_all(&write_packet(
            PACKET_HANDSHAKE,
            &handshake_payload(protocol, host, port),
        ))
        .await
        .map_err(|e| QueryError::Codec(e.into()))?;
    stream
        .write_all(&write_packet(PACKET_STATUS_REQUEST, &[]))
        .await
        .map_err(|e| QueryError::Codec(e.into()))?;

    let response = read_packet(&mut stream, max_packet_len).await?;
    if response.id != PACKET_STATUS_RESPONSE {
        return Err(QueryError::UnexpectedPacket {
            state: "awaiting status response",
            id: response.id,
        });
    }
    let (json, _) = read_string_slice(&response.payload)?;
    let status: ServerStatus = serde_json::from_str(&json).map_err(QueryError::BadStatusJson)?;

    // Round-trip a ping before disconnecting, like the stock client does.
    // The pong is read to completion but a mismatched echo is only logged.
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    let mut ping = Vec::with_capacity(8);
    let _ = WriteBytesExt::write_i64::<BigEndian>(&mut ping, millis);
    stream
        .write_all(&write_packet(PACKET_PING, &ping))
        .await
        .map_err(|e| QueryError::Codec(e.into()))?;
    match read_packet(&mut stream, max_packet_len).await {
        Ok(pong) if pong.id == PACKET_PONG && pong.payload == ping => {}
        Ok(pong) => debug!(
            "{}:{} answered ping with packet id {:#04x} ({} bytes)",
            host,
            port,
            pong.id,
            pong.payload.len()
        ),
        Err(e) => debug!("{}:{} closed before pong: {}", host, port, e),
    }

    let _ = stream.shutdown().await;
    Ok(status)
}

/// Queries one backend's status, bounding the whole connect-to-disconnect
/// exchange by `deadline`.
pub async fn query_status(
    host: &str,
    port: u16,
    protocol: i32,
    deadline: Duration,
    max_packet_len: usize,
) -> Result<ServerStatus, QueryError> {
    match timeout(deadline, run_query(host, port, protocol, max_packet_len)).await {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_payload_layout() {
        let payload = handshake_payload(754, "mc.example.com", 25565);
        let (protocol, used) = codec::read_var_int_slice(&payload).unwrap();
        assert_eq!(protocol, 754);
        let (host, host_used) = read_string_slice(&payload[used..]).unwrap();
        assert_eq!(host, "mc.example.com");
        let rest = &payload[used + host_used..];
        assert_eq!(&rest[..2], &[0x63, 0xdd]); // 25565 big-endian
        let (next_state, _) = codec::read_var_int_slice(&rest[2..]).unwrap();
        assert_eq!(next_state, NEXT_STATE_STATUS);
    }
}

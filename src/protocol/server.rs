// src/protocol/server.rs
//
// Server-role SLP handling for one inbound connection:
// AwaitHandshake -> AwaitStatusRequest -> AwaitPingOrClose -> closed.
// The wire protocol has no error packet in this flow, so every malformed
// or unexpected input just drops the connection.
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::protocol::codec::{
    self, read_packet, write_packet, write_string, CodecError,
};
use crate::state::AppState;

const PACKET_HANDSHAKE: i32 = 0x00;
const PACKET_STATUS_REQUEST: i32 = 0x00;
const PACKET_STATUS_RESPONSE: i32 = 0x00;
const PACKET_PING: i32 = 0x01;
const PACKET_PONG: i32 = 0x01;

const NEXT_STATE_STATUS: i32 = 1;

const PING_PAYLOAD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InboundState {
    AwaitHandshake,
    AwaitStatusRequest,
    AwaitPingOrClose,
}

struct Handshake {
    protocol: i32,
    next_state: i32,
}

fn parse_handshake(payload: &[u8]) -> Result<Handshake, CodecError> {
    let (protocol, mut offset) = codec::read_var_int_slice(payload)?;
    let (_server_address, used) = codec::read_string_slice(&payload[offset..])?;
    offset += used;
    let mut port_bytes = payload
        .get(offset..offset + 2)
        .ok_or(CodecError::IncompletePacket)?;
    let _server_port = port_bytes
        .read_u16::<BigEndian>()
        .map_err(CodecError::from)?;
    offset += 2;
    let (next_state, _) = codec::read_var_int_slice(&payload[offset..])?;
    Ok(Handshake {
        protocol,
        next_state,
    })
}

/// Drives one inbound connection through the status flow until the peer
/// disconnects or sends something the current state does not accept.
pub async fn serve_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    let max_len = state.config.max_packet_len;

    let mut machine = InboundState::AwaitHandshake;
    let mut client_protocol = 0;

    loop {
        let packet = match read_packet(&mut stream, max_len).await {
            Ok(p) => p,
            Err(e) => {
                debug!("{}: closing ({})", peer, e);
                return;
            }
        };

        match machine {
            InboundState::AwaitHandshake => {
                if packet.id != PACKET_HANDSHAKE {
                    debug!("{}: expected handshake, got id {:#04x}", peer, packet.id);
                    return;
                }
                let handshake = match parse_handshake(&packet.payload) {
                    Ok(h) => h,
                    Err(e) => {
                        debug!("{}: malformed handshake ({})", peer, e);
                        return;
                    }
                };
                if handshake.next_state != NEXT_STATE_STATUS {
                    // Login is unsupported; terminate without a response.
                    debug!(
                        "{}: handshake requested state {}, only status is served",
                        peer, handshake.next_state
                    );
                    return;
                }
                client_protocol = handshake.protocol;
                machine = InboundState::AwaitStatusRequest;
            }
            InboundState::AwaitStatusRequest => {
                if packet.id != PACKET_STATUS_REQUEST || !packet.payload.is_empty() {
                    debug!("{}: expected status request, got id {:#04x}", peer, packet.id);
                    return;
                }
                let status = state.status_json(client_protocol).await;
                let json = status.to_string();
                let mut payload = Vec::with_capacity(json.len() + 5);
                write_string(&mut payload, &json);
                if let Err(e) = stream
                    .write_all(&write_packet(PACKET_STATUS_RESPONSE, &payload))
                    .await
                {
                    debug!("{}: failed to write status response ({})", peer, e);
                    return;
                }
                machine = InboundState::AwaitPingOrClose;
            }
            InboundState::AwaitPingOrClose => {
                if packet.id != PACKET_PING || packet.payload.len() != PING_PAYLOAD_LEN {
                    debug!("{}: expected ping, got id {:#04x}", peer, packet.id);
                    return;
                }
                // Pong echoes the client's 8 bytes untouched.
                if let Err(e) = stream
                    .write_all(&write_packet(PACKET_PONG, &packet.payload))
                    .await
                {
                    debug!("{}: failed to write pong ({})", peer, e);
                    return;
                }
            }
        }
    }
}

//! Shared helpers: a minimal in-process SLP backend and status fixtures.
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use mortar::models::status::{
    Description, Players, PlayerSample, ServerStatus, Version,
};
use mortar::protocol::codec::{read_packet, write_packet, write_string};

const MAX_LEN: usize = 2 * 1024 * 1024;

pub fn sample_status(version_name: &str, players: &[&str]) -> ServerStatus {
    ServerStatus {
        version: Version {
            name: version_name.to_string(),
            protocol: 754,
        },
        players: Players {
            max: 20,
            online: players.len() as i32,
            sample: players
                .iter()
                .map(|name| PlayerSample {
                    name: name.to_string(),
                    id: None,
                })
                .collect(),
        },
        description: Description::Text("fixture backend".to_string()),
        favicon: None,
        enforces_secure_chat: None,
    }
}

/// Spawns a backend that speaks the server side of the status flow and
/// always answers with `status`. Returns the bound port.
pub async fn spawn_backend(status: ServerStatus) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let status = status.clone();
            tokio::spawn(async move {
                // Handshake, then status request.
                if read_packet(&mut stream, MAX_LEN).await.is_err() {
                    return;
                }
                if read_packet(&mut stream, MAX_LEN).await.is_err() {
                    return;
                }

                let json = serde_json::to_string(&status).unwrap();
                let mut payload = Vec::new();
                write_string(&mut payload, &json);
                if stream.write_all(&write_packet(0x00, &payload)).await.is_err() {
                    return;
                }

                // Echo the ping if the client sends one.
                if let Ok(ping) = read_packet(&mut stream, MAX_LEN).await {
                    if ping.id == 0x01 {
                        let _ = stream.write_all(&write_packet(0x01, &ping.payload)).await;
                    }
                }
            });
        }
    });

    port
}

/// A port with nothing listening on it: bind, read the port, drop.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

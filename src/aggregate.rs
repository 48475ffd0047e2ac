// src/aggregate.rs
//
// Fan-out/fan-in over the configured backends. Every target is queried
// concurrently under its own timeout; a dead or misbehaving backend is
// logged and dropped, never aborting the round. Partial results are the
// normal case, not an error.
use log::warn;

use crate::config::Config;
use crate::models::status::{
    Description, DescriptionPart, Players, PlayerSample, ServerStatus, TextRun, Version,
};
use crate::protocol::client::query_status;
use crate::protocol::versions::version_to_protocol;

/// Displayed identity of the synthesized server.
const AGGREGATOR_NAME: &str = "mortar";

/// Queries every configured backend concurrently and returns whatever
/// answered, in target-configuration order.
pub async fn fetch_statuses(config: &Config) -> Vec<ServerStatus> {
    let timeout = config.query_timeout();
    let max_len = config.max_packet_len;

    let handles: Vec<_> = config
        .targets
        .iter()
        .map(|target| {
            let host = target.host.clone();
            let port = target.port;
            let protocol = version_to_protocol(&target.version);
            tokio::spawn(async move {
                let result = query_status(&host, port, protocol, timeout, max_len).await;
                (host, port, result)
            })
        })
        .collect();

    let mut statuses = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((_, _, Ok(status))) => statuses.push(status),
            Ok((host, port, Err(e))) => {
                warn!("backend {}:{} excluded from aggregate: {}", host, port, e);
            }
            Err(e) => warn!("backend query task failed: {}", e),
        }
    }
    statuses
}

/// Builds the origin status from the responding backends' statuses.
///
/// Player samples are concatenated in backend order with each display name
/// suffixed by the backend's version name, and the headline online/max
/// numbers advertise the combined sample count. The description is always
/// the fixed aggregator announcement, never sourced from a backend.
pub fn synthesize(backends: &[ServerStatus], protocol: i32) -> ServerStatus {
    let mut sample: Vec<PlayerSample> = Vec::new();
    for backend in backends {
        for player in &backend.players.sample {
            sample.push(PlayerSample {
                name: format!("{} -- {}", player.name, backend.version.name),
                id: player.id.clone(),
            });
        }
    }

    let total = sample.len() as i32;
    let favicon = backends.iter().find_map(|b| b.favicon.clone());

    ServerStatus {
        version: Version {
            name: AGGREGATOR_NAME.to_string(),
            protocol,
        },
        players: Players {
            max: total,
            online: total,
            sample,
        },
        description: announcement(),
        favicon,
        enforces_secure_chat: Some(true),
    }
}

fn announcement() -> Description {
    Description::Parts(vec![
        DescriptionPart::Text(String::new()),
        DescriptionPart::Run(TextRun {
            bold: Some(true),
            color: Some("aqua".to_string()),
            ..TextRun::plain("Mortar")
        }),
        DescriptionPart::Run(TextRun {
            bold: Some(true),
            color: Some("gold".to_string()),
            ..TextRun::plain(" 全服在线人数统计")
        }),
        DescriptionPart::Run(TextRun {
            italic: Some(true),
            underlined: Some(true),
            color: Some("gray".to_string()),
            ..TextRun::plain("\n这是你永远也不能到达的境地……")
        }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(version_name: &str, names: &[&str]) -> ServerStatus {
        ServerStatus {
            version: Version {
                name: version_name.to_string(),
                protocol: 754,
            },
            players: Players {
                max: 20,
                online: names.len() as i32,
                sample: names
                    .iter()
                    .map(|n| PlayerSample {
                        name: n.to_string(),
                        id: Some(format!("id-{}", n)),
                    })
                    .collect(),
            },
            description: Description::Text("backend".to_string()),
            favicon: None,
            enforces_secure_chat: None,
        }
    }

    #[test]
    fn samples_keep_backend_order_and_gain_suffix() {
        let backends = vec![backend("Paper 1.16.5", &["alice"]), backend("1.20.1", &["bob"])];
        let origin = synthesize(&backends, 754);
        let names: Vec<_> = origin
            .players
            .sample
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["alice -- Paper 1.16.5", "bob -- 1.20.1"]);
        assert_eq!(origin.players.sample[0].id.as_deref(), Some("id-alice"));
    }

    #[test]
    fn headline_counts_equal_sample_total() {
        let backends = vec![backend("a", &["p1", "p2"]), backend("b", &["p3"])];
        let origin = synthesize(&backends, 760);
        assert_eq!(origin.players.online, 3);
        assert_eq!(origin.players.max, 3);
        assert_eq!(origin.version.protocol, 760);
        assert_eq!(origin.version.name, "mortar");
    }

    #[test]
    fn zero_responders_yield_empty_status() {
        let origin = synthesize(&[], 754);
        assert_eq!(origin.players.online, 0);
        assert_eq!(origin.players.max, 0);
        assert!(origin.players.sample.is_empty());
        assert!(matches!(origin.description, Description::Parts(_)));
    }
}

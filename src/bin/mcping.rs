// src/bin/mcping.rs
//
// One-shot SLP query: fetch a single server's status and print or save the
// raw JSON.
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use mortar::protocol::client::query_status;
use mortar::protocol::versions::version_to_protocol;

#[derive(Parser)]
#[command(name = "mcping", about = "Query one Minecraft server's status over SLP")]
struct Args {
    /// Server address as host or host:port (port defaults to 25565).
    server: String,

    /// Release version used for the handshake protocol number.
    #[arg(long, default_value = "1.16.5")]
    version: String,

    /// Write the status JSON to this file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Give up after this many milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

fn split_address(server: &str) -> io::Result<(String, u16)> {
    let mut parts = server.splitn(2, ':');
    let host = parts.next().unwrap_or_default();
    if host.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "missing host in server address",
        ));
    }
    let port = match parts.next() {
        Some(p) => p
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid port"))?,
        None => 25565,
    };
    Ok((host.to_string(), port))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    let (host, port) = split_address(&args.server)?;
    let protocol = version_to_protocol(&args.version);

    let status = query_status(
        &host,
        port,
        protocol,
        Duration::from_millis(args.timeout_ms),
        2 * 1024 * 1024,
    )
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let json = serde_json::to_string_pretty(&status)?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, &json)?;
            eprintln!(
                "Fetched status from {}:{} ({}). Output written to {}",
                host,
                port,
                args.version,
                path.display()
            );
        }
        None => {
            io::stdout().write_all(json.as_bytes())?;
            io::stdout().write_all(b"\n")?;
        }
    }
    Ok(())
}

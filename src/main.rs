// src/main.rs
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use tokio::net::TcpListener;

use mortar::config::Config;
use mortar::handlers;
use mortar::mux;
use mortar::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = Config::from_env();
    if config.targets.is_empty() {
        info!("no backends configured (MC_SERVER_LIST is empty); serving empty aggregates");
    }

    // Fatal on an unreadable or invalid persisted offset file.
    let state = AppState::new(config.clone())?;

    // The actix server sits on loopback; the public port below proxies
    // HTTP-classified connections to it.
    let data = web::Data::from(Arc::clone(&state));
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/serverlist", web::get().to(handlers::status::get_server_list))
            .route("/server", web::get().to(handlers::status::get_servers))
            .route("/offset", web::get().to(handlers::offset::get_offset))
            .route("/offset", web::put().to(handlers::offset::put_offset))
            .route("/offset/testput", web::get().to(handlers::offset::reset_offset))
            .route("/health", web::get().to(handlers::health::get_health))
    })
    .bind(("127.0.0.1", config.http_backend_port))?
    .run();
    info!(
        "internal http backend on 127.0.0.1:{}",
        config.http_backend_port
    );

    let bind = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&bind).await?;
    info!("listening on {} (minecraft + http)", bind);

    tokio::select! {
        result = http_server => result,
        result = mux::run_listener(listener, state) => result,
    }
}

//! Minecraft server-list-ping aggregator: answers status pings with a
//! status synthesized from a set of real backends, optionally rewritten by
//! an operator-supplied offset function run in a sandboxed script engine.
pub mod aggregate;
pub mod config;
pub mod handlers;
pub mod models;
pub mod mux;
pub mod offset;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod utils;

// src/handlers/health.rs
use actix_web::{web, HttpResponse};
use serde_json::json;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::state::AppState;

const MIB: u64 = 1024 * 1024;

/// GET /health — process memory/CPU/uptime snapshot. Diagnostic only; the
/// field set carries no contract beyond being informative.
pub async fn get_health(state: web::Data<AppState>) -> HttpResponse {
    let pid = Pid::from_u32(std::process::id());

    let mut system = state.system.lock();
    system.refresh_cpu_all();
    system.refresh_memory();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new().with_cpu().with_memory(),
    );

    let (process_rss, process_cpu, run_time) = system
        .process(pid)
        .map(|p| (p.memory(), p.cpu_usage(), p.run_time()))
        .unwrap_or((0, 0.0, 0));

    HttpResponse::Ok().json(json!({
        "memory": {
            "rss": format!("{:.2} MB", process_rss as f64 / MIB as f64),
            "systemUsed": format!("{:.2} MB", system.used_memory() as f64 / MIB as f64),
            "systemTotal": format!("{:.2} MB", system.total_memory() as f64 / MIB as f64),
        },
        "cpu": {
            "usage": format!("{:.2}%", system.global_cpu_usage()),
            "process": format!("{:.2}%", process_cpu),
            "cores": system.cpus().len(),
        },
        "uptime": format!("{} seconds", run_time),
        "systemUptime": format!("{} seconds", System::uptime()),
    }))
}

mod bands;
mod charts;
mod config;
mod db;
mod ipc;
mod ledger;
mod logging;
mod period;
mod report;
mod stats;
mod store;
#[cfg(test)]
mod test_fixtures;
mod xlsx;

use log::{info, warn};
use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::DaemonConfig::from_env();
    if let Err(e) = logging::init_logging(cfg.log_level, cfg.log_dir.as_deref()) {
        eprintln!("attendd: logging disabled: {e}");
    }
    for w in &cfg.warnings {
        warn!("event=config_fallback module=config status=warn detail={}", w);
    }

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            warn!(
                "event=workspace_open module=main status=error path={} error={}",
                path.display(),
                logging::sanitize_message(&format!("{e:#}"), 200)
            );
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("event=ipc_request module=main status=error code=bad_json");
                // No id to echo back.
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("event=app_stop module=main status=ok");
}

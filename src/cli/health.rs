use crate::config::Config;
use crate::desk_client::DeskClient;
use anyhow::Result;
use std::path::{Path, PathBuf};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

fn ok(label: &str, detail: &str) {
    println!("  {GREEN}[OK]{RESET}   {label}: {detail}");
}

fn fail(label: &str, detail: &str) {
    println!("  {RED}[FAIL]{RESET} {label}: {detail}");
}

fn info(label: &str, detail: &str) {
    println!("  {CYAN}[INFO]{RESET} {label}: {detail}");
}

/// Report client configuration and backend reachability. Fails when the
/// backend does not answer its health endpoint.
pub async fn run(config: &Config, config_path: Option<&Path>, client: &DeskClient) -> Result<()> {
    println!("desk health\n");

    ok("Version", env!("CARGO_PKG_VERSION"));

    match config_path {
        Some(p) => ok("Config", &p.display().to_string()),
        None => info("Config", "(default)"),
    }

    info("Role", config.chat.role.display_name());
    info(
        "Stream idle timeout",
        &format!("{}s", config.chat.stream_idle_timeout_secs),
    );

    check_log_dir(config);

    let healthy = match client.health().await {
        Ok(body) => {
            let status = body
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("ok")
                .to_string();
            ok("Backend", &format!("{} ({})", client.base_url(), status));
            true
        }
        Err(e) => {
            fail("Backend", &format!("{} ({:#})", client.base_url(), e));
            false
        }
    };

    println!();
    if !healthy {
        anyhow::bail!("backend at {} is not healthy", client.base_url());
    }
    Ok(())
}

fn check_log_dir(config: &Config) {
    let log_dir = config
        .logging
        .directory
        .as_deref()
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|d| d.join("service-desk").join("logs")));

    match log_dir {
        Some(dir) if dir.exists() => ok("Logs", &dir.display().to_string()),
        Some(dir) => info("Logs", &format!("{} (not created yet)", dir.display())),
        None => info("Logs", "could not determine log directory"),
    }
}

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const RETENTION_DAYS: u64 = 30;
const LOG_FILE_PREFIX: &str = "service-desk";

pub struct LoggingSettings<'a> {
    pub level: Option<&'a str>,
    pub directory: Option<&'a str>,
    pub retention_days: Option<u64>,
    /// Interactive chat owns the terminal; log to file only.
    pub suppress_stdout: bool,
}

pub fn setup_tracing_with_settings(settings: LoggingSettings<'_>) -> Result<PathBuf> {
    let log_dir = resolve_log_dir(settings.directory)?;
    let retention_days = settings.retention_days.unwrap_or(RETENTION_DAYS);
    let _ = cleanup_old_logs(&log_dir, retention_days);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Dropping the guard would stop the background writer.
    let _ = LOG_GUARD.set(guard);

    let stdout_layer = (!settings.suppress_stdout).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .compact()
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .compact();

    let filter = match settings.level {
        Some(level) => default_filter(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter("info")),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    Ok(log_dir)
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "service_desk={level},desk={level},reqwest=warn,hyper=warn,hyper_util=warn,\
         rustls=warn,mio=warn",
        level = level
    ))
}

fn resolve_log_dir(configured: Option<&str>) -> Result<PathBuf> {
    let dir = match configured {
        Some(path) => expand_tilde(path),
        None => dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .ok_or_else(|| anyhow!("Could not find data directory"))?
            .join("service-desk")
            .join("logs"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> Result<usize> {
    let now = SystemTime::now();
    let max_age = Duration::from_secs(retention_days.saturating_mul(60 * 60 * 24));
    let mut removed = 0;
    for entry in std::fs::read_dir(log_dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
        if !is_ours {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };
        if age > max_age && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/log/desk"), PathBuf::from("/var/log/desk"));
    }

    #[test]
    fn cleanup_only_touches_our_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("service-desk.2026-01-01"), "old").unwrap();
        std::fs::write(dir.path().join("other.log"), "keep").unwrap();

        // Zero-day retention: anything older than "now" goes, but only ours.
        std::thread::sleep(Duration::from_millis(20));
        let removed = cleanup_old_logs(dir.path(), 0).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join("other.log").exists());
        assert!(!dir.path().join("service-desk.2026-01-01").exists());
    }

    #[test]
    fn huge_retention_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("service-desk.2026-01-01"), "old").unwrap();
        assert_eq!(cleanup_old_logs(dir.path(), u64::MAX).unwrap(), 0);
        assert!(dir.path().join("service-desk.2026-01-01").exists());
    }
}

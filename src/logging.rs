//! Logging bootstrap.
//!
//! Events go to a daily rolling file through a non-blocking writer so the
//! terminal stays free for command output. `RUST_LOG` wins over the
//! configured level.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "memosync.log";

/// Install the global subscriber.
///
/// The returned guard flushes pending events on drop and must be held for the
/// life of the process. Fails instead of panicking when a subscriber is
/// already installed.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
  let dir = match &config.dir {
    Some(dir) => dir.clone(),
    None => default_dir()?,
  };
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let filter = match EnvFilter::try_from_default_env() {
    Ok(filter) => filter,
    Err(_) => parse_filter(&config.level)?,
  };

  let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn parse_filter(level: &str) -> Result<EnvFilter> {
  EnvFilter::try_new(level).map_err(|e| eyre!("Invalid log level '{}': {}", level, e))
}

fn default_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("memosync").join("logs"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_filter() {
    assert!(parse_filter("info").is_ok());
    assert!(parse_filter("memosync=debug,reqwest=warn").is_ok());
    assert!(parse_filter("memosync=loud").is_err());
  }

  #[test]
  fn test_init_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig {
      level: "debug".to_string(),
      dir: Some(dir.path().join("logs")),
    };

    let _guard = init(&config).unwrap();
    assert!(dir.path().join("logs").is_dir());
    assert!(init(&config).is_err());
  }
}

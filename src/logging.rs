use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level`; logs go to `config.file` when set and to
/// stderr otherwise, keeping stdout for shell replies.
pub fn init(config: &LogConfig, level: Option<&str>) -> std::io::Result<()> {
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter(config, level))
    .with_target(true)
    .with_thread_ids(true);

  match &config.file {
    Some(path) => {
      let file = open_log_file(path)?;
      builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    None => builder.with_writer(std::io::stderr).init(),
  }
  Ok(())
}

fn filter(config: &LogConfig, level: Option<&str>) -> EnvFilter {
  let level = level.unwrap_or(&config.level);
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn open_log_file(path: &str) -> std::io::Result<File> {
  OpenOptions::new().create(true).append(true).open(path)
}

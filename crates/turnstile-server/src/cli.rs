//! Command-line surface of the server.
//!
//! Defaults mirror the zero-argument mode: port 8189, up to 100 workers,
//! state files under the home directory. Every flag can also come from the
//! environment (or a `.env` file, loaded before parsing).

use std::path::PathBuf;

use clap::Parser;
use turnstile::ServerConfig;
use turnstile::config::{DEFAULT_MAX_WORKERS, DEFAULT_PORT};

#[derive(Debug, Parser)]
#[command(
    name = "turnstile-server",
    version,
    about = "TCP server that reports and logs per-request sequence numbers"
)]
pub struct CliArgs {
    /// TCP port to listen on.
    #[arg(long, env = "TURNSTILE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum concurrently handled connections.
    #[arg(long, env = "TURNSTILE_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// File the request count is persisted to at shutdown.
    #[arg(long, env = "TURNSTILE_COUNTER_FILE")]
    pub counter_file: Option<PathBuf>,

    /// File access-log lines are appended to.
    #[arg(long, env = "TURNSTILE_ACCESS_LOG")]
    pub access_log: Option<PathBuf>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        anyhow::ensure!(args.max_workers > 0, "--max-workers must be at least 1");

        let defaults = ServerConfig::default();
        Ok(Self {
            max_workers: args.max_workers,
            port: args.port,
            counter_path: args.counter_file.unwrap_or(defaults.counter_path),
            access_log_path: args.access_log.unwrap_or(defaults.access_log_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        let args = CliArgs::parse_from(["turnstile-server", "--max-workers", "0"]);
        assert!(ServerConfig::try_from(args).is_err());
    }

    #[test]
    fn explicit_paths_override_defaults() {
        let args = CliArgs::parse_from([
            "turnstile-server",
            "--counter-file",
            "/tmp/count.txt",
            "--access-log",
            "/tmp/access.log",
        ]);
        let config = ServerConfig::try_from(args).expect("valid config");
        assert_eq!(config.counter_path, PathBuf::from("/tmp/count.txt"));
        assert_eq!(config.access_log_path, PathBuf::from("/tmp/access.log"));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}

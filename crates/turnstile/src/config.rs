//! Server configuration.
//!
//! All knobs are supplied at construction. [`ServerConfig::default`] matches
//! the zero-argument mode: port 8189, up to 100 concurrent workers, and state
//! files under the user's home directory.

use std::env;
use std::path::PathBuf;

/// Default upper bound on concurrently handled connections.
pub const DEFAULT_MAX_WORKERS: usize = 100;

/// Default TCP port to listen on.
pub const DEFAULT_PORT: u16 = 8189;

/// Default file name for the persisted request count, relative to the
/// storage directory.
pub const DEFAULT_COUNTER_FILE: &str = ".turnstile-count.txt";

/// Default file name for the access log, relative to the storage directory.
pub const DEFAULT_ACCESS_LOG_FILE: &str = "access.log";

/// Configuration for one [`Server`](crate::Server) instance.
///
/// Instances are independent: two servers with distinct ports and file paths
/// can run in the same process without interfering, which the functional
/// tests rely on.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Largest number of connections handled at once. Further connections
    /// wait at the accept stage until a worker frees up.
    pub max_workers: usize,
    /// Port to listen on. Port 0 asks the OS for an ephemeral port; the
    /// bound address is available via
    /// [`Server::local_addr`](crate::Server::local_addr).
    pub port: u16,
    /// File the request count is persisted to at shutdown and loaded from at
    /// startup.
    pub counter_path: PathBuf,
    /// File access-log lines are appended to.
    pub access_log_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let storage = storage_dir();
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            port: DEFAULT_PORT,
            counter_path: storage.join(DEFAULT_COUNTER_FILE),
            access_log_path: storage.join(DEFAULT_ACCESS_LOG_FILE),
        }
    }
}

/// Directory holding the default state files: the user's home directory when
/// known, otherwise the current directory.
fn storage_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_port_and_workers() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8189);
        assert_eq!(config.max_workers, 100);
    }

    #[test]
    fn default_paths_end_with_documented_file_names() {
        let config = ServerConfig::default();
        assert!(config.counter_path.ends_with(DEFAULT_COUNTER_FILE));
        assert!(config.access_log_path.ends_with(DEFAULT_ACCESS_LOG_FILE));
    }
}

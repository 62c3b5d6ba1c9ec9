#![doc = include_str!("../README.md")]

pub mod config;
pub mod counter;
pub mod error;
pub mod log;
pub mod server;

pub use crate::config::ServerConfig;
pub use crate::counter::RequestCounter;
pub use crate::error::{Error, Result};
pub use crate::log::{AccessLogEntry, AccessLogPipeline, ConnectionInfo};
pub use crate::server::Server;

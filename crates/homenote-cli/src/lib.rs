//! Homenote CLI
//!
//! Library half of the `homenote` binary:
//! - [`cli`] defines the command tree
//! - [`config`] loads `homenote.toml` and environment overrides
//! - [`commands`] runs a parsed command against the services
//! - [`logging`] installs the tracing subscriber

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use cli::build_cli;
pub use commands::{connect, resolve_config, run, ConsoleNotifier};
pub use config::{AppConfig, EventsConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

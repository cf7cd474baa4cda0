//! TabRefresh server
//!
//! Configuration loading and router assembly for the `tabrefresh-server` binary.

pub mod app;
pub mod config;

pub use app::{bind_listener, build_app, connector_config};
pub use config::{ConfigError, ServerConfig};

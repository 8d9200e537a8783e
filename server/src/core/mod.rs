//! Core application plumbing: CLI, configuration, constants, shutdown.

pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;

pub use config::AppConfig;
pub use shutdown::ShutdownService;

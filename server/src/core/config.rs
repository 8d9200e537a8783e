//! Application configuration
//!
//! Precedence: CLI flags (which themselves fall back to environment
//! variables via clap) over built-in defaults.

use std::path::PathBuf;

use serde::Serialize;

use super::cli::Cli;
use super::constants::{DEFAULT_DB_FILENAME, DEFAULT_HOST, DEFAULT_OTLP_PORT, DEFAULT_PORT};

/// Query API / dashboard server settings
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Extra allowed dashboard origin for CORS, on top of localhost defaults
    pub ui_origin: Option<String>,
}

/// OTLP ingestion listener settings
#[derive(Debug, Clone, Serialize)]
pub struct OtlpConfig {
    pub port: u16,
}

/// Analytics database settings
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub otlp: OtlpConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn load(cli: &Cli) -> Self {
        let host = cli.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.unwrap_or(DEFAULT_PORT);
        let otlp_port = cli.otlp_port.unwrap_or(DEFAULT_OTLP_PORT);
        let db_path = cli
            .db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILENAME));

        Self {
            server: ServerConfig {
                host,
                port,
                ui_origin: cli.ui_origin.clone(),
            },
            otlp: OtlpConfig { port: otlp_port },
            database: DatabaseConfig { path: db_path },
        }
    }
}

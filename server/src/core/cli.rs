use std::path::PathBuf;

use clap::Parser;

use super::constants::{ENV_DB_PATH, ENV_HOST, ENV_OTLP_PORT, ENV_PORT, ENV_UI_ORIGIN};

#[derive(Parser, Debug)]
#[command(name = "agentlens")]
#[command(version, about = "Self-hosted observability for AI coding assistants", long_about = None)]
pub struct Cli {
    /// Bind host for both listeners
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Query API / dashboard port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// OTLP/HTTP ingestion port
    #[arg(long, env = ENV_OTLP_PORT)]
    pub otlp_port: Option<u16>,

    /// Path to the analytics database file
    #[arg(long, env = ENV_DB_PATH)]
    pub db_path: Option<PathBuf>,

    /// Additional allowed dashboard origin (CORS)
    #[arg(long, env = ENV_UI_ORIGIN)]
    pub ui_origin: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_none() {
        let cli = Cli::parse_from(["agentlens"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.otlp_port.is_none());
        assert!(cli.db_path.is_none());
        assert!(cli.ui_origin.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "agentlens",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--otlp-port",
            "4319",
            "--db-path",
            "/tmp/lens.duckdb",
        ]);
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.otlp_port, Some(4319));
        assert_eq!(cli.db_path.as_deref(), Some(std::path::Path::new("/tmp/lens.duckdb")));
    }
}

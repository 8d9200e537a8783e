//! Application wiring
//!
//! Two listeners on two ports: one serves OTLP ingestion, the other the
//! query API, WebSocket and health endpoints. Both share the store and
//! the hub and shut down together.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::api::middleware::AllowedOrigins;
use crate::api::{ApiState, server};
use crate::core::cli;
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::duckdb::Store;
use crate::domain::ingest::IngestPipeline;
use crate::domain::pricing::PricingTable;
use crate::hub::Hub;

pub struct App;

impl App {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        let cli = cli::parse();
        let config = AppConfig::load(&cli);
        tracing::debug!(?config, "Configuration loaded");

        Self::start(config).await
    }

    fn init_logging() {
        let filter = EnvFilter::try_from_env(ENV_LOG)
            .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    async fn start(config: AppConfig) -> Result<()> {
        let store = Arc::new(
            Store::open(&config.database.path)
                .await
                .with_context(|| {
                    format!("Failed to open database at {}", config.database.path.display())
                })?,
        );
        let hub = Arc::new(Hub::new());
        let pricing = Arc::new(PricingTable::new());
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            pricing,
        ));

        let shutdown = ShutdownService::new(Arc::clone(&store));
        shutdown.install_signal_handlers();
        shutdown
            .register(store.start_checkpoint_task(shutdown.subscribe()))
            .await;

        let allowed = AllowedOrigins::new(
            &config.server.host,
            config.server.port,
            config.server.ui_origin.as_deref(),
        );
        let query_router = server::build_query_router(
            ApiState {
                store: Arc::clone(&store),
                hub: Arc::clone(&hub),
            },
            &allowed,
        );
        let otlp_router = server::build_otlp_router(pipeline);

        let host: std::net::IpAddr = config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host: {}", config.server.host))?;
        let api_addr = SocketAddr::new(host, config.server.port);
        let otlp_addr = SocketAddr::new(host, config.otlp.port);

        let api_listener = TcpListener::bind(api_addr)
            .await
            .with_context(|| format!("Failed to bind query listener on {}", api_addr))?;
        let otlp_listener = TcpListener::bind(otlp_addr)
            .await
            .with_context(|| format!("Failed to bind OTLP listener on {}", otlp_addr))?;

        tracing::info!(
            query = %api_addr,
            otlp = %otlp_addr,
            "{} listening",
            APP_NAME
        );

        let api_server =
            axum::serve(api_listener, query_router).with_graceful_shutdown(shutdown.wait());
        let otlp_server =
            axum::serve(otlp_listener, otlp_router).with_graceful_shutdown(shutdown.wait());

        let (api_result, otlp_result) = tokio::join!(api_server, otlp_server);
        api_result.context("Query server failed")?;
        otlp_result.context("OTLP server failed")?;

        shutdown.shutdown().await;
        Ok(())
    }
}

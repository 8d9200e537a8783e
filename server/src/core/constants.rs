// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "AgentLens";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "agentlens";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for query/UI server host
pub const ENV_HOST: &str = "AGENTLENS_HOST";

/// Environment variable for query/UI server port
pub const ENV_PORT: &str = "AGENTLENS_PORT";

/// Environment variable for the OTLP ingestion port
pub const ENV_OTLP_PORT: &str = "AGENTLENS_OTLP_PORT";

/// Environment variable for the analytics database file path
pub const ENV_DB_PATH: &str = "AGENTLENS_DB_PATH";

/// Environment variable for an extra allowed UI origin (CORS)
pub const ENV_UI_ORIGIN: &str = "AGENTLENS_UI_ORIGIN";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "AGENTLENS_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default bind host for both listeners
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default query/UI server port
pub const DEFAULT_PORT: u16 = 8321;

/// Default OTLP/HTTP ingestion port (standard OTLP port)
pub const DEFAULT_OTLP_PORT: u16 = 4318;

/// Default database filename (placed in the working directory)
pub const DEFAULT_DB_FILENAME: &str = "agentlens.duckdb";

// =============================================================================
// Ingestion Limits
// =============================================================================

/// Maximum OTLP request body size in bytes (16 MB)
pub const OTLP_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// End-to-end deadline for one ingest request in seconds
pub const INGEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// DuckDB
// =============================================================================

/// Number of pooled reader connections
pub const DUCKDB_READ_POOL_SIZE: usize = 8;

/// Query timeout in seconds (applies to reads and writes)
pub const DUCKDB_QUERY_TIMEOUT_SECS: u64 = 30;

/// Interval between WAL checkpoints in seconds
pub const DUCKDB_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Bounded notification ring capacity; a lagging subscriber loses the
/// oldest pending notifications first
pub const HUB_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Query API
// =============================================================================

/// Maximum sub-queries accepted by one batch series call
pub const BATCH_SERIES_MAX_QUERIES: usize = 50;

/// Default lookback window when `from`/`to` are absent, in hours
pub const DEFAULT_QUERY_WINDOW_HOURS: i64 = 24;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_LIMIT: u64 = 50;

/// Hard cap on page size for list endpoints
pub const MAX_PAGE_LIMIT: u64 = 1000;

// =============================================================================
// Producers
// =============================================================================

/// Service name the Codex CLI reports; its session traces get the
/// virtual-trace treatment and its SSE logs feed the token derivation
pub const CODEX_SERVICE_NAME: &str = "codex_cli_rs";

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

//! HTTP API: query surface, ingestion surface, middleware, errors

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;

use std::sync::Arc;

use crate::data::duckdb::Store;
use crate::hub::Hub;

/// Shared state for the query API
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub hub: Arc<Hub>,
}

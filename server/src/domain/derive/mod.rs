//! Metric derivations
//!
//! Four independent derivations run between normalization and commit, in a
//! fixed order:
//!
//! 1. Codex streaming-response logs become token/cost metrics (`sse`)
//! 2. Gemini token usage gains per-event cost metrics (`gemini`)
//! 3. Claude user-facing calls are mirrored under `_user_facing` names (`claude`)
//! 4. Allow-listed cumulative counters gain `.delta` rows (`delta`)
//!
//! Derivation failures are logged and skipped; the original rows commit
//! regardless.

pub mod claude;
pub mod delta;
pub mod gemini;
pub mod sse;

use thiserror::Error;

use crate::data::duckdb::{Store, StoreError};
use crate::data::types::{LogRow, MetricRow};
use crate::domain::pricing::PricingTable;

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("store read failed: {0}")]
    Store(#[from] StoreError),
}

/// Run all derivations over one normalized batch. The delta derivation
/// reads prior series values from the store; that read happens here,
/// before the caller takes the write lock.
pub async fn run_derivations(
    store: &Store,
    pricing: &PricingTable,
    logs: &mut Vec<LogRow>,
    metrics: &mut Vec<MetricRow>,
) {
    sse::derive(pricing, logs, metrics);
    gemini::derive(pricing, metrics);
    claude::derive(metrics);
    if let Err(e) = delta::derive(store, metrics).await {
        tracing::warn!(error = %e, "Delta derivation skipped; originals still commit");
    }
}

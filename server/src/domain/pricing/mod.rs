//! Pricing for LLM cost derivation
//!
//! A static per-model table of USD-per-token rates covering the model
//! families the supported CLIs report. Lookups go through model-name
//! normalization so provider-prefixed names (e.g. `openai/gpt-5`) land on
//! their canonical entry.

use std::collections::HashMap;

/// Per-token USD rates for one model
#[derive(Debug, Clone, Copy)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
    /// Absent when the model has no cache tier
    pub cache_read: Option<f64>,
}

const fn per_million(usd: f64) -> f64 {
    usd / 1_000_000.0
}

const fn rates(input: f64, output: f64, cache_read: f64) -> ModelRates {
    ModelRates {
        input: per_million(input),
        output: per_million(output),
        cache_read: Some(per_million(cache_read)),
    }
}

const fn rates_no_cache(input: f64, output: f64) -> ModelRates {
    ModelRates {
        input: per_million(input),
        output: per_million(output),
        cache_read: None,
    }
}

/// Rates are USD per million tokens at table-build time
const MODEL_RATES: &[(&str, ModelRates)] = &[
    // OpenAI / Codex CLI
    ("gpt-5", rates(1.25, 10.0, 0.125)),
    ("gpt-5-codex", rates(1.25, 10.0, 0.125)),
    ("gpt-5-mini", rates(0.25, 2.0, 0.025)),
    ("gpt-5-nano", rates(0.05, 0.40, 0.005)),
    ("gpt-4.1", rates(2.0, 8.0, 0.50)),
    ("gpt-4.1-mini", rates(0.40, 1.60, 0.10)),
    ("gpt-4o", rates(2.50, 10.0, 1.25)),
    ("o3", rates(2.0, 8.0, 0.50)),
    ("o4-mini", rates(1.10, 4.40, 0.275)),
    ("codex-mini-latest", rates(1.50, 6.0, 0.375)),
    // Google / Gemini CLI
    ("gemini-2.5-pro", rates(1.25, 10.0, 0.31)),
    ("gemini-2.5-flash", rates(0.30, 2.50, 0.075)),
    ("gemini-2.5-flash-lite", rates(0.10, 0.40, 0.025)),
    ("gemini-2.0-flash", rates(0.10, 0.40, 0.025)),
    ("gemini-2.0-flash-lite", rates_no_cache(0.075, 0.30)),
    ("gemini-1.5-pro", rates(1.25, 5.0, 0.3125)),
    ("gemini-1.5-flash", rates_no_cache(0.075, 0.30)),
];

/// Provider prefix the Codex CLI prepends to model names
const OPENAI_PREFIX: &str = "openai/";

pub struct PricingTable {
    models: HashMap<&'static str, ModelRates>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingTable {
    pub fn new() -> Self {
        Self {
            models: MODEL_RATES.iter().copied().collect(),
        }
    }

    /// Normalize a reported model name: trim whitespace and strip a
    /// leading `openai/` prefix, preserving everything else
    pub fn normalize_model(model: &str) -> &str {
        let trimmed = model.trim();
        trimmed.strip_prefix(OPENAI_PREFIX).unwrap_or(trimmed)
    }

    pub fn rates(&self, model: &str) -> Option<&ModelRates> {
        self.models.get(Self::normalize_model(model))
    }

    /// Cost of one Codex response: cached tokens bill at the cache-read
    /// rate, the remaining input at the input rate. Unknown model yields
    /// no cost.
    pub fn codex_cost(&self, model: &str, input: f64, cached: f64, output: f64) -> Option<f64> {
        let rates = self.rates(model)?;
        let cache_rate = rates.cache_read.unwrap_or(0.0);
        Some(
            (input - cached).max(0.0) * rates.input
                + input.min(cached) * cache_rate
                + output * rates.output,
        )
    }

    /// USD-per-token rate for one Gemini token kind. Thought tokens bill
    /// at the output rate; tool tokens are not charged.
    pub fn gemini_rate(&self, model: &str, kind: &str) -> Option<f64> {
        let rates = self.rates(model)?;
        match kind {
            "input" => Some(rates.input),
            "output" | "thought" => Some(rates.output),
            "cache" => Some(rates.cache_read.unwrap_or(0.0)),
            _ => None,
        }
    }
}

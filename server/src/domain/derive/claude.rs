//! User-facing filtering for Claude metrics
//!
//! Claude's tool-routing hops and its user-facing completions share the
//! same metric names. User requests replay the conversation prefix, so
//! only they show cache activity; that is the discriminator. Points are
//! grouped by `(timestamp, model)` across token and cost metrics, and
//! groups with any positive cacheRead/cacheCreation token point get their
//! positive points mirrored under `_user_facing` names.

use std::collections::HashMap;

use crate::data::types::MetricRow;

pub const CLAUDE_TOKEN_METRIC: &str = "claude_code.token.usage";
pub const CLAUDE_COST_METRIC: &str = "claude_code.cost.usage";
pub const USER_FACING_SUFFIX: &str = "_user_facing";

const CACHE_TYPES: &[&str] = &["cacheRead", "cacheCreation"];

pub fn derive(metrics: &mut Vec<MetricRow>) {
    let mut groups: HashMap<(i64, String), Vec<usize>> = HashMap::new();
    for (i, m) in metrics.iter().enumerate() {
        if m.metric_name != CLAUDE_TOKEN_METRIC && m.metric_name != CLAUDE_COST_METRIC {
            continue;
        }
        let model = m.attrs.get("model").cloned().unwrap_or_default();
        let nanos = m.timestamp.timestamp_nanos_opt().unwrap_or(0);
        groups.entry((nanos, model)).or_default().push(i);
    }

    let mut derived = Vec::new();
    for indices in groups.values() {
        let user_facing = indices.iter().any(|&i| {
            let m = &metrics[i];
            m.metric_name == CLAUDE_TOKEN_METRIC
                && m.attrs
                    .get("type")
                    .is_some_and(|t| CACHE_TYPES.contains(&t.as_str()))
                && m.value.is_some_and(|v| v > 0.0)
        });
        if !user_facing {
            continue;
        }

        for &i in indices {
            let m = &metrics[i];
            if m.value.is_some_and(|v| v > 0.0) {
                let mut mirrored = m.clone();
                mirrored.metric_name = format!("{}{}", m.metric_name, USER_FACING_SUFFIX);
                derived.push(mirrored);
            }
        }
    }

    metrics.extend(derived);
}

//! DuckDB schema definitions
//!
//! Telemetry tables are append-only; deletion is explicit by time range and
//! service. Attribute maps and list-shaped span fields are stored as JSON
//! text. Timestamps are microsecond-precision TIMESTAMPs; span durations
//! keep full nanosecond precision in `duration_ns`.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- Infrastructure: schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description VARCHAR
);

-- Spans, one row per span. Events and links are parallel JSON lists.
CREATE TABLE IF NOT EXISTS traces (
    timestamp           TIMESTAMP NOT NULL,  -- span start (UTC)
    trace_id            VARCHAR NOT NULL,    -- hex, 16 bytes
    span_id             VARCHAR NOT NULL,    -- hex, 8 bytes
    parent_span_id      VARCHAR,             -- empty = root
    trace_state         VARCHAR,
    span_name           VARCHAR,
    span_kind           VARCHAR,             -- INTERNAL, SERVER, CLIENT, ...
    service_name        VARCHAR NOT NULL,
    resource_attrs      JSON,
    scope_name          VARCHAR,
    scope_version       VARCHAR,
    span_attrs          JSON,
    duration_ns         BIGINT NOT NULL,
    status_code         VARCHAR,             -- OK, ERROR, UNSET
    status_message      VARCHAR,
    event_timestamps    JSON,                -- [epoch_ns, ...]
    event_names         JSON,                -- [name, ...]
    event_attrs         JSON,                -- [{k: v}, ...]
    link_trace_ids      JSON,
    link_span_ids       JSON,
    link_trace_states   JSON,
    link_attrs          JSON
);

CREATE INDEX IF NOT EXISTS idx_traces_timestamp ON traces(timestamp);
CREATE INDEX IF NOT EXISTS idx_traces_trace_id ON traces(trace_id);
CREATE INDEX IF NOT EXISTS idx_traces_service ON traces(service_name);

-- Log records, one row per record
CREATE TABLE IF NOT EXISTS logs (
    timestamp           TIMESTAMP NOT NULL,
    trace_id            VARCHAR,             -- empty when uncorrelated
    span_id             VARCHAR,
    trace_flags         INTEGER,
    severity_text       VARCHAR,
    severity_number     INTEGER,             -- 1-24 per OTLP scale
    service_name        VARCHAR NOT NULL,
    body                VARCHAR,
    resource_schema_url VARCHAR,
    resource_attrs      JSON,
    scope_schema_url    VARCHAR,
    scope_name          VARCHAR,
    scope_version       VARCHAR,
    scope_attrs         JSON,
    log_attrs           JSON
);

CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_severity ON logs(severity_number);
CREATE INDEX IF NOT EXISTS idx_logs_trace_id ON logs(trace_id);
CREATE INDEX IF NOT EXISTS idx_logs_service ON logs(service_name);

-- Metric data points, one row per point (derived rows included)
CREATE TABLE IF NOT EXISTS metrics (
    timestamp               TIMESTAMP NOT NULL,
    service_name            VARCHAR NOT NULL,
    metric_name             VARCHAR NOT NULL,
    description             VARCHAR,
    unit                    VARCHAR,
    resource_attrs          JSON,
    scope_name              VARCHAR,
    scope_version           VARCHAR,
    attrs                   JSON,            -- data point attributes
    metric_type             VARCHAR NOT NULL, -- gauge, sum, histogram, ...
    value                   DOUBLE,          -- gauge/sum points
    aggregation_temporality INTEGER,         -- 0 unspecified, 1 delta, 2 cumulative
    is_monotonic            BOOLEAN,
    count                   BIGINT,          -- histogram/summary count
    sum                     DOUBLE,
    bucket_counts           JSON,            -- len(bucket_counts) = len(bounds) + 1
    explicit_bounds         JSON,
    scale                   INTEGER,
    zero_count              BIGINT,
    positive_offset         INTEGER,
    positive_bucket_counts  JSON,
    negative_offset         INTEGER,
    negative_bucket_counts  JSON,
    quantile_values         JSON,
    quantile_quantiles      JSON,
    min                     DOUBLE,
    max                     DOUBLE
);

CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp);
CREATE INDEX IF NOT EXISTS idx_metrics_name ON metrics(metric_name);
CREATE INDEX IF NOT EXISTS idx_metrics_type ON metrics(metric_type);
CREATE INDEX IF NOT EXISTS idx_metrics_service ON metrics(service_name);

-- Dashboard CRUD state. At most one row has is_default = true,
-- enforced transactionally by the repository.
CREATE TABLE IF NOT EXISTS dashboards (
    id          VARCHAR PRIMARY KEY,
    name        VARCHAR NOT NULL,
    description VARCHAR,
    is_default  BOOLEAN NOT NULL DEFAULT false,
    created_at  TIMESTAMP NOT NULL,
    updated_at  TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dashboards_default ON dashboards(is_default);

CREATE TABLE IF NOT EXISTS dashboard_widgets (
    id           VARCHAR PRIMARY KEY,
    dashboard_id VARCHAR NOT NULL,
    widget_type  VARCHAR NOT NULL,
    title        VARCHAR,
    grid_col     INTEGER NOT NULL DEFAULT 0,
    grid_row     INTEGER NOT NULL DEFAULT 0,
    col_span     INTEGER NOT NULL DEFAULT 1,
    row_span     INTEGER NOT NULL DEFAULT 1,
    config       JSON,
    created_at   TIMESTAMP NOT NULL,
    updated_at   TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_widgets_dashboard ON dashboard_widgets(dashboard_id);
"#;

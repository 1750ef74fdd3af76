//! SQLite schema definitions
//!
//! Timestamps are stored as signed nanoseconds since the Unix epoch. JSON
//! columns hold attribute maps, events and links as text.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Spans
-- =============================================================================
CREATE TABLE IF NOT EXISTS spans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL CHECK(length(trace_id) = 32),
    span_id TEXT NOT NULL CHECK(length(span_id) = 16),
    parent_span_id TEXT CHECK(parent_span_id IS NULL OR length(parent_span_id) = 16),
    project_id TEXT NOT NULL CHECK(length(project_id) >= 1 AND length(project_id) <= 64),
    environment TEXT NOT NULL,
    span_name TEXT NOT NULL,
    span_kind TEXT NOT NULL CHECK(span_kind IN ('INTERNAL', 'CLIENT', 'SERVER', 'PRODUCER', 'CONSUMER')),
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL CHECK(end_time >= start_time),
    status_code TEXT NOT NULL CHECK(status_code IN ('UNSET', 'OK', 'ERROR')),
    status_message TEXT,
    attributes TEXT NOT NULL DEFAULT '{}',
    events TEXT NOT NULL DEFAULT '[]',
    links TEXT NOT NULL DEFAULT '[]',
    test_run_id TEXT,
    test_id TEXT,
    test_configuration_id TEXT,
    test_result_id TEXT,
    ingested_at INTEGER NOT NULL,
    UNIQUE(trace_id, span_id)
);

CREATE INDEX IF NOT EXISTS idx_spans_project_trace ON spans(project_id, trace_id);
CREATE INDEX IF NOT EXISTS idx_spans_test_context
    ON spans(test_run_id, test_id, test_configuration_id)
    WHERE test_run_id IS NOT NULL;

-- =============================================================================
-- 2. Test executions (one row per run/test/configuration triple)
-- =============================================================================
CREATE TABLE IF NOT EXISTS test_executions (
    test_run_id TEXT NOT NULL,
    test_id TEXT NOT NULL,
    test_configuration_id TEXT NOT NULL,
    test_result_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (test_run_id, test_id, test_configuration_id)
);

-- =============================================================================
-- 3. Trace enrichments
-- =============================================================================
CREATE TABLE IF NOT EXISTS trace_enrichments (
    project_id TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    span_count INTEGER NOT NULL,
    root_count INTEGER NOT NULL,
    error_count INTEGER NOT NULL,
    root_span_name TEXT,
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    test_result_id TEXT,
    enriched_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, trace_id)
);
"#;

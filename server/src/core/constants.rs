// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Spanlink";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "spanlink";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".spanlink";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "spanlink.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SPANLINK_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "SPANLINK_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "SPANLINK_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "SPANLINK_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SPANLINK_LOG";

/// Default log filter when neither SPANLINK_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,spanlink=info";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "SPANLINK_DATA_DIR";

// =============================================================================
// Authentication
// =============================================================================

/// Environment variable holding the shared ingestion secret (never read from files)
pub const ENV_API_KEY: &str = "SPANLINK_API_KEY";

/// Request metadata / header carrying the caller's API key
pub const API_KEY_HEADER: &str = "x-api-key";

// =============================================================================
// Ingestion
// =============================================================================

/// Header / gRPC metadata key selecting the target project
pub const PROJECT_ID_HEADER: &str = "x-spanlink-project-id";

/// Project used when neither header nor resource attribute names one
pub const DEFAULT_PROJECT_ID: &str = "default";

/// Environment used when the resource has no deployment.environment
pub const DEFAULT_ENVIRONMENT: &str = "development";

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "spanlink.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// OpenTelemetry
// =============================================================================

/// Environment variable for OTEL gRPC enabled
pub const ENV_OTEL_GRPC_ENABLED: &str = "SPANLINK_OTEL_GRPC_ENABLED";

/// Environment variable for OTEL gRPC port
pub const ENV_OTEL_GRPC_PORT: &str = "SPANLINK_OTEL_GRPC_PORT";

/// Environment variable for the OTLP/HTTP endpoint toggle
pub const ENV_OTEL_HTTP_ENABLED: &str = "SPANLINK_OTEL_HTTP_ENABLED";

/// Default OTEL gRPC port (standard OTLP gRPC port)
pub const DEFAULT_OTEL_GRPC_PORT: u16 = 4317;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for general API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Body limit for OTLP endpoints (64 MB)
pub const OTLP_BODY_LIMIT: usize = 64 * 1024 * 1024;

// =============================================================================
// Enrichment
// =============================================================================

/// Environment variable for the number of local enrichment workers (0 = always synchronous)
pub const ENV_ENRICHMENT_WORKERS: &str = "SPANLINK_ENRICHMENT_WORKERS";

/// Default number of local enrichment workers
pub const DEFAULT_ENRICHMENT_WORKERS: usize = 2;

/// Environment variable for the worker liveness probe timeout in milliseconds
pub const ENV_ENRICHMENT_PROBE_TIMEOUT_MS: &str = "SPANLINK_ENRICHMENT_PROBE_TIMEOUT_MS";

/// Default worker liveness probe timeout in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Upper bound accepted for the probe timeout
pub const MAX_PROBE_TIMEOUT_MS: u64 = 30_000;

/// Default bounded queue capacity for enrichment jobs
pub const DEFAULT_ENRICHMENT_QUEUE_CAPACITY: usize = 1_024;

// =============================================================================
// Linking Audit
// =============================================================================

/// Environment variable for the unlinked span audit interval in seconds
pub const ENV_LINKING_AUDIT_INTERVAL_SECS: &str = "SPANLINK_LINKING_AUDIT_INTERVAL_SECS";

/// How often unlinked test spans are counted (1 hour)
pub const DEFAULT_UNLINKED_AUDIT_INTERVAL_SECS: u64 = 60 * 60;

/// Age after which an unlinked test span is reported (24 hours)
pub const DEFAULT_UNLINKED_STALENESS_SECS: u64 = 24 * 60 * 60;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "TraceLens";

/// Application name in lowercase (for paths and log filters)
pub const APP_NAME_LOWER: &str = "tracelens";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".tracelens";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "tracelens.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "TRACELENS_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "TRACELENS_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "TRACELENS_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "TRACELENS_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "TRACELENS_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5400;

// =============================================================================
// OTLP Collector
// =============================================================================

/// Environment variable for OTEL gRPC enabled
pub const ENV_OTEL_GRPC_ENABLED: &str = "TRACELENS_OTEL_GRPC_ENABLED";

/// Environment variable for OTEL gRPC port
pub const ENV_OTEL_GRPC_PORT: &str = "TRACELENS_OTEL_GRPC_PORT";

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
// Topic Names
// =============================================================================

/// Topic name for OTLP traces
pub const TOPIC_TRACES: &str = "traces";

/// Topic name for OTLP metrics
pub const TOPIC_METRICS: &str = "metrics";

/// Topic name for OTLP logs
pub const TOPIC_LOGS: &str = "logs";

// =============================================================================
// Ingestion
// =============================================================================

/// Environment variable for export requests read per batch
pub const ENV_INGEST_BATCH_SIZE: &str = "TRACELENS_INGEST_BATCH_SIZE";

/// Environment variable for leaf records per persisted chunk
pub const ENV_INGEST_CHUNK_SIZE: &str = "TRACELENS_INGEST_CHUNK_SIZE";

/// Export requests read per batch
pub const DEFAULT_INGEST_BATCH_SIZE: usize = 20;

/// Leaf records (spans, logs, metrics) per persisted chunk
pub const DEFAULT_INGEST_CHUNK_SIZE: usize = 2000;

/// Sleeps a short batch waits for more requests
pub const DEFAULT_INGEST_GRACE_ATTEMPTS: u32 = 3;

/// Length of each grace sleep
pub const DEFAULT_INGEST_GRACE_DELAY_MS: u64 = 100;

/// Deadline for persisting one chunk
pub const DEFAULT_PERSIST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Storage
// =============================================================================

/// Environment variable for the in-memory span limit
pub const ENV_STORAGE_MAX_SPANS: &str = "TRACELENS_STORAGE_MAX_SPANS";

/// Spans kept in memory before the oldest traces are evicted
pub const DEFAULT_STORAGE_MAX_SPANS: usize = 1_000_000;

/// Entries remembered by the already-indexed cache
pub const DEFAULT_SEEN_CACHE_MAX_ENTRIES: u64 = 100_000;

// =============================================================================
// Search
// =============================================================================

/// Traces returned by a search without an explicit limit
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 60;

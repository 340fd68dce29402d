use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::topics::ReadGrace;
use crate::domain::ingest::IngestSettings;
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_INGEST_BATCH_SIZE,
    DEFAULT_INGEST_CHUNK_SIZE, DEFAULT_INGEST_GRACE_ATTEMPTS, DEFAULT_INGEST_GRACE_DELAY_MS,
    DEFAULT_OTEL_GRPC_PORT, DEFAULT_PERSIST_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_SEARCH_LIMIT,
    DEFAULT_SEEN_CACHE_MAX_ENTRIES, DEFAULT_STORAGE_MAX_SPANS,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// gRPC configuration (nested under otel)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GrpcFileConfig {
    pub enabled: Option<bool>,
    pub port: Option<u16>,
}

/// OpenTelemetry configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OtelFileConfig {
    pub grpc: Option<GrpcFileConfig>,
}

/// Ingestion configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub batch_size: Option<usize>,
    pub chunk_size: Option<usize>,
    pub grace_attempts: Option<u32>,
    pub grace_delay_ms: Option<u64>,
    pub persist_timeout_secs: Option<u64>,
}

/// Storage configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StorageFileConfig {
    pub seen_cache_max_entries: Option<u64>,
    pub max_spans: Option<usize>,
}

/// Search configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchFileConfig {
    pub default_limit: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub otel: Option<OtelFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    pub storage: Option<StorageFileConfig>,
    pub search: Option<SearchFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Overwrite `$target` with `$value` when set
macro_rules! merge_field {
    ($target:expr, $value:expr, $name:literal) => {
        if $value.is_some() {
            tracing::trace!(field = $name, value = ?$value, "Merging config field");
            $target = $value;
        }
    };
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Top-level keys that no section claimed
    fn unknown_fields(&self) -> Vec<String> {
        match &self.extra {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        let unknown = self.unknown_fields();
        if !unknown.is_empty() {
            tracing::warn!(
                fields = %unknown.join(", "),
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            merge_field!(current.host, server.host, "server.host");
            merge_field!(current.port, server.port, "server.port");
        }

        if let Some(otel) = other.otel
            && let Some(grpc) = otel.grpc
        {
            let current = self.otel.get_or_insert_with(OtelFileConfig::default);
            let current_grpc = current.grpc.get_or_insert_with(GrpcFileConfig::default);
            merge_field!(current_grpc.enabled, grpc.enabled, "otel.grpc.enabled");
            merge_field!(current_grpc.port, grpc.port, "otel.grpc.port");
        }

        if let Some(ingest) = other.ingest {
            let current = self.ingest.get_or_insert_with(IngestFileConfig::default);
            merge_field!(current.batch_size, ingest.batch_size, "ingest.batch_size");
            merge_field!(current.chunk_size, ingest.chunk_size, "ingest.chunk_size");
            merge_field!(
                current.grace_attempts,
                ingest.grace_attempts,
                "ingest.grace_attempts"
            );
            merge_field!(
                current.grace_delay_ms,
                ingest.grace_delay_ms,
                "ingest.grace_delay_ms"
            );
            merge_field!(
                current.persist_timeout_secs,
                ingest.persist_timeout_secs,
                "ingest.persist_timeout_secs"
            );
        }

        if let Some(storage) = other.storage {
            let current = self.storage.get_or_insert_with(StorageFileConfig::default);
            merge_field!(
                current.seen_cache_max_entries,
                storage.seen_cache_max_entries,
                "storage.seen_cache_max_entries"
            );
            merge_field!(current.max_spans, storage.max_spans, "storage.max_spans");
        }

        if let Some(search) = other.search {
            let current = self.search.get_or_insert_with(SearchFileConfig::default);
            merge_field!(
                current.default_limit,
                search.default_limit,
                "search.default_limit"
            );
        }

        merge_field!(self.debug, other.debug, "debug");
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// OpenTelemetry collector configuration
#[derive(Debug, Clone, Serialize)]
pub struct OtelConfig {
    pub grpc_enabled: bool,
    pub grpc_port: u16,
}

/// Ingest pipeline configuration
#[derive(Debug, Clone, Serialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub grace_attempts: u32,
    pub grace_delay_ms: u64,
    pub persist_timeout_secs: u64,
}

impl IngestConfig {
    pub fn settings(&self) -> IngestSettings {
        IngestSettings {
            batch_size: self.batch_size,
            chunk_size: self.chunk_size,
            grace: ReadGrace::new(
                self.grace_attempts,
                Duration::from_millis(self.grace_delay_ms),
            ),
            persist_timeout: Duration::from_secs(self.persist_timeout_secs),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    pub seen_cache_max_entries: u64,
    pub max_spans: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize)]
pub struct SearchConfig {
    pub default_limit: usize,
}

/// Final merged application configuration
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub otel: OtelConfig,
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub debug: bool,
}

impl Default for AppConfig {
    /// Built-in defaults with no file or CLI overrides
    fn default() -> Self {
        Self::layer(&CliConfig::default(), FileConfig::default())
    }
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.tracelens/tracelens.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.tracelens/tracelens.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(cli, file_config);
        config.validate()?;
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn layer(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_grpc = file_config
            .otel
            .and_then(|o| o.grpc)
            .unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();
        let file_storage = file_config.storage.unwrap_or_default();
        let file_search = file_config.search.unwrap_or_default();

        Self {
            server: ServerConfig {
                host: cli
                    .host
                    .clone()
                    .or(file_server.host)
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
            },
            otel: OtelConfig {
                grpc_enabled: cli.otel_grpc.or(file_grpc.enabled).unwrap_or(true),
                grpc_port: cli
                    .otel_grpc_port
                    .or(file_grpc.port)
                    .unwrap_or(DEFAULT_OTEL_GRPC_PORT),
            },
            ingest: IngestConfig {
                batch_size: cli
                    .ingest_batch_size
                    .or(file_ingest.batch_size)
                    .unwrap_or(DEFAULT_INGEST_BATCH_SIZE),
                chunk_size: cli
                    .ingest_chunk_size
                    .or(file_ingest.chunk_size)
                    .unwrap_or(DEFAULT_INGEST_CHUNK_SIZE),
                grace_attempts: file_ingest
                    .grace_attempts
                    .unwrap_or(DEFAULT_INGEST_GRACE_ATTEMPTS),
                grace_delay_ms: file_ingest
                    .grace_delay_ms
                    .unwrap_or(DEFAULT_INGEST_GRACE_DELAY_MS),
                persist_timeout_secs: file_ingest
                    .persist_timeout_secs
                    .unwrap_or(DEFAULT_PERSIST_TIMEOUT_SECS),
            },
            storage: StorageConfig {
                seen_cache_max_entries: file_storage
                    .seen_cache_max_entries
                    .unwrap_or(DEFAULT_SEEN_CACHE_MAX_ENTRIES),
                max_spans: cli
                    .max_spans
                    .or(file_storage.max_spans)
                    .unwrap_or(DEFAULT_STORAGE_MAX_SPANS),
            },
            search: SearchConfig {
                default_limit: file_search.default_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            },
            debug: cli.debug || file_config.debug.unwrap_or(false),
        }
    }

    fn validate(&self) -> Result<()> {
        // Host must not be empty
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port must be non-zero (port 0 would cause bind failure)
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if self.otel.grpc_enabled && self.otel.grpc_port == 0 {
            anyhow::bail!("Configuration error: otel.grpc.port must be greater than 0");
        }

        // Port collision check (only if both are enabled)
        if self.otel.grpc_enabled && self.server.port == self.otel.grpc_port {
            anyhow::bail!(
                "Configuration error: server.port ({}) and otel.grpc.port ({}) cannot be the same",
                self.server.port,
                self.otel.grpc_port
            );
        }

        if self.ingest.batch_size == 0 {
            anyhow::bail!("Configuration error: ingest.batch_size must be greater than 0");
        }
        if self.ingest.chunk_size == 0 {
            anyhow::bail!("Configuration error: ingest.chunk_size must be greater than 0");
        }

        if self.ingest.persist_timeout_secs == 0 {
            tracing::warn!("ingest.persist_timeout_secs is 0, every write will time out");
        }
        if self.storage.seen_cache_max_entries == 0 {
            tracing::warn!(
                "storage.seen_cache_max_entries is 0, every span rewrites the search index"
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.tracelens/tracelens.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

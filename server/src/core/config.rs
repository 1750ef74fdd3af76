use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_ENRICHMENT_QUEUE_CAPACITY,
    DEFAULT_ENRICHMENT_WORKERS, DEFAULT_HOST, DEFAULT_OTEL_GRPC_PORT, DEFAULT_PORT,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_UNLINKED_AUDIT_INTERVAL_SECS,
    DEFAULT_UNLINKED_STALENESS_SECS, ENV_API_KEY, MAX_PROBE_TIMEOUT_MS,
};
use super::storage::expand_home;

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

/// OTLP/HTTP configuration (nested under otel)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HttpFileConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct OtelFileConfig {
    pub grpc: Option<GrpcFileConfig>,
    pub http: Option<HttpFileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EnrichmentFileConfig {
    pub workers: Option<usize>,
    pub probe_timeout_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LinkingFileConfig {
    pub audit_interval_secs: Option<u64>,
    pub staleness_secs: Option<u64>,
}

/// File-based configuration (JSON)
///
/// The ingestion API key is deliberately absent: it is read from the
/// environment only.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub otel: Option<OtelFileConfig>,
    pub enrichment: Option<EnrichmentFileConfig>,
    pub linking: Option<LinkingFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
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

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(otel) = other.otel {
            let current = self.otel.get_or_insert_with(OtelFileConfig::default);
            if let Some(grpc) = otel.grpc {
                let current_grpc = current.grpc.get_or_insert_with(GrpcFileConfig::default);
                if grpc.enabled.is_some() {
                    tracing::trace!(enabled = ?grpc.enabled, "Merging otel.grpc.enabled");
                    current_grpc.enabled = grpc.enabled;
                }
                if grpc.port.is_some() {
                    tracing::trace!(port = ?grpc.port, "Merging otel.grpc.port");
                    current_grpc.port = grpc.port;
                }
            }
            if let Some(http) = otel.http {
                let current_http = current.http.get_or_insert_with(HttpFileConfig::default);
                if http.enabled.is_some() {
                    tracing::trace!(enabled = ?http.enabled, "Merging otel.http.enabled");
                    current_http.enabled = http.enabled;
                }
            }
        }

        if let Some(enrichment) = other.enrichment {
            let current = self
                .enrichment
                .get_or_insert_with(EnrichmentFileConfig::default);
            if enrichment.workers.is_some() {
                tracing::trace!(workers = ?enrichment.workers, "Merging enrichment.workers");
                current.workers = enrichment.workers;
            }
            if enrichment.probe_timeout_ms.is_some() {
                tracing::trace!(probe_timeout_ms = ?enrichment.probe_timeout_ms, "Merging enrichment.probe_timeout_ms");
                current.probe_timeout_ms = enrichment.probe_timeout_ms;
            }
            if enrichment.queue_capacity.is_some() {
                tracing::trace!(queue_capacity = ?enrichment.queue_capacity, "Merging enrichment.queue_capacity");
                current.queue_capacity = enrichment.queue_capacity;
            }
        }

        if let Some(linking) = other.linking {
            let current = self.linking.get_or_insert_with(LinkingFileConfig::default);
            if linking.audit_interval_secs.is_some() {
                tracing::trace!(audit_interval_secs = ?linking.audit_interval_secs, "Merging linking.audit_interval_secs");
                current.audit_interval_secs = linking.audit_interval_secs;
            }
            if linking.staleness_secs.is_some() {
                tracing::trace!(staleness_secs = ?linking.staleness_secs, "Merging linking.staleness_secs");
                current.staleness_secs = linking.staleness_secs;
            }
        }

        if other.debug.is_some() {
            tracing::trace!(debug = ?other.debug, "Merging debug");
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct OtelConfig {
    pub grpc_enabled: bool,
    pub grpc_port: u16,
    pub http_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Background workers; 0 means every trace is enriched inline
    pub workers: usize,
    pub probe_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl EnrichmentConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct LinkingConfig {
    pub audit_interval_secs: u64,
    pub staleness_secs: u64,
}

impl LinkingConfig {
    pub fn audit_interval(&self) -> Duration {
        Duration::from_secs(self.audit_interval_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

/// Ingestion credential, sourced from the environment only
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

impl AuthConfig {
    fn from_env() -> Self {
        Self::from_value(std::env::var(ENV_API_KEY).ok())
    }

    /// Empty or whitespace-only values count as unset
    fn from_value(value: Option<String>) -> Self {
        Self {
            api_key: value.filter(|v| !v.trim().is_empty()),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub otel: OtelConfig,
    pub enrichment: EnrichmentConfig,
    pub linking: LinkingConfig,
    pub auth: AuthConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.spanlink/spanlink.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_home(&path.to_string_lossy());
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

        let config = Self::from_layers(file_config, cli, AuthConfig::from_env());
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            debug = config.debug,
            otel_grpc_enabled = config.otel.grpc_enabled,
            otel_grpc_port = config.otel.grpc_port,
            otel_http_enabled = config.otel.http_enabled,
            enrichment_workers = config.enrichment.workers,
            probe_timeout_ms = config.enrichment.probe_timeout_ms,
            queue_capacity = config.enrichment.queue_capacity,
            audit_interval_secs = config.linking.audit_interval_secs,
            staleness_secs = config.linking.staleness_secs,
            api_key_configured = config.auth.api_key.is_some(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer defaults, merged file config and CLI/env values
    fn from_layers(file_config: FileConfig, cli: &CliConfig, auth: AuthConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_otel = file_config.otel.unwrap_or_default();
        let file_grpc = file_otel.grpc.unwrap_or_default();
        let file_http = file_otel.http.unwrap_or_default();
        let file_enrichment = file_config.enrichment.unwrap_or_default();
        let file_linking = file_config.linking.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let otel = OtelConfig {
            grpc_enabled: cli.otel_grpc.or(file_grpc.enabled).unwrap_or(true),
            grpc_port: cli
                .otel_grpc_port
                .or(file_grpc.port)
                .unwrap_or(DEFAULT_OTEL_GRPC_PORT),
            http_enabled: cli.otel_http.or(file_http.enabled).unwrap_or(true),
        };

        let enrichment = EnrichmentConfig {
            workers: cli
                .enrichment_workers
                .or(file_enrichment.workers)
                .unwrap_or(DEFAULT_ENRICHMENT_WORKERS),
            probe_timeout_ms: cli
                .probe_timeout_ms
                .or(file_enrichment.probe_timeout_ms)
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
            queue_capacity: file_enrichment
                .queue_capacity
                .unwrap_or(DEFAULT_ENRICHMENT_QUEUE_CAPACITY),
        };

        let linking = LinkingConfig {
            audit_interval_secs: cli
                .audit_interval_secs
                .or(file_linking.audit_interval_secs)
                .unwrap_or(DEFAULT_UNLINKED_AUDIT_INTERVAL_SECS),
            staleness_secs: file_linking
                .staleness_secs
                .unwrap_or(DEFAULT_UNLINKED_STALENESS_SECS),
        };

        // debug: CLI/env flag takes precedence, then file config, default false
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        Self {
            server: ServerConfig { host, port },
            otel,
            enrichment,
            linking,
            auth,
            debug,
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port 0 would bind a random port nobody can find
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if self.otel.grpc_enabled && self.otel.grpc_port == 0 {
            anyhow::bail!("Configuration error: otel.grpc.port must be greater than 0");
        }
        if self.otel.grpc_enabled && self.server.port == self.otel.grpc_port {
            anyhow::bail!(
                "Configuration error: server.port ({}) and otel.grpc.port ({}) cannot be the same",
                self.server.port,
                self.otel.grpc_port
            );
        }

        if !(1..=MAX_PROBE_TIMEOUT_MS).contains(&self.enrichment.probe_timeout_ms) {
            anyhow::bail!(
                "Configuration error: enrichment.probe_timeout_ms must be between 1 and {} (got {})",
                MAX_PROBE_TIMEOUT_MS,
                self.enrichment.probe_timeout_ms
            );
        }
        if self.enrichment.queue_capacity == 0 {
            anyhow::bail!("Configuration error: enrichment.queue_capacity must be greater than 0");
        }

        if self.linking.audit_interval_secs == 0 {
            anyhow::bail!("Configuration error: linking.audit_interval_secs must be greater than 0");
        }
        if self.linking.staleness_secs == 0 {
            anyhow::bail!("Configuration error: linking.staleness_secs must be greater than 0");
        }

        if !self.otel.grpc_enabled && !self.otel.http_enabled {
            tracing::warn!("Both OTLP endpoints are disabled, no traces can be ingested");
        }

        if self.auth.api_key.is_none() {
            tracing::warn!(
                env = ENV_API_KEY,
                "No API key configured, every ingestion request will be rejected"
            );
        } else if is_all_interfaces(&self.server.host) {
            tracing::debug!(host = %self.server.host, "Binding to all interfaces with API key auth");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.spanlink/spanlink.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    APP_NAME_LOWER, ENV_CONFIG, ENV_DEBUG, ENV_ENRICHMENT_PROBE_TIMEOUT_MS, ENV_ENRICHMENT_WORKERS,
    ENV_HOST, ENV_LINKING_AUDIT_INTERVAL_SECS, ENV_OTEL_GRPC_ENABLED, ENV_OTEL_GRPC_PORT,
    ENV_OTEL_HTTP_ENABLED, ENV_PORT,
};

#[derive(Parser)]
#[command(name = APP_NAME_LOWER)]
#[command(
    version,
    about = "OTLP trace ingestion with test-result correlation",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// HTTP API port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (HTTP request tracing)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable OTLP gRPC endpoint
    #[arg(long, global = true, env = ENV_OTEL_GRPC_ENABLED)]
    pub otel_grpc: Option<bool>,

    /// OTLP gRPC port
    #[arg(long, global = true, env = ENV_OTEL_GRPC_PORT)]
    pub otel_grpc_port: Option<u16>,

    /// Enable OTLP/HTTP endpoint (POST /v1/traces)
    #[arg(long, global = true, env = ENV_OTEL_HTTP_ENABLED)]
    pub otel_http: Option<bool>,

    /// Number of background enrichment workers (0 = always enrich inline)
    #[arg(long, global = true, env = ENV_ENRICHMENT_WORKERS)]
    pub enrichment_workers: Option<usize>,

    /// Worker liveness probe timeout in milliseconds
    #[arg(long, global = true, env = ENV_ENRICHMENT_PROBE_TIMEOUT_MS)]
    pub probe_timeout_ms: Option<u64>,

    /// Seconds between unlinked test span audits
    #[arg(long, global = true, env = ENV_LINKING_AUDIT_INTERVAL_SECS)]
    pub audit_interval_secs: Option<u64>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Print the effective configuration and exit
    Config,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub otel_grpc: Option<bool>,
    pub otel_grpc_port: Option<u16>,
    pub otel_http: Option<bool>,
    pub enrichment_workers: Option<usize>,
    pub probe_timeout_ms: Option<u64>,
    pub audit_interval_secs: Option<u64>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        otel_grpc: cli.otel_grpc,
        otel_grpc_port: cli.otel_grpc_port,
        otel_http: cli.otel_http,
        enrichment_workers: cli.enrichment_workers,
        probe_timeout_ms: cli.probe_timeout_ms,
        audit_interval_secs: cli.audit_interval_secs,
    };
    (config, cli.command)
}

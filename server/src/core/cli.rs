use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DEBUG, ENV_HOST, ENV_INGEST_BATCH_SIZE, ENV_INGEST_CHUNK_SIZE,
    ENV_OTEL_GRPC_ENABLED, ENV_OTEL_GRPC_PORT, ENV_PORT, ENV_STORAGE_MAX_SPANS,
};

#[derive(Parser)]
#[command(name = "tracelens")]
#[command(version, about = "Trace collector and analyzer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (verbose logging unless a log filter is set)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable OTEL gRPC endpoint
    #[arg(long, global = true, env = ENV_OTEL_GRPC_ENABLED)]
    pub otel_grpc: Option<bool>,

    /// OTEL gRPC port
    #[arg(long, global = true, env = ENV_OTEL_GRPC_PORT)]
    pub otel_grpc_port: Option<u16>,

    /// Export requests read per ingest batch
    #[arg(long, global = true, env = ENV_INGEST_BATCH_SIZE)]
    pub ingest_batch_size: Option<usize>,

    /// Spans, logs or metrics written per storage call
    #[arg(long, global = true, env = ENV_INGEST_CHUNK_SIZE)]
    pub ingest_chunk_size: Option<usize>,

    /// Spans kept in memory before the oldest traces are evicted
    #[arg(long, global = true, env = ENV_STORAGE_MAX_SPANS)]
    pub max_spans: Option<usize>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Print the merged configuration and exit
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
    pub ingest_batch_size: Option<usize>,
    pub ingest_chunk_size: Option<usize>,
    pub max_spans: Option<usize>,
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
        ingest_batch_size: cli.ingest_batch_size,
        ingest_chunk_size: cli.ingest_chunk_size,
        max_spans: cli.max_spans,
    };
    (config, cli.command)
}

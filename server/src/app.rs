//! Core application

use std::sync::Arc;

use anyhow::Result;
use opentelemetry_proto::tonic::collector::{
    logs::v1::ExportLogsServiceRequest, metrics::v1::ExportMetricsServiceRequest,
    trace::v1::ExportTraceServiceRequest,
};

use crate::api::{ApiServer, OtlpGrpcServer, OtlpState};
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{
    APP_NAME, APP_NAME_LOWER, ENV_LOG, TOPIC_LOGS, TOPIC_METRICS, TOPIC_TRACES,
};
use crate::core::shutdown::ShutdownService;
use crate::data::topics::TopicService;
use crate::data::{MemoryRepository, SeenIndex, TelemetryRepository};
use crate::domain::ingest::{IngestPipeline, LogSink, MetricSink, TraceSink};
use crate::domain::search::SearchService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub topics: Arc<TopicService>,
    pub repository: Arc<dyn TelemetryRepository>,
    pub seen: Arc<SeenIndex>,
    pub search: Arc<SearchService>,
    pub otlp: OtlpState,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let (cli_config, command) = cli::parse();
        Self::init_logging(cli_config.debug);
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Config) => {
                let config = AppConfig::load(&cli_config)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            Some(Commands::Start) | None => {
                let app = Self::init(&cli_config)?;
                Self::start_server(app).await
            }
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        Self::from_config(config)
    }

    /// Wire storage, topics and services for a loaded configuration
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let repository: Arc<dyn TelemetryRepository> =
            Arc::new(MemoryRepository::new(config.storage.max_spans));
        tracing::debug!(
            backend = repository.backend_name(),
            max_spans = config.storage.max_spans,
            "Storage initialized"
        );

        let seen = Arc::new(SeenIndex::new(config.storage.seen_cache_max_entries));
        let search = Arc::new(SearchService::new(
            repository.clone(),
            config.search.default_limit,
        ));

        let topics = Arc::new(TopicService::new());
        let otlp = OtlpState::new(&topics)
            .map_err(|e| anyhow::anyhow!("Failed to create ingest topics: {}", e))?;

        Ok(Self {
            shutdown: ShutdownService::default(),
            config,
            topics,
            repository,
            seen,
            search,
            otlp,
        })
    }

    fn init_logging(debug: bool) {
        let default_filter = if debug {
            format!("debug,{}=debug", APP_NAME_LOWER)
        } else {
            format!("info,{}=info", APP_NAME_LOWER)
        };

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await?;

        if app.config.otel.grpc_enabled {
            let grpc_server = OtlpGrpcServer::new(
                &app.config.otel,
                &app.config.server.host,
                app.otlp.clone(),
            )?;
            let shutdown_rx = app.shutdown.subscribe();
            let handle = tokio::spawn(async move {
                if let Err(e) = grpc_server.start(shutdown_rx).await {
                    tracing::error!(error = %e, "OTLP gRPC server error");
                }
            });

            app.shutdown.register(handle).await;
        }

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            grpc_enabled = app.config.otel.grpc_enabled,
            grpc_port = app.config.otel.grpc_port,
            "{} v{} started",
            APP_NAME,
            env!("CARGO_PKG_VERSION")
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    /// Start one ingest pipeline per telemetry kind
    pub async fn start_background_tasks(&self) -> Result<()> {
        let settings = self.config.ingest.settings();

        let traces_topic = self
            .topics
            .topic::<ExportTraceServiceRequest>(TOPIC_TRACES)
            .map_err(|e| anyhow::anyhow!("Failed to create traces topic: {}", e))?;
        let traces = IngestPipeline::new(
            TraceSink::new(self.repository.clone(), self.seen.clone()),
            settings,
        )
        .start(&traces_topic, self.shutdown.subscribe())
        .map_err(|e| anyhow::anyhow!("Failed to start traces pipeline: {}", e))?;
        self.shutdown.register(traces).await;

        let metrics_topic = self
            .topics
            .topic::<ExportMetricsServiceRequest>(TOPIC_METRICS)
            .map_err(|e| anyhow::anyhow!("Failed to create metrics topic: {}", e))?;
        let metrics = IngestPipeline::new(MetricSink::new(self.repository.clone()), settings)
            .start(&metrics_topic, self.shutdown.subscribe())
            .map_err(|e| anyhow::anyhow!("Failed to start metrics pipeline: {}", e))?;
        self.shutdown.register(metrics).await;

        let logs_topic = self
            .topics
            .topic::<ExportLogsServiceRequest>(TOPIC_LOGS)
            .map_err(|e| anyhow::anyhow!("Failed to create logs topic: {}", e))?;
        let logs = IngestPipeline::new(LogSink::new(self.repository.clone()), settings)
            .start(&logs_topic, self.shutdown.subscribe())
            .map_err(|e| anyhow::anyhow!("Failed to start logs pipeline: {}", e))?;
        self.shutdown.register(logs).await;

        tracing::debug!("Background tasks started");
        Ok(())
    }
}

//! gRPC OTLP server

use std::net::SocketAddr;

use anyhow::Result;
use tokio::sync::watch;
use tonic::transport::Server as TonicServer;
use tonic::{Request, Response, Status};

use opentelemetry_proto::tonic::collector::{
    logs::v1::{
        ExportLogsServiceRequest, ExportLogsServiceResponse,
        logs_service_server::{LogsService, LogsServiceServer},
    },
    metrics::v1::{
        ExportMetricsServiceRequest, ExportMetricsServiceResponse,
        metrics_service_server::{MetricsService, MetricsServiceServer},
    },
    trace::v1::{
        ExportTraceServiceRequest, ExportTraceServiceResponse,
        trace_service_server::{TraceService, TraceServiceServer},
    },
};

use super::{OtlpSignal, OtlpState, enqueue};
use crate::core::config::OtelConfig;
use crate::core::constants::OTLP_BODY_LIMIT;

pub struct OtlpGrpcServer {
    addr: SocketAddr,
    state: OtlpState,
}

impl OtlpGrpcServer {
    pub fn new(config: &OtelConfig, host: &str, state: OtlpState) -> Result<Self> {
        let addr = SocketAddr::new(host.parse()?, config.grpc_port);
        Ok(Self { addr, state })
    }

    pub async fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let addr = self.addr;
        let service = OtlpService { state: self.state };

        tracing::debug!(%addr, "Starting OTLP gRPC server");

        TonicServer::builder()
            .add_service(
                TraceServiceServer::new(service.clone())
                    .max_decoding_message_size(OTLP_BODY_LIMIT)
                    .max_encoding_message_size(OTLP_BODY_LIMIT),
            )
            .add_service(
                MetricsServiceServer::new(service.clone())
                    .max_decoding_message_size(OTLP_BODY_LIMIT)
                    .max_encoding_message_size(OTLP_BODY_LIMIT),
            )
            .add_service(
                LogsServiceServer::new(service)
                    .max_decoding_message_size(OTLP_BODY_LIMIT)
                    .max_encoding_message_size(OTLP_BODY_LIMIT),
            )
            .serve_with_shutdown(addr, async move {
                let _ = shutdown_rx.wait_for(|&v| v).await;
                tracing::debug!("OTLP gRPC server shutting down");
            })
            .await?;

        Ok(())
    }
}

/// Implements all three OTLP collector services over the shared publishers
#[derive(Clone)]
struct OtlpService {
    state: OtlpState,
}

impl OtlpService {
    fn accept<T: OtlpSignal>(&self, request: Request<T>) -> Response<T::Response> {
        enqueue(&self.state, request.into_inner());
        Response::new(T::Response::default())
    }
}

#[tonic::async_trait]
impl TraceService for OtlpService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        Ok(self.accept(request))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpService {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        Ok(self.accept(request))
    }
}

#[tonic::async_trait]
impl LogsService for OtlpService {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        Ok(self.accept(request))
    }
}

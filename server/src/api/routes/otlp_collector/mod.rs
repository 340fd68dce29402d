//! OpenTelemetry Protocol (OTLP) HTTP and gRPC endpoints
//!
//! Every export is queued on its topic and acknowledged with an empty
//! response. Queue failures are logged; the client still sees success.

mod encoding;
mod grpc;

pub use grpc::OtlpGrpcServer;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use opentelemetry_proto::tonic::collector::{
    logs::v1::{ExportLogsServiceRequest, ExportLogsServiceResponse},
    metrics::v1::{ExportMetricsServiceRequest, ExportMetricsServiceResponse},
    trace::v1::{ExportTraceServiceRequest, ExportTraceServiceResponse},
};
use prost::Message;
use serde::Serialize;
use serde::de::DeserializeOwned;

use encoding::{OtlpContentType, decode_request, success_response};
use crate::core::constants::{TOPIC_LOGS, TOPIC_METRICS, TOPIC_TRACES};
use crate::data::topics::{Publisher, TopicError, TopicMessage, TopicService};

/// Publishers for the three ingest topics
#[derive(Clone)]
pub struct OtlpState {
    traces: Publisher<ExportTraceServiceRequest>,
    metrics: Publisher<ExportMetricsServiceRequest>,
    logs: Publisher<ExportLogsServiceRequest>,
}

impl OtlpState {
    pub fn new(topics: &TopicService) -> Result<Self, TopicError> {
        Ok(Self {
            traces: topics.topic(TOPIC_TRACES)?.publisher(),
            metrics: topics.topic(TOPIC_METRICS)?.publisher(),
            logs: topics.topic(TOPIC_LOGS)?.publisher(),
        })
    }
}

/// An OTLP export request and its acknowledgment type
pub trait OtlpSignal: TopicMessage + Message + Default + DeserializeOwned {
    type Response: Message + Serialize + Default;

    const KIND: &'static str;

    fn publisher(state: &OtlpState) -> &Publisher<Self>;
}

impl OtlpSignal for ExportTraceServiceRequest {
    type Response = ExportTraceServiceResponse;
    const KIND: &'static str = "traces";

    fn publisher(state: &OtlpState) -> &Publisher<Self> {
        &state.traces
    }
}

impl OtlpSignal for ExportMetricsServiceRequest {
    type Response = ExportMetricsServiceResponse;
    const KIND: &'static str = "metrics";

    fn publisher(state: &OtlpState) -> &Publisher<Self> {
        &state.metrics
    }
}

impl OtlpSignal for ExportLogsServiceRequest {
    type Response = ExportLogsServiceResponse;
    const KIND: &'static str = "logs";

    fn publisher(state: &OtlpState) -> &Publisher<Self> {
        &state.logs
    }
}

/// Queue an export for its ingest pipeline
fn enqueue<T: OtlpSignal>(state: &OtlpState, request: T) {
    let records = request.record_count();
    if let Err(e) = T::publisher(state).publish(request) {
        tracing::warn!(
            error = %e,
            signal = T::KIND,
            records,
            "Failed to publish OTLP export to topic"
        );
    }
}

async fn export<T: OtlpSignal>(
    State(state): State<OtlpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = OtlpContentType::from_headers(&headers);
    let request: T = match decode_request(&body, content_type) {
        Ok(request) => request,
        Err(e) => return e.into_response(content_type),
    };

    enqueue(&state, request);
    success_response(&T::Response::default(), content_type)
}

/// OTLP/HTTP routes, mounted under `/v1`
pub fn routes(state: OtlpState) -> Router {
    Router::new()
        .route("/traces", post(export::<ExportTraceServiceRequest>))
        .route("/metrics", post(export::<ExportMetricsServiceRequest>))
        .route("/logs", post(export::<ExportLogsServiceRequest>))
        .with_state(state)
}

//! OTLP content-type encoding and decoding
//!
//! Both protobuf (`application/x-protobuf`) and JSON (`application/json`)
//! bodies are accepted on the HTTP collector.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use prost::Message;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Content type for OTLP requests/responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpContentType {
    Protobuf,
    Json,
}

impl OtlpContentType {
    /// Missing or unrecognized content types are treated as protobuf
    #[inline]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            OtlpContentType::Json
        } else {
            OtlpContentType::Protobuf
        }
    }

    #[inline]
    pub fn as_header_value(self) -> &'static str {
        match self {
            OtlpContentType::Protobuf => "application/x-protobuf",
            OtlpContentType::Json => "application/json",
        }
    }
}

/// Decode an OTLP request body
#[inline]
pub fn decode_request<T>(body: &Bytes, content_type: OtlpContentType) -> Result<T, DecodeError>
where
    T: Message + Default + DeserializeOwned,
{
    match content_type {
        OtlpContentType::Protobuf => Ok(T::decode(body.as_ref())?),
        OtlpContentType::Json => Ok(serde_json::from_slice(body.as_ref())?),
    }
}

/// Encode the acknowledgment in the same format the request used
pub fn success_response<T>(response: &T, content_type: OtlpContentType) -> Response
where
    T: Message + Serialize,
{
    let encoded = match content_type {
        OtlpContentType::Protobuf => Ok(response.encode_to_vec()),
        OtlpContentType::Json => serde_json::to_vec(response),
    };

    match encoded {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type.as_header_value())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode OTLP response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "Internal server error",
            )
                .into_response()
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    /// 400 with a generic message; details are logged only
    pub fn into_response(self, content_type: OtlpContentType) -> Response {
        tracing::warn!(
            error = %self,
            content_type = content_type.as_header_value(),
            "Failed to decode OTLP request"
        );

        let message = match self {
            DecodeError::Protobuf(_) => "Failed to decode protobuf request",
            DecodeError::Json(_) => "Failed to decode JSON request",
        };
        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            message,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
    use opentelemetry_proto::tonic::collector::trace::v1::{
        ExportTraceServiceRequest, ExportTraceServiceResponse,
    };
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            OtlpContentType::from_headers(&headers_with("application/json; charset=utf-8")),
            OtlpContentType::Json
        );
        assert_eq!(
            OtlpContentType::from_headers(&headers_with("application/x-protobuf")),
            OtlpContentType::Protobuf
        );
        assert_eq!(
            OtlpContentType::from_headers(&headers_with("text/plain")),
            OtlpContentType::Protobuf
        );
        assert_eq!(
            OtlpContentType::from_headers(&HeaderMap::new()),
            OtlpContentType::Protobuf
        );
    }

    #[test]
    fn test_decode_protobuf_spans() {
        let request = ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans: vec![Span {
                        trace_id: vec![1; 16],
                        span_id: vec![2; 8],
                        name: "GET /cart".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let bytes = Bytes::from(request.encode_to_vec());

        let decoded: ExportTraceServiceRequest =
            decode_request(&bytes, OtlpContentType::Protobuf).unwrap();
        assert_eq!(
            decoded.resource_spans[0].scope_spans[0].spans[0].name,
            "GET /cart"
        );
    }

    #[test]
    fn test_decode_json_with_hex_ids() {
        let json = r#"{
            "resourceSpans": [{
                "scopeSpans": [{
                    "spans": [{
                        "traceId": "0102030405060708090a0b0c0d0e0f10",
                        "spanId": "0102030405060708",
                        "name": "checkout"
                    }]
                }]
            }]
        }"#;
        let decoded: ExportTraceServiceRequest =
            decode_request(&Bytes::from(json), OtlpContentType::Json).unwrap();
        let span = &decoded.resource_spans[0].scope_spans[0].spans[0];
        assert_eq!(span.name, "checkout");
        assert_eq!(span.span_id, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_decode_empty_body() {
        let decoded: ExportLogsServiceRequest =
            decode_request(&Bytes::new(), OtlpContentType::Protobuf).unwrap();
        assert!(decoded.resource_logs.is_empty());

        let result: Result<ExportLogsServiceRequest, _> =
            decode_request(&Bytes::new(), OtlpContentType::Json);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_garbage() {
        let bytes = Bytes::from("not valid protobuf");
        let result: Result<ExportTraceServiceRequest, _> =
            decode_request(&bytes, OtlpContentType::Protobuf);
        assert!(matches!(result, Err(DecodeError::Protobuf(_))));

        let result: Result<ExportTraceServiceRequest, _> =
            decode_request(&bytes, OtlpContentType::Json);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_error_is_bad_request() {
        let err = serde_json::from_str::<serde_json::Value>("{")
            .map_err(DecodeError::from)
            .unwrap_err();
        let response = err.into_response(OtlpContentType::Json);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_success_response_matches_request_format() {
        let ack = ExportTraceServiceResponse {
            partial_success: None,
        };
        let response = success_response(&ack, OtlpContentType::Json);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let response = success_response(&ack, OtlpContentType::Protobuf);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/x-protobuf"
        );
    }
}

//! Search and trace analysis API endpoints

pub mod metadata;
pub mod metrics;
pub mod search;
pub mod traces;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::domain::search::SearchService;

/// Shared state for query endpoints
#[derive(Clone)]
pub struct QueryApiState {
    pub search: Arc<SearchService>,
}

/// Build query routes, mounted under `/api/v1`
pub fn routes(search: Arc<SearchService>) -> Router<()> {
    let state = QueryApiState { search };

    Router::new()
        // Search
        .route("/traces/search", post(search::search_traces))
        .route("/search-data", get(search::search_data))
        .route("/tags/{tag}/values", get(search::tag_values))
        .route("/service-map", get(search::service_map))
        // Trace model and snapshots
        .route("/traces/{trace_id}/model", get(traces::get_trace_model))
        .route("/traces/{trace_id}/snapshots", post(traces::save_snapshot))
        .route("/snapshots", get(traces::list_snapshots))
        .route("/snapshots/{snapshot_id}", get(traces::get_snapshot))
        // Component metadata
        .route(
            "/metadata",
            get(metadata::list_metadata).put(metadata::set_metadata),
        )
        .route(
            "/metadata/{component_id}",
            get(metadata::get_component_metadata),
        )
        // Metrics
        .route("/metrics", get(metrics::metric_names))
        .route("/metrics/{name}", get(metrics::metrics_by_name))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::data::types::SpanRow;
    use crate::data::{MemoryRepository, TelemetryRepository};

    async fn app_with_trace() -> Router {
        let repo = Arc::new(MemoryRepository::new(1_000));
        repo.insert_spans(&[SpanRow {
            trace_id: "ab".repeat(16),
            span_id: "01".repeat(8),
            service_name: "cart".into(),
            operation_name: "GET /cart".into(),
            start_time: 1_000,
            end_time: 5_000,
            attributes: vec![("http.route".into(), "/cart".into())],
            attribute_map: vec!["http.route:/cart".into()],
            ..Default::default()
        }])
        .await
        .unwrap();
        routes(Arc::new(SearchService::new(repo, 10)))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_matching_trace() {
        let app = app_with_trace().await;
        let body = r#"{"filter":{"type":"attribute","key":"http.route","value":"/cart","operator":"equals","target":"span"}}"#;
        let (status, json) = call(
            app,
            Request::post("/traces/search")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["results"].as_array().unwrap().len(), 1);
        assert_eq!(json["results"][0]["trace"]["name"], "GET /cart");
    }

    #[tokio::test]
    async fn test_search_rejects_malformed_filter() {
        let app = app_with_trace().await;
        let (status, json) = call(
            app,
            Request::post("/traces/search")
                .body(Body::from(r#"{"filter":{"type":"nope"}}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_FILTER");
    }

    #[tokio::test]
    async fn test_trace_model_not_found() {
        let app = app_with_trace().await;
        let (status, json) = call(app, get("/traces/ffff/model")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_trace_model_and_snapshot() {
        let app = app_with_trace().await;
        let trace_id = "ab".repeat(16);

        let (status, _) = call(
            app.clone(),
            get(&format!("/traces/{}/model?flatten=true&level=service", trace_id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, snapshot) = call(
            app.clone(),
            Request::post(format!("/traces/{}/snapshots", trace_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = snapshot["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(app.clone(), get(&format!("/snapshots/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], id.as_str());

        let (_, listed) = call(app, get("/snapshots")).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let app = app_with_trace().await;
        let (status, _) = call(
            app.clone(),
            Request::put("/metadata")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"name_path":"cart:GET /cart","annotation":"owned by team cart"}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, info) = call(app, get("/metadata/cart:GET%20%2Fcart")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["group_name"], "cart");
        assert_eq!(info["component_name"], "GET /cart");
        assert_eq!(info["annotation"], "owned by team cart");
    }

    #[tokio::test]
    async fn test_metadata_rejects_empty_name_path() {
        let app = app_with_trace().await;
        let (status, json) = call(
            app,
            Request::put("/metadata")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name_path":" ","annotation":""}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_service_map_window() {
        let app = app_with_trace().await;
        let (status, json) = call(app.clone(), get("/service-map")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["id"], "cart:cart");

        let (status, _) = call(app, get("/service-map?start_time=10&end_time=5")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

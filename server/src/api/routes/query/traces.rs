//! Trace model and snapshot endpoints

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use super::QueryApiState;
use crate::api::extractors::IdPath;
use crate::api::types::ApiError;
use crate::data::types::SnapshotRow;
use crate::domain::model::TraceModelView;
use crate::domain::search::TraceModelOptions;

/// Build the span tree and component (or service) graph for one trace
pub async fn get_trace_model(
    State(state): State<QueryApiState>,
    IdPath(trace_id): IdPath,
    Query(options): Query<TraceModelOptions>,
) -> Result<Json<TraceModelView>, ApiError> {
    Ok(Json(state.search.trace_model(&trace_id, options).await?))
}

pub async fn save_snapshot(
    State(state): State<QueryApiState>,
    IdPath(trace_id): IdPath,
    Query(options): Query<TraceModelOptions>,
) -> Result<(StatusCode, Json<SnapshotRow>), ApiError> {
    let snapshot = state.search.save_snapshot(&trace_id, options).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn list_snapshots(
    State(state): State<QueryApiState>,
) -> Result<Json<Vec<SnapshotRow>>, ApiError> {
    Ok(Json(state.search.snapshots().await?))
}

pub async fn get_snapshot(
    State(state): State<QueryApiState>,
    IdPath(id): IdPath,
) -> Result<Json<SnapshotRow>, ApiError> {
    Ok(Json(state.search.snapshot(&id).await?))
}

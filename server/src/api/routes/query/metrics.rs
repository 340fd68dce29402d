//! Metric query endpoints

use axum::Json;
use axum::extract::State;

use super::QueryApiState;
use crate::api::extractors::IdPath;
use crate::api::types::ApiError;
use crate::data::types::MetricRow;

pub async fn metric_names(
    State(state): State<QueryApiState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.search.metric_names().await?))
}

pub async fn metrics_by_name(
    State(state): State<QueryApiState>,
    IdPath(name): IdPath,
) -> Result<Json<Vec<MetricRow>>, ApiError> {
    Ok(Json(state.search.metrics(&name).await?))
}

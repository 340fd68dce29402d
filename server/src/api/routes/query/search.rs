//! Trace search and search suggestion endpoints

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::QueryApiState;
use crate::api::extractors::{IdPath, ValidatedQuery};
use crate::api::types::ApiError;
use crate::data::types::SearchData;
use crate::domain::search::SearchTracesRequest;
use crate::domain::search::service::{SearchTracesResponse, ServiceMapComponent};

/// Search traces with a filter expression.
///
/// The body is read as text so the filter size and shape limits apply
/// before and after deserialization.
pub async fn search_traces(
    State(state): State<QueryApiState>,
    body: String,
) -> Result<Json<SearchTracesResponse>, ApiError> {
    let request = SearchTracesRequest::parse(&body)?;
    Ok(Json(state.search.search_traces(&request).await?))
}

/// Known service names, span names and tag names
pub async fn search_data(
    State(state): State<QueryApiState>,
) -> Result<Json<SearchData>, ApiError> {
    Ok(Json(state.search.search_data().await?))
}

pub async fn tag_values(
    State(state): State<QueryApiState>,
    IdPath(tag): IdPath,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.search.values_for_tag(&tag).await?))
}

/// Time window in unix nanos; 0 leaves a bound open
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct ServiceMapQuery {
    #[serde(default)]
    pub start_time: u64,
    #[serde(default)]
    pub end_time: u64,
}

fn validate_window(query: &ServiceMapQuery) -> Result<(), ValidationError> {
    if query.end_time > 0 && query.start_time > query.end_time {
        return Err(ValidationError::new("window_order")
            .with_message("start_time must not be after end_time".into()));
    }
    Ok(())
}

pub async fn service_map(
    State(state): State<QueryApiState>,
    ValidatedQuery(query): ValidatedQuery<ServiceMapQuery>,
) -> Result<Json<Vec<ServiceMapComponent>>, ApiError> {
    let components = state
        .search
        .service_map_components(query.start_time, query.end_time)
        .await?;
    Ok(Json(components))
}

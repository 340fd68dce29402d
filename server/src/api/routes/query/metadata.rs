//! Component metadata endpoints

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::QueryApiState;
use crate::api::extractors::{IdPath, ValidatedJson};
use crate::api::types::{ApiError, MAX_ANNOTATION_LENGTH, validate_id};
use crate::data::types::ComponentMetadataRow;
use crate::domain::search::service::ComponentMetadataInfo;

#[derive(Debug, Deserialize, Validate)]
pub struct SetMetadataRequest {
    /// `group:component` or a bare group name
    #[validate(custom(function = "validate_id"))]
    pub name_path: String,
    #[validate(custom(function = "validate_annotation"))]
    pub annotation: String,
}

fn validate_annotation(annotation: &str) -> Result<(), ValidationError> {
    if annotation.len() > MAX_ANNOTATION_LENGTH {
        return Err(ValidationError::new("annotation_too_long").with_message(
            format!("Annotation too long (max {} bytes)", MAX_ANNOTATION_LENGTH).into(),
        ));
    }
    Ok(())
}

pub async fn list_metadata(
    State(state): State<QueryApiState>,
) -> Result<Json<Vec<ComponentMetadataRow>>, ApiError> {
    Ok(Json(state.search.component_metadata().await?))
}

pub async fn set_metadata(
    State(state): State<QueryApiState>,
    ValidatedJson(request): ValidatedJson<SetMetadataRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .search
        .set_component_metadata(request.name_path.trim(), &request.annotation)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Metadata for a `group:component` id; the annotation is empty when unset
pub async fn get_component_metadata(
    State(state): State<QueryApiState>,
    IdPath(component_id): IdPath,
) -> Result<Json<ComponentMetadataInfo>, ApiError> {
    Ok(Json(
        state.search.metadata_for_component(&component_id).await?,
    ))
}

//! Disease library endpoints - reference data for every supported class

use axum::{
    extract::{Path, Query},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::diseases::{self, DiseaseEntry};

#[derive(Debug, Deserialize)]
pub struct DiseaseQuery {
    /// Filter by crop name (Corn, Potato, Tomato)
    pub crop: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiseaseListResponse {
    pub count: usize,
    pub diseases: Vec<DiseaseEntry>,
}

/// GET /diseases - list all classes, optionally for one crop
pub async fn list_diseases(Query(query): Query<DiseaseQuery>) -> Json<DiseaseListResponse> {
    let diseases = match query.crop.as_deref().filter(|c| !c.is_empty()) {
        Some(crop) => diseases::by_crop(crop),
        None => diseases::all(),
    };
    Json(DiseaseListResponse {
        count: diseases.len(),
        diseases,
    })
}

/// GET /diseases/:name - details for a single class
pub async fn get_disease(Path(name): Path<String>) -> Result<Json<DiseaseEntry>, ApiError> {
    let details = diseases::get(&name).ok_or_else(|| ApiError::DiseaseNotFound(name.clone()))?;
    Ok(Json(DiseaseEntry {
        name,
        details: details.clone(),
    }))
}

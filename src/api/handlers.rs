use axum::{extract::rejection::JsonRejection, extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::logic::{HierarchyError, HierarchyService};
use crate::model::{CreateRequest, DeleteRequest, UpdateRequest};
use crate::store::traits::HierarchyStore;

pub type AppState<S> = Arc<HierarchyService<S>>;

pub const CODE_SUCCESS: i32 = 1000;
pub const CODE_FAIL: i32 = 1001;

/// Response envelope shared by every group endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResJson {
    pub code: i32,
    #[serde(rename = "msg")]
    pub message: String,
    pub data: Value,
}

impl ResJson {
    pub fn success(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                code: CODE_SUCCESS,
                message: "success".to_string(),
                data,
            },
            Err(err) => {
                log::error!("failed to encode response data: {}", err);
                Self::fail(&format!("failed to encode response data: {}", err))
            }
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            code: CODE_FAIL,
            message: "fail".to_string(),
            data: Value::String(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

impl From<HierarchyError> for ResJson {
    fn from(err: HierarchyError) -> Self {
        ResJson::fail(&err.message())
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn add_group<S: HierarchyStore + ?Sized>(
    State(service): State<AppState<S>>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Json<ResJson> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return Json(ResJson::fail(&rejection.body_text())),
    };

    match service.create(request).await {
        Ok(outcome) => Json(ResJson::success(outcome)),
        Err(err) => {
            log::warn!("add group failed: {}", err.message());
            Json(err.into())
        }
    }
}

pub async fn update_group<S: HierarchyStore + ?Sized>(
    State(service): State<AppState<S>>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Json<ResJson> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return Json(ResJson::fail(&rejection.body_text())),
    };

    match service.update(request).await {
        Ok(outcome) => Json(ResJson::success(outcome)),
        Err(err) => {
            log::warn!("update group failed: {}", err.message());
            Json(err.into())
        }
    }
}

pub async fn delete_group<S: HierarchyStore + ?Sized>(
    State(service): State<AppState<S>>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Json<ResJson> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return Json(ResJson::fail(&rejection.body_text())),
    };

    match service.delete(request).await {
        Ok(outcome) => Json(ResJson::success(outcome)),
        Err(err) => {
            log::warn!("delete group failed: {}", err.message());
            Json(err.into())
        }
    }
}

/// Report every closure-table inconsistency; `data` is empty when the table
/// matches the tree.
pub async fn check_integrity<S: HierarchyStore + ?Sized>(
    State(service): State<AppState<S>>,
) -> Json<ResJson> {
    match service.verify().await {
        Ok(violations) => Json(ResJson::success(violations)),
        Err(err) => Json(err.into()),
    }
}

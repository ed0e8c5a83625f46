use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::HierarchyStore;

pub fn create_router<S: HierarchyStore + ?Sized + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/group/add", post(handlers::add_group::<S>))
        .route("/group/update", post(handlers::update_group::<S>))
        .route("/group/delete", post(handlers::delete_group::<S>))
        .route("/group/integrity", get(handlers::check_integrity::<S>))
}

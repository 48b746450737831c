pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{snapshot_cache::SnapshotCache, tuya::TuyaClient};

/// Shared handler state. Both halves are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    pub cache: SnapshotCache,
    pub tuya: TuyaClient,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/devices", get(handlers::list_devices))
        .route("/devices/{device_id}", get(handlers::get_device))
        .route("/devices/{device_id}/history", get(handlers::get_device_history))
        .route("/devices/{device_id}/power", post(handlers::set_device_power))
        .route("/rooms", get(handlers::list_rooms))
        .route("/alerts", get(handlers::list_alerts))
        .route("/alerts/count", get(handlers::count_alerts))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}

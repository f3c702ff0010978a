use std::sync::Arc;

use axum::{routing::get, Router};

use attendance_cell::router::attendance_routes;
use encounter_cell::router::encounter_routes;
use scheduling_cell::router::scheduling_routes;
use shared_store::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/encounters", encounter_routes(state.clone()))
        .nest("/checkin", attendance_routes(state))
}

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_store::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn attendance_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/patients", post(handlers::register_patient))
        .route("/patients/{patient_id}/log", get(handlers::attendance_log))
        .route("/{scan_code}", post(handlers::check_in))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

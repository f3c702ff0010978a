use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_store::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn encounter_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::start_encounter))
        .route("/{encounter_id}", get(handlers::get_encounter))
        .route("/{encounter_id}/end", post(handlers::end_encounter))
        .route("/{encounter_id}/note", put(handlers::upsert_note))
        .route("/{encounter_id}/evolutions", post(handlers::add_evolution))
        .route(
            "/patients/{patient_id}",
            get(handlers::list_patient_encounters),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

//! Router construction for the lookup server.

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::server::handlers;
use crate::server::state::AppState;

const DESCRIPTOR: &str = ":target_namespace/:target_type/:target_field/:source_namespace/:source_type/:source_field";

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/chains", get(handlers::list_chains))
        .route(&format!("/lookup/{DESCRIPTOR}"), get(handlers::lookup))
        .route(&format!("/lookup/{DESCRIPTOR}/:parent"), get(handlers::lookup))
        .route(&format!("/lookup-all/{DESCRIPTOR}"), get(handlers::lookup_all))
        .route(
            &format!("/lookup-all/{DESCRIPTOR}/:parent"),
            get(handlers::lookup_all),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

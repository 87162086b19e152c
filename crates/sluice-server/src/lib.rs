#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

use axum::Router;
use axum::routing::post;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod error;
pub mod handler;
pub mod job;
mod state;

pub use error::ApiError;
pub use state::AppState;

/// Tracing target for server operations.
pub const TRACING_TARGET: &str = "sluice_server";

/// Assembles the trigger API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pipelines/run_once", post(handler::run_once))
        .route(
            "/pipelines/run_repeatedly",
            post(handler::run_repeatedly)
                .get(handler::list_jobs)
                .delete(handler::cancel_job),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

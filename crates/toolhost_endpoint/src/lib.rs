//! Client-facing duplex endpoint and read-only HTTP surface.
//!
//! The worker-attachment plane lives on its own ZeroMQ socket in
//! `toolhost_worker`; everything here is the axum router a browser or
//! sandboxed script actually talks to.

mod dispatch;
mod http;
mod state;
mod ws;

pub use dispatch::dispatch;
pub use state::EndpointState;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<EndpointState>) -> Router {
    Router::new()
        .route("/client", get(ws::client_socket))
        .route("/health", get(http::health))
        .route("/namespaces", get(http::namespaces))
        .route("/types", get(http::types))
        .route("/types/:list", get(http::types_filtered))
        .route("/client.ts", get(http::client_module))
        .route("/openapi.json", get(http::openapi))
        .route("/doc", get(http::doc))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Router construction for the ingestion stub.
//!
//! Grounded on `opal-fetcher::routes::create_router`'s
//! nest-under-version-prefix + `TraceLayer` shape.

use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

#[must_use]
pub fn create_router(state: AppState) -> Router {
    let api_v1 = Router::new().route("/payments", post(handlers::create_payment));

    Router::new().nest("/api/v1", api_v1).layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_with_empty_state() {
        let _router = create_router(AppState::new());
    }
}

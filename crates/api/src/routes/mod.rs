pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /matches                                  create match
/// /matches/{id}                             fetch match
/// /matches/{id}/videos                      register uploaded half, enqueue analysis
/// /matches/{id}/analysis                    start/retry analysis, progress surface
/// /matches/{id}/clips                       ranked clips
/// /matches/{id}/events                      final events
/// /matches/{id}/mappings                    identity mappings
/// /matches/{id}/mappings/{track}/confirm    confirm jersey number
/// /matches/{id}/reviews                     pending reviews joined with events
/// /matches/{id}/recalculate                 request stats recompute
/// /matches/{id}/metrics                     stat metrics
/// /reviews/{event_id}/resolve               resolve review
/// /events/{id}/correct                      correct event fields
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/matches", post(handlers::matches::create_match))
        .route("/matches/{id}", get(handlers::matches::get_match))
        .route(
            "/matches/{id}/videos",
            post(handlers::matches::register_video),
        )
        .route(
            "/matches/{id}/analysis",
            post(handlers::analysis::start_analysis).get(handlers::analysis::get_analysis),
        )
        .route("/matches/{id}/clips", get(handlers::clips::list_clips))
        .route("/matches/{id}/events", get(handlers::events::list_events))
        .route(
            "/matches/{id}/mappings",
            get(handlers::mappings::list_mappings),
        )
        .route(
            "/matches/{id}/mappings/{track}/confirm",
            post(handlers::mappings::confirm_mapping),
        )
        .route("/matches/{id}/reviews", get(handlers::reviews::list_reviews))
        .route(
            "/matches/{id}/recalculate",
            post(handlers::metrics::recalculate),
        )
        .route("/matches/{id}/metrics", get(handlers::metrics::list_metrics))
        .route(
            "/reviews/{event_id}/resolve",
            post(handlers::reviews::resolve_review),
        )
        .route("/events/{id}/correct", post(handlers::events::correct_event))
}

pub mod api;
pub mod auth;
pub mod eventstream;
pub mod links;

#[cfg(test)]
pub mod testutil;

use axum::Router;
use axum::middleware;
use tower_http::trace::TraceLayer;

use crate::server::appstate::AppState;

pub fn router(appstate: AppState) -> Router {
    Router::new()
        .merge(api::router())
        .merge(links::router())
        .merge(eventstream::router())
        .layer(middleware::from_fn_with_state(
            appstate.clone(),
            auth::require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(appstate)
}

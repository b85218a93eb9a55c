//! Day Close API Module

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Day router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/day", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/close", post(handler::close))
        .route("/closed", get(handler::list_closed))
        .route("/closed/{date}", get(handler::get_closed))
}

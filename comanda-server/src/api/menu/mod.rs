//! Menu API Module

mod handler;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::core::ServerState;

/// Menu router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/menu", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/", post(handler::upsert))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}", patch(handler::update))
        .route("/{id}", delete(handler::remove))
}

//! Payment API Module
//!
//! Prepay session creation for the client and the gateway's
//! server-to-server notification endpoint.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Payment router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/payment", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/create", get(handler::create))
        .route("/notify", post(handler::notify))
}

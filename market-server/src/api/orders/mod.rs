//! Order API Module
//!
//! Order creation, cancellation and queries. All state transitions go
//! through OrderManager.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/order", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/create", post(handler::create))
        .route("/cancel", post(handler::cancel))
        .route("/detail", get(handler::detail))
        .route("/list", get(handler::list))
}

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/conversations/{integration_id}", get(handlers::get_conversations))
        .route("/sync/messages/{integration_id}", get(handlers::get_messages))
        .route("/sync/contacts/{integration_id}", get(handlers::get_contacts))
        .route("/sync/status/{integration_id}", get(handlers::get_status))
        .route("/outbox", post(handlers::post_outbox))
}

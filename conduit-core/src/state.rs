use axum::extract::FromRef;

use crate::auth::JwtConfig;
use crate::db::DbPool;
use crate::outbox::OutboxDispatcher;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: DbPool,
    pub jwt: JwtConfig,
    pub dispatcher: OutboxDispatcher,
}

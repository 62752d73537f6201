pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{init_db, init_db_default, DbConfig, DbPool};

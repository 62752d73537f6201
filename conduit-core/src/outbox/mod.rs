pub mod dispatch;
pub mod worker;

pub use dispatch::{DispatchError, OutboxDispatcher};
pub use worker::run_worker;

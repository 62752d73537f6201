pub mod actor;
pub mod pairing;
pub mod supervisor;
pub mod types;

pub use supervisor::SessionSupervisor;
pub use types::{SessionKey, SessionState, SessionStatus, SupervisorError};

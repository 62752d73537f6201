pub mod config;
pub mod control_service;
pub mod convert;
pub mod ingest_client;
pub mod recorder;
pub mod session;
pub mod session_control_service;
pub mod upstream;

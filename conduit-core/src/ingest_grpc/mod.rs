pub mod convert;
pub mod service;

pub use service::IntegrationServiceImpl;

use conduit_proto::integration_service_server::IntegrationServiceServer;

use crate::db::DbPool;

pub fn server(pool: DbPool) -> IntegrationServiceServer<IntegrationServiceImpl> {
    IntegrationServiceServer::new(IntegrationServiceImpl::new(pool))
}

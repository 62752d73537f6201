pub mod conduit {
    pub mod v1 {
        tonic::include_proto!("conduit.v1");
    }
}

pub use conduit::v1::*;

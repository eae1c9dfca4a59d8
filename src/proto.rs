//! Generated OpenFGA gRPC client code
//!
//! The definitions are compiled from `proto/openfga.proto`, a vendored
//! subset of the public `openfga.v1` API carrying only the `Check` and
//! `ListStores` operations this webhook calls. Field numbers match
//! upstream, so the client speaks to a stock OpenFGA server.

#![allow(missing_docs)] // Generated code doesn't have docs

/// Generated protobuf and gRPC code for the OpenFGA API
pub mod openfga {
    /// Version 1 of the OpenFGA API
    pub mod v1 {
        tonic::include_proto!("openfga.v1");
    }
}

// Re-export commonly used types at the module level for convenience
pub use openfga::v1::*;

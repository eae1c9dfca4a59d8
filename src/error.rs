//! Error types for the authorization webhook

use thiserror::Error;

/// Main error type for webhook operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// OpenFGA RPC returned an error status
    #[error("openfga error: {0}")]
    Fga(#[from] tonic::Status),

    /// gRPC transport failure
    #[error("grpc transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Cluster engagement error
    #[error("engage error: {0}")]
    Engage(String),

    /// REST mapping error (unknown GVR, scope, or singular form)
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an engagement error with the given message
    pub fn engage(msg: impl Into<String>) -> Self {
        Self::Engage(msg.into())
    }

    /// Create a mapping error with the given message
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_categorize() {
        match Error::engage("owner.cluster not found") {
            Error::Engage(msg) => assert_eq!(msg, "owner.cluster not found"),
            _ => panic!("expected Engage variant"),
        }

        match Error::mapping("no resource 'tests' in test.io/v1") {
            Error::Mapping(msg) => assert!(msg.contains("tests")),
            _ => panic!("expected Mapping variant"),
        }
    }

    #[test]
    fn display_includes_category() {
        let err = Error::engage("storeId not found in Store status");
        assert!(err.to_string().contains("engage error"));

        let err = Error::config("openfga address is not a valid URI");
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn constructors_accept_string_and_str() {
        let cluster = "prod-west";
        let err = Error::engage(format!("cluster {cluster} has no parent"));
        assert!(err.to_string().contains("prod-west"));

        let err = Error::mapping("static message");
        assert!(err.to_string().contains("static message"));
    }
}

//! ReBAC authorization webhook for a multi-tenant, multi-cluster control plane
//!
//! The webhook receives `SubjectAccessReview` requests from the control plane,
//! translates each one into a relationship check against an OpenFGA store, and
//! answers allow / deny / no-opinion. It sits on the hot path of every API
//! request, so a decision is a single cache read plus at most one OpenFGA
//! `Check` RPC.
//!
//! # Architecture
//!
//! Requests flow through an ordered chain of authorizers; the first decisive
//! verdict wins:
//!
//! 1. Non-resource paths (`/api`, `/openapi`, ...) are allowed globally and
//!    deferred when cluster-scoped.
//! 2. Requests targeting the organizations workspace are checked against the
//!    orgs store.
//! 3. Everything else is resolved per cluster: the request's resource tuple is
//!    mapped to an OpenFGA object/relation via REST discovery and checked with
//!    contextual tuples describing the account/namespace hierarchy.
//!
//! Cluster metadata (store id, REST mapping, account lineage) is collected by
//! [`cluster::ClusterCache`] as logical clusters are engaged by the discovery
//! provider.
//!
//! # Modules
//!
//! - [`authorizer`] - verdict model, authorizer chain, and the three authorizers
//! - [`cluster`] - per-cluster metadata cache and REST resource mapping
//! - [`crd`] - kcp and store resource types read by the cache
//! - [`fga`] - OpenFGA gRPC client surface
//! - [`provider`] - cluster-discovery collaborator feeding the cache
//! - [`webhook`] - HTTP adapter decoding and encoding SubjectAccessReviews
//! - [`config`] - process configuration (flags and environment)
//! - [`error`] - error types
//! - [`metrics`] - Prometheus metrics
//! - [`retry`] - backoff helper for engagement

#![deny(missing_docs)]

pub mod authorizer;
pub mod cluster;
pub mod config;
pub mod crd;
pub mod error;
pub mod fga;
pub mod metrics;
pub mod proto;
pub mod provider;
pub mod retry;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// `Extra` key that carries the logical cluster name on a SubjectAccessReview
pub const DEFAULT_CLUSTER_KEY: &str = "authorization.kubernetes.io/cluster-name";

/// Non-resource path prefixes that are safe to allow outside a cluster scope
pub const DEFAULT_ALLOWED_PREFIXES: [&str; 3] = ["/api", "/openapi", "/version"];

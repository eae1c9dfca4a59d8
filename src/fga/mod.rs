//! OpenFGA client surface
//!
//! Authorizers depend on the narrow [`CheckClient`] trait rather than the
//! generated gRPC client, which keeps the decision logic testable and the
//! proto types out of the rest of the crate. [`GrpcCheckClient`] is the
//! production implementation; it clones the underlying channel per call
//! (tonic channels are cheap handles) and records `Check` latency.

use std::time::Instant;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tonic::transport::Channel;
use tracing::debug;

use crate::error::Error;
use crate::metrics::OPENFGA_LATENCY;
use crate::proto;
use crate::proto::open_fga_service_client::OpenFgaServiceClient;

/// A single `(object, relation, user)` relationship
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleKey {
    /// Object in `"<type>:<id>"` form
    pub object: String,
    /// Relation name, unique within the object's type
    pub relation: String,
    /// User in `"<type>:<id>"` form
    pub user: String,
}

impl TupleKey {
    /// Create a tuple key from its three parts
    pub fn new(
        object: impl Into<String>,
        relation: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            user: user.into(),
        }
    }
}

impl From<TupleKey> for proto::TupleKey {
    fn from(key: TupleKey) -> Self {
        Self {
            user: key.user,
            relation: key.relation,
            object: key.object,
        }
    }
}

/// Capability to evaluate a relationship check against an OpenFGA store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CheckClient: Send + Sync {
    /// Evaluate `tuple` against the store, with `contextual_tuples` visible
    /// for the duration of this check only. Returns whether the relation
    /// holds.
    async fn check(
        &self,
        store_id: &str,
        tuple: TupleKey,
        contextual_tuples: Vec<TupleKey>,
    ) -> Result<bool, Error>;
}

/// gRPC-backed [`CheckClient`]
#[derive(Clone)]
pub struct GrpcCheckClient {
    inner: OpenFgaServiceClient<Channel>,
}

impl GrpcCheckClient {
    /// Wrap an existing OpenFGA gRPC client
    pub fn new(inner: OpenFgaServiceClient<Channel>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CheckClient for GrpcCheckClient {
    async fn check(
        &self,
        store_id: &str,
        tuple: TupleKey,
        contextual_tuples: Vec<TupleKey>,
    ) -> Result<bool, Error> {
        let request = proto::CheckRequest {
            store_id: store_id.to_string(),
            tuple_key: Some(proto::CheckRequestTupleKey {
                user: tuple.user,
                relation: tuple.relation,
                object: tuple.object,
            }),
            contextual_tuples: if contextual_tuples.is_empty() {
                None
            } else {
                Some(proto::ContextualTupleKeys {
                    tuple_keys: contextual_tuples.into_iter().map(Into::into).collect(),
                })
            },
            authorization_model_id: String::new(),
        };

        let mut client = self.inner.clone();
        let start = Instant::now();
        let result = client.check(request).await;
        OPENFGA_LATENCY.observe(start.elapsed().as_secs_f64());

        let response = result?.into_inner();
        debug!(allowed = response.allowed, "OpenFGA check completed");
        Ok(response.allowed)
    }
}

/// Resolve a store id by name via `ListStores`, following continuation
/// tokens until the store is found or the listing is exhausted.
pub async fn find_store_id(
    client: &mut OpenFgaServiceClient<Channel>,
    name: &str,
) -> Result<String, Error> {
    let mut continuation_token = String::new();

    loop {
        let response = client
            .list_stores(proto::ListStoresRequest {
                continuation_token: continuation_token.clone(),
                name: String::new(),
            })
            .await?
            .into_inner();

        if let Some(store) = response.stores.iter().find(|s| s.name == name) {
            return Ok(store.id.clone());
        }

        if response.continuation_token.is_empty() {
            return Err(Error::config(format!("store {name} doesn't exist")));
        }
        continuation_token = response.continuation_token;
    }
}

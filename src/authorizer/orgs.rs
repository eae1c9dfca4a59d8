//! Organization-workspace scope authorizer
//!
//! Only requests whose cluster key names the organizations workspace are
//! handled here; everything else passes through. A positive check allows;
//! a negative check aborts the chain, because a deny inside the
//! organization scope must not be re-evaluated per cluster.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::fga::{CheckClient, TupleKey};

use super::{relation_group, Authorizer, Request, Response, ROOT_ORG_OBJECT};

/// Authorizer for the organizations workspace
pub struct OrgsAuthorizer {
    fga: Arc<dyn CheckClient>,
    cluster_key: String,
    orgs_workspace_id: String,
    orgs_store_id: String,
}

impl OrgsAuthorizer {
    /// Create an orgs authorizer checking against the given store
    pub fn new(
        fga: Arc<dyn CheckClient>,
        cluster_key: impl Into<String>,
        orgs_workspace_id: impl Into<String>,
        orgs_store_id: impl Into<String>,
    ) -> Self {
        Self {
            fga,
            cluster_key: cluster_key.into(),
            orgs_workspace_id: orgs_workspace_id.into(),
            orgs_store_id: orgs_store_id.into(),
        }
    }
}

#[async_trait]
impl Authorizer for OrgsAuthorizer {
    async fn handle(&self, req: &Request) -> Response {
        let Some(cluster_name) = req.extra(&self.cluster_key) else {
            debug!(key = %self.cluster_key, "request has no cluster key, skipping");
            return Response::no_opinion();
        };

        let Some(attrs) = req.resource_attributes() else {
            return Response::no_opinion();
        };

        if cluster_name != self.orgs_workspace_id {
            debug!(
                cluster = cluster_name,
                orgs_workspace = %self.orgs_workspace_id,
                "cluster is not the orgs workspace, skipping"
            );
            return Response::no_opinion();
        }

        let verb = attrs.verb.as_deref().unwrap_or("");
        let group = attrs.group.as_deref().unwrap_or("");
        let resource = attrs.resource.as_deref().unwrap_or("");

        let relation = format!("{verb}_{}_{resource}", relation_group(group, resource));
        let tuple = TupleKey::new(ROOT_ORG_OBJECT, relation, format!("user:{}", req.user()));

        debug!(object = %tuple.object, relation = %tuple.relation, "checking orgs scope");

        match self.fga.check(&self.orgs_store_id, tuple, vec![]).await {
            Ok(true) => Response::allowed(),
            Ok(false) => Response::aborted(),
            Err(e) => {
                error!(error = %e, user = req.user(), store = %self.orgs_store_id, "orgs check failed");
                Response::no_opinion()
            }
        }
    }
}

//! Per-cluster contextual authorizer
//!
//! Resolves a request's resource tuple against the engaged cluster's REST
//! surface and asks OpenFGA whether the relation holds, passing contextual
//! tuples that stitch the object into its namespace/account hierarchy for
//! the duration of the check. Cluster-scoped non-resource paths are gated
//! on account access here after the non-resource authorizer deferred them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::cluster::{ClusterCache, ClusterInfo, GroupVersionResource};
use crate::fga::{CheckClient, TupleKey};

use super::{
    relation_group, resolve_on_parent, Authorizer, Request, Response, ACCOUNT_TYPE,
    MAX_RELATION_LENGTH, NAMESPACE_TYPE,
};

/// Authorizer resolving requests against their target cluster
pub struct ContextualAuthorizer {
    fga: Arc<dyn CheckClient>,
    cache: Arc<ClusterCache>,
    cluster_key: String,
}

impl ContextualAuthorizer {
    /// Create a contextual authorizer over the given cache
    pub fn new(
        fga: Arc<dyn CheckClient>,
        cache: Arc<ClusterCache>,
        cluster_key: impl Into<String>,
    ) -> Self {
        Self {
            fga,
            cache,
            cluster_key: cluster_key.into(),
        }
    }

    /// Gate a cluster-scoped non-resource path on account access
    async fn handle_cluster_path(
        &self,
        req: &Request,
        cluster_name: &str,
        verb: &str,
    ) -> Response {
        // the caller named the cluster explicitly: unknown means deny, not defer
        let Some(info) = self.cache.get(cluster_name) else {
            error!(cluster = cluster_name, "cluster not engaged, denying");
            return Response::denied();
        };

        if req.user().is_empty() {
            debug!("request has no user, denying");
            return Response::denied();
        }

        let tuple = TupleKey::new(
            account_object(&info),
            verb,
            format!("user:{}", req.user()),
        );

        match self.fga.check(&info.store_id, tuple, vec![]).await {
            Ok(true) => Response::allowed(),
            Ok(false) => Response::denied(),
            Err(e) => {
                error!(error = %e, cluster = cluster_name, "account access check failed");
                Response::denied()
            }
        }
    }

    /// Resolve and check a resource request
    async fn handle_resource(
        &self,
        req: &Request,
        cluster_name: &str,
        attrs: &k8s_openapi::api::authorization::v1::ResourceAttributes,
    ) -> Response {
        let Some(info) = self.cache.get(cluster_name) else {
            debug!(cluster = cluster_name, "cluster not engaged, skipping");
            return Response::no_opinion();
        };

        let group = attrs.group.as_deref().unwrap_or("");
        let resource = attrs.resource.as_deref().unwrap_or("");
        let verb = attrs.verb.as_deref().unwrap_or("");
        let name = attrs.name.as_deref().unwrap_or("");
        let namespace = attrs.namespace.as_deref().unwrap_or("");

        // "*" means any version; resolve through the preferred one
        let version = match attrs.version.as_deref() {
            Some("*") | None => "",
            Some(v) => v,
        };

        let gvr = GroupVersionResource::gvr(group, version, resource);

        let gvk = match info.mapper.kind_for(&gvr).await {
            Ok(gvk) => gvk,
            Err(e) => {
                error!(error = %e, %gvr, "failed to resolve kind");
                return Response::no_opinion();
            }
        };
        debug!(%gvr, kind = %gvk.kind, "mapped resource to kind");

        let namespaced = match info.mapper.is_namespaced(&gvr).await {
            Ok(namespaced) => namespaced,
            Err(e) => {
                error!(error = %e, %gvr, "failed to resolve scope");
                return Response::no_opinion();
            }
        };

        let singular = match info.mapper.singularize(resource).await {
            Ok(singular) => singular,
            Err(e) => {
                error!(error = %e, resource, "failed to singularize resource");
                return Response::no_opinion();
            }
        };

        let group_token = relation_group(group, resource);

        let mut object_type = format!("{group_token}_{singular}");
        let longest = format!("create_{object_type}s");
        if longest.len() > MAX_RELATION_LENGTH {
            let cut = longest.len() - MAX_RELATION_LENGTH;
            object_type = object_type.get(cut..).unwrap_or("").to_string();
        }

        let account_object = account_object(&info);
        let object_ref = format!("{object_type}:{cluster_name}/{name}");
        let has_parent = resolve_on_parent(verb);

        let mut object = object_ref.clone();
        let mut relation = verb.to_string();
        if has_parent {
            // create/list/watch have no concrete object yet: check the
            // collection permission on the owning account or namespace
            relation = format!("{verb}_{group_token}_{resource}");
            object = account_object.clone();
        }

        let mut contextual_tuples = Vec::new();
        if namespaced {
            let namespace_object = format!("{NAMESPACE_TYPE}:{cluster_name}/{namespace}");

            contextual_tuples.push(TupleKey::new(
                namespace_object.clone(),
                "parent",
                account_object.clone(),
            ));

            if has_parent {
                object = namespace_object;
            } else {
                contextual_tuples.push(TupleKey::new(object_ref, "parent", namespace_object));
            }
        } else {
            contextual_tuples.push(TupleKey::new(object_ref, "parent", account_object.clone()));
        }

        debug!(%object, %relation, tuples = contextual_tuples.len(), "calling fga");

        let tuple = TupleKey::new(object, relation, format!("user:{}", req.user()));

        match self.fga.check(&info.store_id, tuple, contextual_tuples).await {
            Ok(true) => Response::allowed(),
            Ok(false) => Response::denied(),
            Err(e) => {
                error!(error = %e, cluster = cluster_name, "openfga check failed");
                Response::no_opinion()
            }
        }
    }
}

/// OpenFGA object naming the cluster's account
fn account_object(info: &ClusterInfo) -> String {
    format!(
        "{ACCOUNT_TYPE}:{}/{}",
        info.parent_cluster_id, info.account_name
    )
}

#[async_trait]
impl Authorizer for ContextualAuthorizer {
    async fn handle(&self, req: &Request) -> Response {
        let Some(cluster_name) = req.extra(&self.cluster_key) else {
            debug!(key = %self.cluster_key, "request has no cluster key, skipping");
            return Response::no_opinion();
        };
        let cluster_name = cluster_name.to_string();

        if let Some(attrs) = req.resource_attributes() {
            return self.handle_resource(req, &cluster_name, attrs).await;
        }

        let Some(attrs) = req.non_resource_attributes() else {
            debug!("request has neither resource nor non-resource attributes, skipping");
            return Response::no_opinion();
        };

        let path = attrs.path.as_deref().unwrap_or("");
        if !path.starts_with("/clusters/") {
            debug!(path, "non-resource request is not cluster-scoped, skipping");
            return Response::no_opinion();
        }

        let verb = attrs.verb.as_deref().unwrap_or("").to_string();
        self.handle_cluster_path(req, &cluster_name, &verb).await
    }
}

//! Control-plane resource types read by the webhook
//!
//! The webhook never writes these objects; it only reads them while engaging
//! a logical cluster (LogicalCluster, Store) and at startup (Workspace, to
//! resolve the organizations workspace id). Only the fields the webhook
//! consumes are modeled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation on a LogicalCluster carrying its workspace path
pub const PATH_ANNOTATION: &str = "kcp.io/path";

/// Annotation carrying the owning cluster name on objects listed through a
/// virtual workspace
pub const CLUSTER_ANNOTATION: &str = "kcp.io/cluster";

/// Specification of a kcp LogicalCluster
///
/// Every logical cluster exposes exactly one of these, named `cluster`.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "core.kcp.io",
    version = "v1alpha1",
    kind = "LogicalCluster",
    plural = "logicalclusters",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClusterSpec {
    /// Reference to the workspace object that owns this cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<LogicalClusterOwner>,
}

/// Owner reference on a LogicalCluster spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClusterOwner {
    /// Cluster id of the parent workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// Name of the owning workspace object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Specification of an organization's OpenFGA Store object
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "core.platform-mesh.io",
    version = "v1alpha1",
    kind = "Store",
    plural = "stores",
    status = "StoreStatus",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct StoreSpec {
    /// Name of the OpenFGA authorization model revision in use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
}

/// Observed state of a Store
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    /// Identifier of the provisioned OpenFGA store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

/// Specification of a kcp tenancy Workspace
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "tenancy.kcp.io",
    version = "v1alpha1",
    kind = "Workspace",
    plural = "workspaces",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    /// Name of the logical cluster backing this workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_cluster_parses_owner() {
        let lc: LogicalCluster = serde_json::from_value(serde_json::json!({
            "apiVersion": "core.kcp.io/v1alpha1",
            "kind": "LogicalCluster",
            "metadata": {
                "name": "cluster",
                "annotations": { PATH_ANNOTATION: "root:orgs:acme:team-a" }
            },
            "spec": { "owner": { "cluster": "parent-id", "name": "team-a" } }
        }))
        .unwrap();

        let owner = lc.spec.owner.unwrap();
        assert_eq!(owner.cluster.as_deref(), Some("parent-id"));
        assert_eq!(
            lc.metadata
                .annotations
                .unwrap()
                .get(PATH_ANNOTATION)
                .map(String::as_str),
            Some("root:orgs:acme:team-a")
        );
    }

    #[test]
    fn store_status_reads_store_id() {
        let store: Store = serde_json::from_value(serde_json::json!({
            "apiVersion": "core.platform-mesh.io/v1alpha1",
            "kind": "Store",
            "metadata": { "name": "acme" },
            "spec": {},
            "status": { "storeId": "01HSTORE" }
        }))
        .unwrap();

        assert_eq!(
            store.status.and_then(|s| s.store_id).as_deref(),
            Some("01HSTORE")
        );
    }

    #[test]
    fn workspace_spec_reads_cluster() {
        let ws: Workspace = serde_json::from_value(serde_json::json!({
            "apiVersion": "tenancy.kcp.io/v1alpha1",
            "kind": "Workspace",
            "metadata": { "name": "orgs" },
            "spec": { "cluster": "orgs-cluster-id" }
        }))
        .unwrap();

        assert_eq!(ws.spec.cluster.as_deref(), Some("orgs-cluster-id"));
    }
}

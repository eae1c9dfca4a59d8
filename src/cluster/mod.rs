//! Cluster metadata cache
//!
//! Maps logical cluster names to the metadata every per-cluster decision
//! needs: the organization's OpenFGA store id, a REST mapper for the
//! cluster's API surface, and the account lineage (account name, parent
//! cluster id). Entries are written once per engagement, always fully
//! populated; readers take a cheap clone. The write lock is held only for
//! the final map insert, never across I/O.

pub mod mapper;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use kube::Api;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::crd::{LogicalCluster, Store, PATH_ANNOTATION};
use crate::error::Error;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::Result;

pub use mapper::{DiscoveryMapper, GroupVersionResource, ResourceMapper};

/// Workspace-path prefix under which clusters are ReBAC-authoritative
const ORGS_PATH_PREFIX: &str = "root:orgs:";

/// Everything the authorizers need to know about one logical cluster
#[derive(Clone)]
pub struct ClusterInfo {
    /// OpenFGA store of the cluster's organization
    pub store_id: String,
    /// Resolves resources served by this cluster
    pub mapper: Arc<dyn ResourceMapper>,
    /// Last segment of the cluster's workspace path
    pub account_name: String,
    /// Cluster id of the owning workspace
    pub parent_cluster_id: String,
}

impl fmt::Debug for ClusterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterInfo")
            .field("store_id", &self.store_id)
            .field("account_name", &self.account_name)
            .field("parent_cluster_id", &self.parent_cluster_id)
            .finish_non_exhaustive()
    }
}

/// Access to an engaged cluster's own API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterTarget: Send + Sync {
    /// Fetch the cluster's LogicalCluster object (named `cluster`)
    async fn logical_cluster(&self) -> Result<LogicalCluster>;

    /// Build a resource mapper over the cluster's discovery endpoints
    async fn resource_mapper(&self) -> Result<Arc<dyn ResourceMapper>>;
}

/// Access to the organizations workspace's Store objects
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StoreSource: Send + Sync {
    /// Fetch the Store object named after the organization
    async fn store(&self, org_name: &str) -> Result<Store>;
}

/// Process-wide registry of engaged clusters
///
/// Constructed once and handed to each authorizer; engagement is driven by
/// the discovery provider.
pub struct ClusterCache {
    entries: RwLock<HashMap<String, ClusterInfo>>,
    stores: Arc<dyn StoreSource>,
    retry: RetryConfig,
}

impl ClusterCache {
    /// Create an empty cache resolving org stores through `stores`
    pub fn new(stores: Arc<dyn StoreSource>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stores,
            retry: RetryConfig::default(),
        }
    }

    /// Look up a cluster's metadata
    pub fn get(&self, cluster_name: &str) -> Option<ClusterInfo> {
        self.entries
            .read()
            .expect("cluster cache lock poisoned")
            .get(cluster_name)
            .cloned()
    }

    /// Whether the cluster has been engaged
    pub fn contains(&self, cluster_name: &str) -> bool {
        self.entries
            .read()
            .expect("cluster cache lock poisoned")
            .contains_key(cluster_name)
    }

    /// Seed an entry directly, bypassing engagement
    #[cfg(test)]
    pub(crate) fn insert(&self, name: &str, info: ClusterInfo) {
        self.entries
            .write()
            .expect("cluster cache lock poisoned")
            .insert(name.to_string(), info);
    }

    /// Collect the metadata of a newly engaged cluster and cache it.
    ///
    /// Clusters outside the `root:orgs:` hierarchy are skipped silently:
    /// they are not ReBAC-authoritative and requests against them fall
    /// through to the control plane's other authorizers. Any other failure
    /// leaves the cache untouched so the cluster stays unknown.
    pub async fn engage(
        &self,
        cancel: &CancellationToken,
        name: &str,
        target: &dyn ClusterTarget,
    ) -> Result<()> {
        debug!(cluster = name, "engaging cluster");

        let lc = retry_with_backoff(&self.retry, cancel, "fetch_logical_cluster", || {
            target.logical_cluster()
        })
        .await?;

        let path = lc
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(PATH_ANNOTATION))
            .cloned()
            .unwrap_or_default();

        let Some(org_path) = path.strip_prefix(ORGS_PATH_PREFIX) else {
            debug!(cluster = name, path, "cluster path has no orgs prefix, skipping");
            return Ok(());
        };

        let org_name = org_path.split(':').next().unwrap_or(org_path);
        let account_name = path.rsplit(':').next().unwrap_or(&path).to_string();

        let parent_cluster_id = lc
            .spec
            .owner
            .as_ref()
            .and_then(|o| o.cluster.clone())
            .ok_or_else(|| Error::engage("owner.cluster not found in LogicalCluster spec"))?;

        let store = self.stores.store(org_name).await?;
        let store_id = store
            .status
            .and_then(|s| s.store_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::engage("storeId not found in Store status"))?;

        let mapper = target.resource_mapper().await?;

        let info = ClusterInfo {
            store_id,
            mapper,
            account_name,
            parent_cluster_id,
        };

        info!(cluster = name, info = ?info, "cached cluster info");

        self.entries
            .write()
            .expect("cluster cache lock poisoned")
            .insert(name.to_string(), info);

        Ok(())
    }
}

/// Derive a config whose URL path targets `/clusters/<cluster_path>` on the
/// same server, the way per-cluster requests are addressed on a kcp front
/// proxy
pub fn cluster_scoped_config(base: &kube::Config, cluster_path: &str) -> Result<kube::Config> {
    let mut config = base.clone();

    let scheme = config.cluster_url.scheme_str().unwrap_or("https");
    let authority = config
        .cluster_url
        .authority()
        .ok_or_else(|| Error::config("cluster url has no authority"))?
        .as_str();

    config.cluster_url = format!("{scheme}://{authority}/clusters/{cluster_path}")
        .parse()
        .map_err(|e: http::uri::InvalidUri| Error::config(e.to_string()))?;

    Ok(config)
}

/// [`ClusterTarget`] over a cluster-scoped kube client
pub struct KubeClusterTarget {
    client: kube::Client,
}

impl KubeClusterTarget {
    /// Build a target from a config already scoped to the cluster
    pub fn new(config: kube::Config) -> Result<Self> {
        let client = kube::Client::try_from(config)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ClusterTarget for KubeClusterTarget {
    async fn logical_cluster(&self) -> Result<LogicalCluster> {
        let api: Api<LogicalCluster> = Api::all(self.client.clone());
        Ok(api.get("cluster").await?)
    }

    async fn resource_mapper(&self) -> Result<Arc<dyn ResourceMapper>> {
        let mapper: Arc<dyn ResourceMapper> = DiscoveryMapper::new(self.client.clone());
        Ok(mapper)
    }
}

/// [`StoreSource`] reading Store objects from the `root:orgs` workspace
pub struct OrgsStoreSource {
    api: Api<Store>,
}

impl OrgsStoreSource {
    /// Build the source from the workspace-root config
    pub fn new(base: &kube::Config) -> Result<Self> {
        let config = cluster_scoped_config(base, "root:orgs")?;
        let client = kube::Client::try_from(config)?;
        Ok(Self {
            api: Api::all(client),
        })
    }
}

#[async_trait]
impl StoreSource for OrgsStoreSource {
    async fn store(&self, org_name: &str) -> Result<Store> {
        Ok(self.api.get(org_name).await?)
    }
}

//! Cluster-discovery collaborator
//!
//! Resolves the virtual-workspace URL published on an APIExportEndpointSlice
//! and periodically lists the LogicalClusters visible through it. Every
//! cluster that is not yet cached is engaged; engagement failures are logged
//! and retried on the next sweep, so a cluster that was briefly unreachable
//! becomes known once it settles. The provider is the only caller of
//! [`ClusterCache::engage`].

use std::sync::Arc;
use std::time::Duration;

use kube::api::{Api, DynamicObject, ListParams};
use kube::core::{ApiResource, GroupVersionKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterCache, KubeClusterTarget};
use crate::crd::{LogicalCluster, CLUSTER_ANNOTATION};
use crate::error::Error;
use crate::Result;

/// Default delay between discovery sweeps
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Watches an APIExport's endpoint slice and engages the clusters it serves
pub struct ApiExportProvider {
    client: kube::Client,
    base_config: kube::Config,
    endpoint_slice_name: String,
    poll_interval: Duration,
}

impl ApiExportProvider {
    /// Create a provider reading the endpoint slice through `config`
    pub fn new(config: kube::Config, endpoint_slice_name: impl Into<String>) -> Result<Self> {
        let client = kube::Client::try_from(config.clone())?;
        Ok(Self {
            client,
            base_config: config,
            endpoint_slice_name: endpoint_slice_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Run discovery sweeps until cancelled
    pub async fn run(self, cache: Arc<ClusterCache>, cancel: CancellationToken) {
        info!(
            endpoint_slice = %self.endpoint_slice_name,
            "starting cluster discovery"
        );

        loop {
            if let Err(e) = self.sync(&cache, &cancel).await {
                warn!(error = %e, "discovery sweep failed");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("cluster discovery stopped");
    }

    /// One sweep: list the clusters behind the endpoint and engage new ones
    async fn sync(&self, cache: &ClusterCache, cancel: &CancellationToken) -> Result<()> {
        let endpoint = self.endpoint_url().await?;

        let wildcard = scoped_config(&self.base_config, &endpoint, "*")?;
        let client = kube::Client::try_from(wildcard)?;
        let api: Api<LogicalCluster> = Api::all(client);

        let clusters = api.list(&ListParams::default()).await?;
        debug!(count = clusters.items.len(), "listed logical clusters");

        for lc in &clusters.items {
            let Some(name) = cluster_name_of(lc) else {
                continue;
            };

            if cache.contains(name) {
                continue;
            }

            let config = scoped_config(&self.base_config, &endpoint, name)?;
            let target = KubeClusterTarget::new(config)?;

            if let Err(e) = cache.engage(cancel, name, &target).await {
                warn!(error = %e, cluster = name, "failed to engage cluster");
            }
        }

        Ok(())
    }

    /// Resolve the virtual-workspace URL from the endpoint slice status
    async fn endpoint_url(&self) -> Result<String> {
        let gvk = GroupVersionKind::gvk("apis.kcp.io", "v1alpha1", "APIExportEndpointSlice");
        let resource = ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);

        let slice = api.get(&self.endpoint_slice_name).await?;
        endpoint_url_of(&slice).ok_or_else(|| {
            Error::config(format!(
                "endpoint slice {:?} publishes no endpoint URL",
                self.endpoint_slice_name
            ))
        })
    }
}

/// First endpoint URL on an APIExportEndpointSlice status
fn endpoint_url_of(slice: &DynamicObject) -> Option<String> {
    slice
        .data
        .get("status")?
        .get("endpoints")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(String::from)
}

/// Name of the cluster that owns an object listed through a virtual
/// workspace
fn cluster_name_of(lc: &LogicalCluster) -> Option<&str> {
    lc.metadata
        .annotations
        .as_ref()?
        .get(CLUSTER_ANNOTATION)
        .map(String::as_str)
}

/// Derive a config addressing one cluster (or `*`) through the virtual
/// workspace endpoint, keeping the base config's auth and TLS settings
fn scoped_config(base: &kube::Config, endpoint: &str, cluster: &str) -> Result<kube::Config> {
    let mut config = base.clone();
    let endpoint = endpoint.trim_end_matches('/');

    config.cluster_url = format!("{endpoint}/clusters/{cluster}")
        .parse()
        .map_err(|e: http::uri::InvalidUri| Error::config(e.to_string()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::crd::LogicalClusterSpec;

    use super::*;

    #[test]
    fn endpoint_url_reads_first_endpoint() {
        let slice: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apis.kcp.io/v1alpha1",
            "kind": "APIExportEndpointSlice",
            "metadata": { "name": "core.platform-mesh.io" },
            "status": {
                "endpoints": [
                    { "url": "https://kcp.example.com:6443/services/apiexport/root/core.platform-mesh.io" },
                    { "url": "https://other.example.com:6443/services/apiexport/root/core.platform-mesh.io" }
                ]
            }
        }))
        .unwrap();

        assert_eq!(
            endpoint_url_of(&slice).as_deref(),
            Some("https://kcp.example.com:6443/services/apiexport/root/core.platform-mesh.io")
        );
    }

    #[test]
    fn endpoint_url_missing_is_none() {
        let slice: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apis.kcp.io/v1alpha1",
            "kind": "APIExportEndpointSlice",
            "metadata": { "name": "core.platform-mesh.io" },
            "status": { "endpoints": [] }
        }))
        .unwrap();

        assert!(endpoint_url_of(&slice).is_none());
    }

    #[test]
    fn scoped_config_addresses_the_cluster() {
        let base = kube::Config::new("https://front-proxy:6443".parse().unwrap());
        let config = scoped_config(
            &base,
            "https://kcp:6443/services/apiexport/root/core.platform-mesh.io/",
            "cA",
        )
        .unwrap();

        assert_eq!(
            config.cluster_url.to_string(),
            "https://kcp:6443/services/apiexport/root/core.platform-mesh.io/clusters/cA"
        );
    }

    #[test]
    fn cluster_name_comes_from_annotation() {
        let mut lc = LogicalCluster::new("cluster", LogicalClusterSpec::default());
        lc.metadata.annotations = Some(BTreeMap::from([(
            CLUSTER_ANNOTATION.to_string(),
            "cA".to_string(),
        )]));

        assert_eq!(cluster_name_of(&lc), Some("cA"));

        lc.metadata.annotations = None;
        assert_eq!(cluster_name_of(&lc), None);
    }
}

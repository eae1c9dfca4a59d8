//! REST resource mapping via API discovery
//!
//! Resolves `(group, version, resource)` to kind, scope, and singular form
//! against a logical cluster's discovery endpoints. Discovery results are
//! cached per mapper; a lookup miss triggers one refresh before failing, so
//! resources added after engagement are still found.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::core::GroupVersionKind;
#[cfg(test)]
use mockall::automock;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Error;

/// A `(group, version, resource)` triple, the request-side counterpart of a
/// GroupVersionKind
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    /// API group, empty for the core group
    pub group: String,
    /// API version, empty to use the group's preferred version
    pub version: String,
    /// Plural resource name
    pub resource: String,
}

impl GroupVersionResource {
    /// Create a gvr from its parts
    pub fn gvr(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

impl std::fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}, Resource={}", self.group, self.version, self.resource)
    }
}

/// Capability to resolve resource identities for one logical cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceMapper: Send + Sync {
    /// Resolve the kind for a resource; an empty version resolves through
    /// the group's preferred version
    async fn kind_for(&self, gvr: &GroupVersionResource) -> Result<GroupVersionKind, Error>;

    /// Whether the resource is namespace-scoped
    async fn is_namespaced(&self, gvr: &GroupVersionResource) -> Result<bool, Error>;

    /// Singular form of a plural resource name
    async fn singularize(&self, resource: &str) -> Result<String, Error>;
}

#[derive(Default)]
struct DiscoveryState {
    /// `(group, version)` to the discovered resources of that group-version
    resources: HashMap<(String, String), Vec<APIResource>>,
    /// group to preferred version
    preferred: HashMap<String, String>,
}

impl DiscoveryState {
    /// Find a resource and the version it resolved through
    fn find(&self, gvr: &GroupVersionResource) -> Option<(APIResource, String)> {
        let version = if gvr.version.is_empty() {
            self.preferred.get(&gvr.group)?.clone()
        } else {
            gvr.version.clone()
        };

        self.resources
            .get(&(gvr.group.clone(), version.clone()))?
            .iter()
            .find(|r| r.name == gvr.resource)
            .map(|r| (r.clone(), version))
    }

    /// Find a resource by plural name across every discovered group-version
    fn find_by_plural(&self, resource: &str) -> Option<&APIResource> {
        self.resources
            .values()
            .flatten()
            .find(|r| r.name == resource)
    }
}

/// Singular form of a discovered resource: the advertised singular name, or
/// the lowercased kind when discovery leaves it empty (core built-ins do)
fn singular_of(resource: &APIResource) -> String {
    if resource.singular_name.is_empty() {
        resource.kind.to_lowercase()
    } else {
        resource.singular_name.clone()
    }
}

/// Discovery-backed [`ResourceMapper`] for a single logical cluster
///
/// The client must already be scoped to the cluster (its URL path ends in
/// `/clusters/<name>`), so discovery sees exactly the resources that
/// cluster serves.
pub struct DiscoveryMapper {
    client: kube::Client,
    state: RwLock<DiscoveryState>,
}

impl DiscoveryMapper {
    /// Create a mapper over a cluster-scoped client
    pub fn new(client: kube::Client) -> Arc<Self> {
        Arc::new(Self {
            client,
            state: RwLock::new(DiscoveryState::default()),
        })
    }

    async fn refresh(&self) -> Result<(), Error> {
        let mut state = DiscoveryState::default();

        let core = self.client.list_core_api_versions().await?;
        if let Some(version) = core.versions.first() {
            state.preferred.insert(String::new(), version.clone());
        }
        for version in &core.versions {
            let list = self.client.list_core_api_resources(version).await?;
            state
                .resources
                .insert((String::new(), version.clone()), list.resources);
        }

        let groups = self.client.list_api_groups().await?;
        for group in &groups.groups {
            let preferred = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first());
            if let Some(gv) = preferred {
                state.preferred.insert(group.name.clone(), gv.version.clone());
            }

            for gv in &group.versions {
                let list = self
                    .client
                    .list_api_group_resources(&gv.group_version)
                    .await?;
                state
                    .resources
                    .insert((group.name.clone(), gv.version.clone()), list.resources);
            }
        }

        debug!(
            group_versions = state.resources.len(),
            "refreshed discovery cache"
        );

        *self.state.write().await = state;
        Ok(())
    }

    async fn resource_for(
        &self,
        gvr: &GroupVersionResource,
    ) -> Result<(APIResource, String), Error> {
        if let Some(found) = self.state.read().await.find(gvr) {
            return Ok(found);
        }

        self.refresh().await?;

        self.state
            .read()
            .await
            .find(gvr)
            .ok_or_else(|| Error::mapping(format!("no match for {gvr}")))
    }
}

#[async_trait]
impl ResourceMapper for DiscoveryMapper {
    async fn kind_for(&self, gvr: &GroupVersionResource) -> Result<GroupVersionKind, Error> {
        let (resource, version) = self.resource_for(gvr).await?;
        Ok(GroupVersionKind::gvk(&gvr.group, &version, &resource.kind))
    }

    async fn is_namespaced(&self, gvr: &GroupVersionResource) -> Result<bool, Error> {
        let (resource, _) = self.resource_for(gvr).await?;
        Ok(resource.namespaced)
    }

    async fn singularize(&self, resource: &str) -> Result<String, Error> {
        if let Some(found) = self.state.read().await.find_by_plural(resource) {
            return Ok(singular_of(found));
        }

        self.refresh().await?;

        self.state
            .read()
            .await
            .find_by_plural(resource)
            .map(singular_of)
            .ok_or_else(|| Error::mapping(format!("no singular form for resource {resource:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_resource(name: &str, singular: &str, kind: &str, namespaced: bool) -> APIResource {
        APIResource {
            name: name.to_string(),
            singular_name: singular.to_string(),
            kind: kind.to_string(),
            namespaced,
            verbs: vec!["get".to_string(), "list".to_string()],
            ..Default::default()
        }
    }

    fn state() -> DiscoveryState {
        let mut state = DiscoveryState::default();
        state.preferred.insert(String::new(), "v1".to_string());
        state
            .preferred
            .insert("test.platform-mesh.io".to_string(), "v1alpha1".to_string());
        state.resources.insert(
            (String::new(), "v1".to_string()),
            vec![api_resource("pods", "", "Pod", true)],
        );
        state.resources.insert(
            ("test.platform-mesh.io".to_string(), "v1alpha1".to_string()),
            vec![api_resource("tests", "test", "Test", true)],
        );
        state
    }

    #[test]
    fn find_resolves_exact_version() {
        let (resource, version) = state()
            .find(&GroupVersionResource::gvr(
                "test.platform-mesh.io",
                "v1alpha1",
                "tests",
            ))
            .unwrap();

        assert_eq!(resource.kind, "Test");
        assert_eq!(version, "v1alpha1");
    }

    #[test]
    fn find_empty_version_uses_preferred() {
        let (resource, version) = state()
            .find(&GroupVersionResource::gvr("test.platform-mesh.io", "", "tests"))
            .unwrap();

        assert_eq!(resource.kind, "Test");
        assert_eq!(version, "v1alpha1");
    }

    #[test]
    fn find_unknown_resource_is_none() {
        assert!(state()
            .find(&GroupVersionResource::gvr("test.platform-mesh.io", "v1alpha1", "nopes"))
            .is_none());
        assert!(state()
            .find(&GroupVersionResource::gvr("unknown.io", "", "tests"))
            .is_none());
    }

    #[test]
    fn singular_prefers_discovery_name() {
        let s = state();
        assert_eq!(singular_of(s.find_by_plural("tests").unwrap()), "test");
        // core built-ins without singularName fall back to the kind
        assert_eq!(singular_of(s.find_by_plural("pods").unwrap()), "pod");
    }

    #[test]
    fn gvr_display_reads_like_a_gvr() {
        let gvr = GroupVersionResource::gvr("apps", "v1", "deployments");
        assert_eq!(gvr.to_string(), "apps/v1, Resource=deployments");
    }
}

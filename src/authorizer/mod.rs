//! Authorization model: requests, verdicts, and the authorizer capability
//!
//! A [`Request`] wraps the decoded SubjectAccessReview. A [`Response`] wraps
//! the review that will be written back, plus an `abort` flag that never
//! crosses the wire: it tells the chain to stop evaluating without granting
//! or denying. Authorizers are trait objects over a single `handle`
//! operation and are composed with [`union::new`].

pub mod contextual;
pub mod non_resource;
pub mod orgs;
pub mod union;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    NonResourceAttributes, ResourceAttributes, SubjectAccessReview, SubjectAccessReviewStatus,
};

/// OpenFGA type of account objects
pub const ACCOUNT_TYPE: &str = "core_platform-mesh_io_account";

/// OpenFGA type of namespace objects
pub const NAMESPACE_TYPE: &str = "core_namespace";

/// OpenFGA object representing the root organizations workspace
pub const ROOT_ORG_OBJECT: &str = "tenancy_kcp_io_workspace:orgs";

/// Upper bound on synthesized relation names; OpenFGA relation identifiers
/// must stay unique and bounded within a type
pub const MAX_RELATION_LENGTH: usize = 50;

/// Input for an authorizer
#[derive(Clone, Debug, Default)]
pub struct Request {
    /// The decoded SubjectAccessReview
    pub review: SubjectAccessReview,
}

impl Request {
    /// Wrap a decoded SubjectAccessReview
    pub fn new(review: SubjectAccessReview) -> Self {
        Self { review }
    }

    /// The requesting user, or `""` when absent
    pub fn user(&self) -> &str {
        self.review.spec.user.as_deref().unwrap_or("")
    }

    /// First value of the given `Extra` key, if present and non-empty
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.review
            .spec
            .extra
            .as_ref()?
            .get(key)?
            .first()
            .map(String::as_str)
    }

    /// Resource attributes, if the request targets a resource
    pub fn resource_attributes(&self) -> Option<&ResourceAttributes> {
        self.review.spec.resource_attributes.as_ref()
    }

    /// Non-resource attributes, if the request targets a raw path
    pub fn non_resource_attributes(&self) -> Option<&NonResourceAttributes> {
        self.review.spec.non_resource_attributes.as_ref()
    }
}

/// Output of an authorizer
///
/// Wraps the review to be written back. `abort` is process-internal: it
/// terminates the chain but serializes identically to no-opinion.
#[derive(Clone, Debug, Default)]
pub struct Response {
    /// The review carrying the verdict in its status
    pub review: SubjectAccessReview,
    /// Stop the chain without granting or denying
    pub abort: bool,
}

impl Response {
    fn with_status(status: SubjectAccessReviewStatus) -> Self {
        Self {
            review: SubjectAccessReview {
                status: Some(status),
                ..Default::default()
            },
            abort: false,
        }
    }

    /// The request is authorized; terminates the chain
    pub fn allowed() -> Self {
        Self::with_status(SubjectAccessReviewStatus {
            allowed: true,
            denied: Some(false),
            ..Default::default()
        })
    }

    /// The request is explicitly denied; terminates the chain
    pub fn denied() -> Self {
        Self::with_status(SubjectAccessReviewStatus {
            allowed: false,
            denied: Some(true),
            ..Default::default()
        })
    }

    /// This authorizer has no opinion; the chain continues
    pub fn no_opinion() -> Self {
        Self::with_status(SubjectAccessReviewStatus {
            allowed: false,
            reason: Some("NoOpinion".to_string()),
            ..Default::default()
        })
    }

    /// Neither allowed nor denied, but the chain must stop evaluating
    /// further authorizers
    pub fn aborted() -> Self {
        let mut response = Self::no_opinion();
        response.abort = true;
        response
    }

    /// The request could not be evaluated at all (adapter-level failures)
    pub fn errored(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        Self::with_status(SubjectAccessReviewStatus {
            allowed: false,
            reason: Some(message.clone()),
            evaluation_error: Some(message),
            ..Default::default()
        })
    }

    /// Whether this response terminates the chain
    pub fn is_decisive(&self) -> bool {
        let status = self.review.status.as_ref();
        let allowed = status.is_some_and(|s| s.allowed);
        let denied = status.is_some_and(|s| s.denied == Some(true));
        allowed || denied || self.abort
    }
}

/// Capability to answer a SubjectAccessReview
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Yield a response to the review. Implementations must return
    /// [`Response::no_opinion`] for requests outside their scope.
    async fn handle(&self, req: &Request) -> Response;
}

/// Whether a verb is checked against the collection owner rather than a
/// concrete object: the object either does not exist yet (`create`) or the
/// verb targets the whole collection (`list`, `watch`).
pub fn resolve_on_parent(verb: &str) -> bool {
    matches!(verb, "create" | "list" | "watch")
}

/// Cap a group name so the longest relation synthesized from it,
/// `create_<group>_<resource>`, fits in `max_length`.
///
/// Truncation drops the left of the group: relation collisions on a shared
/// prefix are harmless, while the resource-bearing tail must stay unique.
/// An empty group maps to `core`.
pub fn cap_group(group: &str, resource: &str, max_length: usize) -> String {
    let worst = format!("create_{group}_{resource}");

    let named = if group.is_empty() { "core" } else { group };

    if worst.len() > max_length {
        let cut = worst.len() - max_length;
        return named.get(cut..).unwrap_or("").to_string();
    }

    named.to_string()
}

/// Policy-safe group token: capped and with dots replaced by underscores
pub fn relation_group(group: &str, resource: &str) -> String {
    cap_group(group, resource, MAX_RELATION_LENGTH).replace('.', "_")
}

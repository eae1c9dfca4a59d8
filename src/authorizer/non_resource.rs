//! Path-prefix authorizer for non-resource requests
//!
//! Global discovery paths (`/api`, `/openapi`, `/version`) are safe to allow
//! for everyone. The same paths under `/clusters/<id>/` are deferred so a
//! later authorizer can gate them on cluster membership. A non-resource
//! path that matches neither rule aborts the chain: nothing downstream may
//! allow an unknown global path.

use async_trait::async_trait;
use tracing::debug;

use super::{Authorizer, Request, Response};

/// Authorizer for requests carrying non-resource attributes
pub struct NonResourceAuthorizer {
    allowed_path_prefixes: Vec<String>,
}

impl NonResourceAuthorizer {
    /// Create an authorizer allowing the given path prefixes
    pub fn new(allowed_path_prefixes: Vec<String>) -> Self {
        Self {
            allowed_path_prefixes,
        }
    }
}

/// Strip a `/clusters/<id>` prefix, yielding the effective path and whether
/// the request was cluster-scoped
fn effective_path(path: &str) -> (&str, bool) {
    let Some(rest) = path.strip_prefix("/clusters/") else {
        return (path, false);
    };

    match rest.find('/') {
        Some(idx) => (&rest[idx..], true),
        None => ("/", true),
    }
}

#[async_trait]
impl Authorizer for NonResourceAuthorizer {
    async fn handle(&self, req: &Request) -> Response {
        let Some(attrs) = req.non_resource_attributes() else {
            return Response::no_opinion();
        };

        let path = attrs.path.as_deref().unwrap_or("");
        let (effective, cluster_scoped) = effective_path(path);

        for prefix in &self.allowed_path_prefixes {
            if effective.starts_with(prefix.as_str()) {
                if cluster_scoped {
                    debug!(path, prefix, "cluster-scoped path matches allowed prefix, deferring");
                    return Response::no_opinion();
                }
                debug!(path, prefix, "path matches allowed prefix, allowing");
                return Response::allowed();
            }
        }

        if cluster_scoped {
            return Response::no_opinion();
        }

        Response::aborted()
    }
}

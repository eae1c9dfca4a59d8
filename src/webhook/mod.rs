//! HTTP adapter for the authorization webhook
//!
//! Decodes a SubjectAccessReview from `POST /authz`, dispatches it through
//! the authorizer chain, and writes the review back with the verdict in its
//! status and the request's UID preserved. Malformed input is reported
//! inside the review status; the HTTP status is 200 for every well-formed
//! POST, as the Kubernetes webhook protocol requires.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::Router;
use k8s_openapi::api::authorization::v1::SubjectAccessReview;
use tracing::{debug, error};

use crate::authorizer::{Authorizer, Request, Response};

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// The authorizer chain answering reviews
    pub chain: Arc<dyn Authorizer>,
}

impl WebhookState {
    /// Create webhook state around an authorizer chain
    pub fn new(chain: Arc<dyn Authorizer>) -> Self {
        Self { chain }
    }
}

/// Create the webhook router serving `POST /authz`
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/authz", post(authorize_handler))
        .with_state(state)
}

/// Create the health router serving liveness and readiness probes
pub fn health_router() -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
}

/// Handle `POST /authz`
async fn authorize_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    if body.is_empty() {
        error!("empty request body");
        return write_response(Response::errored("request body is empty"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type != "application/json" {
        error!(content_type, "invalid content type");
        return write_response(Response::errored(format!(
            "contentType={content_type}, expected application/json"
        )));
    }

    let review: SubjectAccessReview = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            error!(error = %e, "unable to decode the request");
            return write_response(Response::errored(e));
        }
    };

    let req = Request::new(review);
    let uid = req.review.metadata.uid.clone();

    let mut response = state.chain.handle(&req).await;
    response.review.metadata.uid = uid;

    debug!(
        uid = response.review.metadata.uid.as_deref().unwrap_or(""),
        authorized = response.review.status.as_ref().is_some_and(|s| s.allowed),
        "wrote response"
    );

    write_response(response)
}

/// Encode the review (never the internal abort flag) and write it with
/// HTTP 200
fn write_response(response: Response) -> HttpResponse {
    match serde_json::to_vec(&response.review) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "unable to encode the response");
            StatusCode::OK.into_response()
        }
    }
}

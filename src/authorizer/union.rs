//! Ordered authorizer chain with early termination
//!
//! Authorizers run strictly in construction order. The first response that
//! is allowed, denied, or aborted wins and no later authorizer is invoked;
//! no-opinion continues the chain. A chain where every member has no
//! opinion has no opinion itself.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Authorizer, Request, Response};

struct AuthorizerUnion {
    authorizers: Vec<Arc<dyn Authorizer>>,
}

#[async_trait]
impl Authorizer for AuthorizerUnion {
    async fn handle(&self, req: &Request) -> Response {
        for authorizer in &self.authorizers {
            let response = authorizer.handle(req).await;

            if response.is_decisive() {
                return response;
            }
        }

        Response::no_opinion()
    }
}

/// Compose authorizers into a chain. A single authorizer is returned
/// unwrapped.
pub fn new(mut authorizers: Vec<Arc<dyn Authorizer>>) -> Arc<dyn Authorizer> {
    if authorizers.len() == 1 {
        return authorizers.remove(0);
    }

    Arc::new(AuthorizerUnion { authorizers })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Returns a fixed response and counts invocations
    struct Fixed {
        response: fn() -> Response,
        calls: AtomicU32,
    }

    impl Fixed {
        fn new(response: fn() -> Response) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authorizer for Fixed {
        async fn handle(&self, _req: &Request) -> Response {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.response)()
        }
    }

    #[tokio::test]
    async fn first_decisive_verdict_wins() {
        let first = Fixed::new(Response::no_opinion);
        let second = Fixed::new(Response::denied);
        let third = Fixed::new(Response::allowed);

        let chain = new(vec![first.clone(), second.clone(), third.clone()]);
        let response = chain.handle(&Request::default()).await;

        assert_eq!(response.review.status.unwrap().denied, Some(true));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0, "authorizers after the verdict must not run");
    }

    #[tokio::test]
    async fn abort_terminates_without_deny() {
        let aborting = Fixed::new(Response::aborted);
        let never = Fixed::new(Response::allowed);

        let chain = new(vec![aborting.clone(), never.clone()]);
        let response = chain.handle(&Request::default()).await;

        assert!(response.abort);
        assert_eq!(
            response.review.status.unwrap().reason.as_deref(),
            Some("NoOpinion")
        );
        assert_eq!(never.calls(), 0);
    }

    #[tokio::test]
    async fn all_no_opinion_yields_no_opinion() {
        let first = Fixed::new(Response::no_opinion);
        let second = Fixed::new(Response::no_opinion);

        let chain = new(vec![first, second]);
        let response = chain.handle(&Request::default()).await;

        assert!(!response.is_decisive());
        assert_eq!(
            response.review.status.unwrap().reason.as_deref(),
            Some("NoOpinion")
        );
    }

    #[tokio::test]
    async fn single_authorizer_is_returned_unwrapped() {
        let only = Fixed::new(Response::allowed);
        let chain = new(vec![only.clone()]);

        let direct = only.handle(&Request::default()).await;
        let chained = chain.handle(&Request::default()).await;

        assert_eq!(
            serde_json::to_value(&direct.review).unwrap(),
            serde_json::to_value(&chained.review).unwrap()
        );
        // both calls hit the same authorizer: no union wrapper in between
        assert_eq!(only.calls(), 2);
    }

    #[tokio::test]
    async fn empty_chain_has_no_opinion() {
        let chain = new(vec![]);
        let response = chain.handle(&Request::default()).await;
        assert!(!response.is_decisive());
    }
}

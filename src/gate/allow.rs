//! Attach-or-suppress decision for an assembled trace.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::error::{BoxError, TimingError};
use crate::http::RequestContext;

type Predicate =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync>;

/// Rule deciding whether a request's `Server-Timing` value is exposed.
#[derive(Clone, Default)]
pub enum AllowRule {
    /// Always attach.
    #[default]
    Always,
    /// Fixed decision.
    Fixed(bool),
    /// Decision produced once by a pending value, shared by every request.
    Deferred(Shared<BoxFuture<'static, bool>>),
    /// Per-request decision.
    Predicate(Predicate),
}

impl AllowRule {
    /// Decision resolved from a value that is not available yet.
    pub fn deferred<F>(value: F) -> Self
    where
        F: Future<Output = bool> + Send + 'static,
    {
        AllowRule::Deferred(value.boxed().shared())
    }

    /// Decision computed per request. The predicate may suspend.
    pub fn predicate<F, Fut, E>(predicate: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        AllowRule::Predicate(Arc::new(
            move |context: RequestContext| -> BoxFuture<'static, Result<bool, BoxError>> {
                let decision = predicate(context);
                async move { decision.await.map_err(Into::into) }.boxed()
            },
        ))
    }

    /// Evaluate the rule for one request.
    ///
    /// Predicate failures are returned to the caller; they never default to
    /// attaching or suppressing.
    pub async fn decide(&self, context: &RequestContext) -> Result<bool, TimingError> {
        match self {
            AllowRule::Always => Ok(true),
            AllowRule::Fixed(allowed) => Ok(*allowed),
            AllowRule::Deferred(value) => Ok(value.clone().await),
            AllowRule::Predicate(predicate) => predicate(context.clone())
                .await
                .map_err(TimingError::Allow),
        }
    }
}

impl fmt::Debug for AllowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowRule::Always => f.write_str("Always"),
            AllowRule::Fixed(allowed) => f.debug_tuple("Fixed").field(allowed).finish(),
            AllowRule::Deferred(_) => f.write_str("Deferred"),
            AllowRule::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

impl From<bool> for AllowRule {
    fn from(allowed: bool) -> Self {
        AllowRule::Fixed(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::{Method, Uri};

    fn context(path: &'static str) -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static(path))
    }

    #[tokio::test]
    async fn test_always_and_fixed() {
        let ctx = context("/");
        assert!(AllowRule::Always.decide(&ctx).await.unwrap());
        assert!(AllowRule::from(true).decide(&ctx).await.unwrap());
        assert!(!AllowRule::Fixed(false).decide(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_deferred_resolves_once() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let rule = AllowRule::deferred(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            false
        });

        let ctx = context("/");
        assert!(!rule.decide(&ctx).await.unwrap());
        assert!(!rule.decide(&ctx).await.unwrap());
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_predicate_sees_request() {
        let rule = AllowRule::predicate(|ctx: RequestContext| async move {
            tokio::task::yield_now().await;
            Ok::<_, Infallible>(ctx.path() != "/no-trace")
        });
        assert!(rule.decide(&context("/")).await.unwrap());
        assert!(!rule.decide(&context("/no-trace")).await.unwrap());
    }

    #[tokio::test]
    async fn test_predicate_failure_propagates() {
        let rule = AllowRule::predicate(|_ctx: RequestContext| async move {
            Err::<bool, _>(std::io::Error::other("policy store unreachable"))
        });
        let err = rule.decide(&context("/")).await.unwrap_err();
        assert!(matches!(err, TimingError::Allow(_)));
        assert!(err.to_string().contains("policy store unreachable"));
    }
}

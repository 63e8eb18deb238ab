//! Change token handling

use super::{WafRegionalApi, ERR_CODE_STALE_DATA};
use crate::conns::MutexKv;
use crate::errs::{Error, Result, ResultExt};
use crate::retry::retry_when_is_a;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tfplug::Context;

/// How long a change is retried while its token keeps going stale
pub const STALE_DATA_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Serializes token-guarded changes within a region.
///
/// A token is invalidated as soon as another change is made, so each change
/// holds the region's lock from fetching its token until the call returns.
pub struct WafRetryer<'a> {
    api: Arc<dyn WafRegionalApi>,
    region: &'a str,
    mutex_kv: &'a MutexKv,
}

impl<'a> WafRetryer<'a> {
    pub fn new(api: Arc<dyn WafRegionalApi>, region: &'a str, mutex_kv: &'a MutexKv) -> Self {
        Self {
            api,
            region,
            mutex_kv,
        }
    }

    fn lock_key(&self) -> String {
        format!("WafRetryer-{}", self.region)
    }

    /// Runs `f` with a fresh change token, fetching a new token and trying
    /// again while the call fails with `WAFStaleDataException`.
    pub async fn retry_with_token<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = self.lock_key();
        let _guard = tokio::select! {
            guard = self.mutex_kv.lock(&key) => guard,
            _ = ctx.cancelled() => return Err(Error::Cancelled),
        };

        let api = &self.api;
        let f = &f;
        retry_when_is_a(ctx, STALE_DATA_TIMEOUT, ERR_CODE_STALE_DATA, move || async move {
            let token = api
                .get_change_token(ctx)
                .await
                .context("acquiring WAF Regional change token")?;
            tracing::debug!(region = self.region, "acquired WAF Regional change token");
            f(token).await
        })
        .await
    }
}

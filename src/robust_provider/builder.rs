use std::{pin::Pin, time::Duration};

use alloy::{network::Network, providers::RootProvider};

use crate::robust_provider::{IntoRootProvider, RetryPolicy, RobustProvider, provider::Error};

type PendingProvider<N> = Pin<Box<dyn Future<Output = Result<RootProvider<N>, Error>> + Send>>;

/// Default total time one provider gets per call, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Default maximum number of retry attempts.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }
}

/// Builder for constructing a [`RobustProvider`].
///
/// Providers are only connected in [`build`](Self::build), so fallbacks can be given as URLs
/// without awaiting anything up front.
pub struct RobustProviderBuilder<N: Network, P: IntoRootProvider<N>> {
    primary: P,
    fallbacks: Vec<PendingProvider<N>>,
    policy: RetryPolicy,
}

impl<N: Network, P: IntoRootProvider<N>> RobustProviderBuilder<N, P> {
    /// Starts from `provider` as the primary, with [`RetryPolicy::default`].
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { primary: provider, fallbacks: vec![], policy: RetryPolicy::default() }
    }

    /// Like [`new`](Self::new), but without retries.
    ///
    /// A watch polls on a fixed interval, so its next tick already acts as a retry. Use this
    /// when a failed call should surface on the current tick instead of stretching it with
    /// backoff delays.
    #[must_use]
    pub fn fragile(provider: P) -> Self {
        Self::new(provider).max_retries(0).min_delay(Duration::ZERO)
    }

    /// Appends a fallback provider.
    ///
    /// Fallbacks are tried in the order they were added once the primary has failed. Filter
    /// calls (`eth_newFilter`, `eth_getFilterChanges`, `eth_uninstallFilter`) never use them.
    #[must_use]
    pub fn fallback<F: IntoRootProvider<N> + Send + 'static>(mut self, provider: F) -> Self {
        self.fallbacks.push(Box::pin(provider.into_root_provider()));
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.policy.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Base delay of the exponential backoff.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.policy.min_delay = min_delay;
        self
    }

    /// Replaces timeout and retry settings at once.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connects every provider and returns the [`RobustProvider`].
    ///
    /// # Errors
    ///
    /// Returns the first connection error, primary first.
    pub async fn build(self) -> Result<RobustProvider<N>, Error> {
        debug!(policy = ?self.policy, fallback_count = self.fallbacks.len(), "Building RobustProvider");

        let primary = self.primary.into_root_provider().await?;

        let mut fallbacks = Vec::with_capacity(self.fallbacks.len());
        for pending in self.fallbacks {
            fallbacks.push(pending.await?);
        }

        Ok(RobustProvider { primary, fallbacks, policy: self.policy })
    }
}

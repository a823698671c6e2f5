use std::{fmt::Debug, sync::Arc, time::Duration};

use alloy::{
    network::{Ethereum, Network},
    primitives::U256,
    providers::{Provider, RootProvider},
    rpc::{
        json_rpc::ErrorPayload,
        types::{Filter, Log},
    },
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio::time::{error::Elapsed, timeout};

/// Errors returned by [`RobustProvider`] calls.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The total call timeout elapsed.
    #[error("Operation timed out")]
    Timeout,

    /// The last attempt against the last provider failed with this error.
    #[error("RPC call failed: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),
}

impl Error {
    /// The JSON-RPC error object returned by the node, if the failure was a server reply.
    #[must_use]
    pub fn as_error_resp(&self) -> Option<&ErrorPayload> {
        match self {
            Error::RpcError(err) => err.as_error_resp(),
            Error::Timeout => None,
        }
    }
}

impl From<RpcError<TransportErrorKind>> for Error {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Error::RpcError(Arc::new(err))
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::Timeout
    }
}

/// How long a single provider gets to answer, and how often it is retried.
///
/// `call_timeout` bounds the whole retry sequence against one provider, backoff delays included.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    pub max_retries: usize,
    pub min_delay: Duration,
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default().with_max_times(self.max_retries).with_min_delay(self.min_delay)
    }
}

/// Provider wrapper with built-in retry, timeout and failover.
///
/// Stateless calls walk the primary and then every fallback until one answers. Filter calls
/// stay on the primary: filter ids only mean something to the node that issued them.
#[derive(Clone, Debug)]
pub struct RobustProvider<N: Network = Ethereum> {
    pub(crate) primary: RootProvider<N>,
    pub(crate) fallbacks: Vec<RootProvider<N>>,
    pub(crate) policy: RetryPolicy,
}

impl<N: Network> RobustProvider<N> {
    /// Get a reference to the primary provider
    #[must_use]
    pub fn primary(&self) -> &RootProvider<N> {
        &self.primary
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Number of fallback providers tried after the primary.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.len()
    }

    /// Fetch the latest block number.
    ///
    /// # Errors
    ///
    /// See [failover errors](#failover-errors).
    pub async fn get_block_number(&self) -> Result<u64, Error> {
        debug!("eth_blockNumber called");
        self.with_failover("eth_blockNumber", |provider| async move {
            provider.get_block_number().await
        })
        .await
    }

    /// Fetch logs for the given [`Filter`].
    ///
    /// # Errors
    ///
    /// See [failover errors](#failover-errors).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, Error> {
        debug!(from = ?filter.get_from_block(), to = ?filter.get_to_block(), "eth_getLogs called");
        self.with_failover("eth_getLogs", |provider| async move { provider.get_logs(filter).await })
            .await
    }

    /// Install a log filter on the primary node and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or the primary's last [`Error::RpcError`].
    pub async fn new_filter(&self, filter: &Filter) -> Result<U256, Error> {
        debug!("eth_newFilter called");
        self.on_primary("eth_newFilter", |provider| async move { provider.new_filter(filter).await })
            .await
    }

    /// Fetch the logs accumulated by filter `id` since the previous call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or the primary's last [`Error::RpcError`].
    pub async fn get_filter_changes(&self, id: U256) -> Result<Vec<Log>, Error> {
        debug!(filter_id = %id, "eth_getFilterChanges called");
        self.on_primary("eth_getFilterChanges", |provider| async move {
            provider.get_filter_changes::<Log>(id).await
        })
        .await
    }

    /// Remove filter `id` from the primary node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or the primary's last [`Error::RpcError`].
    pub async fn uninstall_filter(&self, id: U256) -> Result<bool, Error> {
        debug!(filter_id = %id, "eth_uninstallFilter called");
        self.on_primary("eth_uninstallFilter", |provider| async move {
            provider.uninstall_filter(id).await
        })
        .await
    }

    async fn on_primary<T, F, Fut>(&self, method: &'static str, operation: F) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let result = self.attempt(&self.primary, &operation).await;
        if let Err(e) = &result {
            warn!(method, error = %e, "Call to primary provider failed");
        }
        result
    }

    /// Run `operation` against the primary, then against each fallback in order, until one
    /// succeeds.
    ///
    /// # Errors
    /// <a name="failover-errors"></a>
    ///
    /// * Returns [`Error::Timeout`] if the last provider tried ran out of `call_timeout`.
    /// * Returns [`Error::RpcError`] with the last provider's error otherwise. Error responses
    ///   sent by the node itself (JSON-RPC error objects) are not retried.
    pub(crate) async fn with_failover<T, F, Fut>(
        &self,
        method: &'static str,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let total = self.fallbacks.len() + 1;
        let mut last_error = Error::Timeout;

        for (position, provider) in std::iter::once(&self.primary).chain(&self.fallbacks).enumerate() {
            if position > 0 {
                info!(method, provider_num = position, total, "Trying fallback provider");
            }
            match self.attempt(provider, &operation).await {
                Ok(value) => {
                    if position > 0 {
                        info!(method, provider_num = position, "Fallback provider succeeded");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(method, provider_num = position, error = %e, "Provider failed");
                    last_error = e;
                }
            }
        }

        error!(method, error = %last_error, "All providers failed");
        Err(last_error)
    }

    /// One provider, retried with backoff, bounded by the call timeout.
    async fn attempt<T, F, Fut>(&self, provider: &RootProvider<N>, operation: F) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let retried = (|| operation(provider.clone()))
            .retry(self.policy.backoff())
            .when(|err: &RpcError<TransportErrorKind>| !err.is_error_resp())
            .notify(|err: &RpcError<TransportErrorKind>, retry_in: Duration| {
                debug!(error = %err, ?retry_in, "RPC error, retrying");
            })
            .sleep(tokio::time::sleep);

        Ok(timeout(self.policy.call_timeout, retried).await??)
    }
}

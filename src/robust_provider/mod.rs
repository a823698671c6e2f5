//! Robust, retrying wrapper around Alloy providers.
//!
//! This module exposes [`RobustProvider`], a small wrapper around Alloy's
//! [`RootProvider`](alloy::providers::RootProvider) that adds:
//! * bounded per-call timeouts
//! * exponential backoff retries for transport failures
//! * transparent failover between a primary and one or more fallback providers
//!
//! Use [`RobustProviderBuilder`] to construct a provider with sensible defaults
//! and optional fallbacks, or implement the [`IntoRobustProvider`] and [`IntoRootProvider`]
//! traits to support custom providers.
//!
//! # How it works
//!
//! Stateless calls (`eth_blockNumber`, `eth_getLogs`) are wrapped in a total timeout and
//! retried with exponential backoff as configured by a [`RetryPolicy`]. If the primary provider keeps failing,
//! the call is retried against the configured fallback providers in the order they were added.
//!
//! Filter calls (`eth_newFilter`, `eth_getFilterChanges`, `eth_uninstallFilter`) address state
//! held by one node, so they are only ever sent to the primary provider.
//!
//! JSON-RPC error objects returned by a node (for example "method not found" or
//! "filter not found") are definitive answers and are returned without retrying.
//!
//! # Examples
//!
//! ```rust,no_run
//! use alloy::providers::ProviderBuilder;
//! use event_watcher::robust_provider::RobustProviderBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let primary = ProviderBuilder::new().connect("http://localhost:8545").await?;
//! let fallback = ProviderBuilder::new().connect("http://localhost:8546").await?;
//!
//! let robust = RobustProviderBuilder::new(primary)
//!     .fallback(fallback)
//!     .call_timeout(Duration::from_secs(30))
//!     .build()
//!     .await?;
//!
//! let block_number = robust.get_block_number().await?;
//! println!("Current block: {block_number}");
//! # Ok(()) }
//! ```

pub mod builder;
pub mod provider;
pub mod provider_conversion;

pub use builder::*;
pub use provider::{Error, RetryPolicy, RobustProvider};
pub use provider_conversion::{IntoRobustProvider, IntoRootProvider};

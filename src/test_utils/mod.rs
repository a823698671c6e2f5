//! Helpers for testing code built on the watcher: an in-memory [`MockRpc`] node and stream
//! assertions.

pub mod macros;
mod mock;

pub use mock::{MockRpc, RpcMethod, event_log, pending_log};

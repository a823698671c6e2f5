use std::time::Duration;

use alloy::{primitives::address, providers::ProviderBuilder, rpc::types::Log, sol};
use event_watcher::{
    Callbacks, EventWatcherBuilder, WatchCriteria, robust_provider::RobustProviderBuilder,
};
use tokio_stream::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

sol! {
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Watches USDC transfers on the node at `RPC_URL` (default `http://localhost:8545`), once
/// through callbacks and once through a stream, until a minute passes without a delivery.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| "http://localhost:8545".to_owned());
    let provider = ProviderBuilder::new().connect(&rpc_url).await?;

    let robust_provider = RobustProviderBuilder::new(provider)
        .call_timeout(Duration::from_secs(30))
        .max_retries(5)
        .min_delay(Duration::from_millis(500))
        .build()
        .await?;

    let watcher = EventWatcherBuilder::new()
        .poll_interval(Duration::from_secs(2))
        .connect(robust_provider)
        .await?;

    let usdc = WatchCriteria::new()
        .contract_address(address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));

    let typed = watcher.watch_event::<Transfer, _>(
        usdc.clone(),
        Callbacks::new(|transfers: Vec<Log<Transfer>>| {
            for transfer in transfers {
                let event = &transfer.inner.data;
                info!(
                    "Transfer of {} from {} to {} in block {:?}",
                    event.value, event.from, event.to, transfer.block_number
                );
            }
        })
        .with_error_handler(|err| error!("Typed watch error: {err}")),
    );

    let (raw, stream) = watcher.watch_stream(usdc);
    let stream = stream.timeout(Duration::from_secs(60));
    tokio::pin!(stream);

    while let Some(Ok(item)) = stream.next().await {
        match item {
            Ok(logs) => info!("Raw watch received {} logs", logs.len()),
            Err(err) => error!("Raw watch error: {err}"),
        }
    }

    typed.unwatch();
    raw.unwatch();

    Ok(())
}

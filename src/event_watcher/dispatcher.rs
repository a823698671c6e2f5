use alloy::rpc::types::Log;

use crate::{
    event_watcher::{decoder::LogDecoder, handle::Lifecycle, sink::LogSink},
    types::ChannelState,
};

/// Decodes a tick's entries and hands them to the sink.
///
/// In batch mode a tick becomes one delivery (skipped when empty). Otherwise each entry is
/// delivered on its own, in the order the node returned them. Undecodable entries are reported
/// through `on_error` and left out. Nothing reaches the sink once the watch is stopped.
#[derive(Debug)]
pub(crate) struct Dispatcher<D> {
    decoder: D,
    batch: bool,
}

impl<D: LogDecoder> Dispatcher<D> {
    pub(crate) fn new(decoder: D, batch: bool) -> Self {
        Self { decoder, batch }
    }

    pub(crate) async fn dispatch<S: LogSink<D::Output>>(
        &self,
        logs: Vec<Log>,
        sink: &mut S,
        lifecycle: &Lifecycle,
    ) -> ChannelState {
        if logs.is_empty() {
            return ChannelState::Open;
        }

        if self.batch {
            self.dispatch_batch(logs, sink, lifecycle).await
        } else {
            self.dispatch_each(logs, sink, lifecycle).await
        }
    }

    async fn dispatch_batch<S: LogSink<D::Output>>(
        &self,
        logs: Vec<Log>,
        sink: &mut S,
        lifecycle: &Lifecycle,
    ) -> ChannelState {
        let mut batch = Vec::with_capacity(logs.len());
        for log in logs {
            match self.decoder.decode(log) {
                Ok(entry) => batch.push(entry),
                Err(err) => {
                    if lifecycle.is_stopped() {
                        return ChannelState::Open;
                    }
                    if sink.on_error(err).await.is_closed() {
                        return ChannelState::Closed;
                    }
                }
            }
        }

        if batch.is_empty() || lifecycle.is_stopped() {
            return ChannelState::Open;
        }

        debug!(log_count = batch.len(), "Delivering batch");
        sink.on_logs(batch).await
    }

    async fn dispatch_each<S: LogSink<D::Output>>(
        &self,
        logs: Vec<Log>,
        sink: &mut S,
        lifecycle: &Lifecycle,
    ) -> ChannelState {
        debug!(log_count = logs.len(), "Delivering logs one by one");
        for log in logs {
            if lifecycle.is_stopped() {
                return ChannelState::Open;
            }
            let state = match self.decoder.decode(log) {
                Ok(entry) => sink.on_logs(vec![entry]).await,
                Err(err) => sink.on_error(err).await,
            };
            if state.is_closed() {
                return ChannelState::Closed;
            }
        }
        ChannelState::Open
    }
}

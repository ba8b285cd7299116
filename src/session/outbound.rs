use crate::types::ChannelEvent;
use anyhow::{anyhow, Result};
use futures::future::{self, BoxFuture};
use tokio::sync::mpsc;

/// Publishes locally authored events to the channel transport.
pub trait OutboundSink: Send + Sync {
    fn publish(&self, event: ChannelEvent) -> BoxFuture<'_, Result<()>>;
}

impl OutboundSink for mpsc::UnboundedSender<ChannelEvent> {
    fn publish(&self, event: ChannelEvent) -> BoxFuture<'_, Result<()>> {
        let sent = self
            .send(event)
            .map_err(|_| anyhow!("outbound channel closed"));
        Box::pin(future::ready(sent))
    }
}

impl OutboundSink for mpsc::Sender<ChannelEvent> {
    fn publish(&self, event: ChannelEvent) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.send(event)
                .await
                .map_err(|_| anyhow!("outbound channel closed"))
        })
    }
}

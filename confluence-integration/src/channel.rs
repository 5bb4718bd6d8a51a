use std::fmt::Debug;
use tracing::warn;

/// Convenience pair holding both ends of an unbounded mpsc channel, mirroring
/// `jackbot-integration::channel::Channel`.
#[derive(Debug)]
pub struct Channel<T> {
    pub tx: UnboundedTx<T>,
    pub rx: UnboundedRx<T>,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            tx: UnboundedTx { tx },
            rx: UnboundedRx { rx },
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct UnboundedTx<T> {
    pub tx: tokio::sync::mpsc::UnboundedSender<T>,
}

impl<T> UnboundedTx<T>
where
    T: Debug + Clone + Send,
{
    pub fn send(&self, item: T) -> Result<(), tokio::sync::mpsc::error::SendError<T>> {
        self.tx.send(item)
    }
}

#[derive(Debug)]
pub struct UnboundedRx<T> {
    pub rx: tokio::sync::mpsc::UnboundedReceiver<T>,
}

impl<T> UnboundedRx<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> tokio_stream::wrappers::UnboundedReceiverStream<T> {
        tokio_stream::wrappers::UnboundedReceiverStream::new(self.rx)
    }
}

/// A channel sender that disables itself once the receiver is dropped,
/// logging once rather than on every subsequent send. Used for progress and
/// metrics channels that outlive individual consumers, exactly the role
/// `jackbot-integration::channel::ChannelTxDroppable` plays for market data.
#[derive(Debug, Clone)]
pub struct DroppableTx<T> {
    inner: Option<UnboundedTx<T>>,
}

impl<T> DroppableTx<T>
where
    T: Debug + Clone + Send,
{
    pub fn new(tx: UnboundedTx<T>) -> Self {
        Self { inner: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn send(&mut self, item: T) {
        let Some(tx) = &self.inner else { return };
        if tx.send(item).is_err() {
            warn!(
                item_type = std::any::type_name::<T>(),
                "receiver dropped, disabling channel"
            );
            self.inner = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_round_trips_a_value() {
        let mut channel = Channel::<u32>::new();
        channel.tx.send(7).unwrap();
        assert_eq!(channel.rx.recv().await, Some(7));
    }

    #[tokio::test]
    async fn droppable_tx_disables_itself_once_receiver_dropped() {
        let channel = Channel::<u32>::new();
        let mut tx = DroppableTx::new(channel.tx);
        drop(channel.rx);
        tx.send(1);
        assert!(tx.inner.is_none());
    }
}

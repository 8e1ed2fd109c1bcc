//! Subscription plumbing between a store and a single consumer.
//!
//! A store keeps the [`ChangeSender`] for as long as the subscription is live and
//! hands the [`ChangeStream`] to the subscriber. Dropping the stream is how a
//! subscriber unsubscribes: the store notices on its next publish (the send fails)
//! and prunes the sender.

use tokio::sync::mpsc;

/// Create a connected sender/stream pair.
pub fn change_channel<M>() -> (ChangeSender<M>, ChangeStream<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChangeSender { inner: tx }, ChangeStream { receiver: rx })
}

/// Producer side of a subscription.
#[derive(Debug)]
pub struct ChangeSender<M> {
    inner: mpsc::UnboundedSender<M>,
}

impl<M> Clone for ChangeSender<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M> ChangeSender<M> {
    /// Deliver a message. Returns `false` if the subscriber is gone.
    pub fn send(&self, message: M) -> bool {
        self.inner.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer side of a subscription.
///
/// Messages are received in the order the producer sent them.
#[derive(Debug)]
pub struct ChangeStream<M> {
    receiver: mpsc::UnboundedReceiver<M>,
}

impl<M> ChangeStream<M> {
    /// Wait for the next message; `None` once the producer has gone away.
    pub async fn next(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take a message if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<M> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_send_order() {
        let (tx, mut stream) = change_channel();
        assert!(tx.send(1));
        assert!(tx.send(2));

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.try_next(), Some(2));
        assert_eq!(stream.try_next(), None);
    }

    #[tokio::test]
    async fn ends_when_all_senders_drop() {
        let (tx, mut stream) = change_channel::<u8>();
        drop(tx);
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn send_reports_closed_subscriber() {
        let (tx, stream) = change_channel::<u8>();
        drop(stream);
        assert!(tx.is_closed());
        assert!(!tx.send(7));
    }
}

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::backend::QueueBackend;
use crate::error::QueueResult;

/// In-process unbounded-channel [`QueueBackend`] for single-node mode.
/// Multiple workers may call `pop` concurrently; the receiver is shared
/// behind a mutex so each payload is delivered to exactly one of them.
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<String>,
    receiver: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl InProcessQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for InProcessQueue {
    async fn push(&self, payload: String) -> QueueResult<()> {
        // An unbounded channel only fails to send once every receiver has
        // been dropped, which doesn't happen while `self` is alive.
        let _ = self.sender.send(payload);
        Ok(())
    }

    async fn pop(&self, cancel: &mut watch::Receiver<bool>) -> QueueResult<Option<String>> {
        if *cancel.borrow() {
            return Ok(None);
        }
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            biased;
            _ = cancel.changed() => Ok(None),
            payload = receiver.recv() => Ok(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_then_pop_round_trips() {
        let queue = InProcessQueue::new();
        let (_tx, mut rx) = watch::channel(false);

        queue.push("hello".to_string()).await.unwrap();
        let payload = queue.pop(&mut rx).await.unwrap();
        assert_eq!(payload, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn pop_returns_none_on_cancel() {
        let queue = InProcessQueue::new();
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        let payload = queue.pop(&mut rx).await.unwrap();
        assert_eq!(payload, None);
    }
}

pub mod listener;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// A raw message as it arrived at the socket, tagged with its arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxMessage {
    pub sequence: u64,
    pub received_at: Instant,
    pub text: String,
}

/// Creates the queue bridging the listener thread and the tick loop.
pub fn inbox() -> (InboxSender, Inbox) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let sender = InboxSender {
        tx,
        sequence: Arc::new(AtomicU64::new(0)),
    };
    let inbox = Inbox {
        rx,
        delivered: 0,
        closed: false,
    };
    (sender, inbox)
}

#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: UnboundedSender<InboxMessage>,
    sequence: Arc<AtomicU64>,
}

impl InboxSender {
    /// Enqueues `text`. Returns `false` once the consuming `Inbox` is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let message = InboxMessage {
            sequence,
            received_at: Instant::now(),
            text: text.into(),
        };
        self.tx.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct Inbox {
    rx: UnboundedReceiver<InboxMessage>,
    delivered: u64,
    closed: bool,
}

impl Inbox {
    /// Returns the next pending message without blocking.
    pub fn try_dequeue(&mut self) -> Option<InboxMessage> {
        match self.rx.try_recv() {
            Ok(message) => {
                self.delivered = self.delivered.saturating_add(1);
                Some(message)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    log::debug!("[inbox] all senders dropped");
                    self.closed = true;
                }
                None
            }
        }
    }

    /// Yields messages in arrival order until the queue is empty.
    pub fn drain(&mut self) -> impl Iterator<Item = InboxMessage> + '_ {
        std::iter::from_fn(move || self.try_dequeue())
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn dequeue_preserves_push_order() {
        let (sender, mut inbox) = inbox();
        for text in ["a", "b", "c"] {
            assert!(sender.push(text));
        }

        let drained: Vec<_> = inbox.drain().collect();
        let texts: Vec<_> = drained.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(drained.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert!(inbox.try_dequeue().is_none());
        assert_eq!(inbox.delivered(), 3);
    }

    #[test]
    fn empty_inbox_does_not_block() {
        let (_sender, mut inbox) = inbox();
        assert!(inbox.try_dequeue().is_none());
        assert_eq!(inbox.pending(), 0);
    }

    #[test]
    fn messages_survive_sender_drop() {
        let (sender, mut inbox) = inbox();
        sender.push("kept");
        drop(sender);

        let message = inbox.try_dequeue().expect("message still queued");
        assert_eq!(message.text, "kept");
        assert!(inbox.try_dequeue().is_none());
        assert!(inbox.is_closed());
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let (sender, mut inbox) = inbox();
        let handles: Vec<_> = (0..4)
            .map(|producer| {
                let sender = sender.clone();
                thread::spawn(move || {
                    for index in 0..100 {
                        sender.push(format!("{producer}:{index}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("producer thread");
        }

        let mut last_seen = [-1i64; 4];
        let mut total = 0;
        for message in inbox.drain() {
            let (producer, index) = message.text.split_once(':').expect("tagged message");
            let producer: usize = producer.parse().unwrap();
            let index: i64 = index.parse().unwrap();
            assert!(index > last_seen[producer]);
            last_seen[producer] = index;
            total += 1;
        }
        assert_eq!(total, 400);
    }

    #[test]
    fn push_reports_closed_consumer() {
        let (sender, inbox) = inbox();
        drop(inbox);
        assert!(sender.is_closed());
        assert!(!sender.push("lost"));
    }
}

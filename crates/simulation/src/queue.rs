//! Bounded per-node transmit queue.

use leosim_types::Message;
use std::collections::VecDeque;

/// Default transmit buffer depth, in messages.
pub const DEFAULT_TX_QUEUE_CAPACITY: usize = 1000;

/// Bounded FIFO with tail drop.
///
/// `G` identifies the outbound gate a queued message is bound to; the queue
/// itself never reorders. An enqueue against a full queue returns the
/// rejected message so the caller can count the drop.
#[derive(Debug)]
pub struct TxQueue<G> {
    items: VecDeque<(G, Message)>,
    capacity: usize,
}

impl<G> TxQueue<G> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TX_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Append a message, or hand it back if the queue is full (tail drop).
    pub fn push(&mut self, gate: G, message: Message) -> Result<(), Message> {
        if self.items.len() >= self.capacity {
            return Err(message);
        }
        self.items.push_back((gate, message));
        Ok(())
    }

    pub fn peek(&self) -> Option<&(G, Message)> {
        self.items.front()
    }

    pub fn pop(&mut self) -> Option<(G, Message)> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<G> Default for TxQueue<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leosim_types::{Address, DataPacket};
    use std::time::Duration;

    fn packet(id: u64) -> Message {
        Message::Data(DataPacket {
            source: Address(1),
            destination: Address(2),
            packet_id: id,
            hop_count: 0,
            created_at: Duration::ZERO,
            bits: 80_000,
        })
    }

    #[test]
    fn exactly_one_tail_drop_past_capacity() {
        let mut queue: TxQueue<()> = TxQueue::new();
        let mut dropped = 0;
        for id in 0..1001 {
            if queue.push((), packet(id)).is_err() {
                dropped += 1;
            }
        }
        assert_eq!(dropped, 1);
        assert_eq!(queue.len(), 1000);
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut queue: TxQueue<usize> = TxQueue::with_capacity(10);
        for id in 0..5 {
            queue.push(id as usize, packet(id)).unwrap();
        }
        for expected in 0..5u64 {
            let (gate, message) = queue.pop().unwrap();
            assert_eq!(gate, expected as usize);
            match message {
                Message::Data(p) => assert_eq!(p.packet_id, expected),
                other => panic!("unexpected message {other:?}"),
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_length_never_exceeds_capacity() {
        let mut queue: TxQueue<()> = TxQueue::with_capacity(3);
        for id in 0..50 {
            let _ = queue.push((), packet(id));
            assert!(queue.len() <= queue.capacity());
        }
    }
}

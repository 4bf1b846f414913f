//! The bounded packet queue between push and pull regions.

use std::any::Any;
use std::collections::VecDeque;

use crate::config::{keywords, parse};
use crate::context::Context;
use crate::element::{CastHandle, Element, Processing, EMPTY_NOTIFIER, FULL_NOTIFIER, STORAGE};
use crate::error::ErrorHandler;
use crate::handler::{Registrar, BUTTON};
use crate::notifier::{Signal, Storage};
use crate::packet::Packet;

const DEFAULT_CAPACITY: usize = 1000;

/// A bounded FIFO with a push input and a pull output.
///
/// The queue is the coupling point between data-driven and demand-driven
/// regions of a graph, and the place where backpressure becomes visible: a
/// push into a full queue drops the packet and counts it. Its two notifier
/// signals let neighbors sleep instead of spinning — the empty notifier is
/// active while packets are available, the full notifier while there is
/// room.
///
/// Keywords: `CAPACITY`.
pub struct Queue {
    deque: VecDeque<Packet>,
    capacity: usize,
    drops: u64,
    highwater: usize,
    empty_note: Signal,
    full_note: Signal,
    storage: Storage,
}

impl Queue {
    /// An empty queue with the default capacity.
    pub fn new() -> Queue {
        Queue {
            deque: VecDeque::new(),
            capacity: DEFAULT_CAPACITY,
            drops: 0,
            highwater: 0,
            empty_note: Signal::new(false),
            full_note: Signal::new(true),
            storage: Storage::new(DEFAULT_CAPACITY),
        }
    }

    /// The number of queued packets.
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    /// True when no packets are queued.
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    /// Packets dropped at the push side.
    pub fn drops(&self) -> u64 {
        self.drops
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.storage.set_capacity(self.capacity);
        self.full_note.set_active(self.deque.len() < self.capacity);
    }
}

impl Default for Queue {
    fn default() -> Self {
        Queue::new()
    }
}

impl Element for Queue {
    fn class_name(&self) -> &'static str {
        "Queue"
    }

    fn processing(&self) -> Processing {
        Processing::parse(Processing::PUSH_TO_PULL)
    }

    fn configure(&mut self, args: &[String], _errh: &mut ErrorHandler) -> Result<(), String> {
        for (key, value) in keywords(args) {
            match key {
                "CAPACITY" => {
                    let capacity = parse::<usize>(key, value)?;
                    if capacity == 0 {
                        return Err("CAPACITY must be at least 1".to_owned());
                    }
                    self.set_capacity(capacity);
                }
                _ => return Err(format!("unknown keyword {:?}", key)),
            }
        }
        Ok(())
    }

    fn push(&mut self, _ctx: &Context<'_>, _port: usize, packet: Packet) {
        if self.deque.len() >= self.capacity {
            self.drops += 1;
            self.full_note.set_active(false);
            packet.kill();
            return;
        }
        self.deque.push_back(packet);
        let len = self.deque.len();
        self.highwater = self.highwater.max(len);
        self.storage.set_len(len);
        self.empty_note.set_active(true);
        if len >= self.capacity {
            self.full_note.set_active(false);
        }
    }

    fn pull(&mut self, _ctx: &Context<'_>, _port: usize) -> Option<Packet> {
        match self.deque.pop_front() {
            Some(packet) => {
                let len = self.deque.len();
                self.storage.set_len(len);
                if len == 0 {
                    self.empty_note.set_active(false);
                }
                self.full_note.set_active(true);
                Some(packet)
            }
            None => {
                self.empty_note.set_active(false);
                None
            }
        }
    }

    fn cast(&self, name: &str) -> Option<CastHandle> {
        match name {
            EMPTY_NOTIFIER => Some(CastHandle::EmptyNotifier(self.empty_note.clone())),
            FULL_NOTIFIER => Some(CastHandle::FullNotifier(self.full_note.clone())),
            STORAGE => Some(CastHandle::Storage(self.storage.clone())),
            _ => None,
        }
    }

    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        reg.add_read::<Queue, _>("length", |e| e.deque.len().to_string());
        reg.add_read::<Queue, _>("highwater", |e| e.highwater.to_string());
        reg.add_read::<Queue, _>("drops", |e| e.drops.to_string());
        reg.add_read::<Queue, _>("capacity", |e| e.capacity.to_string());
        reg.add_write::<Queue, _>("capacity", |e, value, _errh| {
            let capacity = crate::config::parse::<usize>("CAPACITY", value.trim())?;
            if capacity == 0 {
                return Err("CAPACITY must be at least 1".to_owned());
            }
            e.set_capacity(capacity);
            Ok(())
        });
        reg.add_write_flagged::<Queue, _>("reset_counts", BUTTON, |e, _value, _errh| {
            e.drops = 0;
            e.highwater = e.deque.len();
            Ok(())
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_states_track_occupancy() {
        let mut queue = Queue::new();
        queue.set_capacity(2);
        let empty = match queue.cast(EMPTY_NOTIFIER).unwrap() {
            CastHandle::EmptyNotifier(signal) => signal,
            _ => unreachable!(),
        };
        let full = match queue.cast(FULL_NOTIFIER).unwrap() {
            CastHandle::FullNotifier(signal) => signal,
            _ => unreachable!(),
        };
        assert!(!empty.active());
        assert!(full.active());

        // Direct state manipulation; the hooks only touch the deque and
        // signals, so a context is unnecessary here.
        let router = crate::test_support::empty_router();
        let ctx = crate::context::Context::new(&router, 0);

        queue.push(&ctx, 0, Packet::make(8).unwrap());
        assert!(empty.active());
        queue.push(&ctx, 0, Packet::make(8).unwrap());
        assert!(!full.active());

        queue.push(&ctx, 0, Packet::make(8).unwrap());
        assert_eq!(queue.drops(), 1);

        assert!(queue.pull(&ctx, 0).is_some());
        assert!(full.active());
        assert!(queue.pull(&ctx, 0).is_some());
        assert!(!empty.active());
        assert!(queue.pull(&ctx, 0).is_none());
    }
}

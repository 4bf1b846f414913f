//! A pass-through packet and byte counter.

use std::any::Any;

use crate::context::Context;
use crate::element::Element;
use crate::handler::{Registrar, BUTTON};
use crate::packet::Packet;

/// Counts packets and bytes flowing through, agnostically.
pub struct Counter {
    count: u64,
    byte_count: u64,
}

impl Counter {
    /// A zeroed counter.
    pub fn new() -> Counter {
        Counter { count: 0, byte_count: 0 }
    }

    /// Packets seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Bytes seen so far.
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }
}

impl Default for Counter {
    fn default() -> Self {
        Counter::new()
    }
}

impl Element for Counter {
    fn class_name(&self) -> &'static str {
        "Counter"
    }

    fn simple_action(&mut self, _ctx: &Context<'_>, packet: Packet) -> Option<Packet> {
        self.count += 1;
        self.byte_count += packet.len() as u64;
        Some(packet)
    }

    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        reg.add_read::<Counter, _>("count", |e| e.count.to_string());
        reg.add_read::<Counter, _>("byte_count", |e| e.byte_count.to_string());
        reg.add_write_flagged::<Counter, _>("reset", BUTTON, |e, _value, _errh| {
            e.count = 0;
            e.byte_count = 0;
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

//! Push fan-out.

use std::any::Any;

use crate::context::Context;
use crate::element::{Element, PortCount, Processing};
use crate::packet::Packet;

/// Copies each pushed packet to every output.
///
/// The clone shares the buffer; downstream elements that mutate must
/// uniqueify, which is exactly the packet layer's copy-on-write contract.
/// The original packet goes to the last output unshared when possible.
pub struct Tee;

impl Tee {
    /// The fan-out element.
    pub fn new() -> Tee {
        Tee
    }
}

impl Default for Tee {
    fn default() -> Self {
        Tee::new()
    }
}

impl Element for Tee {
    fn class_name(&self) -> &'static str {
        "Tee"
    }

    fn port_count(&self) -> PortCount {
        PortCount::parse("1/1-")
    }

    fn processing(&self) -> Processing {
        Processing::parse(Processing::PUSH)
    }

    fn push(&mut self, ctx: &Context<'_>, _port: usize, packet: Packet) {
        let outputs = ctx.noutputs();
        for port in 0..outputs.saturating_sub(1) {
            ctx.output(port).push(packet.clone());
        }
        if outputs > 0 {
            ctx.output(outputs - 1).push(packet);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

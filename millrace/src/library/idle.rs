//! A connector that discards everything and produces nothing.

use std::any::Any;

use crate::context::Context;
use crate::element::{Element, PortCount};
use crate::flow::FlowCode;
use crate::packet::Packet;

/// Accepts any number of connections on either side and never transfers a
/// packet; its flow code declares no reachability.
///
/// Useful for capping unused ports in a configuration and as the inert node
/// in connectivity tests.
pub struct Idle;

impl Idle {
    /// The one and only idle element.
    pub fn new() -> Idle {
        Idle
    }
}

impl Default for Idle {
    fn default() -> Self {
        Idle::new()
    }
}

impl Element for Idle {
    fn class_name(&self) -> &'static str {
        "Idle"
    }

    fn port_count(&self) -> PortCount {
        PortCount::parse("-/-")
    }

    fn flow_code(&self) -> FlowCode {
        FlowCode::parse(FlowCode::NONE)
    }

    fn push(&mut self, _ctx: &Context<'_>, _port: usize, packet: Packet) {
        packet.kill();
    }

    fn pull(&mut self, _ctx: &Context<'_>, _port: usize) -> Option<Packet> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

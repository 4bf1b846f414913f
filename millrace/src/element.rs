//! The contract every processing node in a router satisfies.
//!
//! An element declares its shape statically — class name, port counts,
//! per-port [`Processing`] codes, a [`FlowCode`](crate::flow::FlowCode) — and
//! implements the lifecycle and transfer hooks the router invokes. Elements
//! never hold references to their peers; all reachability goes through the
//! [`Context`] handed to each hook.

use std::any::Any;

use smallvec::SmallVec;

use crate::context::Context;
use crate::error::ErrorHandler;
use crate::flow::FlowCode;
use crate::handler::Registrar;
use crate::notifier::{Signal, Storage};
use crate::packet::Packet;
use crate::task::Task;
use crate::timer::Timer;

/// The resolved orientation of a bound port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    /// The upstream endpoint drives packets into the downstream hook.
    Push,
    /// The downstream endpoint demands packets from the upstream hook.
    Pull,
}

/// A per-port processing declaration, before resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortCode {
    /// Declared push.
    Push,
    /// Declared pull.
    Pull,
    /// Either; the router assigns an orientation from the graph shape.
    Agnostic,
}

/// How far an element's bring-up progressed, passed to
/// [`Element::cleanup`] so the element can skip undoing work it never did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CleanupStage {
    /// `configure` was never called, or not yet.
    New,
    /// `configure` was called and failed.
    ConfigureFailed,
    /// `configure` succeeded.
    Configured,
    /// `initialize` was called and failed.
    InitializeFailed,
    /// `initialize` succeeded.
    Initialized,
    /// The router reached the running state.
    Running,
}

impl CleanupStage {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            CleanupStage::New => 0,
            CleanupStage::ConfigureFailed => 1,
            CleanupStage::Configured => 2,
            CleanupStage::InitializeFailed => 3,
            CleanupStage::Initialized => 4,
            CleanupStage::Running => 5,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> CleanupStage {
        match raw {
            1 => CleanupStage::ConfigureFailed,
            2 => CleanupStage::Configured,
            3 => CleanupStage::InitializeFailed,
            4 => CleanupStage::Initialized,
            5 => CleanupStage::Running,
            _ => CleanupStage::New,
        }
    }
}

/// Capability name for a queue's "has packets" signal.
pub const EMPTY_NOTIFIER: &str = "Notifier.EMPTY";
/// Capability name for a queue's "has room" signal.
pub const FULL_NOTIFIER: &str = "Notifier.FULL";
/// Capability name for queue occupancy.
pub const STORAGE: &str = "Storage";

/// A capability returned by [`Element::cast`].
///
/// Casts let the router and neighboring elements discover facilities an
/// element offers beyond the base contract, without knowing its concrete
/// type.
pub enum CastHandle {
    /// A signal active while the element has packets to give.
    EmptyNotifier(Signal),
    /// A signal active while the element has room to accept packets.
    FullNotifier(Signal),
    /// Shared occupancy counters.
    Storage(Storage),
}

/// Declared bounds on an element's input and output port counts.
///
/// Written `"I/O"` where each side is a count (`"1"`), a range (`"1-4"`),
/// an open range (`"1-"`), or unbounded (`"-"`). The actual counts are fixed
/// by the connections the configuration uses, validated against these bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortCount {
    imin: usize,
    imax: usize,
    omin: usize,
    omax: usize,
}

impl PortCount {
    /// Parses a port-count specification.
    ///
    /// Specifications are static class descriptors; malformed ones are
    /// programmer errors and panic.
    pub fn parse(spec: &str) -> PortCount {
        let (inputs, outputs) = match spec.split_once('/') {
            Some(pair) => pair,
            None => (spec, spec),
        };
        let (imin, imax) = parse_count_side(inputs, spec);
        let (omin, omax) = parse_count_side(outputs, spec);
        PortCount { imin, imax, omin, omax }
    }

    /// True when `n` input ports satisfy the declaration.
    pub fn allows_inputs(&self, n: usize) -> bool {
        self.imin <= n && n <= self.imax
    }

    /// True when `n` output ports satisfy the declaration.
    pub fn allows_outputs(&self, n: usize) -> bool {
        self.omin <= n && n <= self.omax
    }

    /// The smallest allowed number of input ports.
    pub fn min_inputs(&self) -> usize {
        self.imin
    }

    /// The smallest allowed number of output ports.
    pub fn min_outputs(&self) -> usize {
        self.omin
    }
}

fn parse_count_side(side: &str, spec: &str) -> (usize, usize) {
    let side = side.trim();
    if side == "-" {
        return (0, usize::MAX);
    }
    match side.split_once('-') {
        None => {
            let n = side
                .parse::<usize>()
                .unwrap_or_else(|_| panic!("bad port count specification {:?}", spec));
            (n, n)
        }
        Some((lo, hi)) => {
            let lo = lo
                .parse::<usize>()
                .unwrap_or_else(|_| panic!("bad port count specification {:?}", spec));
            let hi = if hi.is_empty() {
                usize::MAX
            } else {
                hi.parse::<usize>()
                    .unwrap_or_else(|_| panic!("bad port count specification {:?}", spec))
            };
            (lo, hi)
        }
    }
}

/// Declared per-port processing codes.
///
/// Written `"I/O"` with one character per port — `h` push, `l` pull, `a`
/// agnostic — where the final character extends to any further ports. A
/// specification with no `/` applies to both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Processing {
    inputs: SmallVec<[u8; 4]>,
    outputs: SmallVec<[u8; 4]>,
}

impl Processing {
    /// All ports agnostic.
    pub const AGNOSTIC: &'static str = "a/a";
    /// All ports push.
    pub const PUSH: &'static str = "h/h";
    /// All ports pull.
    pub const PULL: &'static str = "l/l";
    /// Push inputs, pull outputs (a queue).
    pub const PUSH_TO_PULL: &'static str = "h/l";
    /// Pull inputs, push outputs (an unqueue).
    pub const PULL_TO_PUSH: &'static str = "l/h";

    /// Parses a processing specification.
    ///
    /// Specifications are static class descriptors; malformed ones are
    /// programmer errors and panic.
    pub fn parse(spec: &str) -> Processing {
        let (inputs, outputs) = match spec.split_once('/') {
            Some(pair) => pair,
            None => (spec, spec),
        };
        Processing {
            inputs: parse_processing_side(inputs, spec),
            outputs: parse_processing_side(outputs, spec),
        }
    }

    /// The declared code of input `port`.
    pub fn input(&self, port: usize) -> PortCode {
        code_at(&self.inputs, port)
    }

    /// The declared code of output `port`.
    pub fn output(&self, port: usize) -> PortCode {
        code_at(&self.outputs, port)
    }
}

fn parse_processing_side(side: &str, spec: &str) -> SmallVec<[u8; 4]> {
    let side = side.trim();
    let mut codes = SmallVec::new();
    for ch in side.bytes() {
        match ch {
            b'h' | b'l' | b'a' => codes.push(ch),
            _ => panic!("bad processing specification {:?}", spec),
        }
    }
    if codes.is_empty() {
        panic!("bad processing specification {:?}", spec);
    }
    codes
}

fn code_at(codes: &[u8], port: usize) -> PortCode {
    let ch = codes
        .get(port)
        .or_else(|| codes.last())
        .copied()
        .unwrap_or(b'a');
    match ch {
        b'h' => PortCode::Push,
        b'l' => PortCode::Pull,
        _ => PortCode::Agnostic,
    }
}

/// A processing node in the router graph.
///
/// Implementations provide the static descriptors and whichever hooks their
/// processing style needs; the defaults wire `push` and `pull` through
/// [`simple_action`](Element::simple_action) so one-in/one-out agnostic
/// elements implement a single method.
pub trait Element: Send {
    /// The class name this element registers under.
    fn class_name(&self) -> &'static str;

    /// Declared bounds on port counts.
    fn port_count(&self) -> PortCount {
        PortCount::parse("1/1")
    }

    /// Declared per-port processing codes.
    fn processing(&self) -> Processing {
        Processing::parse(Processing::AGNOSTIC)
    }

    /// Declared input→output reachability, used for signal propagation and
    /// connectivity queries.
    fn flow_code(&self) -> FlowCode {
        FlowCode::parse(FlowCode::COMPLETE)
    }

    /// Free-form class flags.
    fn flags(&self) -> &'static str {
        ""
    }

    /// Parses configuration arguments. Called exactly once per instance,
    /// before any port is bound.
    fn configure(&mut self, args: &[String], errh: &mut ErrorHandler) -> Result<(), String> {
        let _ = errh;
        if args.is_empty() {
            Ok(())
        } else {
            Err("takes no configuration arguments".to_owned())
        }
    }

    /// Completes bring-up after all ports are bound and orientations are
    /// resolved, before any packet flows.
    fn initialize(&mut self, ctx: &Context<'_>, errh: &mut ErrorHandler) -> Result<(), String> {
        let _ = (ctx, errh);
        Ok(())
    }

    /// Undoes bring-up; `stage` records how far it progressed.
    fn cleanup(&mut self, stage: CleanupStage) {
        let _ = stage;
    }

    /// Registers this element's read and write handlers.
    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        let _ = reg;
    }

    /// Accepts a packet pushed into input `port`.
    fn push(&mut self, ctx: &Context<'_>, port: usize, packet: Packet) {
        if let Some(p) = self.simple_action(ctx, packet) {
            ctx.output(port).push(p);
        }
    }

    /// Produces a packet on demand from output `port`.
    fn pull(&mut self, ctx: &Context<'_>, port: usize) -> Option<Packet> {
        let packet = ctx.input(port).pull()?;
        self.simple_action(ctx, packet)
    }

    /// Convenience hook for one-in/one-out agnostic elements: transform a
    /// packet, or consume it by returning `None`.
    fn simple_action(&mut self, ctx: &Context<'_>, packet: Packet) -> Option<Packet> {
        let _ = ctx;
        Some(packet)
    }

    /// Runs this element's task once; returns true when useful work was done.
    ///
    /// A task that returns false and arms no wakeup leaves the runqueue.
    fn run_task(&mut self, ctx: &Context<'_>, task: &Task) -> bool {
        let _ = (ctx, task);
        false
    }

    /// Runs an expired timer owned by this element.
    fn run_timer(&mut self, ctx: &Context<'_>, timer: &Timer) {
        let _ = (ctx, timer);
    }

    /// Queries a named capability.
    fn cast(&self, name: &str) -> Option<CastHandle> {
        let _ = name;
        None
    }

    /// Upcast for concrete-type discovery.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for concrete-type discovery.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_count_forms() {
        let pc = PortCount::parse("1/2");
        assert!(pc.allows_inputs(1) && !pc.allows_inputs(2));
        assert!(pc.allows_outputs(2) && !pc.allows_outputs(1));

        let pc = PortCount::parse("1-4/0-");
        assert!(!pc.allows_inputs(0));
        assert!(pc.allows_inputs(4) && !pc.allows_inputs(5));
        assert!(pc.allows_outputs(0) && pc.allows_outputs(100));

        let pc = PortCount::parse("-/1");
        assert!(pc.allows_inputs(0) && pc.allows_inputs(17));
        assert_eq!(pc.min_outputs(), 1);

        // No slash applies to both sides.
        let pc = PortCount::parse("1");
        assert!(pc.allows_inputs(1) && pc.allows_outputs(1));
    }

    #[test]
    #[should_panic(expected = "bad port count")]
    fn port_count_rejects_garbage() {
        PortCount::parse("q/1");
    }

    #[test]
    fn processing_last_code_extends() {
        let p = Processing::parse("hl/a");
        assert_eq!(p.input(0), PortCode::Push);
        assert_eq!(p.input(1), PortCode::Pull);
        assert_eq!(p.input(7), PortCode::Pull);
        assert_eq!(p.output(0), PortCode::Agnostic);
        assert_eq!(p.output(3), PortCode::Agnostic);
    }

    #[test]
    fn processing_shorthand() {
        let p = Processing::parse("h");
        assert_eq!(p.input(0), PortCode::Push);
        assert_eq!(p.output(0), PortCode::Push);

        let p = Processing::parse(Processing::PUSH_TO_PULL);
        assert_eq!(p.input(0), PortCode::Push);
        assert_eq!(p.output(0), PortCode::Pull);
    }

    #[test]
    #[should_panic(expected = "bad processing")]
    fn processing_rejects_garbage() {
        Processing::parse("x/y!");
    }
}

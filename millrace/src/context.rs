//! The per-call surface connecting element code to its router.
//!
//! Elements never hold references to the router or their peers; every hook
//! receives a short-lived [`Context`] instead. The context resolves port
//! handles, creates tasks and timers homed on the element's thread, and
//! answers graph queries like "aggregate the empty notifiers upstream of
//! this input".

use crate::element::PortKind;
use crate::notifier::{downstream_full_signal, upstream_empty_signal, Signal};
use crate::packet::Packet;
use crate::router::Router;
use crate::task::Task;
use crate::timer::Timer;

/// The view of the router handed to each element hook.
pub struct Context<'a> {
    router: &'a Router,
    element: usize,
}

impl<'a> Context<'a> {
    pub(crate) fn new(router: &'a Router, element: usize) -> Context<'a> {
        Context { router, element }
    }

    /// The router this element belongs to.
    pub fn router(&self) -> &Router {
        self.router
    }

    /// This element's index in the router's element vector.
    pub fn element_index(&self) -> usize {
        self.element
    }

    /// This element's instance name.
    pub fn element_name(&self) -> &str {
        self.router.element_name(self.element)
    }

    /// The number of bound input ports.
    pub fn ninputs(&self) -> usize {
        self.router.ninputs(self.element)
    }

    /// The number of bound output ports.
    pub fn noutputs(&self) -> usize {
        self.router.noutputs(self.element)
    }

    /// A handle on input `port`.
    pub fn input(&self, port: usize) -> InputPort<'a> {
        InputPort { router: self.router, element: self.element, port }
    }

    /// A handle on output `port`.
    pub fn output(&self, port: usize) -> OutputPort<'a> {
        OutputPort { router: self.router, element: self.element, port }
    }

    /// Creates a task bound to this element, homed on its thread.
    pub fn new_task(&self) -> Task {
        Task::new(self.router, self.element, self.router.home_thread(self.element))
    }

    /// Creates a timer bound to this element, homed on its thread.
    pub fn new_timer(&self) -> Timer {
        Timer::new(self.router, self.element, self.router.home_thread(self.element))
    }

    /// Aggregates the empty notifiers upstream of input `port`.
    pub fn upstream_empty_signal(&self, port: usize) -> Signal {
        upstream_empty_signal(self.router, self.element, port)
    }

    /// Aggregates the full notifiers downstream of output `port`.
    pub fn downstream_full_signal(&self, port: usize) -> Signal {
        downstream_full_signal(self.router, self.element, port)
    }
}

/// A bound output port.
pub struct OutputPort<'a> {
    router: &'a Router,
    element: usize,
    port: usize,
}

impl OutputPort<'_> {
    /// The port index.
    pub fn port(&self) -> usize {
        self.port
    }

    /// The resolved orientation, once the router is initialized.
    pub fn kind(&self) -> Option<PortKind> {
        self.router.output_kind(self.element, self.port)
    }

    /// True when the port is bound to a peer.
    pub fn connected(&self) -> bool {
        !self.router.output_peers(self.element, self.port).is_empty()
    }

    /// Pushes a packet into the peer's receive hook, synchronously.
    ///
    /// Only meaningful on push outputs; a packet pushed through a pull or
    /// unbound port is dropped.
    pub fn push(&self, packet: Packet) {
        self.router.deliver_push(self.element, self.port, packet);
    }
}

/// A bound input port.
pub struct InputPort<'a> {
    router: &'a Router,
    element: usize,
    port: usize,
}

impl InputPort<'_> {
    /// The port index.
    pub fn port(&self) -> usize {
        self.port
    }

    /// The resolved orientation, once the router is initialized.
    pub fn kind(&self) -> Option<PortKind> {
        self.router.input_kind(self.element, self.port)
    }

    /// True when the port is bound to a peer.
    pub fn connected(&self) -> bool {
        self.router.input_peer(self.element, self.port).is_some()
    }

    /// Demands a packet from the peer's produce hook, synchronously.
    ///
    /// Only meaningful on pull inputs; pulling a push or unbound port
    /// returns `None`.
    pub fn pull(&self) -> Option<Packet> {
        self.router.deliver_pull(self.element, self.port)
    }
}

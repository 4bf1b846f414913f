//! The runtime router: a frozen element graph and its control surface.
//!
//! A [`Router`] owns one configuration brought to a runnable state by
//! [`RouterBuilder`](crate::builder::RouterBuilder). The element vector,
//! connection tables, and resolved port orientations are immutable once the
//! router exists; element state itself sits behind per-element locks taken
//! for the duration of each hook call. Packet transfer is synchronous: a
//! push locks the peer and invokes its receive hook before returning, so a
//! chain of pushes runs to completion as one nested call sequence. A
//! transfer chain must not revisit an element.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::chatter;
use crate::context::Context;
use crate::element::{CastHandle, CleanupStage, Element, PortKind};
use crate::error::ErrorHandler;
use crate::flow::FlowCode;
use crate::handler::{GlobalHandler, Handler};
use crate::master::MasterShared;
use crate::packet::Packet;
use crate::task::Task;
use crate::thread::Pending;
use crate::timer::Timer;

/// Where a router is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterState {
    /// Built but not yet configured.
    New,
    /// All elements configured.
    Configured,
    /// All ports bound, orientations resolved, elements initialized.
    Initialized,
    /// Installed and processing packets.
    Running,
    /// Torn down; delivery and dispatch are refused.
    Dead,
}

impl RouterState {
    fn as_u8(self) -> u8 {
        match self {
            RouterState::New => 0,
            RouterState::Configured => 1,
            RouterState::Initialized => 2,
            RouterState::Running => 3,
            RouterState::Dead => 4,
        }
    }

    fn from_u8(raw: u8) -> RouterState {
        match raw {
            1 => RouterState::Configured,
            2 => RouterState::Initialized,
            3 => RouterState::Running,
            4 => RouterState::Dead,
            _ => RouterState::New,
        }
    }
}

pub(crate) struct ElementSlot {
    pub(crate) name: String,
    pub(crate) class: String,
    pub(crate) args: Vec<String>,
    pub(crate) element: Mutex<Box<dyn Element>>,
    pub(crate) home_thread: usize,
    pub(crate) flow: FlowCode,
    pub(crate) ninputs: usize,
    pub(crate) noutputs: usize,
    pub(crate) input_kinds: Vec<PortKind>,
    pub(crate) output_kinds: Vec<PortKind>,
    /// The single upstream peer of each input (exactly one for pull inputs;
    /// for push inputs, one representative of possibly many).
    pub(crate) input_peer: Vec<Option<(usize, usize)>>,
    /// The downstream peers of each output (exactly one for push outputs).
    pub(crate) output_peers: Vec<Vec<(usize, usize)>>,
    pub(crate) cleanup_stage: AtomicU8,
}

impl ElementSlot {
    pub(crate) fn set_stage(&self, stage: CleanupStage) {
        self.cleanup_stage.store(stage.as_u8(), Ordering::Release);
    }

    pub(crate) fn stage(&self) -> CleanupStage {
        CleanupStage::from_u8(self.cleanup_stage.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

/// One installed configuration: the element graph and its handlers.
pub struct Router {
    /// Self-reference established at construction (`Arc::new_cyclic`);
    /// tasks and timers downgrade through it.
    pub(crate) weak_self: Weak<Router>,
    pub(crate) master: Weak<MasterShared>,
    pub(crate) elements: Vec<ElementSlot>,
    pub(crate) name_index: HashMap<String, usize>,
    pub(crate) handlers: RwLock<Vec<BTreeMap<String, Arc<Handler>>>>,
    pub(crate) global_handlers: BTreeMap<&'static str, GlobalHandler>,
    pub(crate) class_names: Vec<String>,
    pub(crate) quiesce: RwLock<()>,
    pub(crate) state: AtomicU8,
    pub(crate) stopper: AtomicI32,
}

impl Router {
    /// The router's lifecycle state.
    pub fn state(&self) -> RouterState {
        RouterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: RouterState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// The number of elements in the graph.
    pub fn nelements(&self) -> usize {
        self.elements.len()
    }

    /// The instance name of element `index`.
    pub fn element_name(&self, index: usize) -> &str {
        &self.elements[index].name
    }

    /// The class name of element `index`.
    pub fn element_class(&self, index: usize) -> &str {
        &self.elements[index].class
    }

    /// Looks up an element index by instance name.
    pub fn find_element(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// All element instance names, in declaration order.
    pub fn element_names(&self) -> Vec<String> {
        self.elements.iter().map(|slot| slot.name.clone()).collect()
    }

    /// The number of bound input ports on element `index`.
    pub fn ninputs(&self, index: usize) -> usize {
        self.elements[index].ninputs
    }

    /// The number of bound output ports on element `index`.
    pub fn noutputs(&self, index: usize) -> usize {
        self.elements[index].noutputs
    }

    /// The resolved orientation of an input port.
    pub fn input_kind(&self, index: usize, port: usize) -> Option<PortKind> {
        self.elements[index].input_kinds.get(port).copied()
    }

    /// The resolved orientation of an output port.
    pub fn output_kind(&self, index: usize, port: usize) -> Option<PortKind> {
        self.elements[index].output_kinds.get(port).copied()
    }

    /// The upstream peer of an input port.
    pub fn input_peer(&self, index: usize, port: usize) -> Option<(usize, usize)> {
        self.elements[index].input_peer.get(port).copied().flatten()
    }

    /// The downstream peers of an output port.
    pub fn output_peers(&self, index: usize, port: usize) -> Vec<(usize, usize)> {
        self.elements[index]
            .output_peers
            .get(port)
            .cloned()
            .unwrap_or_default()
    }

    /// The flow code element `index` declared.
    pub fn flow_code(&self, index: usize) -> &FlowCode {
        &self.elements[index].flow
    }

    /// The worker thread element `index` is assigned to.
    pub fn home_thread(&self, index: usize) -> usize {
        self.elements[index].home_thread
    }

    /// The router's stop request counter; non-zero asks workers to quit
    /// dispatching this router's work.
    pub fn stopper(&self) -> i32 {
        self.stopper.load(Ordering::Acquire)
    }

    /// Requests shutdown of the whole driver.
    pub fn please_stop(&self) {
        self.stopper.store(1, Ordering::Release);
        if let Some(master) = self.master.upgrade() {
            master.please_stop();
        }
    }

    pub(crate) fn master(&self) -> Option<Arc<MasterShared>> {
        self.master.upgrade()
    }

    /// A weak handle on this router.
    pub(crate) fn weak(&self) -> Weak<Router> {
        self.weak_self.clone()
    }

    /// A strong handle on this router, absent only mid-destruction.
    pub(crate) fn arc(&self) -> Option<Arc<Router>> {
        self.weak_self.upgrade()
    }

    /// Routes a pending operation to a worker thread's queue.
    pub(crate) fn send_pending(&self, thread: usize, op: Pending) {
        if let Some(master) = self.master.upgrade() {
            master.send_pending(thread, op);
        }
    }

    /// Queries a named capability on an element.
    pub(crate) fn cast_element(&self, index: usize, name: &str) -> Option<CastHandle> {
        let guard = self.elements[index]
            .element
            .lock()
            .expect("poisoned element lock");
        guard.cast(name)
    }

    /// Delivers a packet pushed out of `(index, port)` into the peer's
    /// receive hook.
    pub(crate) fn deliver_push(&self, index: usize, port: usize, packet: Packet) {
        if self.state() == RouterState::Dead {
            return;
        }
        let slot = &self.elements[index];
        if slot.output_kinds.get(port).copied() == Some(PortKind::Pull) {
            chatter!(
                "{}: push through pull output {}, packet dropped",
                slot.name,
                port
            );
            return;
        }
        let Some(&(peer, peer_port)) = slot.output_peers.get(port).and_then(|p| p.first()) else {
            return;
        };
        let mut guard = self.elements[peer]
            .element
            .lock()
            .expect("poisoned element lock");
        let ctx = Context::new(self, peer);
        guard.push(&ctx, peer_port, packet);
    }

    /// Demands a packet for input `(index, port)` from the peer's produce
    /// hook.
    pub(crate) fn deliver_pull(&self, index: usize, port: usize) -> Option<Packet> {
        if self.state() == RouterState::Dead {
            return None;
        }
        let slot = &self.elements[index];
        if slot.input_kinds.get(port).copied() == Some(PortKind::Push) {
            chatter!("{}: pull through push input {}", slot.name, port);
            return None;
        }
        let (peer, peer_port) = slot.input_peer.get(port).copied().flatten()?;
        let mut guard = self.elements[peer]
            .element
            .lock()
            .expect("poisoned element lock");
        let ctx = Context::new(self, peer);
        guard.pull(&ctx, peer_port)
    }

    /// Dispatches one run of an element task. Returns the hook's "did work"
    /// result.
    pub(crate) fn run_element_task(&self, task: &Task) -> bool {
        if self.state() != RouterState::Running {
            return false;
        }
        let slot = &self.elements[task.element()];
        let mut guard = slot.element.lock().expect("poisoned element lock");
        let ctx = Context::new(self, task.element());
        guard.run_task(&ctx, task)
    }

    /// Dispatches an expired element timer.
    pub(crate) fn run_element_timer(&self, timer: &Timer) {
        if self.state() != RouterState::Running {
            return;
        }
        let slot = &self.elements[timer.element()];
        let mut guard = slot.element.lock().expect("poisoned element lock");
        let ctx = Context::new(self, timer.element());
        guard.run_timer(&ctx, timer);
    }

    /// The handler names registered on element `index`, sorted.
    pub fn handler_names(&self, index: usize) -> Vec<String> {
        let tables = self.handlers.read().expect("poisoned handler table");
        tables
            .get(index)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The names of the router's global handlers.
    pub fn global_handler_names(&self) -> Vec<&'static str> {
        self.global_handlers.keys().copied().collect()
    }

    fn find_handler(&self, index: usize, name: &str) -> Option<Arc<Handler>> {
        let tables = self.handlers.read().expect("poisoned handler table");
        tables.get(index).and_then(|table| table.get(name)).cloned()
    }

    /// Calls a read handler by `"element.handler"` name, or a global handler
    /// by bare name. Non-raw results get a courtesy newline.
    pub fn call_read(&self, spec: &str) -> Result<String, String> {
        self.read_impl(spec, "", false)
    }

    /// Calls a read handler, optionally keeping the result raw.
    pub fn call_read_with(&self, spec: &str, raw: bool) -> Result<String, String> {
        self.read_impl(spec, "", raw)
    }

    /// Calls a read handler with a parameter string.
    pub fn call_read_param(&self, spec: &str, param: &str) -> Result<String, String> {
        self.read_impl(spec, param, false)
    }

    fn read_impl(&self, spec: &str, param: &str, raw: bool) -> Result<String, String> {
        match spec.rsplit_once('.') {
            None => {
                let handler = self
                    .global_handlers
                    .get(spec)
                    .ok_or_else(|| format!("no global handler {:?}", spec))?;
                let result = handler.call_read(self)?;
                Ok(finish_read(result, raw || handler.raw()))
            }
            Some((element, hname)) => {
                let index = self
                    .find_element(element)
                    .ok_or_else(|| format!("no element {:?}", element))?;
                let handler = self
                    .find_handler(index, hname)
                    .ok_or_else(|| format!("no handler {:?}.{:?}", element, hname))?;
                let result = {
                    let _quiesce;
                    let _quiesce_all;
                    if handler.exclusive() {
                        _quiesce_all = self.quiesce.write().expect("poisoned quiesce lock");
                    } else {
                        _quiesce = self.quiesce.read().expect("poisoned quiesce lock");
                    }
                    let guard = self.elements[index]
                        .element
                        .lock()
                        .expect("poisoned element lock");
                    handler.call_read(&**guard, param)?
                };
                Ok(finish_read(result, raw || handler.raw()))
            }
        }
    }

    /// Calls a write handler by `"element.handler"` name, or a global
    /// handler by bare name.
    pub fn call_write(&self, spec: &str, value: &str) -> Result<(), String> {
        let mut errh = ErrorHandler::new();
        let result = match spec.rsplit_once('.') {
            None => {
                let handler = self
                    .global_handlers
                    .get(spec)
                    .ok_or_else(|| format!("no global handler {:?}", spec))?;
                handler.call_write(self, value, &mut errh)
            }
            Some((element, hname)) => {
                let index = self
                    .find_element(element)
                    .ok_or_else(|| format!("no element {:?}", element))?;
                let handler = self
                    .find_handler(index, hname)
                    .ok_or_else(|| format!("no handler {:?}.{:?}", element, hname))?;
                let _quiesce;
                let _quiesce_all;
                if handler.exclusive() {
                    _quiesce_all = self.quiesce.write().expect("poisoned quiesce lock");
                } else {
                    _quiesce = self.quiesce.read().expect("poisoned quiesce lock");
                }
                let mut guard = self.elements[index]
                    .element
                    .lock()
                    .expect("poisoned element lock");
                handler.call_write(&mut **guard, value, &mut errh)
            }
        };
        result.map_err(|message| match errh.report() {
            Some(report) => format!("{}\n{}", message, report),
            None => message,
        })
    }

    /// Runs element cleanup in reverse declaration order and marks the
    /// router dead. Idempotent.
    pub(crate) fn teardown(&self) {
        if self.state() == RouterState::Dead {
            return;
        }
        self.set_state(RouterState::Dead);
        for slot in self.elements.iter().rev() {
            let stage = slot.stage();
            let mut guard = slot.element.lock().expect("poisoned element lock");
            guard.cleanup(stage);
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The courtesy newline: non-raw read results are newline-terminated.
fn finish_read(mut result: String, raw: bool) -> String {
    if !raw && !result.is_empty() && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

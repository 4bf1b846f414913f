//! Edge signals coupling element state to scheduler wakeups.
//!
//! A [`Signal`] is one bit of state — active or inactive — with a list of
//! listener tasks. Schedulers use signals to sleep instead of spinning when
//! upstream is provably empty or downstream is provably full: a task that
//! finds nothing to do unschedules itself, and the inactive→active
//! transition reschedules every listener on its home thread. Signals compose
//! by OR, and the graph walks at the bottom of this module aggregate the
//! empty/full signals reachable from a port through element flow codes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::element::{CastHandle, EMPTY_NOTIFIER, FULL_NOTIFIER};
use crate::router::Router;
use crate::task::Task;

struct Leaf {
    active: AtomicBool,
    listeners: Mutex<Vec<Task>>,
}

#[derive(Clone)]
enum Inner {
    Leaf(Arc<Leaf>),
    Or(Arc<[Signal]>),
    Always,
}

/// A one-bit active/inactive signal with listener tasks.
///
/// Readers use acquire loads and may briefly observe a stale inactive; the
/// writer's next activation wakes them regardless.
#[derive(Clone)]
pub struct Signal {
    inner: Inner,
}

impl Signal {
    /// Creates a leaf signal in the given state.
    pub fn new(active: bool) -> Signal {
        Signal {
            inner: Inner::Leaf(Arc::new(Leaf {
                active: AtomicBool::new(active),
                listeners: Mutex::new(Vec::new()),
            })),
        }
    }

    /// A signal that is always active and never wakes anyone.
    ///
    /// Used where a definite answer is unavailable, so pollers keep polling.
    pub fn always_active() -> Signal {
        Signal { inner: Inner::Always }
    }

    /// The OR of several signals: active when any is.
    ///
    /// Listeners added to the derived signal are added to every branch.
    pub fn or_of(signals: Vec<Signal>) -> Signal {
        match signals.len() {
            0 => Signal::always_active(),
            1 => signals.into_iter().next().unwrap_or_else(Signal::always_active),
            _ => Signal { inner: Inner::Or(signals.into()) },
        }
    }

    /// Reads the current state.
    pub fn active(&self) -> bool {
        match &self.inner {
            Inner::Leaf(leaf) => leaf.active.load(Ordering::Acquire),
            Inner::Or(signals) => signals.iter().any(Signal::active),
            Inner::Always => true,
        }
    }

    /// Writes the state of a leaf signal.
    ///
    /// An inactive→active transition schedules every listener on its home
    /// thread before this call returns. Derived and always-active signals
    /// ignore writes.
    pub fn set_active(&self, active: bool) {
        if let Inner::Leaf(leaf) = &self.inner {
            let was = leaf.active.swap(active, Ordering::Release);
            if active && !was {
                let listeners = leaf.listeners.lock().expect("poisoned listener list");
                for task in listeners.iter() {
                    task.reschedule();
                }
            }
        }
    }

    /// Registers a task to be scheduled on inactive→active transitions.
    pub fn add_listener(&self, task: &Task) {
        match &self.inner {
            Inner::Leaf(leaf) => {
                let mut listeners = leaf.listeners.lock().expect("poisoned listener list");
                if !listeners.iter().any(|t| t.same(task)) {
                    listeners.push(task.clone());
                }
            }
            Inner::Or(signals) => {
                for signal in signals.iter() {
                    signal.add_listener(task);
                }
            }
            Inner::Always => {}
        }
    }

    /// Removes a previously registered listener.
    pub fn remove_listener(&self, task: &Task) {
        match &self.inner {
            Inner::Leaf(leaf) => {
                let mut listeners = leaf.listeners.lock().expect("poisoned listener list");
                listeners.retain(|t| !t.same(task));
            }
            Inner::Or(signals) => {
                for signal in signals.iter() {
                    signal.remove_listener(task);
                }
            }
            Inner::Always => {}
        }
    }
}

/// Shared occupancy counters exposed by queue-like elements through
/// [`CastHandle::Storage`].
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    len: AtomicUsize,
    capacity: AtomicUsize,
}

impl Storage {
    /// Creates storage counters for a queue of `capacity` packets.
    pub fn new(capacity: usize) -> Storage {
        Storage {
            inner: Arc::new(StorageInner {
                len: AtomicUsize::new(0),
                capacity: AtomicUsize::new(capacity),
            }),
        }
    }

    /// The current occupancy.
    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Acquire)
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    /// Updates the occupancy; called by the owning element.
    pub fn set_len(&self, len: usize) {
        self.inner.len.store(len, Ordering::Release);
    }

    /// Updates the capacity; called by the owning element.
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.capacity.store(capacity, Ordering::Release);
    }
}

/// Aggregates the empty notifiers upstream of input `port` of `element`.
///
/// The walk crosses elements that offer no notifier by following their flow
/// codes to the inputs that can feed the traversed output. When a branch
/// dead-ends without finding a notifier — a source element, say — the result
/// degrades to [`Signal::always_active`], since emptiness cannot be proven.
pub fn upstream_empty_signal(router: &Router, element: usize, port: usize) -> Signal {
    collect_signals(router, element, port, Direction::Upstream)
}

/// Aggregates the full notifiers downstream of output `port` of `element`.
///
/// The mirror image of [`upstream_empty_signal`]: used by push producers to
/// sleep while every downstream queue is full.
pub fn downstream_full_signal(router: &Router, element: usize, port: usize) -> Signal {
    collect_signals(router, element, port, Direction::Downstream)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

fn collect_signals(
    router: &Router,
    element: usize,
    port: usize,
    direction: Direction,
) -> Signal {
    let mut found = Vec::new();
    let mut visited = vec![false; router.nelements()];
    let mut complete = true;
    let mut frontier = vec![(element, port)];

    while let Some((elt, port)) = frontier.pop() {
        let peers: Vec<(usize, usize)> = match direction {
            Direction::Upstream => router.input_peer(elt, port).into_iter().collect(),
            Direction::Downstream => router.output_peers(elt, port),
        };
        if peers.is_empty() {
            complete = false;
            continue;
        }
        for (peer, peer_port) in peers {
            if visited[peer] {
                continue;
            }
            visited[peer] = true;
            let cast = match direction {
                Direction::Upstream => router.cast_element(peer, EMPTY_NOTIFIER),
                Direction::Downstream => router.cast_element(peer, FULL_NOTIFIER),
            };
            match cast {
                Some(CastHandle::EmptyNotifier(signal)) | Some(CastHandle::FullNotifier(signal)) => {
                    found.push(signal);
                }
                _ => {
                    // Cross the element along its flow code.
                    let flow = router.flow_code(peer);
                    let mut crossed = false;
                    match direction {
                        Direction::Upstream => {
                            for input in 0..router.ninputs(peer) {
                                if flow.reachable(input, peer_port) {
                                    frontier.push((peer, input));
                                    crossed = true;
                                }
                            }
                        }
                        Direction::Downstream => {
                            for output in 0..router.noutputs(peer) {
                                if flow.reachable(peer_port, output) {
                                    frontier.push((peer, output));
                                    crossed = true;
                                }
                            }
                        }
                    }
                    if !crossed {
                        complete = false;
                    }
                }
            }
        }
    }

    if !complete || found.is_empty() {
        Signal::always_active()
    } else {
        Signal::or_of(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_state_round_trip() {
        let s = Signal::new(false);
        assert!(!s.active());
        s.set_active(true);
        assert!(s.active());
        s.set_active(false);
        assert!(!s.active());
    }

    #[test]
    fn or_is_active_when_any_branch_is() {
        let a = Signal::new(false);
        let b = Signal::new(false);
        let or = Signal::or_of(vec![a.clone(), b.clone()]);
        assert!(!or.active());
        b.set_active(true);
        assert!(or.active());
        b.set_active(false);
        a.set_active(true);
        assert!(or.active());
    }

    #[test]
    fn empty_or_degrades_to_always_active() {
        let or = Signal::or_of(Vec::new());
        assert!(or.active());
        or.set_active(false);
        assert!(or.active());
    }

    #[test]
    fn storage_counters() {
        let storage = Storage::new(8);
        assert_eq!(storage.capacity(), 8);
        assert!(storage.is_empty());
        storage.set_len(3);
        assert_eq!(storage.len(), 3);
        let view = storage.clone();
        assert_eq!(view.len(), 3);
    }
}

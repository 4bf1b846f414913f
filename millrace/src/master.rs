//! The process-wide owner of worker threads and installed routers.
//!
//! A [`Master`] spawns its worker threads once, then installs, hot-swaps,
//! and kills routers against that fixed pool. Pausing is cooperative: the
//! pause counter goes up, every worker finishes its current task or timer
//! body and parks at a safe point, and only then does the master mutate the
//! router set. There are no globals; whoever owns the `Master` owns the
//! driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};

use crate::builder::RouterBuilder;
use crate::logging::LogHook;
use crate::router::Router;
use crate::thread::{Pending, RouterThread, ThreadHandle, S_IDLE};

/// State shared between the master, its workers, and installed routers.
pub(crate) struct MasterShared {
    threads: Vec<ThreadHandle>,
    paused: AtomicU32,
    stopper: AtomicI32,
    signals_pending: AtomicBool,
    routers: Mutex<Vec<Arc<Router>>>,
    staged: Mutex<HashMap<String, RouterBuilder>>,
    signal_actions: Mutex<Vec<Box<dyn Fn(&MasterShared) + Send + Sync>>>,
}

impl MasterShared {
    pub(crate) fn nthreads(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn send_pending(&self, thread: usize, op: Pending) {
        if let Some(handle) = self.threads.get(thread) {
            let _ = handle.sender.send(op);
        }
    }

    fn wake_all(&self) {
        for handle in &self.threads {
            let _ = handle.sender.send(Pending::Wake);
        }
    }

    pub(crate) fn stopping(&self) -> bool {
        self.stopper.load(Ordering::Acquire) != 0
    }

    pub(crate) fn please_stop(&self) {
        self.stopper.store(1, Ordering::Release);
        self.wake_all();
    }

    pub(crate) fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire) > 0
    }

    /// Raises the pause counter and waits until every worker reaches a safe
    /// point. Must not be called from a worker thread.
    pub(crate) fn pause(&self) {
        self.paused.fetch_add(1, Ordering::AcqRel);
        self.wake_all();
        while !self.threads.iter().all(ThreadHandle::quiescent) {
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    pub(crate) fn unpause(&self) {
        self.paused.fetch_sub(1, Ordering::AcqRel);
        self.wake_all();
    }

    pub(crate) fn set_signals_pending(&self) {
        self.signals_pending.store(true, Ordering::Release);
        self.wake_all();
    }

    pub(crate) fn take_signals_pending(&self) -> bool {
        self.signals_pending.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn run_signal_actions(&self) {
        let actions = self.signal_actions.lock().expect("poisoned signal actions");
        for action in actions.iter() {
            action(self);
        }
    }

    pub(crate) fn add_signal_action(&self, action: Box<dyn Fn(&MasterShared) + Send + Sync>) {
        self.signal_actions
            .lock()
            .expect("poisoned signal actions")
            .push(action);
    }

    pub(crate) fn install(
        master: &Arc<MasterShared>,
        builder: RouterBuilder,
    ) -> Result<Arc<Router>, String> {
        master.pause();
        let result = builder.build(master);
        if let Ok(router) = &result {
            master
                .routers
                .lock()
                .expect("poisoned router list")
                .push(Arc::clone(router));
        }
        master.unpause();
        result
    }

    /// Strips a router's tasks and timers from every worker, waits for the
    /// acknowledgements, and runs element cleanup. Caller holds the pause.
    fn retire_router(&self, router: &Arc<Router>) {
        self.routers
            .lock()
            .expect("poisoned router list")
            .retain(|installed| !Arc::ptr_eq(installed, router));

        let (ack_send, ack_recv) = bounded(self.threads.len());
        let mut expected = 0;
        for handle in &self.threads {
            if !handle.exited() {
                let _ = handle
                    .sender
                    .send(Pending::KillRouter(Arc::clone(router), ack_send.clone()));
                expected += 1;
            }
        }
        drop(ack_send);
        while expected > 0 {
            match ack_recv.recv_timeout(Duration::from_millis(50)) {
                Ok(()) => expected -= 1,
                Err(RecvTimeoutError::Timeout) => {
                    // A worker that exited mid-kill never acknowledges.
                    if self.threads.iter().all(ThreadHandle::exited) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        router.teardown();
    }

    pub(crate) fn kill_router(&self, router: &Arc<Router>) {
        self.pause();
        self.retire_router(router);
        self.unpause();
    }

    pub(crate) fn hotswap(
        master: &Arc<MasterShared>,
        old: &Arc<Router>,
        builder: RouterBuilder,
    ) -> Result<Arc<Router>, String> {
        master.pause();
        let result = builder.build(master);
        match &result {
            Ok(new) => {
                master.retire_router(old);
                master
                    .routers
                    .lock()
                    .expect("poisoned router list")
                    .push(Arc::clone(new));
            }
            Err(_) => {
                // Install is all-or-nothing: the old router keeps running.
            }
        }
        master.unpause();
        result
    }

    pub(crate) fn stage(&self, name: &str, builder: RouterBuilder) {
        self.staged
            .lock()
            .expect("poisoned staged builders")
            .insert(name.to_owned(), builder);
    }

    pub(crate) fn hotswap_staged(
        master: &Arc<MasterShared>,
        old: &Router,
        name: &str,
    ) -> Result<(), String> {
        let builder = master
            .staged
            .lock()
            .expect("poisoned staged builders")
            .remove(name)
            .ok_or_else(|| format!("no staged router {:?}", name))?;
        let old = old
            .arc()
            .ok_or_else(|| "router is already being destroyed".to_owned())?;
        MasterShared::hotswap(master, &old, builder).map(|_| ())
    }

    pub(crate) fn routers(&self) -> Vec<Arc<Router>> {
        self.routers.lock().expect("poisoned router list").clone()
    }
}

/// Owns the worker thread pool and the set of installed routers.
pub struct Master {
    shared: Arc<MasterShared>,
    guards: Vec<JoinHandle<()>>,
}

impl Master {
    /// Spawns `nthreads` worker threads (at least one).
    pub fn new(nthreads: usize) -> Master {
        Master::with_log_hook(nthreads, None)
    }

    /// Spawns worker threads whose event streams are bound by `log_hook`.
    pub fn with_log_hook(nthreads: usize, log_hook: Option<LogHook>) -> Master {
        let nthreads = nthreads.max(1);
        let mut handles = Vec::with_capacity(nthreads);
        let mut receivers = Vec::with_capacity(nthreads);
        for _ in 0..nthreads {
            let (sender, receiver) = unbounded();
            let state = Arc::new(AtomicU8::new(S_IDLE));
            handles.push(ThreadHandle { sender, state: Arc::clone(&state) });
            receivers.push((receiver, state));
        }
        let shared = Arc::new(MasterShared {
            threads: handles,
            paused: AtomicU32::new(0),
            stopper: AtomicI32::new(0),
            signals_pending: AtomicBool::new(false),
            routers: Mutex::new(Vec::new()),
            staged: Mutex::new(HashMap::new()),
            signal_actions: Mutex::new(Vec::new()),
        });
        let mut guards = Vec::with_capacity(nthreads);
        for (id, (receiver, state)) in receivers.into_iter().enumerate() {
            let shared = Arc::clone(&shared);
            let hook = log_hook.clone();
            let guard = std::thread::Builder::new()
                .name(format!("router thread {}", id))
                .spawn(move || RouterThread::new(id, shared, receiver, state, hook).run())
                .expect("failed to spawn worker thread");
            guards.push(guard);
        }
        Master { shared, guards }
    }

    /// The number of worker threads.
    pub fn nthreads(&self) -> usize {
        self.shared.nthreads()
    }

    /// Brings a built graph to the running state and installs it.
    ///
    /// Install is all-or-nothing: on error, nothing remains installed and
    /// previously installed routers are untouched.
    pub fn install(&self, builder: RouterBuilder) -> Result<Arc<Router>, String> {
        MasterShared::install(&self.shared, builder)
    }

    /// Atomically replaces `old` with the router built from `builder`.
    ///
    /// Workers quiesce first, so packet chains in flight in the old router
    /// complete; the old router's tasks and timers are then dropped and its
    /// elements cleaned up. On build failure the old router keeps running.
    pub fn hotswap(
        &self,
        old: &Arc<Router>,
        builder: RouterBuilder,
    ) -> Result<Arc<Router>, String> {
        MasterShared::hotswap(&self.shared, old, builder)
    }

    /// Stages a builder for a later `hotswap` global-handler write.
    pub fn stage_router(&self, name: &str, builder: RouterBuilder) {
        self.shared.stage(name, builder);
    }

    /// Uninstalls a router: workers drop its tasks and timers, then element
    /// cleanup runs.
    pub fn kill_router(&self, router: &Arc<Router>) {
        self.shared.kill_router(router);
    }

    /// The currently installed routers.
    pub fn routers(&self) -> Vec<Arc<Router>> {
        self.shared.routers()
    }

    /// Raises the pause counter and quiesces all workers.
    pub fn pause(&self) {
        self.shared.pause();
    }

    /// Lowers the pause counter.
    pub fn unpause(&self) {
        self.shared.unpause();
    }

    /// Requests shutdown: workers finish their current body and exit.
    pub fn please_stop(&self) {
        self.shared.please_stop();
    }

    /// True when shutdown has been requested.
    pub fn stopping(&self) -> bool {
        self.shared.stopping()
    }

    /// Marks process-level signals pending; workers poll the flag once per
    /// loop iteration and run the registered actions.
    pub fn set_signals_pending(&self) {
        self.shared.set_signals_pending();
    }

    /// Registers an action run on a worker thread when signals are pending.
    pub fn add_signal_action<F>(&self, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.add_signal_action(Box::new(move |_| action()));
    }

    /// Waits for the worker threads to exit.
    ///
    /// Workers exit in response to [`Master::please_stop`] (or a `stop`
    /// handler write); joining without a stop request blocks until one
    /// arrives.
    pub fn join(mut self) {
        for guard in self.guards.drain(..) {
            let _ = guard.join();
        }
        for router in self.shared.routers() {
            router.teardown();
        }
    }
}

impl Drop for Master {
    fn drop(&mut self) {
        self.shared.please_stop();
        for guard in self.guards.drain(..) {
            let _ = guard.join();
        }
        for router in self.shared.routers() {
            router.teardown();
        }
    }
}

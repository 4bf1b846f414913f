//! The per-OS-thread scheduling loop.
//!
//! Each worker owns its runqueue and timer heap outright; other threads
//! reach it only through its pending queue, drained at the top of every
//! loop iteration. One iteration drains pending operations, observes the
//! master's stop and pause flags, runs expired timers (inspected every
//! timer-stride iterations, or whenever the runqueue is idle), then
//! dispatches one stride-selected task. With nothing to do, the worker
//! parks on its queue until the soonest timer deadline or an incoming
//! operation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use millrace_logging::Registry;

use crate::logging::{LogHook, RouterEvent, TaskEvent, TimerEvent};
use crate::master::MasterShared;
use crate::router::Router;
use crate::task::{RunQueue, Task};
use crate::timer::{Timer, TimerSet};

/// Operations other threads queue for a worker.
pub(crate) enum Pending {
    ScheduleTask(Task),
    UnscheduleTask(Task),
    MoveTask(Task, usize),
    ScheduleTimer(Timer, Instant),
    UnscheduleTimer(Timer),
    /// Purge the router's tasks and timers, then acknowledge.
    KillRouter(Arc<Router>, Sender<()>),
    /// No operation; delivered to interrupt a park.
    Wake,
}

/// Worker state words, visible through [`ThreadHandle::state`].
pub(crate) const S_IDLE: u8 = 0;
pub(crate) const S_TASK: u8 = 1;
pub(crate) const S_TIMER: u8 = 2;
pub(crate) const S_PAUSED: u8 = 3;
pub(crate) const S_EXITED: u8 = 4;

/// How long a paused worker sleeps between pending-queue polls.
const PAUSE_TICK: Duration = Duration::from_millis(2);

/// Longest idle park; bounds how stale a missed wake can leave the loop.
const IDLE_PARK: Duration = Duration::from_millis(200);

/// The shared-side view of one worker thread.
pub(crate) struct ThreadHandle {
    pub(crate) sender: Sender<Pending>,
    pub(crate) state: Arc<AtomicU8>,
}

impl ThreadHandle {
    pub(crate) fn quiescent(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), S_PAUSED | S_EXITED)
    }

    pub(crate) fn exited(&self) -> bool {
        self.state.load(Ordering::Acquire) == S_EXITED
    }
}

/// One worker thread's owned state.
pub(crate) struct RouterThread {
    id: usize,
    master: Arc<MasterShared>,
    receiver: Receiver<Pending>,
    runqueue: RunQueue,
    timers: TimerSet,
    state: Arc<AtomicU8>,
    log_hook: Option<LogHook>,
    /// Pass of the most recent dispatch; the floor for returning tasks.
    global_pass: u64,
    iterations: u64,
}

impl RouterThread {
    pub(crate) fn new(
        id: usize,
        master: Arc<MasterShared>,
        receiver: Receiver<Pending>,
        state: Arc<AtomicU8>,
        log_hook: Option<LogHook>,
    ) -> RouterThread {
        RouterThread {
            id,
            master,
            receiver,
            runqueue: RunQueue::new(),
            timers: TimerSet::new(),
            state,
            log_hook,
            global_pass: 0,
            iterations: 0,
        }
    }

    pub(crate) fn run(mut self) {
        let mut registry = Registry::new(Instant::now());
        if let Some(hook) = self.log_hook.take() {
            if let Some(action) = hook(self.id) {
                registry.insert::<RouterEvent>("millrace", action);
            }
        }
        let logger = registry.get::<RouterEvent>("millrace");

        loop {
            self.drain_pending();

            if self.master.stopping() {
                break;
            }
            if self.master.paused() {
                self.state.store(S_PAUSED, Ordering::Release);
                while self.master.paused() && !self.master.stopping() {
                    if let Ok(op) = self.receiver.recv_timeout(PAUSE_TICK) {
                        self.apply(op);
                    }
                }
                self.state.store(S_IDLE, Ordering::Release);
                continue;
            }

            self.iterations += 1;
            if self.runqueue.is_empty() || self.iterations % self.timers.stride() as u64 == 0 {
                self.run_timers(&logger);
            }

            match self.runqueue.pop_min() {
                Some(task) => {
                    self.state.store(S_TASK, Ordering::Release);
                    self.global_pass = task.pass();
                    let busy = match task.router() {
                        Some(router) => {
                            let _quiesce = router.quiesce.read().expect("poisoned quiesce lock");
                            router.run_element_task(&task)
                        }
                        // The router is gone; the task dies with it.
                        None => false,
                    };
                    task.note_run();
                    task.advance_pass();
                    if let Some(logger) = &logger {
                        logger.log(RouterEvent::Task(TaskEvent {
                            thread: self.id,
                            element: task.element(),
                            busy,
                        }));
                    }
                    if (busy || task.take_fast_requeue())
                        && task.should_run()
                        && task.router().is_some()
                    {
                        self.runqueue.insert(task, self.global_pass);
                    }
                }
                None => {
                    self.state.store(S_IDLE, Ordering::Release);
                    if let Some(logger) = &logger {
                        logger.flush();
                    }
                    let timeout = self
                        .timers
                        .next_expiry()
                        .map(|expiry| expiry.saturating_duration_since(Instant::now()))
                        .unwrap_or(IDLE_PARK)
                        .min(IDLE_PARK);
                    match self.receiver.recv_timeout(timeout) {
                        Ok(op) => self.apply(op),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            }

            if self.master.take_signals_pending() {
                self.master.run_signal_actions();
            }
        }

        if let Some(logger) = &logger {
            logger.flush();
        }
        self.state.store(S_EXITED, Ordering::Release);
    }

    fn run_timers(&mut self, logger: &Option<millrace_logging::Logger<RouterEvent>>) {
        if self.timers.is_empty() {
            return;
        }
        self.state.store(S_TIMER, Ordering::Release);
        let master = Arc::clone(&self.master);
        let id = self.id;
        self.timers.run_timers(
            &mut || master.stopping() || master.paused(),
            &mut |timer| {
                if let Some(router) = timer.router() {
                    let _quiesce = router.quiesce.read().expect("poisoned quiesce lock");
                    router.run_element_timer(&timer);
                    if let Some(logger) = logger {
                        logger.log(RouterEvent::Timer(TimerEvent {
                            thread: id,
                            element: timer.element(),
                        }));
                    }
                }
            },
        );
    }

    fn drain_pending(&mut self) {
        while let Ok(op) = self.receiver.try_recv() {
            self.apply(op);
        }
    }

    fn apply(&mut self, op: Pending) {
        match op {
            Pending::ScheduleTask(task) => {
                if !task.should_run() || task.router().is_none() {
                    return;
                }
                if task.home_thread() == self.id {
                    self.runqueue.insert(task, self.global_pass);
                } else {
                    // The task moved homes while the operation was in
                    // flight; forward it.
                    let home = task.home_thread();
                    self.master.send_pending(home, Pending::ScheduleTask(task));
                }
            }
            Pending::UnscheduleTask(task) => {
                self.runqueue.remove(&task);
            }
            Pending::MoveTask(task, target) => {
                self.runqueue.remove(&task);
                task.set_home_thread(target);
                if task.should_run() {
                    self.master.send_pending(target, Pending::ScheduleTask(task));
                }
            }
            Pending::ScheduleTimer(timer, when) => {
                if timer.home_thread() == self.id {
                    self.timers.schedule(&timer, when, Instant::now());
                } else {
                    let home = timer.home_thread();
                    self.master.send_pending(home, Pending::ScheduleTimer(timer, when));
                }
            }
            Pending::UnscheduleTimer(timer) => {
                self.timers.unschedule(&timer);
            }
            Pending::KillRouter(router, ack) => {
                let target = Arc::as_ptr(&router);
                self.runqueue.purge_router(target);
                self.timers.purge_router(target);
                let _ = ack.send(());
            }
            Pending::Wake => {}
        }
    }
}

//! Cooperative tasks and the stride-scheduled runqueue.
//!
//! A [`Task`] is a schedulable handle on one element: when dispatched, the
//! worker thread locks the element and invokes its
//! [`run_task`](crate::element::Element::run_task) hook. Each runqueue is
//! stride-scheduled for fairness: a task's `stride` is `STRIDE1 / tickets`,
//! dispatch picks the runnable task with the smallest virtual `pass`, and
//! each run advances the task's pass by its stride, so dispatch frequency is
//! proportional to tickets.
//!
//! Tasks may be scheduled and unscheduled from any thread; the operations
//! travel to the task's home thread over that thread's pending queue and
//! take effect at the top of its scheduling loop.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::router::Router;
use crate::thread::Pending;

/// Pass advance for a task with one ticket.
pub const STRIDE1: u64 = 1 << 16;
/// Ticket count given to tasks that do not choose one.
pub const DEFAULT_TICKETS: u32 = 256;
/// Largest permitted ticket count.
pub const MAX_TICKETS: u32 = 65_535;

pub(crate) struct TaskInner {
    router: Weak<Router>,
    element: usize,
    home_thread: AtomicUsize,
    /// Desired state: the task wants to be on its home runqueue.
    should_run: AtomicBool,
    /// Actual state: the task is present in some runqueue.
    on_runqueue: AtomicBool,
    /// Requeue requested from inside the task's own callback.
    fast_requeue: AtomicBool,
    tickets: AtomicU32,
    stride: AtomicU64,
    pass: AtomicU64,
    total_runs: AtomicU64,
}

/// A schedulable handle on one element's work.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub(crate) fn new(router: &Router, element: usize, home_thread: usize) -> Task {
        Task {
            inner: Arc::new(TaskInner {
                router: router.weak(),
                element,
                home_thread: AtomicUsize::new(home_thread),
                should_run: AtomicBool::new(false),
                on_runqueue: AtomicBool::new(false),
                fast_requeue: AtomicBool::new(false),
                tickets: AtomicU32::new(DEFAULT_TICKETS),
                stride: AtomicU64::new(STRIDE1 / DEFAULT_TICKETS as u64),
                pass: AtomicU64::new(0),
                total_runs: AtomicU64::new(0),
            }),
        }
    }

    /// The index of the owning element.
    pub fn element(&self) -> usize {
        self.inner.element
    }

    /// The task's home thread.
    pub fn home_thread(&self) -> usize {
        self.inner.home_thread.load(Ordering::Acquire)
    }

    /// True when the task wants to run.
    pub fn scheduled(&self) -> bool {
        self.inner.should_run.load(Ordering::Acquire)
    }

    /// The number of completed dispatches.
    pub fn total_runs(&self) -> u64 {
        self.inner.total_runs.load(Ordering::Relaxed)
    }

    /// The task's ticket count.
    pub fn tickets(&self) -> u32 {
        self.inner.tickets.load(Ordering::Relaxed)
    }

    /// Sets the ticket count, clamped to `1..=MAX_TICKETS`.
    pub fn set_tickets(&self, tickets: u32) {
        let tickets = tickets.clamp(1, MAX_TICKETS);
        self.inner.tickets.store(tickets, Ordering::Relaxed);
        self.inner
            .stride
            .store(STRIDE1 / tickets as u64, Ordering::Relaxed);
    }

    /// Attaches the task to its home thread, optionally scheduling it.
    pub fn initialize(&self, scheduled: bool) {
        if scheduled {
            self.schedule();
        }
    }

    /// Places the task on its home runqueue; idempotent.
    pub fn schedule(&self) {
        self.inner.should_run.store(true, Ordering::Release);
        self.send_home(Pending::ScheduleTask(self.clone()));
    }

    /// Alias of [`Task::schedule`], used by wakeup paths.
    pub fn reschedule(&self) {
        self.schedule();
    }

    /// Removes the task from its runqueue; idempotent.
    pub fn unschedule(&self) {
        self.inner.should_run.store(false, Ordering::Release);
        self.send_home(Pending::UnscheduleTask(self.clone()));
    }

    /// Requeues the task from inside its own callback, cheaper than a round
    /// trip through the pending queue.
    pub fn fast_reschedule(&self) {
        self.inner.should_run.store(true, Ordering::Release);
        self.inner.fast_requeue.store(true, Ordering::Release);
    }

    /// Moves the task to another thread's runqueue.
    ///
    /// The detach happens on the current home thread; the attach follows on
    /// the target. In between, the task is on no runqueue.
    pub fn move_thread(&self, target: usize) {
        self.send_home(Pending::MoveTask(self.clone(), target));
    }

    /// True when the two handles address the same task.
    pub fn same(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn send_home(&self, op: Pending) {
        if let Some(router) = self.inner.router.upgrade() {
            router.send_pending(self.home_thread(), op);
        }
    }

    pub(crate) fn router(&self) -> Option<Arc<Router>> {
        self.inner.router.upgrade()
    }

    pub(crate) fn router_ptr(&self) -> *const Router {
        self.inner.router.as_ptr()
    }

    pub(crate) fn set_home_thread(&self, thread: usize) {
        self.inner.home_thread.store(thread, Ordering::Release);
    }

    pub(crate) fn pass(&self) -> u64 {
        self.inner.pass.load(Ordering::Relaxed)
    }

    pub(crate) fn set_pass(&self, pass: u64) {
        self.inner.pass.store(pass, Ordering::Relaxed);
    }

    pub(crate) fn advance_pass(&self) {
        let stride = self.inner.stride.load(Ordering::Relaxed);
        self.inner.pass.fetch_add(stride, Ordering::Relaxed);
    }

    pub(crate) fn note_run(&self) {
        self.inner.total_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn should_run(&self) -> bool {
        self.inner.should_run.load(Ordering::Acquire)
    }

    pub(crate) fn take_fast_requeue(&self) -> bool {
        self.inner.fast_requeue.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn mark_on_runqueue(&self) -> bool {
        self.inner.on_runqueue.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_on_runqueue(&self) {
        self.inner.on_runqueue.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn detached(element: usize, tickets: u32) -> Task {
        let task = Task {
            inner: Arc::new(TaskInner {
                router: Weak::new(),
                element,
                home_thread: AtomicUsize::new(0),
                should_run: AtomicBool::new(true),
                on_runqueue: AtomicBool::new(false),
                fast_requeue: AtomicBool::new(false),
                tickets: AtomicU32::new(DEFAULT_TICKETS),
                stride: AtomicU64::new(STRIDE1 / DEFAULT_TICKETS as u64),
                pass: AtomicU64::new(0),
                total_runs: AtomicU64::new(0),
            }),
        };
        task.set_tickets(tickets);
        task
    }
}

/// One thread's stride-scheduled runqueue.
///
/// Owned by a single worker thread; cross-thread operations arrive through
/// the pending queue, never by touching the runqueue directly.
pub(crate) struct RunQueue {
    tasks: Vec<Task>,
}

impl RunQueue {
    pub(crate) fn new() -> RunQueue {
        RunQueue { tasks: Vec::new() }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Inserts a task unless it is already queued. The task's pass is lifted
    /// to `floor` (the pass of the most recent dispatch) so a task returning
    /// from sleep cannot monopolize the thread working off an ancient pass.
    pub(crate) fn insert(&mut self, task: Task, floor: u64) {
        if task.mark_on_runqueue() {
            return;
        }
        if task.pass() < floor {
            task.set_pass(floor);
        }
        self.tasks.push(task);
    }

    /// Removes and returns the queued task with the smallest pass.
    pub(crate) fn pop_min(&mut self) -> Option<Task> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .min_by_key(|(_, task)| task.pass())
            .map(|(index, _)| index)?;
        let task = self.tasks.remove(index);
        task.clear_on_runqueue();
        Some(task)
    }

    /// Removes a specific task if present.
    pub(crate) fn remove(&mut self, task: &Task) {
        if let Some(index) = self.tasks.iter().position(|t| t.same(task)) {
            self.tasks.remove(index);
            task.clear_on_runqueue();
        }
    }

    /// Removes every task belonging to the given router.
    pub(crate) fn purge_router(&mut self, router: *const Router) {
        self.tasks.retain(|task| {
            if std::ptr::eq(task.router_ptr(), router) {
                task.clear_on_runqueue();
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulates the dispatch loop: pick minimum pass, advance, reinsert.
    fn dispatch_counts(ticket_sets: &[u32], rounds: usize) -> Vec<usize> {
        let tasks: Vec<Task> = ticket_sets
            .iter()
            .enumerate()
            .map(|(index, tickets)| Task::detached(index, *tickets))
            .collect();
        let mut queue = RunQueue::new();
        for task in &tasks {
            queue.insert(task.clone(), 0);
        }
        let mut counts = vec![0usize; tasks.len()];
        let mut floor = 0;
        for _ in 0..rounds {
            let task = queue.pop_min().expect("runqueue unexpectedly empty");
            floor = task.pass();
            counts[task.element()] += 1;
            task.advance_pass();
            queue.insert(task, floor);
        }
        counts
    }

    #[test]
    fn equal_tickets_share_equally() {
        let counts = dispatch_counts(&[DEFAULT_TICKETS; 4], 400);
        for count in counts {
            assert_eq!(count, 100);
        }
    }

    #[test]
    fn tickets_weight_dispatch_frequency() {
        let counts = dispatch_counts(&[100, 300], 400);
        assert!((98..=102).contains(&counts[0]), "A ran {} times", counts[0]);
        assert!((298..=302).contains(&counts[1]), "B ran {} times", counts[1]);
    }

    #[test]
    fn insert_is_idempotent() {
        let task = Task::detached(0, DEFAULT_TICKETS);
        let mut queue = RunQueue::new();
        queue.insert(task.clone(), 0);
        queue.insert(task.clone(), 0);
        assert!(queue.pop_min().is_some());
        assert!(queue.pop_min().is_none());
    }

    #[test]
    fn returning_task_pass_is_floored() {
        let slow = Task::detached(0, 1);
        let mut queue = RunQueue::new();
        queue.insert(slow.clone(), 500_000);
        assert_eq!(queue.pop_min().unwrap().pass(), 500_000);
    }

    #[test]
    fn ticket_bounds_clamp() {
        let task = Task::detached(0, DEFAULT_TICKETS);
        task.set_tickets(0);
        assert_eq!(task.tickets(), 1);
        task.set_tickets(1_000_000);
        assert_eq!(task.tickets(), MAX_TICKETS);
    }
}

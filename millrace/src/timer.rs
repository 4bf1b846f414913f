//! Steady-clock timers, coalesced per worker thread.
//!
//! Each worker thread owns a [`TimerSet`]: a 4-ary min-heap of deadlines on
//! the steady clock. A [`Timer`] handle records its heap slot so moves and
//! removals stay cheap; scheduling from another thread routes through the
//! home thread's pending queue, so the heap itself is single-owner. Expired
//! timers run in bounded bursts to keep tasks from starving, with a
//! drain-everything fallback when the burst limit is hit while timers are
//! still behind.

use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::chatter;
use crate::router::Router;
use crate::thread::Pending;

/// Timers more than this far in the past are clamped to now.
pub const BEHIND: Duration = Duration::from_secs(1);

/// Slack allowed before a deadline counts as "behind" for the governor.
const ADJUSTMENT: Duration = Duration::from_micros(500);

/// Burst bound on timers run per inspection.
const MAX_TIMERS_PER_RUN: u32 = 64;

/// Punctual inspections before the governor relaxes.
const PUNCTUAL_RUNS: u32 = 12;

/// Upper bound on the timer-stride governor.
const MAX_TIMER_STRIDE: u32 = 32;

/// Throttle on "timer far behind" diagnostics.
const CHECK_REPORTS: u32 = 5;

pub(crate) struct TimerInner {
    router: Weak<Router>,
    element: usize,
    home_thread: AtomicUsize,
    /// The most recently requested expiry; the base for periodic reschedule.
    expiry: Mutex<Option<Instant>>,
    /// 0 unscheduled, `slot + 1` in the heap, negative in the run chunk.
    schedpos: AtomicIsize,
}

/// A deadline bound to an element's
/// [`run_timer`](crate::element::Element::run_timer) hook.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    pub(crate) fn new(router: &Router, element: usize, home_thread: usize) -> Timer {
        Timer {
            inner: Arc::new(TimerInner {
                router: router.weak(),
                element,
                home_thread: AtomicUsize::new(home_thread),
                expiry: Mutex::new(None),
                schedpos: AtomicIsize::new(0),
            }),
        }
    }

    /// The index of the owning element.
    pub fn element(&self) -> usize {
        self.inner.element
    }

    /// The most recently requested expiry.
    pub fn expiry(&self) -> Option<Instant> {
        *self.inner.expiry.lock().expect("poisoned timer expiry")
    }

    /// True when the timer has a pending expiry.
    pub fn scheduled(&self) -> bool {
        self.expiry().is_some()
    }

    /// Schedules the timer to fire at `when` on the steady clock.
    ///
    /// Rescheduling an already scheduled timer moves its deadline.
    pub fn schedule_at(&self, when: Instant) {
        *self.inner.expiry.lock().expect("poisoned timer expiry") = Some(when);
        self.send_home(Pending::ScheduleTimer(self.clone(), when));
    }

    /// Schedules the timer to fire `delay` from now.
    pub fn schedule_after(&self, delay: Duration) {
        self.schedule_at(Instant::now() + delay);
    }

    /// Schedules the timer `delay` after its previous expiry, which keeps a
    /// periodic timer drift-free. Falls back to now when never scheduled.
    pub fn reschedule_after(&self, delay: Duration) {
        let base = self.expiry().unwrap_or_else(Instant::now);
        self.schedule_at(base + delay);
    }

    /// Cancels any pending expiry; idempotent.
    pub fn unschedule(&self) {
        *self.inner.expiry.lock().expect("poisoned timer expiry") = None;
        self.send_home(Pending::UnscheduleTimer(self.clone()));
    }

    /// True when the two handles address the same timer.
    pub fn same(&self, other: &Timer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The timer's home thread.
    pub fn home_thread(&self) -> usize {
        self.inner.home_thread.load(Ordering::Acquire)
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

    fn schedpos(&self) -> isize {
        self.inner.schedpos.load(Ordering::Relaxed)
    }

    fn set_schedpos(&self, pos: isize) {
        self.inner.schedpos.store(pos, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn detached(element: usize) -> Timer {
        Timer {
            inner: Arc::new(TimerInner {
                router: Weak::new(),
                element,
                home_thread: AtomicUsize::new(0),
                expiry: Mutex::new(None),
                schedpos: AtomicIsize::new(0),
            }),
        }
    }
}

struct HeapEntry {
    expiry: Instant,
    timer: Timer,
}

/// One thread's timer heap.
pub(crate) struct TimerSet {
    heap: Vec<HeapEntry>,
    timer_stride: u32,
    timer_count: u32,
    check_reports: u32,
    runchunk: Vec<Option<Timer>>,
}

impl TimerSet {
    pub(crate) fn new() -> TimerSet {
        TimerSet {
            heap: Vec::new(),
            timer_stride: MAX_TIMER_STRIDE,
            timer_count: 0,
            check_reports: CHECK_REPORTS,
            runchunk: Vec::new(),
        }
    }

    /// How many scheduling iterations may pass between inspections.
    pub(crate) fn stride(&self) -> u32 {
        self.timer_stride
    }

    /// The soonest deadline, if any timer is scheduled.
    pub(crate) fn next_expiry(&self) -> Option<Instant> {
        self.heap.first().map(|entry| entry.expiry)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts or moves a timer to expire at `when`.
    pub(crate) fn schedule(&mut self, timer: &Timer, mut when: Instant, now: Instant) {
        if when + BEHIND < now {
            if self.check_reports > 0 {
                self.check_reports -= 1;
                chatter!(
                    "timer for element {} outdated by {:?}, clamped to now",
                    timer.element(),
                    now.duration_since(when)
                );
            }
            when = now;
        }
        let pos = timer.schedpos();
        if pos > 0 {
            let slot = (pos - 1) as usize;
            self.heap[slot].expiry = when;
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        } else {
            if pos < 0 {
                self.runchunk[(-pos - 1) as usize] = None;
            }
            self.heap.push(HeapEntry { expiry: when, timer: timer.clone() });
            let last = self.heap.len() - 1;
            self.heap[last].timer.set_schedpos(last as isize + 1);
            self.sift_up(last);
        }
    }

    /// Removes a timer wherever it sits.
    pub(crate) fn unschedule(&mut self, timer: &Timer) {
        let pos = timer.schedpos();
        if pos > 0 {
            self.remove_slot((pos - 1) as usize);
        } else if pos < 0 {
            self.runchunk[(-pos - 1) as usize] = None;
        }
        timer.set_schedpos(0);
    }

    /// Removes every timer belonging to the given router.
    pub(crate) fn purge_router(&mut self, router: *const Router) {
        let mut slot = self.heap.len();
        while slot > 0 {
            slot -= 1;
            if std::ptr::eq(self.heap[slot].timer.router_ptr(), router) {
                self.heap[slot].timer.set_schedpos(0);
                self.remove_slot(slot);
            }
        }
        for entry in self.runchunk.iter_mut() {
            if entry
                .as_ref()
                .is_some_and(|t| std::ptr::eq(t.router_ptr(), router))
            {
                *entry = None;
            }
        }
    }

    /// Runs expired timers, invoking `fire` for each.
    ///
    /// At most [`MAX_TIMERS_PER_RUN`] run directly off the heap; if more are
    /// still expired after that, everything expired is drained into a run
    /// chunk and executed, so a far-behind deadline cannot starve its
    /// neighbors indefinitely. `stop` is consulted between timers.
    pub(crate) fn run_timers(
        &mut self,
        stop: &mut dyn FnMut() -> bool,
        fire: &mut dyn FnMut(Timer),
    ) {
        if self.heap.is_empty() || stop() {
            return;
        }
        let now = Instant::now();
        let Some(first) = self.next_expiry() else {
            return;
        };
        if first > now {
            return;
        }

        // Inspections arriving behind schedule tighten the stride governor;
        // punctual ones relax it.
        if first + ADJUSTMENT <= now {
            self.timer_count = 0;
            if self.timer_stride > 1 {
                self.timer_stride = (self.timer_stride * 4) / 5;
            }
        } else {
            self.timer_count += 1;
            if self.timer_count >= PUNCTUAL_RUNS {
                self.timer_count = 0;
                self.timer_stride = (self.timer_stride + 1).min(MAX_TIMER_STRIDE);
            }
        }

        let mut budget = MAX_TIMERS_PER_RUN;
        while let Some(entry) = self.heap.first() {
            if entry.expiry > now || stop() || budget == 0 {
                break;
            }
            budget -= 1;
            let timer = self.pop_root();
            fire(timer);
        }

        // Burst exhausted with timers still expired: drain them all so the
        // backlog clears in one pass instead of starving round after round.
        if budget == 0 && !stop() {
            while let Some(entry) = self.heap.first() {
                if entry.expiry > now {
                    break;
                }
                let timer = self.pop_root();
                timer.set_schedpos(-(self.runchunk.len() as isize) - 1);
                self.runchunk.push(Some(timer));
            }
            let mut index = 0;
            while index < self.runchunk.len() && !stop() {
                if let Some(timer) = self.runchunk[index].take() {
                    timer.set_schedpos(0);
                    fire(timer);
                }
                index += 1;
            }
            // Stopped early: put unrun timers back at their old deadlines.
            while index < self.runchunk.len() {
                if let Some(timer) = self.runchunk[index].take() {
                    timer.set_schedpos(0);
                    if let Some(expiry) = timer.expiry() {
                        self.schedule(&timer, expiry, now);
                    }
                }
                index += 1;
            }
            self.runchunk.clear();
        }
    }

    fn pop_root(&mut self) -> Timer {
        let timer = self.remove_slot(0);
        timer.set_schedpos(0);
        timer
    }

    fn remove_slot(&mut self, slot: usize) -> Timer {
        let last = self.heap.len() - 1;
        self.heap.swap(slot, last);
        let entry = self.heap.pop().expect("heap underflow");
        if slot < self.heap.len() {
            self.heap[slot].timer.set_schedpos(slot as isize + 1);
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        }
        entry.timer
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 4;
            if self.heap[slot].expiry < self.heap[parent].expiry {
                self.swap_slots(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let first_child = 4 * slot + 1;
            if first_child >= self.heap.len() {
                break;
            }
            let mut smallest = slot;
            for child in first_child..(first_child + 4).min(self.heap.len()) {
                if self.heap[child].expiry < self.heap[smallest].expiry {
                    smallest = child;
                }
            }
            if smallest == slot {
                break;
            }
            self.swap_slots(slot, smallest);
            slot = smallest;
        }
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.heap[a].timer.set_schedpos(a as isize + 1);
        self.heap[b].timer.set_schedpos(b as isize + 1);
    }

    #[cfg(test)]
    fn assert_heap(&self) {
        for slot in 1..self.heap.len() {
            let parent = (slot - 1) / 4;
            assert!(
                self.heap[parent].expiry <= self.heap[slot].expiry,
                "heap property violated at slot {}",
                slot
            );
        }
        for (slot, entry) in self.heap.iter().enumerate() {
            assert_eq!(entry.timer.schedpos(), slot as isize + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_order(set: &mut TimerSet) -> Vec<usize> {
        let mut order = Vec::new();
        set.run_timers(&mut || false, &mut |timer| order.push(timer.element()));
        order
    }

    #[test]
    fn pops_in_deadline_order() {
        let now = Instant::now();
        let mut set = TimerSet::new();
        let timers: Vec<Timer> = (0..10).map(Timer::detached).collect();
        // Insert with deadlines descending so every insert reshuffles.
        for (index, timer) in timers.iter().enumerate() {
            let when = now - Duration::from_millis(10 * (10 - index) as u64);
            *timer.inner.expiry.lock().unwrap() = Some(when);
            set.schedule(timer, when, now);
            set.assert_heap();
        }
        let order = fire_order(&mut set);
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(set.is_empty());
    }

    #[test]
    fn unschedule_removes_from_middle() {
        let now = Instant::now();
        let mut set = TimerSet::new();
        let timers: Vec<Timer> = (0..8).map(Timer::detached).collect();
        for (index, timer) in timers.iter().enumerate() {
            set.schedule(timer, now + Duration::from_millis(index as u64), now);
        }
        set.unschedule(&timers[3]);
        set.unschedule(&timers[0]);
        set.assert_heap();
        assert_eq!(timers[3].schedpos(), 0);

        // Unscheduling twice is harmless.
        set.unschedule(&timers[3]);
        set.assert_heap();
    }

    #[test]
    fn reschedule_moves_deadline() {
        let now = Instant::now();
        let mut set = TimerSet::new();
        let a = Timer::detached(0);
        let b = Timer::detached(1);
        set.schedule(&a, now + Duration::from_secs(5), now);
        set.schedule(&b, now + Duration::from_secs(10), now);
        assert_eq!(set.next_expiry(), Some(now + Duration::from_secs(5)));
        // Moving b ahead of a must surface it at the root.
        set.schedule(&b, now + Duration::from_secs(1), now);
        set.assert_heap();
        assert_eq!(set.next_expiry(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn far_past_deadlines_clamp_to_now() {
        let now = Instant::now();
        let mut set = TimerSet::new();
        let timer = Timer::detached(0);
        set.schedule(&timer, now - Duration::from_secs(60), now);
        let root = set.next_expiry().unwrap();
        assert!(root >= now - BEHIND);
    }

    #[test]
    fn burst_bound_drains_backlog() {
        let now = Instant::now();
        let mut set = TimerSet::new();
        let timers: Vec<Timer> = (0..100).map(Timer::detached).collect();
        for (index, timer) in timers.iter().enumerate() {
            let when = now - Duration::from_millis(index as u64);
            *timer.inner.expiry.lock().unwrap() = Some(when);
            set.schedule(timer, when, now);
        }
        // All 100 are expired; the run chunk picks up what the burst leaves.
        let order = fire_order(&mut set);
        assert_eq!(order.len(), 100);
        assert!(set.is_empty());
        for timer in &timers {
            assert_eq!(timer.schedpos(), 0);
        }
    }

    #[test]
    fn stop_flag_halts_between_timers() {
        let now = Instant::now();
        let mut set = TimerSet::new();
        for index in 0..10 {
            let timer = Timer::detached(index);
            set.schedule(&timer, now - Duration::from_millis(1), now);
        }
        let mut fired = 0;
        let mut budget = 3;
        set.run_timers(
            &mut || {
                if budget == 0 {
                    true
                } else {
                    budget -= 1;
                    false
                }
            },
            &mut |_| fired += 1,
        );
        assert!(fired < 10);
    }
}

//! The packet sink.

use std::any::Any;

use crate::context::Context;
use crate::element::{CleanupStage, Element, PortCount};
use crate::handler::{Registrar, BUTTON};
use crate::notifier::Signal;
use crate::packet::Packet;
use crate::task::Task;

/// Swallows every packet it receives.
///
/// On a push input it is a plain sink. On a pull input it runs a task that
/// drains upstream, listening to the upstream empty signal so it sleeps
/// while there is provably nothing to pull.
pub struct Discard {
    count: u64,
    task: Option<Task>,
    signal: Option<Signal>,
}

impl Discard {
    /// A zeroed sink.
    pub fn new() -> Discard {
        Discard { count: 0, task: None, signal: None }
    }

    /// Packets discarded so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for Discard {
    fn default() -> Self {
        Discard::new()
    }
}

impl Element for Discard {
    fn class_name(&self) -> &'static str {
        "Discard"
    }

    fn port_count(&self) -> PortCount {
        PortCount::parse("1/0")
    }

    fn initialize(
        &mut self,
        ctx: &Context<'_>,
        _errh: &mut crate::error::ErrorHandler,
    ) -> Result<(), String> {
        if ctx.input(0).kind() == Some(crate::element::PortKind::Pull) {
            let task = ctx.new_task();
            let signal = ctx.upstream_empty_signal(0);
            signal.add_listener(&task);
            task.initialize(true);
            self.task = Some(task);
            self.signal = Some(signal);
        }
        Ok(())
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        if stage >= CleanupStage::Initialized {
            if let (Some(task), Some(signal)) = (&self.task, &self.signal) {
                signal.remove_listener(task);
                task.unschedule();
            }
        }
    }

    fn push(&mut self, _ctx: &Context<'_>, _port: usize, packet: Packet) {
        self.count += 1;
        packet.kill();
    }

    fn run_task(&mut self, ctx: &Context<'_>, task: &Task) -> bool {
        match ctx.input(0).pull() {
            Some(packet) => {
                self.count += 1;
                packet.kill();
                task.fast_reschedule();
                true
            }
            None => {
                // Nothing upstream. With the signal still active the source
                // may produce again without a transition, so keep polling;
                // otherwise sleep until the signal wakes this task.
                if self.signal.as_ref().is_some_and(Signal::active) {
                    task.fast_reschedule();
                }
                false
            }
        }
    }

    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        reg.add_read::<Discard, _>("count", |e| e.count.to_string());
        reg.add_write_flagged::<Discard, _>("reset", BUTTON, |e, _value, _errh| {
            e.count = 0;
            Ok(())
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

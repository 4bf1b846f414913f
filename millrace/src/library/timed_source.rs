//! A timer-driven push source.

use std::any::Any;
use std::time::Duration;

use crate::config::{keywords, parse_interval};
use crate::context::Context;
use crate::element::{CleanupStage, Element, PortCount, Processing};
use crate::error::ErrorHandler;
use crate::handler::Registrar;
use crate::packet::Packet;
use crate::timer::Timer;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Emits one packet per interval from a timer.
///
/// The timer reschedules relative to its previous expiry, so the emission
/// rate does not drift with callback latency.
///
/// Keywords: `INTERVAL`, `DATA`.
pub struct TimedSource {
    data: Vec<u8>,
    interval: Duration,
    count: u64,
    timer: Option<Timer>,
}

impl TimedSource {
    /// A source emitting 64-byte zero packets twice a second.
    pub fn new() -> TimedSource {
        TimedSource {
            data: vec![0; 64],
            interval: DEFAULT_INTERVAL,
            count: 0,
            timer: None,
        }
    }

    /// Packets emitted so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for TimedSource {
    fn default() -> Self {
        TimedSource::new()
    }
}

impl Element for TimedSource {
    fn class_name(&self) -> &'static str {
        "TimedSource"
    }

    fn port_count(&self) -> PortCount {
        PortCount::parse("0/1")
    }

    fn processing(&self) -> Processing {
        Processing::parse(Processing::PUSH)
    }

    fn configure(&mut self, args: &[String], _errh: &mut ErrorHandler) -> Result<(), String> {
        for (key, value) in keywords(args) {
            match key {
                "INTERVAL" => self.interval = parse_interval(key, value)?,
                "DATA" => self.data = value.as_bytes().to_vec(),
                _ => return Err(format!("unknown keyword {:?}", key)),
            }
        }
        Ok(())
    }

    fn initialize(&mut self, ctx: &Context<'_>, _errh: &mut ErrorHandler) -> Result<(), String> {
        let timer = ctx.new_timer();
        timer.schedule_after(self.interval);
        self.timer = Some(timer);
        Ok(())
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        if stage >= CleanupStage::Initialized {
            if let Some(timer) = &self.timer {
                timer.unschedule();
            }
        }
    }

    fn run_timer(&mut self, ctx: &Context<'_>, timer: &Timer) {
        if let Some(packet) = Packet::from_data(&self.data) {
            self.count += 1;
            ctx.output(0).push(packet);
        }
        timer.reschedule_after(self.interval);
    }

    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        reg.add_read::<TimedSource, _>("count", |e| e.count.to_string());
        reg.add_read::<TimedSource, _>("interval", |e| format!("{:?}", e.interval));
        reg.add_write::<TimedSource, _>("interval", |e, value, _errh| {
            e.interval = parse_interval("INTERVAL", value.trim())?;
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

//! A rate-limited pull-to-push bridge.

use std::any::Any;
use std::time::Duration;

use crate::config::{keywords, parse, parse_interval};
use crate::context::Context;
use crate::element::{CleanupStage, Element, Processing};
use crate::error::ErrorHandler;
use crate::handler::Registrar;
use crate::timer::Timer;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Pulls at most one packet per interval and pushes it downstream.
///
/// The demand clock is a timer rather than a task, so the element imposes
/// its rate even when upstream is saturated.
///
/// Keywords: `INTERVAL` (time between pulls) or `RATE` (pulls per second).
pub struct RatedUnqueue {
    interval: Duration,
    pulls: u64,
    timer: Option<Timer>,
}

impl RatedUnqueue {
    /// A bridge pulling 100 packets per second.
    pub fn new() -> RatedUnqueue {
        RatedUnqueue {
            interval: DEFAULT_INTERVAL,
            pulls: 0,
            timer: None,
        }
    }
}

impl Default for RatedUnqueue {
    fn default() -> Self {
        RatedUnqueue::new()
    }
}

impl Element for RatedUnqueue {
    fn class_name(&self) -> &'static str {
        "RatedUnqueue"
    }

    fn processing(&self) -> Processing {
        Processing::parse(Processing::PULL_TO_PUSH)
    }

    fn configure(&mut self, args: &[String], _errh: &mut ErrorHandler) -> Result<(), String> {
        for (key, value) in keywords(args) {
            match key {
                "INTERVAL" => self.interval = parse_interval(key, value)?,
                "RATE" => {
                    let rate = parse::<u64>(key, value)?;
                    if rate == 0 {
                        return Err("RATE must be at least 1".to_owned());
                    }
                    self.interval = Duration::from_secs_f64(1.0 / rate as f64);
                }
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
        if let Some(packet) = ctx.input(0).pull() {
            self.pulls += 1;
            ctx.output(0).push(packet);
        }
        timer.reschedule_after(self.interval);
    }

    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        reg.add_read::<RatedUnqueue, _>("pulls", |e| e.pulls.to_string());
        reg.add_read::<RatedUnqueue, _>("interval", |e| format!("{:?}", e.interval));
        reg.add_write::<RatedUnqueue, _>("interval", |e, value, _errh| {
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

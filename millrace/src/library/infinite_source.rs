//! A task-driven push source.

use std::any::Any;

use crate::config::{keywords, parse, parse_bool};
use crate::context::Context;
use crate::element::{CleanupStage, Element, PortCount, Processing};
use crate::error::ErrorHandler;
use crate::handler::{Registrar, BUTTON};
use crate::packet::Packet;
use crate::task::Task;

const DEFAULT_LENGTH: usize = 64;

/// Emits copies of a fixed payload from a scheduled task, up to an optional
/// limit.
///
/// Keywords: `DATA` (payload text), `LENGTH` (zero-filled payload size when
/// `DATA` is absent), `LIMIT` (packet count, negative for unlimited),
/// `BURST` (packets per task run), `ACTIVE` (start scheduled or not).
pub struct InfiniteSource {
    data: Vec<u8>,
    limit: i64,
    burst: u32,
    active: bool,
    count: u64,
    task: Option<Task>,
}

impl InfiniteSource {
    /// An unlimited source of 64-byte zero packets.
    pub fn new() -> InfiniteSource {
        InfiniteSource {
            data: vec![0; DEFAULT_LENGTH],
            limit: -1,
            burst: 1,
            active: true,
            count: 0,
            task: None,
        }
    }

    fn exhausted(&self) -> bool {
        self.limit >= 0 && self.count >= self.limit as u64
    }
}

impl Default for InfiniteSource {
    fn default() -> Self {
        InfiniteSource::new()
    }
}

impl Element for InfiniteSource {
    fn class_name(&self) -> &'static str {
        "InfiniteSource"
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
                "DATA" => self.data = value.as_bytes().to_vec(),
                "LENGTH" => self.data = vec![0; parse::<usize>(key, value)?],
                "LIMIT" => self.limit = parse::<i64>(key, value)?,
                "BURST" => {
                    self.burst = parse::<u32>(key, value)?;
                    if self.burst == 0 {
                        return Err("BURST must be at least 1".to_owned());
                    }
                }
                "ACTIVE" => self.active = parse_bool(key, value)?,
                _ => return Err(format!("unknown keyword {:?}", key)),
            }
        }
        Ok(())
    }

    fn initialize(&mut self, ctx: &Context<'_>, _errh: &mut ErrorHandler) -> Result<(), String> {
        let task = ctx.new_task();
        task.initialize(self.active && !self.exhausted());
        self.task = Some(task);
        Ok(())
    }

    fn cleanup(&mut self, stage: CleanupStage) {
        if stage >= CleanupStage::Initialized {
            if let Some(task) = &self.task {
                task.unschedule();
            }
        }
    }

    fn run_task(&mut self, ctx: &Context<'_>, task: &Task) -> bool {
        let mut sent = 0;
        while sent < self.burst && !self.exhausted() {
            let Some(packet) = Packet::from_data(&self.data) else {
                break;
            };
            self.count += 1;
            sent += 1;
            ctx.output(0).push(packet);
        }
        if self.exhausted() {
            task.unschedule();
        } else {
            task.fast_reschedule();
        }
        sent > 0
    }

    fn add_handlers(&self, reg: &mut Registrar<'_>) {
        reg.add_read::<InfiniteSource, _>("count", |e| e.count.to_string());
        reg.add_data::<InfiniteSource, i64>("limit", |e| e.limit, Some(|e, v| e.limit = v));
        reg.add_data::<InfiniteSource, u32>("burst", |e| e.burst, Some(|e, v| e.burst = v.max(1)));
        reg.add_read::<InfiniteSource, _>("active", |e| e.active.to_string());
        reg.add_write::<InfiniteSource, _>("active", |e, value, _errh| {
            e.active = crate::config::parse_bool("ACTIVE", value.trim())?;
            if let Some(task) = &e.task {
                if e.active && !e.exhausted() {
                    task.reschedule();
                } else {
                    task.unschedule();
                }
            }
            Ok(())
        });
        reg.add_write_flagged::<InfiniteSource, _>("reset", BUTTON, |e, _value, _errh| {
            e.count = 0;
            if let Some(task) = &e.task {
                if e.active {
                    task.reschedule();
                }
            }
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

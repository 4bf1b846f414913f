//! Buffered, typed event logging shared by the router core.
//!
//! A [`Registry`] maps stream names to typed [`Logger`]s. All loggers created
//! by one registry share a common [`Instant`] so their event timestamps are
//! mutually comparable. Each logger buffers events and hands batches to its
//! action when the buffer fills or on an explicit [`Logger::flush`].
//!
//! Registries are per-thread; sharing events across threads is the concern of
//! whatever action the stream was bound to.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// The action invoked with each completed batch of events.
///
/// The first argument lower-bounds the timestamp of any event the action may
/// see in the future; the slice holds `(elapsed, event)` pairs in
/// non-decreasing timestamp order.
pub type Action<T> = Box<dyn FnMut(&Duration, &[(Duration, T)])>;

/// A map from stream names to typed loggers anchored at a shared instant.
pub struct Registry {
    time: Instant,
    map: HashMap<String, Box<dyn Any>>,
}

impl Registry {
    /// Creates a registry whose loggers measure time from `time`.
    pub fn new(time: Instant) -> Self {
        Registry {
            time,
            map: HashMap::new(),
        }
    }

    /// Binds `name` to `action`, returning any previously installed stream.
    ///
    /// Existing `Logger` handles for a replaced stream keep writing to the
    /// old action; only loggers obtained after the call see the new one.
    pub fn insert<T: 'static>(&mut self, name: &str, action: Action<T>) -> Option<Box<dyn Any>> {
        let logger = Logger::<T>::new(self.time, action);
        self.map.insert(name.to_owned(), Box::new(logger))
    }

    /// Removes a bound stream, ending it once outstanding handles drop.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Any>> {
        self.map.remove(name)
    }

    /// Retrieves a shared handle to a bound stream, if the name is bound and
    /// the event type matches.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Logger<T>> {
        self.map
            .get(name)
            .and_then(|entry| entry.downcast_ref::<Logger<T>>())
            .cloned()
    }

    /// Flushes every stream of type `T`.
    pub fn flush<T: 'static>(&mut self) {
        for entry in self.map.values() {
            if let Some(logger) = entry.downcast_ref::<Logger<T>>() {
                logger.flush();
            }
        }
    }
}

/// A buffering logger for events of type `T`.
pub struct Logger<T> {
    time: Instant,
    action: Rc<RefCell<Action<T>>>,
    buffer: Rc<RefCell<Vec<(Duration, T)>>>,
}

impl<T> Clone for Logger<T> {
    fn clone(&self) -> Self {
        Logger {
            time: self.time,
            action: Rc::clone(&self.action),
            buffer: Rc::clone(&self.buffer),
        }
    }
}

const BUFFER_CAPACITY: usize = 1024;

impl<T> Logger<T> {
    /// Allocates a shareable logger bound to a batch action.
    pub fn new(time: Instant, action: Action<T>) -> Self {
        Logger {
            time,
            action: Rc::new(RefCell::new(action)),
            buffer: Rc::new(RefCell::new(Vec::with_capacity(BUFFER_CAPACITY))),
        }
    }

    /// Logs an event, stamped now; delivery waits for the next flush.
    pub fn log(&self, event: T) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push((self.time.elapsed(), event));
        if buffer.len() == buffer.capacity() {
            (self.action.borrow_mut())(&self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }

    /// Delivers buffered events and communicates the new lower bound.
    pub fn flush(&self) {
        let mut buffer = self.buffer.borrow_mut();
        (self.action.borrow_mut())(&self.time.elapsed(), &buffer[..]);
        buffer.clear();
    }
}

//! Event types for the core's log streams, and binary capture.
//!
//! Worker threads log dispatch activity through a per-thread
//! [`millrace_logging::Registry`] under the stream name `"millrace"`. The
//! destination is chosen at [`Master`](crate::master::Master) construction
//! via a [`LogHook`]; [`BatchLogger`] adapts a destination to an
//! [`EventWriter`], which frames batches with `bincode` so they can be
//! shipped to a socket or file and replayed with [`EventReader`].

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use millrace_logging::Action;

/// One task dispatch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    /// The dispatching worker thread.
    pub thread: usize,
    /// The element whose task ran.
    pub element: usize,
    /// The hook's "did work" result.
    pub busy: bool,
}

/// One timer fire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    /// The firing worker thread.
    pub thread: usize,
    /// The element whose timer ran.
    pub element: usize,
}

/// An event in the core's log stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// A task dispatch.
    Task(TaskEvent),
    /// A timer fire.
    Timer(TimerEvent),
}

impl From<TaskEvent> for RouterEvent {
    fn from(event: TaskEvent) -> RouterEvent {
        RouterEvent::Task(event)
    }
}

impl From<TimerEvent> for RouterEvent {
    fn from(event: TimerEvent) -> RouterEvent {
        RouterEvent::Timer(event)
    }
}

/// Chooses each worker thread's log destination.
///
/// Called once per worker, on that worker's thread, with the thread index;
/// returning `None` leaves the thread's stream unbound.
pub type LogHook = Arc<dyn Fn(usize) -> Option<Action<RouterEvent>> + Send + Sync>;

/// A decoded capture frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBatch {
    /// Lower bound on the timestamps of all later events.
    pub lower: Duration,
    /// The batch contents, in non-decreasing timestamp order.
    pub events: Vec<(Duration, RouterEvent)>,
}

/// Writes event batches as bincode frames.
pub struct EventWriter<W: Write> {
    stream: W,
}

impl<W: Write> EventWriter<W> {
    /// Wraps a byte sink.
    pub fn new(stream: W) -> EventWriter<W> {
        EventWriter { stream }
    }

    /// Appends one batch frame; errors are reported to the caller as a
    /// plain flag since log capture must never panic the dispatch path.
    pub fn write_batch(&mut self, lower: &Duration, events: &[(Duration, RouterEvent)]) -> bool {
        bincode::serialize_into(&mut self.stream, &(lower, events)).is_ok()
    }
}

/// Reads the frames produced by [`EventWriter`].
pub struct EventReader<R: Read> {
    stream: R,
}

impl<R: Read> EventReader<R> {
    /// Wraps a byte source.
    pub fn new(stream: R) -> EventReader<R> {
        EventReader { stream }
    }

    /// Decodes the next frame, or `None` at end of stream.
    pub fn read_batch(&mut self) -> Option<EventBatch> {
        bincode::deserialize_from::<_, (Duration, Vec<(Duration, RouterEvent)>)>(&mut self.stream)
            .ok()
            .map(|(lower, events)| EventBatch { lower, events })
    }
}

/// Adapts an [`EventWriter`] into a logger action.
pub struct BatchLogger<W: Write> {
    writer: EventWriter<W>,
}

impl<W: Write + 'static> BatchLogger<W> {
    /// Wraps a byte sink.
    pub fn new(stream: W) -> BatchLogger<W> {
        BatchLogger { writer: EventWriter::new(stream) }
    }

    /// Publishes one batch from a logger.
    pub fn publish_batch(&mut self, lower: &Duration, events: &[(Duration, RouterEvent)]) {
        self.writer.write_batch(lower, events);
    }

    /// Consumes the batch logger into an action suitable for
    /// [`millrace_logging::Registry::insert`] or a [`LogHook`].
    pub fn into_action(mut self) -> Action<RouterEvent> {
        Box::new(move |lower, events| self.publish_batch(lower, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_survive_capture() {
        let mut bytes = Vec::new();
        {
            let mut writer = EventWriter::new(&mut bytes);
            let first = vec![
                (
                    Duration::from_millis(1),
                    RouterEvent::Task(TaskEvent { thread: 0, element: 2, busy: true }),
                ),
                (
                    Duration::from_millis(2),
                    RouterEvent::Timer(TimerEvent { thread: 0, element: 1 }),
                ),
            ];
            assert!(writer.write_batch(&Duration::from_millis(3), &first));
            assert!(writer.write_batch(&Duration::from_millis(9), &[]));
        }

        let mut reader = EventReader::new(&bytes[..]);
        let batch = reader.read_batch().unwrap();
        assert_eq!(batch.lower, Duration::from_millis(3));
        assert_eq!(batch.events.len(), 2);
        assert_eq!(
            batch.events[0].1,
            RouterEvent::Task(TaskEvent { thread: 0, element: 2, busy: true })
        );
        let batch = reader.read_batch().unwrap();
        assert!(batch.events.is_empty());
        assert!(reader.read_batch().is_none());
    }

    #[test]
    fn batch_logger_feeds_a_logger() {
        use std::sync::Mutex;

        let bytes: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink(Arc::clone(&bytes));
        let logger = millrace_logging::Logger::new(
            std::time::Instant::now(),
            BatchLogger::new(sink).into_action(),
        );
        logger.log(RouterEvent::Task(TaskEvent { thread: 1, element: 0, busy: false }));
        logger.flush();

        let bytes = bytes.lock().unwrap().clone();
        let mut reader = EventReader::new(&bytes[..]);
        let batch = reader.read_batch().unwrap();
        assert_eq!(batch.events.len(), 1);
    }

    struct SharedSink(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

//! The core element library.
//!
//! Infrastructure elements every configuration ends up needing: sources,
//! sinks, queues, fan-out. Protocol work belongs to external element
//! collections; these exist so the core's own machinery — tasks, timers,
//! notifiers, handlers — has first-party users and so test configurations
//! can be built from stock parts.

pub mod counter;
pub mod discard;
pub mod idle;
pub mod infinite_source;
pub mod queue;
pub mod rated_unqueue;
pub mod tee;
pub mod timed_source;

pub use counter::Counter;
pub use discard::Discard;
pub use idle::Idle;
pub use infinite_source::InfiniteSource;
pub use queue::Queue;
pub use rated_unqueue::RatedUnqueue;
pub use tee::Tee;
pub use timed_source::TimedSource;

use crate::builder::ClassRegistry;

/// Registers every library class in `registry`.
pub fn register_defaults(registry: &mut ClassRegistry) {
    registry.register("Counter", || Box::new(Counter::new()));
    registry.register("Discard", || Box::new(Discard::new()));
    registry.register("Idle", || Box::new(Idle::new()));
    registry.register("InfiniteSource", || Box::new(InfiniteSource::new()));
    registry.register("Queue", || Box::new(Queue::new()));
    registry.register("RatedUnqueue", || Box::new(RatedUnqueue::new()));
    registry.register("Tee", || Box::new(Tee::new()));
    registry.register("TimedSource", || Box::new(TimedSource::new()));
}

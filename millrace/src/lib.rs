//! Millrace is a toolkit for building modular packet routers.
//!
//! A router is a directed graph of small processing **elements** connected by
//! typed **ports**. Elements declare how many ports they have and whether each
//! is *push* (the upstream element drives a packet into the downstream hook)
//! or *pull* (the downstream element demands a packet from the upstream hook);
//! ports declared *agnostic* are resolved from the graph shape at
//! initialization. Packets move as reference-counted buffers with headroom
//! and tailroom for in-place encapsulation, cooperative [tasks](task::Task)
//! and [timers](timer::Timer) drive the graph on worker threads, and named
//! [handlers](handler) expose each element for inspection and reconfiguration
//! at run time.
//!
//! The code is organized in crates and modules that are meant to depend as
//! little as possible on each other.
//!
//! **Buffers**: the [`millrace_bytes`] crate provides the reference-counted
//! allocations underneath [`packet::Packet`].
//!
//! **Logging**: the [`millrace_logging`] crate provides named, typed event
//! streams; the [`logging`] module defines the core's event types.
//!
//! **Graph construction**: [`builder::RouterBuilder`] assembles elements and
//! connections and brings the graph to a runnable [`router::Router`] under a
//! [`master::Master`] that owns the worker threads.
//!
//! # Examples
//!
//! The following builds a three-element pipeline, lets it run, and inspects
//! it through handlers.
//!
//! ```
//! use millrace::{Config, execute};
//!
//! let (master, router) = execute(Config::thread(), |builder| {
//!     builder.add_element("src", "InfiniteSource", &["DATA abc", "LIMIT 3"]);
//!     builder.add_element("cnt", "Counter", &[]);
//!     builder.add_element("sink", "Discard", &[]);
//!     builder.connect("src", 0, "cnt", 0);
//!     builder.connect("cnt", 0, "sink", 0);
//! }).unwrap();
//!
//! while router.call_read("cnt.count").unwrap().trim() != "3" {
//!     std::thread::yield_now();
//! }
//!
//! master.please_stop();
//! master.join();
//! ```

#![forbid(missing_docs)]

pub use execute::{execute, execute_directly, Config};
#[cfg(feature = "getopts")]
pub use execute::execute_from_args;

/// Re-export of the `millrace_bytes` crate.
pub mod bytes {
    pub use millrace_bytes::*;
}

/// Re-export of the `millrace_logging` crate.
pub mod logging_core {
    pub use millrace_logging::*;
}

pub mod builder;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod execute;
pub mod flow;
pub mod handler;
pub mod library;
pub mod logging;
pub mod master;
pub mod notifier;
pub mod packet;
pub mod router;
pub mod task;
pub mod timer;

mod thread;

#[cfg(test)]
mod test_support;

pub use context::Context;
pub use element::{CastHandle, CleanupStage, Element, PortCount, PortKind, Processing};
pub use error::ErrorHandler;
pub use flow::FlowCode;
pub use master::Master;
pub use notifier::Signal;
pub use packet::{Packet, WritablePacket};
pub use router::Router;
pub use task::Task;
pub use timer::Timer;

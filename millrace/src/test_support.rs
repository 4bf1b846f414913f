//! Small fixtures shared by the crate's unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, AtomicU8};
use std::sync::{Arc, RwLock, Weak};

use crate::router::{Router, RouterState};

/// A running router with no elements, no master, and no connections; enough
/// for exercising element hooks that only need a [`Context`](crate::Context).
pub(crate) fn empty_router() -> Arc<Router> {
    let router = Arc::new_cyclic(|weak| Router {
        weak_self: weak.clone(),
        master: Weak::new(),
        elements: Vec::new(),
        name_index: HashMap::new(),
        handlers: RwLock::new(Vec::new()),
        global_handlers: BTreeMap::new(),
        class_names: Vec::new(),
        quiesce: RwLock::new(()),
        state: AtomicU8::new(0),
        stopper: AtomicI32::new(0),
    });
    router.set_state(RouterState::Running);
    router
}

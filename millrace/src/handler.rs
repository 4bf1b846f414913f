//! Named read/write entry points on elements.
//!
//! Handlers are the router's inspection and reconfiguration surface: every
//! element exposes a table of named callables, each readable, writable, or
//! both, plus flags describing how callers should treat it. The router
//! resolves `"element.handler"` names and drives the calls; this module
//! defines the handler objects and the [`Registrar`] elements use inside
//! [`add_handlers`](crate::element::Element::add_handlers).

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::element::Element;
use crate::error::ErrorHandler;
use crate::router::Router;

/// Handler supports read operations.
pub const OP_READ: u32 = 1 << 0;
/// Handler supports write operations.
pub const OP_WRITE: u32 = 1 << 1;
/// Results and values are raw text: no trimming, no quoting.
pub const RAW: u32 = 1 << 2;
/// The read value changes rarely.
pub const CALM: u32 = 1 << 3;
/// The read is expensive to call.
pub const EXPENSIVE: u32 = 1 << 4;
/// Calls quiesce all other router processing first.
pub const EXCLUSIVE: u32 = 1 << 5;
/// The write ignores its data; writing triggers an action.
pub const BUTTON: u32 = 1 << 6;
/// The value is boolean.
pub const CHECKBOX: u32 = 1 << 7;
/// The read hook consumes a parameter string.
pub const READ_PARAM: u32 = 1 << 8;
/// First flag bit free for element-specific use.
pub const USER_FLAG_SHIFT: u32 = 14;
/// First uninterpreted element-specific flag.
pub const USER_FLAG_0: u32 = 1 << USER_FLAG_SHIFT;

/// A handler's identity: name, flags, and two opaque user-data words.
pub struct HandlerInfo {
    /// The handler's name, unique per element.
    pub name: String,
    /// Bitwise OR of the flag constants in this module.
    pub flags: u32,
    /// First opaque user-data word.
    pub user1: usize,
    /// Second opaque user-data word.
    pub user2: usize,
}

type ReadHook = Box<dyn Fn(&dyn Element, &str, &HandlerInfo) -> String + Send + Sync>;
type WriteHook =
    Box<dyn Fn(&mut dyn Element, &str, &HandlerInfo, &mut ErrorHandler) -> Result<(), String> + Send + Sync>;

/// A named read/write entry point on one element.
pub struct Handler {
    info: HandlerInfo,
    read: Option<ReadHook>,
    write: Option<WriteHook>,
}

impl Handler {
    fn new(name: &str) -> Handler {
        Handler {
            info: HandlerInfo { name: name.to_owned(), flags: 0, user1: 0, user2: 0 },
            read: None,
            write: None,
        }
    }

    /// The handler's name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The handler's flag word.
    pub fn flags(&self) -> u32 {
        self.info.flags
    }

    /// True when the handler supports reads.
    pub fn readable(&self) -> bool {
        self.info.flags & OP_READ != 0
    }

    /// True when the handler supports writes.
    pub fn writable(&self) -> bool {
        self.info.flags & OP_WRITE != 0
    }

    /// True when results pass through untouched.
    pub fn raw(&self) -> bool {
        self.info.flags & RAW != 0
    }

    /// True when calls must quiesce other router processing.
    pub fn exclusive(&self) -> bool {
        self.info.flags & EXCLUSIVE != 0
    }

    /// True when writes ignore their data.
    pub fn button(&self) -> bool {
        self.info.flags & BUTTON != 0
    }

    /// Invokes the read hook. `param` reaches only hooks registered with
    /// [`READ_PARAM`]; the rest ignore it.
    pub fn call_read(&self, element: &dyn Element, param: &str) -> Result<String, String> {
        match &self.read {
            Some(hook) => Ok(hook(element, param, &self.info)),
            None => Err(format!("handler {:?} not readable", self.info.name)),
        }
    }

    /// Invokes the write hook.
    pub fn call_write(
        &self,
        element: &mut dyn Element,
        value: &str,
        errh: &mut ErrorHandler,
    ) -> Result<(), String> {
        match &self.write {
            Some(hook) => hook(element, value, &self.info, errh),
            None => Err(format!("handler {:?} not writable", self.info.name)),
        }
    }

    /// One-line description used by the built-in `handlers` handler.
    pub fn describe(&self) -> String {
        let mut letters = String::new();
        if self.readable() {
            letters.push('r');
        }
        if self.writable() {
            letters.push('w');
        }
        if self.exclusive() {
            letters.push('!');
        }
        format!("{}\t{}", self.info.name, letters)
    }
}

/// The registration surface handed to
/// [`Element::add_handlers`](crate::element::Element::add_handlers).
///
/// Registering a read and a write under the same name produces one handler
/// supporting both operations.
pub struct Registrar<'a> {
    table: &'a mut BTreeMap<String, Handler>,
}

impl<'a> Registrar<'a> {
    pub(crate) fn new(table: &'a mut BTreeMap<String, Handler>) -> Registrar<'a> {
        Registrar { table }
    }

    fn entry(&mut self, name: &str) -> &mut Handler {
        self.table
            .entry(name.to_owned())
            .or_insert_with(|| Handler::new(name))
    }

    /// Registers a read handler.
    pub fn add_read<E, F>(&mut self, name: &str, hook: F)
    where
        E: Element + 'static,
        F: Fn(&E) -> String + Send + Sync + 'static,
    {
        self.add_read_flagged::<E, F>(name, 0, hook)
    }

    /// Registers a read handler with extra flags.
    pub fn add_read_flagged<E, F>(&mut self, name: &str, extra_flags: u32, hook: F)
    where
        E: Element + 'static,
        F: Fn(&E) -> String + Send + Sync + 'static,
    {
        let handler = self.entry(name);
        handler.info.flags |= OP_READ | extra_flags;
        handler.read = Some(Box::new(move |element, _param, _info| {
            element
                .as_any()
                .downcast_ref::<E>()
                .map(&hook)
                .unwrap_or_default()
        }));
    }

    /// Registers a read handler whose hook takes a parameter string.
    pub fn add_read_param<E, F>(&mut self, name: &str, hook: F)
    where
        E: Element + 'static,
        F: Fn(&E, &str) -> String + Send + Sync + 'static,
    {
        let handler = self.entry(name);
        handler.info.flags |= OP_READ | READ_PARAM;
        handler.read = Some(Box::new(move |element, param, _info| {
            element
                .as_any()
                .downcast_ref::<E>()
                .map(|element| hook(element, param))
                .unwrap_or_default()
        }));
    }

    /// Registers a write handler.
    pub fn add_write<E, F>(&mut self, name: &str, hook: F)
    where
        E: Element + 'static,
        F: Fn(&mut E, &str, &mut ErrorHandler) -> Result<(), String> + Send + Sync + 'static,
    {
        self.add_write_flagged::<E, F>(name, 0, hook)
    }

    /// Registers a write handler with extra flags.
    pub fn add_write_flagged<E, F>(&mut self, name: &str, extra_flags: u32, hook: F)
    where
        E: Element + 'static,
        F: Fn(&mut E, &str, &mut ErrorHandler) -> Result<(), String> + Send + Sync + 'static,
    {
        let handler = self.entry(name);
        handler.info.flags |= OP_WRITE | extra_flags;
        handler.write = Some(Box::new(move |element, value, _info, errh| {
            match element.as_any_mut().downcast_mut::<E>() {
                Some(element) => hook(element, value, errh),
                None => Err("handler bound to a different element type".to_owned()),
            }
        }));
    }

    /// Exposes a numeric or otherwise printable field as a handler: readable
    /// always, writable when `set` is provided.
    pub fn add_data<E, T>(&mut self, name: &str, get: fn(&E) -> T, set: Option<fn(&mut E, T)>)
    where
        E: Element + 'static,
        T: Display + FromStr + 'static,
        <T as FromStr>::Err: Display,
    {
        self.add_read::<E, _>(name, move |element| get(element).to_string());
        if let Some(set) = set {
            self.add_write::<E, _>(name, move |element, value, _errh| {
                let parsed = value
                    .trim()
                    .parse::<T>()
                    .map_err(|e| format!("expected {}: {}", std::any::type_name::<T>(), e))?;
                set(element, parsed);
                Ok(())
            });
        }
    }

    /// Sets the opaque user-data words of an already registered handler.
    pub fn set_user_data(&mut self, name: &str, user1: usize, user2: usize) {
        if let Some(handler) = self.table.get_mut(name) {
            handler.info.user1 = user1;
            handler.info.user2 = user2;
        }
    }

    /// True when a handler is already registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// The names registered so far.
    pub fn names(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    /// Registers an untyped read handler; used for the per-element
    /// built-ins, whose values do not depend on the element state.
    pub(crate) fn add_read_any<F>(&mut self, name: &str, extra_flags: u32, hook: F)
    where
        F: Fn(&dyn Element, &str, &HandlerInfo) -> String + Send + Sync + 'static,
    {
        let handler = self.entry(name);
        handler.info.flags |= OP_READ | extra_flags;
        handler.read = Some(Box::new(hook));
    }
}

type GlobalReadHook = Box<dyn Fn(&Router) -> String + Send + Sync>;
type GlobalWriteHook =
    Box<dyn Fn(&Router, &str, &mut ErrorHandler) -> Result<(), String> + Send + Sync>;

/// A router-level handler, not attached to any element.
pub struct GlobalHandler {
    name: &'static str,
    flags: u32,
    read: Option<GlobalReadHook>,
    write: Option<GlobalWriteHook>,
}

impl GlobalHandler {
    pub(crate) fn read(name: &'static str, hook: GlobalReadHook) -> GlobalHandler {
        GlobalHandler { name, flags: OP_READ, read: Some(hook), write: None }
    }

    pub(crate) fn write(name: &'static str, flags: u32, hook: GlobalWriteHook) -> GlobalHandler {
        GlobalHandler { name, flags: OP_WRITE | flags, read: None, write: Some(hook) }
    }

    /// The handler's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The handler's flag word.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// True when results pass through untouched.
    pub fn raw(&self) -> bool {
        self.flags & RAW != 0
    }

    pub(crate) fn call_read(&self, router: &Router) -> Result<String, String> {
        match &self.read {
            Some(hook) => Ok(hook(router)),
            None => Err(format!("handler {:?} not readable", self.name)),
        }
    }

    pub(crate) fn call_write(
        &self,
        router: &Router,
        value: &str,
        errh: &mut ErrorHandler,
    ) -> Result<(), String> {
        match &self.write {
            Some(hook) => hook(router, value, errh),
            None => Err(format!("handler {:?} not writable", self.name)),
        }
    }
}

pub(crate) type HandlerTable = BTreeMap<String, Handler>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Probe {
        value: u64,
    }

    impl Element for Probe {
        fn class_name(&self) -> &'static str {
            "Probe"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn registered(probe_value: u64) -> (HandlerTable, Probe) {
        let mut table = HandlerTable::new();
        let mut reg = Registrar::new(&mut table);
        reg.add_read::<Probe, _>("value", |p| p.value.to_string());
        reg.add_write::<Probe, _>("value", |p, v, _| {
            p.value = v.trim().parse().map_err(|_| "expected u64".to_owned())?;
            Ok(())
        });
        reg.add_write_flagged::<Probe, _>("reset", BUTTON, |p, _, _| {
            p.value = 0;
            Ok(())
        });
        reg.add_data::<Probe, u64>("data", |p| p.value, Some(|p, v| p.value = v));
        (table, Probe { value: probe_value })
    }

    #[test]
    fn read_write_share_one_handler() {
        let (table, mut probe) = registered(5);
        let handler = &table["value"];
        assert!(handler.readable() && handler.writable());
        assert_eq!(handler.call_read(&probe, "").unwrap(), "5");

        let mut errh = ErrorHandler::new();
        handler.call_write(&mut probe, "12", &mut errh).unwrap();
        assert_eq!(handler.call_read(&probe, "").unwrap(), "12");
    }

    #[test]
    fn button_handler_flags() {
        let (table, mut probe) = registered(5);
        let handler = &table["reset"];
        assert!(handler.button() && handler.writable() && !handler.readable());
        assert!(handler.call_read(&probe, "").is_err());
        let mut errh = ErrorHandler::new();
        handler.call_write(&mut probe, "ignored", &mut errh).unwrap();
        assert_eq!(probe.value, 0);
    }

    #[test]
    fn data_handler_parses_and_reports() {
        let (table, mut probe) = registered(1);
        let handler = &table["data"];
        let mut errh = ErrorHandler::new();
        handler.call_write(&mut probe, " 44 ", &mut errh).unwrap();
        assert_eq!(probe.value, 44);
        assert!(handler.call_write(&mut probe, "nope", &mut errh).is_err());
        assert_eq!(probe.value, 44);
    }

    #[test]
    fn parameterized_reads_see_their_argument() {
        let mut table = HandlerTable::new();
        let mut reg = Registrar::new(&mut table);
        reg.add_read_param::<Probe, _>("value_in", |p, param| {
            format!("{} {}", p.value, param)
        });
        let probe = Probe { value: 3 };
        let handler = &table["value_in"];
        assert_ne!(handler.flags() & READ_PARAM, 0);
        assert_eq!(handler.call_read(&probe, "hex").unwrap(), "3 hex");
        assert_eq!(handler.call_read(&probe, "").unwrap(), "3 ");
    }

    #[test]
    fn describe_lists_capabilities() {
        let (table, _probe) = registered(0);
        assert_eq!(table["value"].describe(), "value\trw");
        assert_eq!(table["reset"].describe(), "reset\tw");
    }
}

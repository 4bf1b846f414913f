//! Graph assembly and the configuration-time phases.
//!
//! A [`RouterBuilder`] collects element declarations and connections, then
//! [`Master::install`](crate::master::Master::install) drives it through the
//! bring-up phases: instantiate, configure, check hookup, resolve push/pull
//! orientations, initialize. Failures at any phase collect into one report,
//! already-configured elements are cleaned up, and the install as a whole is
//! all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, AtomicU8};
use std::sync::{Arc, Mutex, RwLock};

use itertools::Itertools;

use crate::element::{CleanupStage, Element, PortCode, PortKind};
use crate::error::ErrorHandler;
use crate::handler::{GlobalHandler, Handler, Registrar, BUTTON, CALM};
use crate::master::MasterShared;
use crate::router::{ElementSlot, Router, RouterState};

type Ctor = Box<dyn Fn() -> Box<dyn Element> + Send + Sync>;

/// A table of element classes instantiable by name.
pub struct ClassRegistry {
    ctors: BTreeMap<String, Ctor>,
}

impl ClassRegistry {
    /// An empty registry.
    pub fn new() -> ClassRegistry {
        ClassRegistry { ctors: BTreeMap::new() }
    }

    /// A registry pre-populated with the core element library.
    pub fn with_default_classes() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        crate::library::register_defaults(&mut registry);
        registry
    }

    /// Registers a class constructor under `name`.
    pub fn register<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Box<dyn Element> + Send + Sync + 'static,
    {
        self.ctors.insert(name.to_owned(), Box::new(ctor));
    }

    /// Instantiates a class by name.
    pub fn create(&self, name: &str) -> Option<Box<dyn Element>> {
        self.ctors.get(name).map(|ctor| ctor())
    }

    /// All registered class names, sorted.
    pub fn class_names(&self) -> Vec<String> {
        self.ctors.keys().cloned().collect()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        ClassRegistry::with_default_classes()
    }
}

struct PendingElement {
    name: String,
    class: String,
    args: Vec<String>,
    instance: Option<Box<dyn Element>>,
    thread: usize,
}

struct PendingConnection {
    from: String,
    from_port: usize,
    to: String,
    to_port: usize,
}

/// An element graph under assembly.
///
/// The builder performs no parsing: the configuration-language layer (or
/// test code) supplies class names, pre-split argument lists, and connection
/// endpoints.
pub struct RouterBuilder {
    registry: Arc<ClassRegistry>,
    elements: Vec<PendingElement>,
    connections: Vec<PendingConnection>,
}

impl RouterBuilder {
    /// A builder using the default class registry.
    pub fn new() -> RouterBuilder {
        RouterBuilder::with_registry(ClassRegistry::with_default_classes())
    }

    /// A builder using a caller-supplied registry.
    pub fn with_registry(registry: ClassRegistry) -> RouterBuilder {
        RouterBuilder {
            registry: Arc::new(registry),
            elements: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Declares an element instance of a registered class.
    pub fn add_element(&mut self, name: &str, class: &str, args: &[&str]) -> &mut Self {
        self.elements.push(PendingElement {
            name: name.to_owned(),
            class: class.to_owned(),
            args: args.iter().map(|s| (*s).to_owned()).collect(),
            instance: None,
            thread: 0,
        });
        self
    }

    /// Declares an element instance supplied directly, bypassing the
    /// registry.
    pub fn add_instance(&mut self, name: &str, element: Box<dyn Element>, args: &[&str]) -> &mut Self {
        let class = element.class_name().to_owned();
        self.elements.push(PendingElement {
            name: name.to_owned(),
            class,
            args: args.iter().map(|s| (*s).to_owned()).collect(),
            instance: Some(element),
            thread: 0,
        });
        self
    }

    /// Connects output `from_port` of `from` to input `to_port` of `to`.
    pub fn connect(&mut self, from: &str, from_port: usize, to: &str, to_port: usize) -> &mut Self {
        self.connections.push(PendingConnection {
            from: from.to_owned(),
            from_port,
            to: to.to_owned(),
            to_port,
        });
        self
    }

    /// Assigns an element to a worker thread; the default is thread 0.
    pub fn assign_thread(&mut self, name: &str, thread: usize) -> &mut Self {
        if let Some(pending) = self.elements.iter_mut().find(|e| e.name == name) {
            pending.thread = thread;
        }
        self
    }

    /// Runs the bring-up phases and produces a runnable router.
    pub(crate) fn build(self, master: &Arc<MasterShared>) -> Result<Arc<Router>, String> {
        let mut errh = ErrorHandler::new();
        let registry = Arc::clone(&self.registry);
        let nthreads = master.nthreads();

        // Instantiate and index.
        let mut name_index: HashMap<String, usize> = HashMap::new();
        let mut instances: Vec<Box<dyn Element>> = Vec::new();
        let mut stages: Vec<CleanupStage> = Vec::new();
        let mut declared: Vec<PendingElement> = Vec::new();
        for mut pending in self.elements {
            if name_index.contains_key(&pending.name) {
                errh.error(format!("duplicate element name {:?}", pending.name));
                continue;
            }
            if pending.thread >= nthreads {
                errh.error(format!(
                    "{}: assigned to thread {} but only {} exist",
                    pending.name, pending.thread, nthreads
                ));
                pending.thread = 0;
            }
            let instance = match pending.instance.take() {
                Some(instance) => instance,
                None => match registry.create(&pending.class) {
                    Some(instance) => instance,
                    None => {
                        errh.error(format!(
                            "{}: unknown element class {:?}",
                            pending.name, pending.class
                        ));
                        continue;
                    }
                },
            };
            name_index.insert(pending.name.clone(), instances.len());
            instances.push(instance);
            stages.push(CleanupStage::New);
            declared.push(pending);
        }
        errh.result()?;

        // Resolve connections to indices.
        let mut conns: Vec<((usize, usize), (usize, usize))> = Vec::new();
        for connection in &self.connections {
            let from = name_index.get(&connection.from).copied();
            let to = name_index.get(&connection.to).copied();
            match (from, to) {
                (Some(from), Some(to)) => {
                    conns.push(((from, connection.from_port), (to, connection.to_port)));
                }
                _ => errh.error(format!(
                    "connection {}[{}] -> [{}]{} names an unknown element",
                    connection.from, connection.from_port, connection.to_port, connection.to
                )),
            }
        }
        for dup in conns.iter().duplicates() {
            let ((se, sp), (de, dp)) = *dup;
            errh.error(format!(
                "duplicate connection {}[{}] -> [{}]{}",
                declared[se].name, sp, dp, declared[de].name
            ));
        }
        errh.result()?;

        // Configure, in declaration order.
        for (index, instance) in instances.iter_mut().enumerate() {
            errh.set_context(Some(format!(
                "{} ({})",
                declared[index].name, declared[index].class
            )));
            match instance.configure(&declared[index].args, &mut errh) {
                Ok(()) => stages[index] = CleanupStage::Configured,
                Err(message) => {
                    stages[index] = CleanupStage::ConfigureFailed;
                    errh.error(message);
                }
            }
        }
        errh.set_context(None);
        if errh.failed() {
            cleanup_instances(&mut instances, &stages);
            return Err(errh.report().unwrap_or_default());
        }

        // Fix port counts from the connections actually used.
        let n = instances.len();
        let mut ninputs = vec![0usize; n];
        let mut noutputs = vec![0usize; n];
        for ((se, sp), (de, dp)) in &conns {
            noutputs[*se] = noutputs[*se].max(sp + 1);
            ninputs[*de] = ninputs[*de].max(dp + 1);
        }
        for index in 0..n {
            let pc = instances[index].port_count();
            ninputs[index] = ninputs[index].max(pc.min_inputs());
            noutputs[index] = noutputs[index].max(pc.min_outputs());
            if !pc.allows_inputs(ninputs[index]) {
                errh.error(format!(
                    "{}: {} input ports used, outside the declared range",
                    declared[index].name, ninputs[index]
                ));
            }
            if !pc.allows_outputs(noutputs[index]) {
                errh.error(format!(
                    "{}: {} output ports used, outside the declared range",
                    declared[index].name, noutputs[index]
                ));
            }
        }
        errh.result().map_err(|e| {
            cleanup_instances(&mut instances, &stages);
            e
        })?;

        // Resolve push/pull orientations.
        let names: Vec<String> = declared.iter().map(|d| d.name.clone()).collect();
        let flows: Vec<_> = instances.iter().map(|i| i.flow_code()).collect();
        let decl_inputs: Vec<Vec<PortCode>> = instances
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let processing = instance.processing();
                (0..ninputs[index]).map(|port| processing.input(port)).collect()
            })
            .collect();
        let decl_outputs: Vec<Vec<PortCode>> = instances
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let processing = instance.processing();
                (0..noutputs[index]).map(|port| processing.output(port)).collect()
            })
            .collect();
        let (input_kinds, output_kinds) = resolve_processing(
            &decl_inputs,
            &decl_outputs,
            &conns,
            &flows,
            &names,
            &mut errh,
        );

        // Hookup checks that depend on orientation.
        check_hookup(
            &conns,
            &ninputs,
            &noutputs,
            &input_kinds,
            &output_kinds,
            &names,
            &mut errh,
        );
        if errh.failed() {
            cleanup_instances(&mut instances, &stages);
            return Err(errh.report().unwrap_or_default());
        }

        // Handler tables: element-declared handlers first, then built-ins
        // for any name still free.
        let mut tables: Vec<BTreeMap<String, Arc<Handler>>> = Vec::with_capacity(n);
        for index in 0..n {
            let mut table = BTreeMap::new();
            {
                let mut registrar = Registrar::new(&mut table);
                instances[index].add_handlers(&mut registrar);
                add_builtin_handlers(
                    &mut registrar,
                    &declared[index],
                    index,
                    &conns,
                    &names,
                    ninputs[index],
                    noutputs[index],
                    &input_kinds[index],
                    &output_kinds[index],
                );
            }
            tables.push(table.into_iter().map(|(k, v)| (k, Arc::new(v))).collect());
        }

        // Freeze the graph.
        let mut slots = Vec::with_capacity(n);
        for (index, instance) in instances.into_iter().enumerate() {
            let flow = instance.flow_code();
            let mut input_peer = vec![None; ninputs[index]];
            let mut output_peers = vec![Vec::new(); noutputs[index]];
            for ((se, sp), (de, dp)) in &conns {
                if *se == index {
                    output_peers[*sp].push((*de, *dp));
                }
                if *de == index && input_peer[*dp].is_none() {
                    input_peer[*dp] = Some((*se, *sp));
                }
            }
            slots.push(ElementSlot {
                name: declared[index].name.clone(),
                class: declared[index].class.clone(),
                args: declared[index].args.clone(),
                element: Mutex::new(instance),
                home_thread: declared[index].thread,
                flow,
                ninputs: ninputs[index],
                noutputs: noutputs[index],
                input_kinds: input_kinds[index].clone(),
                output_kinds: output_kinds[index].clone(),
                input_peer,
                output_peers,
                cleanup_stage: AtomicU8::new(stages[index].as_u8()),
            });
        }

        let router = Arc::new_cyclic(|weak| Router {
            weak_self: weak.clone(),
            master: Arc::downgrade(master),
            elements: slots,
            name_index,
            handlers: RwLock::new(tables),
            global_handlers: global_handlers(),
            class_names: registry.class_names(),
            quiesce: RwLock::new(()),
            state: AtomicU8::new(0),
            stopper: AtomicI32::new(0),
        });
        router.set_state(RouterState::Configured);

        // Initialize, in declaration order.
        router.set_state(RouterState::Initialized);
        for index in 0..router.nelements() {
            let slot = &router.elements[index];
            errh.set_context(Some(format!("{} ({})", slot.name, slot.class)));
            let result = {
                let mut guard = slot.element.lock().expect("poisoned element lock");
                let ctx = crate::context::Context::new(&router, index);
                guard.initialize(&ctx, &mut errh)
            };
            match result {
                Ok(()) => slot.set_stage(CleanupStage::Initialized),
                Err(message) => {
                    slot.set_stage(CleanupStage::InitializeFailed);
                    errh.error(message);
                }
            }
            if errh.failed() {
                break;
            }
        }
        errh.set_context(None);
        if errh.failed() {
            router.teardown();
            return Err(errh.report().unwrap_or_default());
        }

        for slot in &router.elements {
            slot.set_stage(CleanupStage::Running);
        }
        router.set_state(RouterState::Running);
        Ok(router)
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        RouterBuilder::new()
    }
}

fn cleanup_instances(instances: &mut [Box<dyn Element>], stages: &[CleanupStage]) {
    for (instance, stage) in instances.iter_mut().zip(stages).rev() {
        instance.cleanup(*stage);
    }
}

/// Assigns an orientation to every port by fixed-point propagation.
///
/// Declared-push and declared-pull ports seed the iteration; orientations
/// spread across connections (both endpoints match) and across agnostic
/// elements (an agnostic input matches the agnostic outputs its flow code
/// reaches). Ports still undecided at the fixed point become push.
fn resolve_processing(
    decl_inputs: &[Vec<PortCode>],
    decl_outputs: &[Vec<PortCode>],
    conns: &[((usize, usize), (usize, usize))],
    flows: &[crate::flow::FlowCode],
    names: &[String],
    errh: &mut ErrorHandler,
) -> (Vec<Vec<PortKind>>, Vec<Vec<PortKind>>) {
    let seed = |code: &PortCode| match code {
        PortCode::Push => Some(PortKind::Push),
        PortCode::Pull => Some(PortKind::Pull),
        PortCode::Agnostic => None,
    };
    let mut inputs: Vec<Vec<Option<PortKind>>> = decl_inputs
        .iter()
        .map(|codes| codes.iter().map(seed).collect())
        .collect();
    let mut outputs: Vec<Vec<Option<PortKind>>> = decl_outputs
        .iter()
        .map(|codes| codes.iter().map(seed).collect())
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for ((se, sp), (de, dp)) in conns {
            match (outputs[*se][*sp], inputs[*de][*dp]) {
                (Some(kind), None) => {
                    inputs[*de][*dp] = Some(kind);
                    changed = true;
                }
                (None, Some(kind)) => {
                    outputs[*se][*sp] = Some(kind);
                    changed = true;
                }
                _ => {}
            }
        }
        for element in 0..inputs.len() {
            for input in 0..inputs[element].len() {
                if decl_inputs[element][input] != PortCode::Agnostic {
                    continue;
                }
                for output in 0..outputs[element].len() {
                    if decl_outputs[element][output] != PortCode::Agnostic
                        || !flows[element].reachable(input, output)
                    {
                        continue;
                    }
                    match (inputs[element][input], outputs[element][output]) {
                        (Some(kind), None) => {
                            outputs[element][output] = Some(kind);
                            changed = true;
                        }
                        (None, Some(kind)) => {
                            inputs[element][input] = Some(kind);
                            changed = true;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    // Undecided ports prefer push.
    let inputs: Vec<Vec<PortKind>> = inputs
        .into_iter()
        .map(|ports| ports.into_iter().map(|kind| kind.unwrap_or(PortKind::Push)).collect())
        .collect();
    let outputs: Vec<Vec<PortKind>> = outputs
        .into_iter()
        .map(|ports| ports.into_iter().map(|kind| kind.unwrap_or(PortKind::Push)).collect())
        .collect();

    for ((se, sp), (de, dp)) in conns {
        if outputs[*se][*sp] != inputs[*de][*dp] {
            errh.error(format!(
                "{}[{}] is {:?} but {}[{}] is {:?}",
                names[*se], sp, outputs[*se][*sp], names[*de], dp, inputs[*de][*dp]
            ));
        }
    }

    (inputs, outputs)
}

/// Connectivity checks that need resolved orientations.
fn check_hookup(
    conns: &[((usize, usize), (usize, usize))],
    ninputs: &[usize],
    noutputs: &[usize],
    input_kinds: &[Vec<PortKind>],
    output_kinds: &[Vec<PortKind>],
    names: &[String],
    errh: &mut ErrorHandler,
) {
    let n = ninputs.len();
    let mut in_degree: Vec<Vec<usize>> = (0..n).map(|e| vec![0; ninputs[e]]).collect();
    let mut out_degree: Vec<Vec<usize>> = (0..n).map(|e| vec![0; noutputs[e]]).collect();
    for ((se, sp), (de, dp)) in conns {
        out_degree[*se][*sp] += 1;
        in_degree[*de][*dp] += 1;
    }
    for element in 0..n {
        for (port, &degree) in in_degree[element].iter().enumerate() {
            if degree == 0 {
                errh.error(format!("{}: input {} not connected", names[element], port));
            } else if degree > 1 && input_kinds[element][port] == PortKind::Pull {
                errh.error(format!(
                    "{}: pull input {} has {} connections, wants exactly one",
                    names[element], port, degree
                ));
            }
        }
        for (port, &degree) in out_degree[element].iter().enumerate() {
            if degree == 0 {
                errh.error(format!("{}: output {} not connected", names[element], port));
            } else if degree > 1 && output_kinds[element][port] == PortKind::Push {
                errh.error(format!(
                    "{}: push output {} has {} connections, wants exactly one",
                    names[element], port, degree
                ));
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn add_builtin_handlers(
    registrar: &mut Registrar<'_>,
    declared: &PendingElement,
    index: usize,
    conns: &[((usize, usize), (usize, usize))],
    names: &[String],
    ninputs: usize,
    noutputs: usize,
    input_kinds: &[PortKind],
    output_kinds: &[PortKind],
) {
    let config = declared.args.join(", ");
    let class = declared.class.clone();
    let name = declared.name.clone();

    let mut ports = format!("{} inputs, {} outputs\n", ninputs, noutputs);
    for port in 0..ninputs {
        let kind = kind_word(input_kinds[port]);
        let from: Vec<String> = conns
            .iter()
            .filter(|((_, _), (de, dp))| *de == index && *dp == port)
            .map(|((se, sp), _)| format!("{}[{}]", names[*se], sp))
            .collect();
        ports.push_str(&format!("input {}: {} from {}\n", port, kind, from.join(", ")));
    }
    for port in 0..noutputs {
        let kind = kind_word(output_kinds[port]);
        let to: Vec<String> = conns
            .iter()
            .filter(|((se, sp), (_, _))| *se == index && *sp == port)
            .map(|(_, (de, dp))| format!("{}[{}]", names[*de], dp))
            .collect();
        ports.push_str(&format!("output {}: {} to {}\n", port, kind, to.join(", ")));
    }

    if !registrar.contains("config") {
        registrar.add_read_any("config", CALM, move |_, _, _| config.clone());
    }
    if !registrar.contains("class") {
        registrar.add_read_any("class", CALM, move |_, _, _| class.clone());
    }
    if !registrar.contains("name") {
        registrar.add_read_any("name", CALM, move |_, _, _| name.clone());
    }
    if !registrar.contains("ports") {
        registrar.add_read_any("ports", CALM, move |_, _, _| ports.clone());
    }
    if !registrar.contains("handlers") {
        let mut handler_names = registrar.names();
        handler_names.push("handlers".to_owned());
        handler_names.sort();
        let listing = handler_names.join("\n");
        registrar.add_read_any("handlers", CALM, move |_, _, _| listing.clone());
    }
}

fn kind_word(kind: PortKind) -> &'static str {
    match kind {
        PortKind::Push => "push",
        PortKind::Pull => "pull",
    }
}

fn global_handlers() -> BTreeMap<&'static str, GlobalHandler> {
    let mut map = BTreeMap::new();
    map.insert(
        "stop",
        GlobalHandler::write("stop", BUTTON, Box::new(|router, _value, _errh| {
            router.please_stop();
            Ok(())
        })),
    );
    map.insert(
        "list",
        GlobalHandler::read("list", Box::new(|router| router.element_names().join("\n"))),
    );
    map.insert(
        "classes",
        GlobalHandler::read("classes", Box::new(|router| router.class_names.join("\n"))),
    );
    map.insert(
        "hotswap",
        GlobalHandler::write("hotswap", 0, Box::new(|router, value, _errh| {
            let master = router
                .master()
                .ok_or_else(|| "router has no master".to_owned())?;
            MasterShared::hotswap_staged(&master, router, value.trim())
        })),
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{PortCode, PortKind};
    use crate::flow::FlowCode;

    fn run_resolution(
        decl_inputs: Vec<Vec<PortCode>>,
        decl_outputs: Vec<Vec<PortCode>>,
        conns: Vec<((usize, usize), (usize, usize))>,
        flows: Vec<FlowCode>,
    ) -> Result<(Vec<Vec<PortKind>>, Vec<Vec<PortKind>>), String> {
        let names: Vec<String> = (0..decl_inputs.len()).map(|i| format!("e{}", i)).collect();
        let mut errh = ErrorHandler::new();
        let kinds = resolve_processing(&decl_inputs, &decl_outputs, &conns, &flows, &names, &mut errh);
        errh.result().map(|_| kinds)
    }

    #[test]
    fn push_spreads_through_agnostic_chain() {
        // source (push out) -> filter (agnostic) -> sink (agnostic in).
        let (inputs, outputs) = run_resolution(
            vec![vec![], vec![PortCode::Agnostic], vec![PortCode::Agnostic]],
            vec![vec![PortCode::Push], vec![PortCode::Agnostic], vec![]],
            vec![((0, 0), (1, 0)), ((1, 0), (2, 0))],
            vec![
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::COMPLETE),
            ],
        )
        .unwrap();
        assert_eq!(inputs[1], vec![PortKind::Push]);
        assert_eq!(outputs[1], vec![PortKind::Push]);
        assert_eq!(inputs[2], vec![PortKind::Push]);
    }

    #[test]
    fn pull_spreads_backwards_from_consumer() {
        // queue (pull out) -> filter (agnostic) -> puller (pull in).
        let (inputs, outputs) = run_resolution(
            vec![vec![], vec![PortCode::Agnostic], vec![PortCode::Pull]],
            vec![vec![PortCode::Pull], vec![PortCode::Agnostic], vec![]],
            vec![((0, 0), (1, 0)), ((1, 0), (2, 0))],
            vec![
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::COMPLETE),
            ],
        )
        .unwrap();
        assert_eq!(inputs[1], vec![PortKind::Pull]);
        assert_eq!(outputs[1], vec![PortKind::Pull]);
    }

    #[test]
    fn mismatch_is_a_configuration_error() {
        // push output wired straight into a declared-pull input.
        let result = run_resolution(
            vec![vec![], vec![PortCode::Pull]],
            vec![vec![PortCode::Push], vec![]],
            vec![((0, 0), (1, 0))],
            vec![
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::COMPLETE),
            ],
        );
        let message = result.unwrap_err();
        assert!(message.contains("e0[0]"), "got {:?}", message);
        assert!(message.contains("e1[0]"), "got {:?}", message);
    }

    #[test]
    fn isolated_agnostic_ports_prefer_push() {
        let (inputs, outputs) = run_resolution(
            vec![vec![], vec![PortCode::Agnostic]],
            vec![vec![PortCode::Agnostic], vec![]],
            vec![((0, 0), (1, 0))],
            vec![
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::COMPLETE),
            ],
        )
        .unwrap();
        assert_eq!(outputs[0], vec![PortKind::Push]);
        assert_eq!(inputs[1], vec![PortKind::Push]);
    }

    #[test]
    fn flow_code_gates_agnostic_propagation() {
        // Element 1 declares its input unreachable from its output, so the
        // pull consumer downstream must not drag the upstream side to pull.
        let (inputs, outputs) = run_resolution(
            vec![vec![], vec![PortCode::Agnostic], vec![PortCode::Pull]],
            vec![vec![PortCode::Push], vec![PortCode::Agnostic], vec![]],
            vec![((0, 0), (1, 0)), ((1, 0), (2, 0))],
            vec![
                FlowCode::parse(FlowCode::COMPLETE),
                FlowCode::parse(FlowCode::NONE),
                FlowCode::parse(FlowCode::COMPLETE),
            ],
        )
        .unwrap();
        assert_eq!(inputs[1], vec![PortKind::Push]);
        assert_eq!(outputs[1], vec![PortKind::Pull]);
    }

    #[test]
    fn hookup_rejects_dangling_and_fan_out() {
        let names = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let conns = vec![((0, 0), (1, 0)), ((0, 0), (2, 0))];
        let mut errh = ErrorHandler::new();
        check_hookup(
            &conns,
            &[0, 1, 1],
            &[1, 0, 1],
            &[vec![], vec![PortKind::Push], vec![PortKind::Push]],
            &[vec![PortKind::Push], vec![], vec![PortKind::Push]],
            &names,
            &mut errh,
        );
        let report = errh.report().unwrap();
        assert!(report.contains("push output 0 has 2 connections"), "{}", report);
        assert!(report.contains("c: output 0 not connected"), "{}", report);
    }
}

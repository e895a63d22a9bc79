// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph builders and instrumented node types for tests.

use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepResult};
use crate::nodes::{int_property, standard_registry, string_property};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use crate::settings::RuntimeSettings;
use crate::vm::ScriptVm;
use ordoplay_script_graph::{NodeId, Pin, ScriptGraph, ScriptNode, Value, ValueType};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Builds a graph with sequential node IDs
pub(crate) struct GraphBuilder {
    graph: ScriptGraph,
    next: u32,
}

impl GraphBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            graph: ScriptGraph::new(name),
            next: 1,
        }
    }

    pub(crate) fn add(&mut self, build: impl FnOnce(NodeId) -> ScriptNode) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        self.graph.add_node(build(id))
    }

    pub(crate) fn connect(&mut self, from: NodeId, from_port: usize, to: NodeId, to_port: usize) {
        self.graph.connect(from, from_port, to, to_port).unwrap();
    }

    pub(crate) fn graph_mut(&mut self) -> &mut ScriptGraph {
        &mut self.graph
    }

    pub(crate) fn build(self) -> ScriptGraph {
        self.graph
    }
}

/// Observations made by the instrumented nodes
#[derive(Clone, Default)]
pub(crate) struct Probes {
    pub(crate) steps: Arc<AtomicUsize>,
    pub(crate) visits: Arc<Mutex<Vec<NodeId>>>,
}

impl Probes {
    pub(crate) fn step_count(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub(crate) fn visits(&self) -> Vec<NodeId> {
        self.visits.lock().clone()
    }
}

/// Data node adding `amount` to its input and counting its steps
pub(crate) fn counted_add(id: NodeId, amount: i64) -> ScriptNode {
    ScriptNode::new(id, "counted_add")
        .with_property("amount", amount)
        .with_pin(Pin::input("value", ValueType::Int))
        .with_pin(Pin::output("result", ValueType::Int))
}

/// Execution node recording its visits
pub(crate) fn probe(id: NodeId) -> ScriptNode {
    ScriptNode::new(id, "probe")
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::exec_output("then"))
}

/// Execution node writing a marker into four outputs
pub(crate) fn scatter(id: NodeId) -> ScriptNode {
    (0..4).fold(
        ScriptNode::new(id, "scatter")
            .with_pin(Pin::exec_input("exec"))
            .with_pin(Pin::exec_output("then")),
        |node, index| node.with_pin(Pin::output(format!("out {index}"), ValueType::Int)),
    )
}

/// Execution node that always returns the same step result.
///
/// `step` is one of `go_back`, `end`, `yield`, `bad_port`.
pub(crate) fn fixed_step(id: NodeId, step: &str) -> ScriptNode {
    ScriptNode::new(id, "fixed_step")
        .with_property("step", step)
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::exec_output("then"))
}

/// Data-only node with working memory that always returns the same step result.
///
/// `step` is one of `yield`, `end`, `push`, `go_back`.
pub(crate) fn data_step(id: NodeId, step: &str) -> ScriptNode {
    ScriptNode::new(id, "data_step")
        .with_property("step", step)
        .with_pin(Pin::output("value", ValueType::Int))
}

pub(crate) const SCATTER_MARKER: i64 = 666;

#[derive(Debug)]
struct CountedAdd {
    amount: i64,
    steps: Arc<AtomicUsize>,
}

impl NodeStep for CountedAdd {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        self.steps.fetch_add(1, Ordering::SeqCst);
        let value = context.input(0).as_int().unwrap_or(0);
        context.set_output(0, Value::Int(value + self.amount));
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct Probe {
    visits: Arc<Mutex<Vec<NodeId>>>,
}

impl NodeStep for Probe {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        self.visits.lock().push(context.current_node());
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct Scatter;

impl NodeStep for Scatter {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        for index in 0..context.output_count() {
            context.set_output(index, Value::Int(SCATTER_MARKER));
        }
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct FixedStep {
    result: StepResult,
}

impl NodeStep for FixedStep {
    fn step(&self, _context: &mut ExecutionContext) -> StepResult {
        self.result
    }
}

#[derive(Debug)]
struct DataStep {
    result: StepResult,
}

impl NodeStep for DataStep {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        context.set_output(0, Value::Int(1));
        self.result
    }
}

/// Register the instrumented node types
pub(crate) fn register_test_nodes(registry: &mut NodeRegistry, probes: &Probes) {
    let steps = Arc::clone(&probes.steps);
    registry.register(NodeType::new("counted_add", "Counted Add", NodeCategory::Custom, "", move |node| {
        Ok(Box::new(CountedAdd {
            amount: int_property(node, "amount")?,
            steps: Arc::clone(&steps),
        }) as Box<dyn NodeStep>)
    }));

    let visits = Arc::clone(&probes.visits);
    registry.register(NodeType::new("probe", "Probe", NodeCategory::Custom, "", move |_| {
        Ok(Box::new(Probe {
            visits: Arc::clone(&visits),
        }) as Box<dyn NodeStep>)
    }));

    registry.register(NodeType::new("scatter", "Scatter", NodeCategory::Custom, "", |_| {
        Ok(Box::new(Scatter) as Box<dyn NodeStep>)
    }));

    registry.register(NodeType::new("fixed_step", "Fixed Step", NodeCategory::Custom, "", |node| {
        let result = match string_property(node, "step")?.as_str() {
            "go_back" => StepResult::GoBack,
            "end" => StepResult::End,
            "yield" => StepResult::Yield,
            "bad_port" => StepResult::Advance(5),
            other => return Err(format!("unknown step '{other}'")),
        };
        Ok(Box::new(FixedStep { result }) as Box<dyn NodeStep>)
    }));

    registry.register(NodeType::new("data_step", "Data Step", NodeCategory::Custom, "", |node| {
        let result = match string_property(node, "step")?.as_str() {
            "yield" => StepResult::Yield,
            "end" => StepResult::End,
            "push" => StepResult::Push(0),
            "go_back" => StepResult::GoBack,
            other => return Err(format!("unknown step '{other}'")),
        };
        Ok(Box::new(DataStep { result }) as Box<dyn NodeStep>)
    }));
}

/// A VM with the standard library plus the instrumented node types
pub(crate) fn test_vm(settings: RuntimeSettings) -> (ScriptVm, Probes) {
    let probes = Probes::default();
    let mut registry = standard_registry();
    register_test_nodes(&mut registry, &probes);
    (ScriptVm::with_registry(settings, registry), probes)
}

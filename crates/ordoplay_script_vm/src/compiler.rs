// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph compiler.
//!
//! Turns one function of a [`ScriptGraph`] into a [`CompiledFunction`]:
//! 1. Walk execution connections breadth first from the entry node
//! 2. Pull in every node feeding data into that path, transitively
//! 3. Instantiate each node through the registry
//! 4. Lay out working memory, sharing one slot per local variable
//! 5. Wire data connections, turning data-only sources into memoized dependencies
//! 6. Reserve the trash slot
//! 7. Wire execution connections
//! 8. Give unconnected inputs a default slot and send unconnected outputs to trash
//!
//! Slots are handed out in that order, after the argument slots.

use crate::error::CompileError;
use crate::function::{CompiledFunction, Function, LocalSlot};
use crate::instance::{ExecTarget, InputBinding, NodeInstance, UNASSIGNED_SLOT};
use crate::registry::NodeRegistry;
use crate::settings::RuntimeSettings;
use indexmap::IndexMap;
use ordoplay_script_graph::{
    Connection, FunctionDefinition, NodeId, Pin, PinDirection, ScriptGraph, ScriptNode, Value,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use uuid::Uuid;

/// A data connection resolved to data-relative pin indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DataLink {
    from_node: NodeId,
    from_index: usize,
    to_node: NodeId,
    to_index: usize,
    connection: Connection,
}

/// Compiles function graphs against a node registry
#[derive(Debug, Clone, Copy)]
pub struct GraphCompiler<'a> {
    registry: &'a NodeRegistry,
    settings: &'a RuntimeSettings,
}

impl<'a> GraphCompiler<'a> {
    /// Create a compiler
    pub fn new(registry: &'a NodeRegistry, settings: &'a RuntimeSettings) -> Self {
        Self { registry, settings }
    }

    /// Compile one function
    pub fn compile(
        &self,
        graph: &ScriptGraph,
        definition: &FunctionDefinition,
    ) -> Result<CompiledFunction, CompileError> {
        if graph.node(definition.entry).is_none() {
            return Err(CompileError::EntryNodeNotFound {
                function: definition.name.clone(),
                node: definition.entry,
            });
        }

        let mut build = Build::new(graph, definition, self.settings);

        let (path, execution_connections) = build.execution_path()?;
        let (nodes, data_links) = build.data_closure(&path)?;
        build.instantiate(self.registry, &nodes)?;
        build.wire_data(&data_links)?;

        build.function.trash_pos = build.function.max_stack;
        build.function.max_stack += 1;

        build.wire_execution(&execution_connections)?;
        build.assign_defaults()?;
        build.check_cycles()?;

        let compiled = build.finish()?;
        tracing::debug!(
            function = %compiled.name,
            nodes = compiled.function.node_count,
            slots = compiled.function.max_stack,
            passes = compiled.function.pass_stack_size,
            bytes = compiled.function.stack_info().stack_size(),
            "Compiled function"
        );
        Ok(compiled)
    }
}

struct Build<'g> {
    graph: &'g ScriptGraph,
    definition: &'g FunctionDefinition,
    function: Function,
    instances: Vec<NodeInstance>,
    lookup: IndexMap<NodeId, usize>,
    default_values: Vec<Value>,
    local_slots: Vec<LocalSlot>,
    shared_memory: HashMap<Uuid, usize>,
}

impl<'g> Build<'g> {
    fn new(graph: &'g ScriptGraph, definition: &'g FunctionDefinition, settings: &RuntimeSettings) -> Self {
        let argument_count = definition.arguments.len();
        let function = Function {
            node: definition.entry,
            max_stack: argument_count,
            trash_pos: 0,
            flow_stack_size: settings.flow_stack_size,
            pass_stack_size: 0,
            node_count: 0,
            argument_count,
            max_inputs: argument_count,
            max_outputs: 0,
            variables: definition
                .local_variables
                .iter()
                .map(|v| (v.name.clone(), v.default_value.clone()))
                .collect(),
        };

        Self {
            graph,
            definition,
            function,
            instances: Vec::new(),
            lookup: IndexMap::new(),
            default_values: Vec::new(),
            local_slots: Vec::new(),
            shared_memory: HashMap::new(),
        }
    }

    fn node(&self, node: NodeId) -> Result<&'g ScriptNode, CompileError> {
        self.graph.node(node).ok_or_else(|| CompileError::NodeNotFound {
            function: self.definition.name.clone(),
            node,
        })
    }

    fn index_of(&self, node: NodeId) -> Result<usize, CompileError> {
        self.lookup.get(&node).copied().ok_or_else(|| CompileError::NodeNotFound {
            function: self.definition.name.clone(),
            node,
        })
    }

    fn wiring(&self, connection: &Connection, reason: &str) -> CompileError {
        CompileError::InvalidWiring {
            function: self.definition.name.clone(),
            connection: *connection,
            reason: reason.to_string(),
        }
    }

    /// Nodes reachable over execution connections, and the connections walked
    fn execution_path(&self) -> Result<(BTreeSet<NodeId>, BTreeSet<Connection>), CompileError> {
        let entry = self.definition.entry;
        let mut path = BTreeSet::from([entry]);
        let mut connections = BTreeSet::new();
        let mut queue = VecDeque::from([entry]);

        while let Some(node_id) = queue.pop_front() {
            let node = self.node(node_id)?;
            for connection in self.graph.connections_from(node_id) {
                let source_pin = node
                    .find_pin(connection.from_port, PinDirection::Output)
                    .ok_or_else(|| self.wiring(connection, "source port does not exist"))?;
                if !source_pin.is_execution() {
                    continue;
                }
                if source_pin.hidden {
                    return Err(self.wiring(connection, "source pin is hidden"));
                }

                let target = self.node(connection.to_node)?;
                match target.find_pin(connection.to_port, PinDirection::Input) {
                    None => return Err(self.wiring(connection, "target port does not exist")),
                    Some(pin) if !pin.is_execution() => {
                        return Err(self.wiring(connection, "execution output wired to a data input"));
                    }
                    Some(pin) if pin.hidden => {
                        return Err(self.wiring(connection, "target pin is hidden"));
                    }
                    Some(_) => {}
                }

                connections.insert(*connection);
                if path.insert(connection.to_node) {
                    queue.push_back(connection.to_node);
                }
            }
        }

        Ok((path, connections))
    }

    /// The execution path plus every node feeding it data
    fn data_closure(
        &self,
        path: &BTreeSet<NodeId>,
    ) -> Result<(BTreeSet<NodeId>, BTreeSet<DataLink>), CompileError> {
        let mut nodes = path.clone();
        let mut links = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = path.iter().copied().collect();

        while let Some(node_id) = queue.pop_front() {
            let target = self.node(node_id)?;
            for connection in self.graph.connections_to(node_id) {
                let source = self.node(connection.from_node)?;
                let source_pin = source
                    .find_pin(connection.from_port, PinDirection::Output)
                    .ok_or_else(|| self.wiring(connection, "source port does not exist"))?;
                if source_pin.is_execution() {
                    continue;
                }

                let target_pin = target
                    .find_pin(connection.to_port, PinDirection::Input)
                    .ok_or_else(|| self.wiring(connection, "target port does not exist"))?;
                if target_pin.is_execution() {
                    return Err(self.wiring(connection, "data output wired to an execution input"));
                }
                if source_pin.hidden || target_pin.hidden {
                    return Err(self.wiring(connection, "pin is hidden"));
                }

                links.insert(DataLink {
                    from_node: connection.from_node,
                    from_index: source.data_index_of_port(connection.from_port, PinDirection::Output),
                    to_node: node_id,
                    to_index: target.data_index_of_port(connection.to_port, PinDirection::Input),
                    connection: *connection,
                });

                if nodes.insert(connection.from_node) {
                    queue.push_back(connection.from_node);
                }
            }
        }

        Ok((nodes, links))
    }

    fn instantiate(&mut self, registry: &NodeRegistry, nodes: &BTreeSet<NodeId>) -> Result<(), CompileError> {
        for &node_id in nodes {
            let node = self.node(node_id)?;
            let behavior = registry.instantiate(&self.definition.name, node)?;

            let execution_index = self.instances.len();
            let mut instance = NodeInstance::new(node_id, node.node_type.as_str(), execution_index, behavior);

            let data_inputs = node.data_pin_count(PinDirection::Input);
            let data_outputs = node.data_pin_count(PinDirection::Output);
            instance.execution_input_pin_count = node.execution_pin_count(PinDirection::Input);
            instance.execution_output_pin_count = node.execution_pin_count(PinDirection::Output);
            instance.input_pins = vec![InputBinding::Unassigned; data_inputs];
            instance.output_pins = vec![UNASSIGNED_SLOT; data_outputs];
            instance.execution_outputs = vec![None; instance.execution_output_pin_count];

            self.function.max_inputs = self.function.max_inputs.max(data_inputs);
            self.function.max_outputs = self.function.max_outputs.max(data_outputs);

            self.assign_working_memory(&mut instance);
            self.lookup.insert(node_id, execution_index);
            self.instances.push(instance);
        }

        self.function.node_count = self.instances.len();
        Ok(())
    }

    fn assign_working_memory(&mut self, instance: &mut NodeInstance) {
        let size = instance.behavior.working_memory_size();

        if let Some(key) = instance.behavior.shared_memory_key() {
            let slot = match self.shared_memory.get(&key) {
                Some(&slot) => slot,
                None => {
                    let slot = self.function.max_stack;
                    self.function.max_stack += size.max(1);
                    let default_value = self
                        .definition
                        .local_variable(key)
                        .map(|v| v.default_value.clone())
                        .unwrap_or_default();
                    self.local_slots.push(LocalSlot { slot, default_value });
                    self.shared_memory.insert(key, slot);
                    slot
                }
            };
            instance.working_memory_index = Some(slot);
        } else if size > 0 {
            instance.working_memory_index = Some(self.function.max_stack);
            self.function.max_stack += size;
        }
    }

    fn wire_data(&mut self, links: &BTreeSet<DataLink>) -> Result<(), CompileError> {
        for link in links {
            let source_index = self.index_of(link.from_node)?;
            let target_index = self.index_of(link.to_node)?;

            let slot = match self.instances[source_index].output_pins.get_mut(link.from_index) {
                Some(output) => {
                    if *output == UNASSIGNED_SLOT {
                        *output = self.function.max_stack;
                        self.function.max_stack += 1;
                    }
                    *output
                }
                None => return Err(self.wiring(&link.connection, "source is not a visible data output")),
            };

            // Sources without execution outputs only run when something reads them
            let memoized = self.instances[source_index].execution_output_pin_count == 0;
            if memoized && !self.instances[target_index].dependencies.contains(&source_index) {
                if self.instances[source_index].pass_index.is_none() {
                    self.instances[source_index].pass_index = Some(self.function.pass_stack_size);
                    self.function.pass_stack_size += 1;
                }
                self.instances[target_index].dependencies.push(source_index);
            }

            match self.instances[target_index].input_pins.get_mut(link.to_index) {
                Some(binding) => *binding = InputBinding::Stack(slot),
                None => return Err(self.wiring(&link.connection, "target is not a visible data input")),
            }
        }

        Ok(())
    }

    fn wire_execution(&mut self, connections: &BTreeSet<Connection>) -> Result<(), CompileError> {
        for connection in connections {
            let source = self.node(connection.from_node)?;
            let target = self.node(connection.to_node)?;
            let source_port = source.execution_index_of_port(connection.from_port, PinDirection::Output);
            let target_port = target.execution_index_of_port(connection.to_port, PinDirection::Input);

            let source_index = self.index_of(connection.from_node)?;
            let target_index = self.index_of(connection.to_node)?;

            match self.instances[source_index].execution_outputs.get_mut(source_port) {
                Some(output) => {
                    *output = Some(ExecTarget {
                        instance: target_index,
                        port: target_port,
                    });
                }
                None => return Err(self.wiring(connection, "source is not a visible execution output")),
            }
        }

        Ok(())
    }

    fn assign_defaults(&mut self) -> Result<(), CompileError> {
        let trash = self.function.trash_pos;

        for instance in &mut self.instances {
            let node = self.graph.node(instance.id).ok_or_else(|| CompileError::NodeNotFound {
                function: self.definition.name.clone(),
                node: instance.id,
            })?;

            for (index, binding) in instance.input_pins.iter_mut().enumerate() {
                if *binding != InputBinding::Unassigned {
                    continue;
                }

                let default = node
                    .data_pin_at(index, PinDirection::Input)
                    .map(Pin::effective_default_value)
                    .unwrap_or_default();
                let value = match self.default_values.iter().position(|v| *v == default) {
                    Some(position) => position,
                    None => {
                        self.default_values.push(default);
                        self.default_values.len() - 1
                    }
                };

                let slot = self.function.max_stack;
                self.function.max_stack += 1;
                *binding = InputBinding::Default { value, slot };
            }

            for output in &mut instance.output_pins {
                if *output == UNASSIGNED_SLOT {
                    *output = trash;
                }
            }
        }

        Ok(())
    }

    /// Memoized dependencies must form a DAG
    fn check_cycles(&self) -> Result<(), CompileError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn visit(instances: &[NodeInstance], marks: &mut [Mark], index: usize) -> Result<(), NodeId> {
            match marks[index] {
                Mark::Done => return Ok(()),
                Mark::Active => return Err(instances[index].id),
                Mark::Unvisited => {}
            }

            marks[index] = Mark::Active;
            for &dependency in &instances[index].dependencies {
                visit(instances, marks, dependency)?;
            }
            marks[index] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.instances.len()];
        for index in 0..self.instances.len() {
            visit(&self.instances, &mut marks, index).map_err(|node| CompileError::DataCycle {
                function: self.definition.name.clone(),
                node,
            })?;
        }

        Ok(())
    }

    fn finish(self) -> Result<CompiledFunction, CompileError> {
        let entry = self.index_of(self.definition.entry)?;
        Ok(CompiledFunction {
            name: self.definition.name.clone(),
            function: self.function,
            arguments: self.definition.arguments.clone(),
            instances: self.instances,
            lookup: self.lookup,
            default_values: self.default_values,
            local_slots: self.local_slots,
            entry,
        })
    }
}

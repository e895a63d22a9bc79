// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interpreter loop.
//!
//! Each visit of a node:
//! - Run memoized dependencies not yet stepped in this pass, then bind inputs
//! - Point working memory and outputs at the node's slots
//! - Pick the step mode and step the node
//! - Record the node on the flow stack and move to the next node
//!
//! A node that pushed stays on the flow stack and is re-entered in
//! [`StepMode::Continue`] once the branch it started runs out of nodes.

use crate::context::{ExecutionContext, StepError};
use crate::continuation::Continuation;
use crate::error::{CallError, CallErrorKind};
use crate::function::CompiledFunction;
use crate::instance::{ExecTarget, InputBinding, NodeInstance, StepMode, StepResult};
use ordoplay_script_graph::Value;
use std::sync::Arc;

/// Result of a call that did not fail
#[derive(Debug)]
pub enum CallOutcome {
    /// The function returned
    Returned(Value),
    /// A node yielded; resume the continuation to finish the call
    Suspended(Continuation),
}

impl CallOutcome {
    /// Returned value, if the call finished
    pub fn returned(&self) -> Option<&Value> {
        match self {
            Self::Returned(value) => Some(value),
            Self::Suspended(_) => None,
        }
    }

    /// Take the continuation of a suspended call
    pub fn into_continuation(self) -> Option<Continuation> {
        match self {
            Self::Returned(_) => None,
            Self::Suspended(continuation) => Some(continuation),
        }
    }
}

enum RunOutcome {
    Returned(Value),
    Yielded { node: usize, port: usize },
}

/// Run a call to completion or to its next yield
pub(crate) fn execute(
    function: Arc<CompiledFunction>,
    mut context: ExecutionContext,
    start: usize,
    port: usize,
    resume: bool,
) -> Result<CallOutcome, CallError> {
    let outcome = Interpreter { function: &function }.run(&mut context, start, port, resume);

    match outcome {
        Ok(RunOutcome::Returned(value)) => Ok(CallOutcome::Returned(value)),
        Ok(RunOutcome::Yielded { node, port }) => {
            let continuation = Continuation::capture(Arc::clone(&function), context, node, port);
            tracing::debug!(
                function = %function.name,
                bytes = continuation.stack_size(),
                event = continuation.awaited_event().unwrap_or("<none>"),
                "Call suspended"
            );
            Ok(CallOutcome::Suspended(continuation))
        }
        Err(error) => {
            tracing::error!("Script call failed: {}", error);
            Err(error)
        }
    }
}

struct Interpreter<'f> {
    function: &'f CompiledFunction,
}

impl Interpreter<'_> {
    fn run(
        &self,
        context: &mut ExecutionContext,
        start: usize,
        start_port: usize,
        mut resume: bool,
    ) -> Result<RunOutcome, CallError> {
        let mut node_index = start;
        let mut node_port = start_port;

        loop {
            let instance = self.instance(node_index)?;
            context.current_node = instance.id;
            context.current_node_port = node_port;
            context.passes += 1;

            self.resolve_inputs(context, instance)?;
            context.prime_working_memory(instance.working_memory_index, instance.working_memory_size());
            self.prime_outputs(context, instance);

            context.step_mode = if resume {
                resume = false;
                StepMode::Resume
            } else if context
                .flow_entry(context.flow_position)
                .is_some_and(|entry| entry.pushed)
            {
                StepMode::Continue
            } else {
                StepMode::Begin
            };

            tracing::trace!(
                function = %self.function.name,
                node = %instance.id,
                node_type = %instance.node_type,
                mode = ?context.step_mode,
                "Step"
            );
            let result = instance.behavior.step(context);
            if let Some(error) = context.take_error() {
                return Err(self.step_error(error, instance));
            }

            match result {
                StepResult::Yield => {
                    if !context.has_working_memory() {
                        return Err(self.error(
                            CallErrorKind::InvalidMethod,
                            "Execution yielded without any working memory",
                            instance,
                        ));
                    }
                    return Ok(RunOutcome::Yielded {
                        node: node_index,
                        port: node_port,
                    });
                }
                StepResult::End => {
                    if !context.has_working_memory() {
                        return Err(self.error(
                            CallErrorKind::InvalidMethod,
                            "Return value should be assigned to node's working memory",
                            instance,
                        ));
                    }
                    return Ok(RunOutcome::Returned(context.working_memory(0).clone()));
                }
                _ => {}
            }

            let next = self.next_target(instance, result)?;

            let pushed = result.pushes_stack();
            context.set_flow_entry(context.flow_position, instance.id, pushed);
            context.stack.set_executed(instance.execution_index, pushed);

            if result == StepResult::GoBack {
                if context.flow_position == 0 {
                    return Ok(RunOutcome::Returned(Value::Nil));
                }
                context.flow_position -= 1;
                node_index = self.flow_node(context, context.flow_position)?;
                node_port = 0;
                continue;
            }

            match next {
                Some(target) => {
                    let target_instance = self.instance(target.instance)?;
                    if context.stack.is_executed(target_instance.execution_index) {
                        // Re-entering a node that is still pushed unwinds the flow back to it
                        let position = (0..=context.flow_position)
                            .rev()
                            .find(|&position| {
                                context
                                    .flow_entry(position)
                                    .is_some_and(|entry| entry.node == target_instance.id)
                            })
                            .ok_or_else(|| {
                                self.error(
                                    CallErrorKind::InvalidMethod,
                                    "Found execution bit but not the node in the stack",
                                    instance,
                                )
                            })?;
                        context.flow_position = position;
                        context.stack.set_executed(target_instance.execution_index, false);
                    } else {
                        if context.flow_position + 1 >= context.stack.flow_size() {
                            return Err(self.error(CallErrorKind::StackOverflow, "Stack overflow", instance));
                        }
                        context.flow_position += 1;
                    }

                    context.set_flow_entry(context.flow_position, target_instance.id, false);
                    node_index = target.instance;
                    node_port = target.port;
                }
                None => {
                    let pushed = (0..=context.flow_position).rev().find(|&position| {
                        context.flow_entry(position).is_some_and(|entry| entry.pushed)
                    });
                    let Some(position) = pushed else {
                        return Ok(RunOutcome::Returned(Value::Nil));
                    };
                    context.flow_position = position;
                    node_index = self.flow_node(context, position)?;
                    node_port = 0;
                }
            }
        }
    }

    fn instance(&self, index: usize) -> Result<&NodeInstance, CallError> {
        self.function.instances.get(index).ok_or_else(|| {
            CallError::new(
                CallErrorKind::InvalidMethod,
                self.function.name.as_str(),
                format!("Node instance {index} does not exist"),
            )
        })
    }

    fn flow_node(&self, context: &ExecutionContext, position: usize) -> Result<usize, CallError> {
        context
            .flow_entry(position)
            .and_then(|entry| self.function.instance_index(entry.node))
            .ok_or_else(|| {
                CallError::new(
                    CallErrorKind::InvalidMethod,
                    self.function.name.as_str(),
                    format!("Flow stack entry {position} does not name a node"),
                )
            })
    }

    /// Execution output chosen by the step, if any
    fn next_target(&self, instance: &NodeInstance, result: StepResult) -> Result<Option<ExecTarget>, CallError> {
        let Some(port) = result.port() else {
            return Ok(None);
        };
        if instance.execution_output_pin_count == 0 {
            return Ok(None);
        }

        match instance.execution_outputs.get(port) {
            Some(target) => Ok(*target),
            None => Err(self.error(
                CallErrorKind::InvalidMethod,
                format!(
                    "Node returned an invalid execution pin output {port} ({} outputs)",
                    instance.execution_output_pin_count
                ),
                instance,
            )),
        }
    }

    fn resolve_inputs(&self, context: &mut ExecutionContext, instance: &NodeInstance) -> Result<(), CallError> {
        if instance.id == context.initial_node {
            context.bind_arguments(self.function.function.argument_count);
            return Ok(());
        }

        for &dependency in &instance.dependencies {
            self.dependency_step(context, dependency)?;
        }
        context.current_node = instance.id;
        self.bind_inputs(context, instance)
    }

    /// Step a memoized data node unless it already ran in this pass
    fn dependency_step(&self, context: &mut ExecutionContext, index: usize) -> Result<(), CallError> {
        let instance = self.instance(index)?;
        let pass_index = instance.pass_index.ok_or_else(|| {
            self.error(CallErrorKind::InvalidMethod, "Dependency has no pass slot", instance)
        })?;

        if context.stack.pass(pass_index) == context.passes {
            return Ok(());
        }
        context.stack.set_pass(pass_index, context.passes);

        for &dependency in &instance.dependencies {
            self.dependency_step(context, dependency)?;
        }

        context.current_node = instance.id;
        self.bind_inputs(context, instance)?;
        self.prime_outputs(context, instance);
        context.prime_working_memory(instance.working_memory_index, instance.working_memory_size());
        context.step_mode = StepMode::Begin;

        tracing::trace!(
            function = %self.function.name,
            node = %instance.id,
            node_type = %instance.node_type,
            "Dependency step"
        );
        let result = instance.behavior.step(context);
        if let Some(error) = context.take_error() {
            return Err(self.step_error(error, instance));
        }

        match result {
            StepResult::Advance(_) | StepResult::NoAdvance => Ok(()),
            StepResult::Push(_) | StepResult::GoBack | StepResult::End | StepResult::Yield => Err(self.error(
                CallErrorKind::InvalidMethod,
                "Data dependency returned a flow result",
                instance,
            )),
        }
    }

    fn bind_inputs(&self, context: &mut ExecutionContext, instance: &NodeInstance) -> Result<(), CallError> {
        for (index, binding) in instance.input_pins.iter().enumerate() {
            match *binding {
                InputBinding::Stack(slot) => context.bind_input(index, slot),
                InputBinding::Default { value, slot } => {
                    // Refreshed every visit so a step can never leak into the next
                    let default = self.function.default_values.get(value).cloned().unwrap_or_default();
                    context.stack.set_slot(slot, default);
                    context.bind_input(index, slot);
                }
                InputBinding::Unassigned => {
                    return Err(self.error(
                        CallErrorKind::InvalidMethod,
                        format!("Input {index} was never assigned a slot"),
                        instance,
                    ));
                }
            }
        }
        context.set_input_count(instance.input_pins.len());
        Ok(())
    }

    fn prime_outputs(&self, context: &mut ExecutionContext, instance: &NodeInstance) {
        for (index, &slot) in instance.output_pins.iter().enumerate() {
            context.bind_output(index, slot);
        }
        context.set_output_count(instance.output_pins.len());
    }

    fn error(&self, kind: CallErrorKind, reason: impl Into<String>, instance: &NodeInstance) -> CallError {
        CallError::new(kind, self.function.name.as_str(), reason).at_node(instance.id)
    }

    fn step_error(&self, error: StepError, instance: &NodeInstance) -> CallError {
        self.error(error.kind, error.reason, instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::flow_control::{branch, for_loop, sequence, while_loop};
    use crate::nodes::functions::{function_entry, function_result};
    use crate::nodes::math::{constant, operator, Operator};
    use crate::nodes::variables::{assign_local_variable, local_variable};
    use crate::settings::RuntimeSettings;
    use crate::test_support::{
        counted_add, data_step, fixed_step, probe, scatter, test_vm, GraphBuilder, SCATTER_MARKER,
    };
    use crate::vm::ScriptVm;
    use ordoplay_script_graph::{Argument, FunctionDefinition, LocalVariable, NodeId, ObjectRef, ValueType};

    fn returned(vm: &ScriptVm, name: &str, arguments: &[Value]) -> Value {
        match vm.call(name, arguments).unwrap() {
            CallOutcome::Returned(value) => value,
            CallOutcome::Suspended(_) => panic!("call to {name} suspended"),
        }
    }

    #[test]
    fn test_product_scenario() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let arguments = [Argument::new("a", ValueType::Int)];
        let mut builder = GraphBuilder::new("product");
        let entry = builder.add(|id| function_entry(id, &arguments));
        let add1 = builder.add(|id| counted_add(id, 1));
        let add2 = builder.add(|id| counted_add(id, 2));
        let mul = builder.add(|id| operator(id, Operator::Multiply));
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, result, 0);
        builder.connect(entry, 1, add1, 0);
        builder.connect(entry, 1, add2, 0);
        builder.connect(add1, 0, mul, 0);
        builder.connect(add2, 0, mul, 1);
        builder.connect(mul, 0, result, 1);

        let definition = FunctionDefinition::new("f", entry).with_argument("a", ValueType::Int);
        vm.register_function(&builder.build(), &definition).unwrap();

        assert_eq!(returned(&vm, "f", &[Value::Int(3)]), Value::Int(20));
        assert_eq!(probes.step_count(), 2);
    }

    #[test]
    fn test_shared_dependency_runs_once_per_pass() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("diamond");
        let entry = builder.add(|id| function_entry(id, &[]));
        let seed = builder.add(|id| constant(id, 1_i64));
        let shared = builder.add(|id| counted_add(id, 10));
        let left = builder.add(|id| operator(id, Operator::Add));
        let right = builder.add(|id| operator(id, Operator::Add));
        let mul = builder.add(|id| operator(id, Operator::Multiply));
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, result, 0);
        builder.connect(seed, 0, shared, 0);
        builder.connect(shared, 0, left, 0);
        builder.connect(seed, 0, left, 1);
        builder.connect(shared, 0, right, 0);
        builder.connect(shared, 0, right, 1);
        builder.connect(left, 0, mul, 0);
        builder.connect(right, 0, mul, 1);
        builder.connect(mul, 0, result, 1);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        // (11 + 1) * (11 + 11)
        assert_eq!(returned(&vm, "main", &[]), Value::Int(264));
        assert_eq!(probes.step_count(), 1);
    }

    #[test]
    fn test_dependencies_rerun_on_every_visit() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let counter = LocalVariable::new("counter", 0_i64);
        let mut builder = GraphBuilder::new("visits");
        let entry = builder.add(|id| function_entry(id, &[]));
        let first = builder.add(|id| assign_local_variable(id, &counter));
        let second = builder.add(|id| assign_local_variable(id, &counter));
        let read = builder.add(|id| local_variable(id, &counter));
        let increment = builder.add(|id| counted_add(id, 1));
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, first, 0);
        builder.connect(first, 0, second, 0);
        builder.connect(second, 0, result, 0);
        builder.connect(read, 0, increment, 0);
        builder.connect(increment, 0, first, 1);
        builder.connect(increment, 0, second, 1);
        builder.connect(read, 0, result, 1);

        let definition = FunctionDefinition::new("main", entry).with_local(counter);
        vm.register_function(&builder.build(), &definition).unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Int(2));
        assert_eq!(probes.step_count(), 2);
    }

    #[test]
    fn test_deterministic_visit_order() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("order");
        let entry = builder.add(|id| function_entry(id, &[]));
        let steps = builder.add(|id| sequence(id, 3));
        let a = builder.add(probe);
        let b = builder.add(probe);
        let nested = builder.add(|id| sequence(id, 2));
        let c = builder.add(probe);
        let d = builder.add(probe);
        let e = builder.add(probe);
        builder.connect(entry, 0, steps, 0);
        builder.connect(steps, 0, a, 0);
        builder.connect(a, 0, b, 0);
        builder.connect(steps, 1, nested, 0);
        builder.connect(nested, 0, c, 0);
        builder.connect(nested, 1, d, 0);
        builder.connect(steps, 2, e, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Nil);
        let first = probes.visits();
        assert_eq!(first, vec![a, b, c, d, e]);

        assert_eq!(returned(&vm, "main", &[]), Value::Nil);
        assert_eq!(probes.visits()[5..], first[..]);
    }

    #[test]
    fn test_defaults_are_fresh_every_call() {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("defaults");
        let entry = builder.add(|id| function_entry(id, &[]));
        let sum = builder.add(|id| {
            let mut node = operator(id, Operator::Add);
            node.pins[0] = node.pins[0].clone().with_default(40_i64);
            node.pins[1] = node.pins[1].clone().with_default(2_i64);
            node
        });
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, result, 0);
        builder.connect(sum, 0, result, 1);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Int(42));
        assert_eq!(returned(&vm, "main", &[]), Value::Int(42));
    }

    #[test]
    fn test_trash_writes_do_not_leak() {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        let kept = LocalVariable::new("kept", 0_i64);
        let mut builder = GraphBuilder::new("trash");
        let entry = builder.add(|id| function_entry(id, &[]));
        let assign = builder.add(|id| assign_local_variable(id, &kept));
        let seven = builder.add(|id| constant(id, 7_i64));
        let sink = builder.add(scatter);
        let read = builder.add(|id| local_variable(id, &kept));
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, assign, 0);
        builder.connect(seven, 0, assign, 1);
        builder.connect(assign, 0, sink, 0);
        builder.connect(sink, 0, result, 0);
        builder.connect(read, 0, result, 1);

        let definition = FunctionDefinition::new("main", entry).with_local(kept);
        vm.register_function(&builder.build(), &definition).unwrap();

        let value = returned(&vm, "main", &[]);
        assert_eq!(value, Value::Int(7));
        assert_ne!(value, Value::Int(SCATTER_MARKER));
    }

    #[test]
    fn test_for_loop_sum() {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        let total = LocalVariable::new("total", 0_i64);
        let mut builder = GraphBuilder::new("sum");
        let entry = builder.add(|id| function_entry(id, &[]));
        let looped = builder.add(|id| for_loop(id, 1, 4));
        let assign = builder.add(|id| assign_local_variable(id, &total));
        let read = builder.add(|id| local_variable(id, &total));
        let add = builder.add(|id| operator(id, Operator::Add));
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, looped, 0);
        builder.connect(looped, 0, assign, 0);
        builder.connect(read, 0, add, 0);
        builder.connect(looped, 1, add, 1);
        builder.connect(add, 0, assign, 1);
        builder.connect(looped, 2, result, 0);
        builder.connect(read, 0, result, 1);

        let definition = FunctionDefinition::new("sum", entry).with_local(total);
        vm.register_function(&builder.build(), &definition).unwrap();

        assert_eq!(returned(&vm, "sum", &[]), Value::Int(10));
        // Locals start from their default on every call
        assert_eq!(returned(&vm, "sum", &[]), Value::Int(10));
    }

    #[test]
    fn test_for_loop_break() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("break");
        let entry = builder.add(|id| function_entry(id, &[]));
        let looped = builder.add(|id| for_loop(id, 1, 100));
        let body = builder.add(probe);
        let done = builder.add(probe);
        builder.connect(entry, 0, looped, 0);
        builder.connect(looped, 0, body, 0);
        builder.connect(body, 0, looped, 1);
        builder.connect(looped, 2, done, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Nil);
        assert_eq!(probes.visits(), vec![body, done]);
    }

    #[test]
    fn test_loop_iteration_limit() {
        let (mut vm, _) = test_vm(RuntimeSettings {
            max_loop_iterations: 3,
            ..Default::default()
        });
        let mut builder = GraphBuilder::new("limit");
        let entry = builder.add(|id| function_entry(id, &[]));
        let looped = builder.add(|id| for_loop(id, 0, 10));
        builder.connect(entry, 0, looped, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        let error = vm.call("main", &[]).unwrap_err();
        assert_eq!(error.kind, CallErrorKind::NodeFailure);
        assert_eq!(error.node, Some(looped));
    }

    #[test]
    fn test_while_loop_with_branch() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let count = LocalVariable::new("count", 0_i64);
        let mut builder = GraphBuilder::new("while");
        let entry = builder.add(|id| function_entry(id, &[]));
        let looped = builder.add(while_loop);
        let read = builder.add(|id| local_variable(id, &count));
        let limit = builder.add(|id| constant(id, 5_i64));
        let less = builder.add(|id| operator(id, Operator::Less));
        let assign = builder.add(|id| assign_local_variable(id, &count));
        let one = builder.add(|id| constant(id, 1_i64));
        let increment = builder.add(|id| operator(id, Operator::Add));
        let two = builder.add(|id| constant(id, 2_i64));
        let is_two = builder.add(|id| operator(id, Operator::Equal));
        let check = builder.add(branch);
        let hit = builder.add(probe);
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));

        builder.connect(entry, 0, looped, 0);
        builder.connect(read, 0, less, 0);
        builder.connect(limit, 0, less, 1);
        builder.connect(less, 0, looped, 1);
        builder.connect(looped, 0, assign, 0);
        builder.connect(read, 0, increment, 0);
        builder.connect(one, 0, increment, 1);
        builder.connect(increment, 0, assign, 1);
        builder.connect(assign, 0, check, 0);
        builder.connect(read, 0, is_two, 0);
        builder.connect(two, 0, is_two, 1);
        builder.connect(is_two, 0, check, 1);
        builder.connect(check, 0, hit, 0);
        builder.connect(looped, 1, result, 0);
        builder.connect(read, 0, result, 1);

        let definition = FunctionDefinition::new("main", entry).with_local(count);
        vm.register_function(&builder.build(), &definition).unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Int(5));
        assert_eq!(probes.visits(), vec![hit]);
    }

    #[test]
    fn test_flow_stack_overflow() {
        let (mut vm, probes) = test_vm(RuntimeSettings {
            flow_stack_size: 4,
            ..Default::default()
        });
        let mut builder = GraphBuilder::new("deep");
        let entry = builder.add(|id| function_entry(id, &[]));
        let mut previous = entry;
        for _ in 0..4 {
            let next = builder.add(|id| sequence(id, 2));
            builder.connect(previous, 0, next, 0);
            previous = next;
        }
        let leaf = builder.add(probe);
        builder.connect(previous, 0, leaf, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        let error = vm.call("main", &[]).unwrap_err();
        assert_eq!(error.kind, CallErrorKind::StackOverflow);
        assert!(probes.visits().is_empty());

        // Same graph fits with the default flow stack
        let (mut roomy, _) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("deep");
        let entry = builder.add(|id| function_entry(id, &[]));
        let steps = builder.add(|id| sequence(id, 2));
        builder.connect(entry, 0, steps, 0);
        roomy.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();
        assert!(roomy.call("main", &[]).is_ok());
    }

    #[test]
    fn test_go_back_returns_to_previous_entry() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("go_back");
        let entry = builder.add(|id| function_entry(id, &[]));
        let steps = builder.add(|id| sequence(id, 2));
        let back = builder.add(|id| fixed_step(id, "go_back"));
        let after = builder.add(probe);
        let result = builder.add(|id| {
            let mut node = function_result(id, Some(ValueType::Int));
            node.pins[1] = node.pins[1].clone().with_default(7_i64);
            node
        });
        builder.connect(entry, 0, steps, 0);
        builder.connect(steps, 0, back, 0);
        builder.connect(back, 0, after, 0);
        builder.connect(steps, 1, result, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Int(7));
        assert!(probes.visits().is_empty());

        // Going back from the first entry just ends the call
        let mut builder = GraphBuilder::new("go_back_root");
        let root = builder.add(|id| fixed_step(id, "go_back"));
        vm.register_function(&builder.build(), &FunctionDefinition::new("root", root))
            .unwrap();
        assert_eq!(returned(&vm, "root", &[]), Value::Nil);
    }

    #[test]
    fn test_step_protocol_violations() {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        for (name, step) in [("end", "end"), ("yield", "yield"), ("bad_port", "bad_port")] {
            let mut builder = GraphBuilder::new(name);
            let entry = builder.add(|id| function_entry(id, &[]));
            let node = builder.add(|id| fixed_step(id, step));
            builder.connect(entry, 0, node, 0);
            vm.register_function(&builder.build(), &FunctionDefinition::new(name, entry))
                .unwrap();

            let error = vm.call(name, &[]).unwrap_err();
            assert_eq!(error.kind, CallErrorKind::InvalidMethod, "{name}");
            assert_eq!(error.node, Some(node));
        }

        let message = vm.call("end", &[]).unwrap_err().reason;
        assert_eq!(message, "Return value should be assigned to node's working memory");
    }

    #[test]
    fn test_dependency_flow_results_are_rejected() {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        for step in ["yield", "end", "push", "go_back"] {
            let mut builder = GraphBuilder::new(step);
            let entry = builder.add(|id| function_entry(id, &[]));
            let source = builder.add(|id| data_step(id, step));
            let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
            builder.connect(entry, 0, result, 0);
            builder.connect(source, 0, result, 1);
            vm.register_function(&builder.build(), &FunctionDefinition::new(step, entry))
                .unwrap();

            let error = vm.call(step, &[]).unwrap_err();
            assert_eq!(error.kind, CallErrorKind::InvalidMethod, "{step}");
            assert_eq!(error.node, Some(source), "{step}");
            assert_eq!(error.reason, "Data dependency returned a flow result");
        }
    }

    #[test]
    fn test_local_variables_keep_separate_slots() {
        let x = LocalVariable::new("x", 1_i64);
        let y = LocalVariable::new("y", 2_i64);

        let register = |vm: &mut ScriptVm, name: &str, returned: &LocalVariable| -> [NodeId; 3] {
            let mut builder = GraphBuilder::new(name);
            let entry = builder.add(|id| function_entry(id, &[]));
            let assign = builder.add(|id| assign_local_variable(id, &x));
            let nine = builder.add(|id| constant(id, 9_i64));
            let read = builder.add(|id| local_variable(id, returned));
            let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
            builder.connect(entry, 0, assign, 0);
            builder.connect(nine, 0, assign, 1);
            builder.connect(assign, 0, result, 0);
            builder.connect(read, 0, result, 1);

            let definition = FunctionDefinition::new(name, entry)
                .with_local(x.clone())
                .with_local(y.clone());
            vm.register_function(&builder.build(), &definition).unwrap();
            [assign, read, result]
        };

        let (mut vm, _) = test_vm(RuntimeSettings::default());
        let [assign_x, read_y, _] = register(&mut vm, "read_y", &y);
        let [_, read_x, _] = register(&mut vm, "read_x", &x);

        assert_eq!(returned(&vm, "read_y", &[]), Value::Int(2));
        assert_eq!(returned(&vm, "read_x", &[]), Value::Int(9));

        let compiled = vm.function("read_y").unwrap();
        let x_slot = compiled.instance(assign_x).unwrap().working_memory_index();
        let y_slot = compiled.instance(read_y).unwrap().working_memory_index();
        assert!(x_slot.is_some() && y_slot.is_some());
        assert_ne!(x_slot, y_slot);

        let compiled = vm.function("read_x").unwrap();
        assert_eq!(
            compiled.instance(assign_x).unwrap().working_memory_index(),
            compiled.instance(read_x).unwrap().working_memory_index()
        );
    }

    #[test]
    fn test_executed_node_missing_from_flow_stack() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("stale");
        let entry = builder.add(|id| function_entry(id, &[]));
        let next = builder.add(probe);
        builder.connect(entry, 0, next, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        let (function, mut context) = vm.prepare("main", &[]).unwrap();
        let executed = function.instance(next).unwrap().execution_index();
        context.stack.set_executed(executed, true);

        let start = function.entry_index();
        let error = execute(function, context, start, 0, false).unwrap_err();
        assert_eq!(error.kind, CallErrorKind::InvalidMethod);
        assert_eq!(error.node, Some(entry));
        assert_eq!(error.reason, "Found execution bit but not the node in the stack");
        assert!(probes.visits().is_empty());
    }

    #[test]
    fn test_failed_call_releases_slots() {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        let arguments = [Argument::new("target", ValueType::Object)];
        let mut builder = GraphBuilder::new("failing");
        let entry = builder.add(|id| function_entry(id, &arguments));
        let zero = builder.add(|id| constant(id, 0_i64));
        let divide = builder.add(|id| operator(id, Operator::Divide));
        let result = builder.add(|id| function_result(id, Some(ValueType::Int)));
        builder.connect(entry, 0, result, 0);
        builder.connect(zero, 0, divide, 0);
        builder.connect(zero, 0, divide, 1);
        builder.connect(divide, 0, result, 1);
        let definition = FunctionDefinition::new("main", entry).with_argument("target", ValueType::Object);
        vm.register_function(&builder.build(), &definition).unwrap();

        let target = ObjectRef::new(String::from("player"));
        let error = vm.call("main", &[Value::Object(target.clone())]).unwrap_err();
        assert_eq!(error.kind, CallErrorKind::NodeFailure);
        assert_eq!(error.node, Some(divide));
        assert_eq!(target.handle_count(), 1);
    }

    #[test]
    fn test_single_node_body() {
        let (mut vm, probes) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("entry");
        let entry = builder.add(|id| function_entry(id, &[]));
        let only = builder.add(probe);
        builder.connect(entry, 0, only, 0);
        vm.register_function(&builder.build(), &FunctionDefinition::new("main", entry))
            .unwrap();

        assert_eq!(returned(&vm, "main", &[]), Value::Nil);
        assert_eq!(probes.visits(), vec![only]);
    }
}

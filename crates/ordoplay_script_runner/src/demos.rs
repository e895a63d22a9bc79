// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo scripts assembled in code.

use ordoplay_script_graph::{
    ConnectionError, FunctionDefinition, NodeId, Script, ScriptGraph, ScriptNode, ValueType,
    VariableDefinition,
};
use ordoplay_script_vm::nodes::flow_control::for_loop;
use ordoplay_script_vm::nodes::functions::{function_entry, function_result};
use ordoplay_script_vm::nodes::math::{constant, operator, Operator};
use ordoplay_script_vm::nodes::signals::await_event;
use ordoplay_script_vm::nodes::utilities::print;
use ordoplay_script_vm::nodes::variables::{variable_get, variable_set};

/// Event the greeter waits for
pub const PLAYER_JOINED: &str = "player_joined";

fn add(graph: &mut ScriptGraph, build: impl FnOnce(NodeId) -> ScriptNode) -> NodeId {
    let id = graph.next_node_id();
    graph.add_node(build(id))
}

/// `product(a) = (a + 1) * (a + 2)`
fn product(graph: &mut ScriptGraph) -> Result<FunctionDefinition, ConnectionError> {
    let definition = FunctionDefinition::new("product", graph.next_node_id()).with_argument("a", ValueType::Int);
    let entry = add(graph, |id| function_entry(id, &definition.arguments));
    let one = add(graph, |id| constant(id, 1_i64));
    let two = add(graph, |id| constant(id, 2_i64));
    let plus_one = add(graph, |id| operator(id, Operator::Add));
    let plus_two = add(graph, |id| operator(id, Operator::Add));
    let times = add(graph, |id| operator(id, Operator::Multiply));
    let result = add(graph, |id| function_result(id, Some(ValueType::Int)));

    graph.connect(entry, 0, result, 0)?;
    graph.connect(entry, 1, plus_one, 0)?;
    graph.connect(one, 0, plus_one, 1)?;
    graph.connect(entry, 1, plus_two, 0)?;
    graph.connect(two, 0, plus_two, 1)?;
    graph.connect(plus_one, 0, times, 0)?;
    graph.connect(plus_two, 0, times, 1)?;
    graph.connect(times, 0, result, 1)?;
    Ok(definition)
}

/// Prints 1 to `count`, then bumps the `runs` variable
fn countdown(graph: &mut ScriptGraph) -> Result<FunctionDefinition, ConnectionError> {
    let definition =
        FunctionDefinition::new("countdown", graph.next_node_id()).with_argument("count", ValueType::Int);
    let entry = add(graph, |id| function_entry(id, &definition.arguments));
    let looped = add(graph, |id| for_loop(id, 1, 0));
    let say = add(graph, |id| print(id, ""));
    let runs = add(graph, |id| variable_get(id, "runs", ValueType::Int));
    let one = add(graph, |id| constant(id, 1_i64));
    let bump = add(graph, |id| operator(id, Operator::Add));
    let store = add(graph, |id| variable_set(id, "runs", ValueType::Int));
    let result = add(graph, |id| function_result(id, Some(ValueType::Int)));

    graph.connect(entry, 0, looped, 0)?;
    graph.connect(entry, 1, looped, 3)?;
    graph.connect(looped, 0, say, 0)?;
    graph.connect(looped, 1, say, 1)?;
    graph.connect(looped, 2, store, 0)?;
    graph.connect(runs, 0, bump, 0)?;
    graph.connect(one, 0, bump, 1)?;
    graph.connect(bump, 0, store, 1)?;
    graph.connect(store, 0, result, 0)?;
    graph.connect(store, 1, result, 1)?;
    Ok(definition)
}

/// Waits for a player and returns their name
fn greeter(graph: &mut ScriptGraph) -> Result<FunctionDefinition, ConnectionError> {
    let definition = FunctionDefinition::new("greeter", graph.next_node_id());
    let entry = add(graph, |id| function_entry(id, &[]));
    let waiting = add(graph, |id| print(id, "Waiting for a player"));
    let wait = add(graph, |id| await_event(id, PLAYER_JOINED));
    let welcome = add(graph, |id| print(id, ""));
    let result = add(graph, |id| function_result(id, Some(ValueType::String)));

    graph.connect(entry, 0, waiting, 0)?;
    graph.connect(waiting, 0, wait, 0)?;
    graph.connect(wait, 0, welcome, 0)?;
    graph.connect(wait, 1, welcome, 1)?;
    graph.connect(welcome, 0, result, 0)?;
    graph.connect(wait, 1, result, 1)?;
    Ok(definition)
}

/// The demo script: `product`, `countdown` and `greeter`
pub fn demo_script() -> Result<Script, ConnectionError> {
    let mut graph = ScriptGraph::new("demo");
    let functions = [product(&mut graph)?, countdown(&mut graph)?, greeter(&mut graph)?];

    let mut script = Script::new(graph);
    for function in functions {
        script.add_function(function);
    }
    script.add_variable(VariableDefinition::new("runs", ValueType::Int).exported());
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_script_graph::Value;
    use ordoplay_script_vm::{EventHub, ScriptVm};

    #[test]
    fn test_demo_script_runs() {
        let script = demo_script().unwrap();
        let mut vm = ScriptVm::default();
        let report = vm.load_script(&script);
        assert!(report.is_ok(), "{report:?}");

        let outcome = vm.call("product", &[Value::Int(3)]).unwrap();
        assert_eq!(outcome.returned(), Some(&Value::Int(20)));

        vm.call("countdown", &[Value::Int(3)]).unwrap();
        let outcome = vm.call("countdown", &[Value::Int(0)]).unwrap();
        assert_eq!(outcome.returned(), Some(&Value::Int(2)));

        let mut hub = EventHub::new();
        let continuation = vm.call("greeter", &[]).unwrap().into_continuation().unwrap();
        hub.bind(continuation).unwrap();
        let results = hub.emit(PLAYER_JOINED, &[Value::from("Ada")]);
        assert_eq!(results[0].as_ref().unwrap().returned(), Some(&Value::from("Ada")));
    }
}

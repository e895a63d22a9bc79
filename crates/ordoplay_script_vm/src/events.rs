// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-shot event binding for suspended calls.

use crate::continuation::Continuation;
use crate::error::CallError;
use crate::interpreter::CallOutcome;
use indexmap::IndexMap;
use ordoplay_script_graph::Value;

/// Continuations waiting for named events.
///
/// Emitting an event resumes and forgets everything bound to it.
#[derive(Debug, Default)]
pub struct EventHub {
    listeners: IndexMap<String, Vec<Continuation>>,
}

impl EventHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a continuation to the event it awaits
    pub fn bind(&mut self, continuation: Continuation) -> Result<(), Continuation> {
        match continuation.awaited_event().map(str::to_string) {
            Some(event) => {
                self.bind_to(event, continuation);
                Ok(())
            }
            None => Err(continuation),
        }
    }

    /// Bind a continuation to an explicit event
    pub fn bind_to(&mut self, event: impl Into<String>, continuation: Continuation) {
        self.listeners.entry(event.into()).or_default().push(continuation);
    }

    /// Resume every continuation bound to `event`, in binding order
    pub fn emit(&mut self, event: &str, arguments: &[Value]) -> Vec<Result<CallOutcome, CallError>> {
        let Some(listeners) = self.listeners.shift_remove(event) else {
            tracing::warn!("Event '{}' emitted with no listeners", event);
            return Vec::new();
        };

        tracing::debug!(event, listeners = listeners.len(), "Emitting event");
        listeners
            .into_iter()
            .map(|mut continuation| continuation.resume(arguments))
            .collect()
    }

    /// Continuations waiting for `event`
    pub fn pending(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Continuations waiting for any event
    pub fn total_pending(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Drop every bound continuation. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.total_pending();
        self.listeners.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::functions::{function_entry, function_result};
    use crate::nodes::signals::await_event;
    use crate::settings::RuntimeSettings;
    use crate::test_support::{test_vm, GraphBuilder};
    use crate::vm::ScriptVm;
    use ordoplay_script_graph::{FunctionDefinition, ValueType};

    /// Returns whatever the "spawned" event carries
    fn vm() -> ScriptVm {
        let (mut vm, _) = test_vm(RuntimeSettings::default());
        let mut builder = GraphBuilder::new("listener");
        let entry = builder.add(|id| function_entry(id, &[]));
        let wait = builder.add(|id| await_event(id, "spawned"));
        let result = builder.add(|id| function_result(id, Some(ValueType::Any)));
        builder.connect(entry, 0, wait, 0);
        builder.connect(wait, 0, result, 0);
        builder.connect(wait, 1, result, 1);
        vm.register_function(&builder.build(), &FunctionDefinition::new("listener", entry))
            .unwrap();
        vm
    }

    fn suspend(vm: &ScriptVm) -> Continuation {
        vm.call("listener", &[]).unwrap().into_continuation().unwrap()
    }

    #[test]
    fn test_emit_resumes_bound_continuations() {
        let vm = vm();
        let mut hub = EventHub::new();
        hub.bind(suspend(&vm)).unwrap();
        suspend(&vm).bind_to(&mut hub).unwrap();
        assert_eq!(hub.pending("spawned"), 2);

        let results = hub.emit("spawned", &[Value::from("orc")]);
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.as_ref().unwrap().returned(), Some(&Value::from("orc")));
        }

        assert_eq!(hub.pending("spawned"), 0);
        assert!(hub.emit("spawned", &[]).is_empty());
    }

    #[test]
    fn test_resume_arguments_shape() {
        let vm = vm();
        let mut hub = EventHub::new();
        hub.bind_to("many", suspend(&vm));
        hub.bind_to("none", suspend(&vm));

        let many = hub.emit("many", &[Value::Int(1), Value::Int(2)]);
        assert_eq!(
            many[0].as_ref().unwrap().returned(),
            Some(&Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
        let none = hub.emit("none", &[]);
        assert_eq!(none[0].as_ref().unwrap().returned(), Some(&Value::Nil));
    }

    #[test]
    fn test_clear_drops_pending() {
        let vm = vm();
        let mut hub = EventHub::new();
        hub.bind(suspend(&vm)).unwrap();
        hub.bind_to("other", suspend(&vm));
        assert_eq!(hub.total_pending(), 2);
        assert_eq!(hub.clear(), 2);
        assert_eq!(hub.total_pending(), 0);
    }
}

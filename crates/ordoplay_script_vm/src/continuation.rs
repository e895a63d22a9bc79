// SPDX-License-Identifier: MIT OR Apache-2.0
//! Suspended calls.

use crate::context::ExecutionContext;
use crate::error::{CallError, CallErrorKind};
use crate::events::EventHub;
use crate::function::CompiledFunction;
use crate::interpreter::{self, CallOutcome};
use ordoplay_script_graph::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
struct SuspendedCall {
    function: Arc<CompiledFunction>,
    context: ExecutionContext,
    node: usize,
    port: usize,
}

/// A call suspended by a yielding node.
///
/// Owns the call's whole stack. Resuming consumes it, so a continuation runs
/// at most once; dropping one that was never resumed releases its slots.
#[derive(Debug)]
pub struct Continuation {
    id: Uuid,
    function_name: String,
    awaited_event: Option<String>,
    stack_size: usize,
    suspended: Option<SuspendedCall>,
}

impl Continuation {
    pub(crate) fn capture(
        function: Arc<CompiledFunction>,
        mut context: ExecutionContext,
        node: usize,
        port: usize,
    ) -> Self {
        let awaited_event = context.take_awaited_event();
        context.set_resume_arguments(Vec::new());

        Self {
            id: Uuid::new_v4(),
            function_name: function.name.clone(),
            awaited_event,
            stack_size: context.stack.stack_size(),
            suspended: Some(SuspendedCall {
                function,
                context,
                node,
                port,
            }),
        }
    }

    /// Unique ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the suspended function
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Event the yielding node waits for
    pub fn awaited_event(&self) -> Option<&str> {
        self.awaited_event.as_deref()
    }

    /// Size of the captured stack in bytes
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Whether the continuation can still be resumed
    pub fn is_valid(&self) -> bool {
        self.suspended.is_some()
    }

    /// Continue the call. The yielding node is re-entered in resume mode and
    /// sees `arguments` through [`ExecutionContext::resume_arguments`].
    pub fn resume(&mut self, arguments: &[Value]) -> Result<CallOutcome, CallError> {
        let Some(suspended) = self.suspended.take() else {
            let error = CallError::new(
                CallErrorKind::InvalidMethod,
                self.function_name.as_str(),
                "Continuation has already been resumed",
            );
            tracing::error!("Script call failed: {}", error);
            return Err(error);
        };

        let SuspendedCall {
            function,
            mut context,
            node,
            port,
        } = suspended;
        context.set_resume_arguments(arguments.to_vec());

        tracing::debug!(function = %self.function_name, id = %self.id, "Resuming call");
        interpreter::execute(function, context, node, port, true)
    }

    /// File this continuation in an event hub under its awaited event.
    /// Gives the continuation back when it awaits nothing.
    pub fn bind_to(self, hub: &mut EventHub) -> Result<(), Continuation> {
        hub.bind(self)
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        if self.suspended.is_some() {
            tracing::warn!(
                function = %self.function_name,
                id = %self.id,
                "Continuation dropped without being resumed"
            );
        }
    }
}

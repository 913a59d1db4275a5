//! Fan-out/fan-in execution of a requires-action tool batch.
//!
//! All calls in one `requires_action` event are resolved as a complete set:
//! handlers run concurrently, the coordinator waits for every one to
//! settle, and the output batch carries exactly one entry per call id.
//! Partial submission is not a valid protocol state, so per-call failures
//! (malformed arguments, unregistered names, handler errors) are recorded
//! in that call's output slot instead of aborting siblings.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use crate::protocol::{ToolCallRequest, ToolOutput};

use super::registry::ArcTool;
use super::ToolRegistry;

/// Executes tool call batches against a registry.
pub struct ToolCallCoordinator {
    registry: Arc<ToolRegistry>,
}

impl ToolCallCoordinator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute every call in the batch concurrently and collect one output
    /// per call id. Output order follows the request batch; callers may
    /// submit in any order.
    pub async fn execute_batch(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutput> {
        debug!(calls = calls.len(), "Executing tool call batch");
        let futures = calls.iter().map(|call| self.execute_one(call));
        join_all(futures).await
    }

    async fn execute_one(&self, call: &ToolCallRequest) -> ToolOutput {
        let output = match self.resolve(call) {
            Resolved::Tool { tool, args } => match tool.call(args).await {
                Ok(output) => {
                    debug!(tool = %call.function_name, call_id = %call.id, "Tool call succeeded");
                    output
                }
                Err(e) => {
                    warn!(tool = %call.function_name, call_id = %call.id, error = %e, "Tool call failed");
                    json!({ "error": e.to_string() }).to_string()
                }
            },
            Resolved::MalformedArguments(e) => {
                warn!(
                    tool = %call.function_name,
                    call_id = %call.id,
                    error = %e,
                    "Malformed tool arguments; recording failed output"
                );
                json!({ "error": format!("malformed arguments: {e}") }).to_string()
            }
            Resolved::Unregistered => {
                warn!(tool = %call.function_name, call_id = %call.id, "Tool not registered; recording empty output");
                String::new()
            }
        };

        ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        }
    }

    fn resolve(&self, call: &ToolCallRequest) -> Resolved {
        // Parse before dispatch so one bad argument string cannot take the
        // whole batch down.
        let args = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return Resolved::MalformedArguments(e),
        };
        match self.registry.get(&call.function_name) {
            Some(tool) => Resolved::Tool { tool, args },
            None => Resolved::Unregistered,
        }
    }
}

enum Resolved {
    Tool {
        tool: ArcTool,
        args: serde_json::Value,
    },
    MalformedArguments(serde_json::Error),
    Unregistered,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{KitchenTool, ToolError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            function_name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    struct StaticTool {
        name: &'static str,
        output: &'static str,
    }

    #[async_trait]
    impl KitchenTool for StaticTool {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn call(&self, _args: serde_json::Value) -> Result<String, ToolError> {
            Ok(self.output.to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl KitchenTool for FailingTool {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn call(&self, _args: serde_json::Value) -> Result<String, ToolError> {
            Err(ToolError::Failed("oven on fire".to_string()))
        }
    }

    /// Blocks until every sibling in the batch has started, which only
    /// happens if the coordinator actually fans out.
    struct RendezvousTool {
        name: &'static str,
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl KitchenTool for RendezvousTool {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn call(&self, _args: serde_json::Value) -> Result<String, ToolError> {
            self.barrier.wait().await;
            Ok(self.name.to_string())
        }
    }

    fn coordinator(tools: Vec<ArcTool>) -> ToolCallCoordinator {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        ToolCallCoordinator::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn batch_is_complete_with_matching_ids() {
        let coordinator = coordinator(vec![
            Arc::new(StaticTool { name: "a", output: "out-a" }),
            Arc::new(StaticTool { name: "b", output: "out-b" }),
        ]);
        let calls = vec![call("c1", "a", "{}"), call("c2", "b", "{}"), call("c3", "a", "{}")];

        let outputs = coordinator.execute_batch(&calls).await;

        assert_eq!(outputs.len(), 3);
        let ids: HashSet<_> = outputs.iter().map(|o| o.tool_call_id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["c1", "c2", "c3"]));
    }

    #[tokio::test]
    async fn malformed_arguments_do_not_block_siblings() {
        let coordinator = coordinator(vec![Arc::new(StaticTool { name: "a", output: "ok" })]);
        let calls = vec![
            call("c1", "a", "{}"),
            call("c2", "a", "{not json"),
            call("c3", "a", "{}"),
        ];

        let outputs = coordinator.execute_batch(&calls).await;

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].output, "ok");
        assert!(outputs[1].output.contains("malformed arguments"));
        assert_eq!(outputs[2].output, "ok");
    }

    #[tokio::test]
    async fn unregistered_tool_yields_empty_output() {
        let coordinator = coordinator(vec![Arc::new(StaticTool { name: "a", output: "ok" })]);
        let calls = vec![call("c1", "missing", "{}"), call("c2", "a", "{}")];

        let outputs = coordinator.execute_batch(&calls).await;

        assert_eq!(outputs[0].output, "");
        assert_eq!(outputs[1].output, "ok");
    }

    #[tokio::test]
    async fn handler_error_is_recorded_not_propagated() {
        let coordinator = coordinator(vec![
            Arc::new(FailingTool),
            Arc::new(StaticTool { name: "a", output: "ok" }),
        ]);
        let calls = vec![call("c1", "broken", "{}"), call("c2", "a", "{}")];

        let outputs = coordinator.execute_batch(&calls).await;

        assert!(outputs[0].output.contains("oven on fire"));
        assert_eq!(outputs[1].output, "ok");
    }

    #[tokio::test]
    async fn handlers_run_concurrently() {
        // Each handler waits for the other to start. Sequential execution
        // would never reach the barrier twice and the timeout would fire.
        let barrier = Arc::new(Barrier::new(2));
        let coordinator = coordinator(vec![
            Arc::new(RendezvousTool { name: "x", barrier: barrier.clone() }),
            Arc::new(RendezvousTool { name: "y", barrier }),
        ]);
        let calls = vec![call("c1", "x", "{}"), call("c2", "y", "{}")];

        let outputs = tokio::time::timeout(Duration::from_secs(1), coordinator.execute_batch(&calls))
            .await
            .expect("handlers did not run concurrently");

        assert_eq!(outputs.len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_outputs() {
        let coordinator = coordinator(vec![]);
        let outputs = coordinator.execute_batch(&[]).await;
        assert!(outputs.is_empty());
    }
}

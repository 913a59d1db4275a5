//! Kitchen tools the assistant can invoke.
//!
//! When a run pauses on `requires_action`, each requested call names one of
//! these tools. A tool takes JSON arguments and returns a string output
//! that is submitted back to the run. Registration lives in
//! [`ToolRegistry`]; batch execution in [`ToolCallCoordinator`].

mod coordinator;
mod drafter;
mod meal;
mod recipe;
mod registry;
mod shopping;

pub use coordinator::ToolCallCoordinator;
pub use drafter::{HttpRecipeDrafter, RecipeDraft, RecipeDrafter};
pub use meal::AddMealTool;
pub use recipe::CreateRecipeTool;
pub use registry::ToolRegistry;
pub use shopping::AddShoppingItemsTool;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a single tool invocation. Always isolated to that call;
/// the coordinator records the failure and the rest of the batch proceeds.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("record store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("tool failed: {0}")]
    Failed(String),
}

/// A named local capability the remote run may invoke.
#[async_trait]
pub trait KitchenTool: Send + Sync {
    /// The function name the remote model calls this tool by.
    fn name(&self) -> &'static str;

    /// Execute with parsed-JSON arguments and produce the output string
    /// submitted back to the run.
    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError>;
}

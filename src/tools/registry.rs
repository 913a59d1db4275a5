//! Tool registry.
//!
//! Maps function names requested by the run to local [`KitchenTool`]
//! handlers. Lookups for unregistered names return `None`; the coordinator
//! turns those into logged no-op outputs rather than errors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::RecordStore;

use super::{
    AddMealTool, AddShoppingItemsTool, CreateRecipeTool, KitchenTool, RecipeDrafter,
};

/// Arc-wrapped tool for shared ownership across concurrent invocations.
pub type ArcTool = Arc<dyn KitchenTool>;

/// Registry of tools available to assistant runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, ArcTool>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard kitchen tools wired to a record store.
    pub fn with_kitchen_tools(
        store: Arc<dyn RecordStore>,
        drafter: Arc<dyn RecipeDrafter>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CreateRecipeTool::new(store.clone(), drafter)));
        registry.register(Arc::new(AddShoppingItemsTool::new(store.clone())));
        registry.register(Arc::new(AddMealTool::new(store)));
        registry
    }

    /// Register a tool under its own name. Replaces any previous tool with
    /// the same name.
    pub fn register(&mut self, tool: ArcTool) {
        self.tools.insert(tool.name(), tool);
    }

    /// Look up a tool by function name.
    pub fn get(&self, name: &str) -> Option<ArcTool> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted for stable output.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

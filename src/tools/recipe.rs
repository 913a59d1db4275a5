//! `create_recipe` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::store::{fields, kinds, RecordStore};

use super::{KitchenTool, RecipeDrafter, ToolError};

/// Drafts a recipe from a text prompt and writes it to the record store.
/// Returns the created record as JSON so the run can cite it.
pub struct CreateRecipeTool {
    store: Arc<dyn RecordStore>,
    drafter: Arc<dyn RecipeDrafter>,
}

#[derive(Debug, Deserialize)]
struct CreateRecipeArgs {
    prompt: String,
}

impl CreateRecipeTool {
    pub fn new(store: Arc<dyn RecordStore>, drafter: Arc<dyn RecipeDrafter>) -> Self {
        Self { store, drafter }
    }
}

#[async_trait]
impl KitchenTool for CreateRecipeTool {
    fn name(&self) -> &'static str {
        "create_recipe"
    }

    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: CreateRecipeArgs = serde_json::from_value(args)?;
        debug!(prompt = %args.prompt, "Drafting recipe");

        let draft = self.drafter.draft(&args.prompt).await?;
        let created = self
            .store
            .create(
                kinds::RECIPES,
                vec![fields(&[
                    ("name", json!(draft.name)),
                    ("ingredients", json!(draft.ingredients)),
                    ("method", json!(draft.method)),
                    ("serves", json!(draft.serves)),
                ])],
            )
            .await?;

        let record = created
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::Failed("store created no record".to_string()))?;
        info!(recipe_id = %record.id, name = %draft.name, "Recipe created");

        Ok(json!({ "id": record.id, "fields": record.fields }).to_string())
    }
}

//! `add_shopping_items` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::store::{create_chunked, fields, kinds, Fields, RecordStore};

use super::{KitchenTool, ToolError};

/// Writes shopping list items to the record store, chunking large lists to
/// respect the store's batch cap.
pub struct AddShoppingItemsTool {
    store: Arc<dyn RecordStore>,
}

#[derive(Debug, Deserialize)]
struct AddShoppingItemsArgs {
    items: Vec<ShoppingItemArgs>,
}

#[derive(Debug, Deserialize)]
struct ShoppingItemArgs {
    item: String,
    #[serde(default)]
    quantity: String,
    #[serde(default)]
    category: String,
}

impl AddShoppingItemsTool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KitchenTool for AddShoppingItemsTool {
    fn name(&self) -> &'static str {
        "add_shopping_items"
    }

    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: AddShoppingItemsArgs = serde_json::from_value(args)?;
        debug!(items = args.items.len(), "Adding shopping items");

        let batch: Vec<Fields> = args
            .items
            .iter()
            .map(|item| {
                fields(&[
                    ("item", json!(item.item)),
                    ("quantity", json!(item.quantity)),
                    ("category", json!(item.category)),
                    ("bought", json!(false)),
                ])
            })
            .collect();

        let created = create_chunked(self.store.as_ref(), kinds::SHOPPING, batch).await?;
        info!(count = created.len(), "Shopping items added");

        Ok(json!({ "added": created.len() }).to_string())
    }
}

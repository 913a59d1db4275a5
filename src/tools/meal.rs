//! `add_meal` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::store::{fields, kinds, RecordStore};

use super::{KitchenTool, ToolError};

/// Writes a planned meal to the record store.
pub struct AddMealTool {
    store: Arc<dyn RecordStore>,
}

#[derive(Debug, Deserialize)]
struct AddMealArgs {
    name: String,
    /// ISO date the meal is planned for, e.g. `2026-03-14`.
    #[serde(default)]
    date: Option<String>,
}

impl AddMealTool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KitchenTool for AddMealTool {
    fn name(&self) -> &'static str {
        "add_meal"
    }

    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: AddMealArgs = serde_json::from_value(args)?;
        debug!(name = %args.name, date = ?args.date, "Adding meal");

        let mut meal = fields(&[("name", json!(args.name))]);
        if let Some(date) = &args.date {
            meal.insert("date".to_string(), json!(date));
        }

        let created = self.store.create(kinds::MEALS, vec![meal]).await?;
        let record = created
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::Failed("store created no record".to_string()))?;
        info!(meal_id = %record.id, "Meal added");

        Ok(json!({ "id": record.id }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    #[tokio::test]
    async fn adds_meal_with_date() {
        let store = Arc::new(MemoryRecordStore::new());
        let tool = AddMealTool::new(store.clone());

        let output = tool
            .call(json!({ "name": "Pancake Tuesday", "date": "2026-02-17" }))
            .await
            .unwrap();

        let records = store.list(kinds::MEALS, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].str_field("name"), Some("Pancake Tuesday"));
        assert_eq!(records[0].str_field("date"), Some("2026-02-17"));
        assert!(output.contains(&records[0].id));
    }

    #[tokio::test]
    async fn date_is_optional() {
        let store = Arc::new(MemoryRecordStore::new());
        let tool = AddMealTool::new(store.clone());

        tool.call(json!({ "name": "Leftovers" })).await.unwrap();

        let records = store.list(kinds::MEALS, None).await.unwrap();
        assert_eq!(records[0].str_field("date"), None);
    }
}

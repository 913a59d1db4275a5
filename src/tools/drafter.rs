//! Recipe drafting.
//!
//! Turning a free-text prompt into structured recipe fields is a separate
//! model call (json-mode chat completion), kept behind a trait so the
//! engine and its tests never need a live model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::ToolError;

/// Structured recipe fields drafted from a prompt. `ingredients` and
/// `method` are markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub method: String,
    #[serde(default = "default_serves")]
    pub serves: u32,
}

fn default_serves() -> u32 {
    2
}

/// Drafts structured recipe fields from a free-text prompt.
#[async_trait]
pub trait RecipeDrafter: Send + Sync {
    async fn draft(&self, prompt: &str) -> Result<RecipeDraft, ToolError>;
}

const DRAFT_INSTRUCTIONS: &str = "Here's an idea for a recipe. Respond with a JSON object \
for it. The fields are name, ingredients, method and serves; ingredients and method use \
markdown. The name field must be called name, not Title or Recipe title.";

/// Drafter backed by a json-mode chat completion endpoint.
pub struct HttpRecipeDrafter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl HttpRecipeDrafter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl RecipeDrafter for HttpRecipeDrafter {
    async fn draft(&self, prompt: &str) -> Result<RecipeDraft, ToolError> {
        debug!(model = %self.model, "Drafting recipe from prompt");
        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": DRAFT_INSTRUCTIONS },
                { "role": "user", "content": prompt },
            ],
        });
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("draft request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Failed(format!(
                "draft request rejected: {status}: {body}"
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("draft response malformed: {e}")))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ToolError::Failed("draft response had no content".to_string()))?;

        Ok(serde_json::from_str(&content)?)
    }
}

use serde_json::{Map, Value};

use super::error::ToolError;
use super::output::ToolOutput;
use super::schema::ArgSchema;

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn args(&self) -> Vec<ArgSchema>;

    /// Parameters configured for this tool outside the model's control.
    /// Model-supplied arguments with the same key take precedence.
    fn runtime_parameters(&self) -> Map<String, Value> {
        Map::new()
    }

    async fn run(&self, input: Value) -> Result<Vec<ToolOutput>, ToolError>;
}

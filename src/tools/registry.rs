use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::schema::ToolSchema;
use super::traits::Tool;

/// Tools available to an agent, keyed by the name the model uses.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the given name, or its own name when `None`.
    /// Replaces any existing tool with the same name.
    pub fn register(&mut self, name: Option<&str>, tool: Arc<dyn Tool>) -> &mut Self {
        let name = name.unwrap_or_else(|| tool.name()).to_string();
        self.tools.insert(name, tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas offered to the model, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSchema {
                name: name.clone(),
                description: tool.description().to_string(),
                args: tool.args(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tools.keys()).finish()
    }
}

/// Overlay the model's arguments on a tool's runtime parameters.
pub fn merge_parameters(defaults: Map<String, Value>, model_args: Value) -> Value {
    let mut merged = defaults;
    if let Value::Object(args) = model_args {
        merged.extend(args);
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ArgSchema, ToolError, ToolOutput};
    use serde_json::json;

    struct Echo;

    #[async_trait::async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echo input" }
        fn args(&self) -> Vec<ArgSchema> { Vec::new() }
        async fn run(&self, input: Value) -> Result<Vec<ToolOutput>, ToolError> {
            Ok(vec![ToolOutput::json(input)])
        }
    }

    #[test]
    fn register_uses_tool_name_unless_overridden() {
        let mut set = ToolSet::new();
        set.register(None, Arc::new(Echo)).register(Some("repeat"), Arc::new(Echo));
        assert_eq!(set.names().collect::<Vec<_>>(), ["echo", "repeat"]);
        assert_eq!(set.schemas()[1].name, "repeat");
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn model_arguments_override_runtime_parameters() {
        let mut defaults = Map::new();
        defaults.insert("limit".into(), json!(10));
        defaults.insert("lang".into(), json!("en"));
        let merged = merge_parameters(defaults, json!({"limit": 3, "query": "rust"}));
        assert_eq!(merged, json!({"limit": 3, "lang": "en", "query": "rust"}));
    }
}

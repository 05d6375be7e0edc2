
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    
    #[error("Tool execution error in '{name}': {reason}")]
    ExecutionError {
        name: String,
        reason: String,
    },

    #[error("Tool parameters do not match: {0}")]
    ParamsNotMatched(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    pub fn execution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::ExecutionError { name: name.into(), reason: reason.into() }
    }
}

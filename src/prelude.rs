//! Common imports: `use mini_toolflow::prelude::*;`

pub use crate::agent::{
    types::{Agent, AgentInput, AgentResult},
    traits::AgentRunner,
    events::{AgentEvent, AgentEventStream, DirectOutput},
    observer::{LoopObserver, TracingObserver},
};
pub use crate::config::AgentConfig;
pub use crate::llm::{
    traits::{llm_to_arc_dyn, LLM},
    tokens::{TokenUsage, UsageReport},
    ModelRequest,
    ModelResponse,
    StreamChunk,
};
pub use crate::message::{ContentPart, Message, MessageContent};
pub use crate::tools::{Tool, ToolError, ToolOutput};
pub use crate::tool;

use std::sync::Arc;
use futures::future::BoxFuture;
use crate::llm::{LLMResult, ModelRequest, ModelResponse};

/// Convert a concrete L into an `Arc<dyn LLM>`.
/// Convenience so callers can do `llm_to_arc_dyn(MyLlm::new(...))`.
pub fn llm_to_arc_dyn<L>(llm: L) -> Arc<dyn LLM>
where
    L: 'static + LLM,
{
    Arc::new(llm)
}

/// Core model-invocation trait. Uses BoxFuture/BoxStream with explicit lifetimes
/// so implementations can borrow the request and avoid cloning large transcripts.
///
/// Note:
/// - `async_trait` is not used here so that the returned future and the chunk
///   stream inside `ModelResponse` can be annotated with the input lifetime `'a`.
/// - Implementations decide whether to stream; `request.stream` is a preference.
///   Callers must handle both `ModelResponse` variants.
/// - Chunks must be yielded in provider emission order.
pub trait LLM: Send + Sync {
    /// Invoke the model for one round.
    fn invoke<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, LLMResult<ModelResponse<'a>>>;

    /// Short provider label used in logs.
    fn provider(&self) -> &'static str {
        "custom"
    }
}

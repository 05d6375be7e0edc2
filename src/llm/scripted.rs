//! A replay model that answers from a fixed script. Used for offline demos
//! and tests of code built on the agent loop.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use futures::{FutureExt, StreamExt, future::BoxFuture, stream};

use crate::llm::{
    traits::LLM,
    error::LLMError,
    GenerateResult,
    LLMResult,
    ModelRequest,
    ModelResponse,
    StreamChunk,
};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Complete(GenerateResult),
    Stream(Vec<StreamChunk>),
    /// Chunks followed by a transport error.
    BrokenStream(Vec<StreamChunk>, String),
    Fail(String),
}

/// Returns scripted replies in order and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedLLM {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ModelRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedLLM {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

impl LLM for ScriptedLLM {
    fn invoke<'a>(&'a self, request: &'a ModelRequest) -> BoxFuture<'a, LLMResult<ModelResponse<'a>>> {
        async move {
            lock(&self.requests).push(request.clone());
            let reply = lock(&self.replies).pop_front();
            match reply {
                Some(ScriptedReply::Complete(result)) => Ok(ModelResponse::Complete(result)),
                Some(ScriptedReply::Stream(chunks)) => {
                    Ok(ModelResponse::Stream(stream::iter(chunks.into_iter().map(Ok)).boxed()))
                }
                Some(ScriptedReply::BrokenStream(chunks, reason)) => {
                    let items = chunks
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(LLMError::StreamError(reason))));
                    Ok(ModelResponse::Stream(stream::iter(items).boxed()))
                }
                Some(ScriptedReply::Fail(reason)) => Err(LLMError::InvalidResponse(reason)),
                None => Err(LLMError::InvalidResponse("scripted model has no replies left".into())),
            }
        }
        .boxed()
    }

    fn provider(&self) -> &'static str {
        "scripted"
    }
}

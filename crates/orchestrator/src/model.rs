//! Model-invocation seam.
//!
//! The orchestrator does not talk to any model provider directly. A worker
//! is handed a [`ModelInvoker`] capability: given a prompt and the tools its
//! router advertises, it returns either text or a tool call. How the call is
//! transported or billed is the embedder's concern.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use covey_core::{Error, Result};

use crate::router::ToolDescriptor;

/// One model invocation request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// The prompt to complete.
    pub prompt: String,
    /// Model identifier from the agent's configuration.
    pub model: String,
    /// Tools the agent's router exposes for this call.
    pub tools: Vec<ToolDescriptor>,
}

impl ModelRequest {
    /// Create a request with no tools.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            tools: Vec::new(),
        }
    }

    /// Attach the advertised tool set.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

/// What a model invocation produced.
#[derive(Debug, Clone)]
pub enum ModelReply {
    /// Plain text output; the completion is finished.
    Text(String),
    /// The model wants a tool serviced before continuing.
    ToolCall {
        /// Tool name, resolved against the agent's router.
        name: String,
        /// Tool arguments as loose JSON.
        arguments: Value,
    },
}

/// Capability to invoke a model on behalf of an agent.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Run one model invocation.
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply>;
}

/// Trivial invoker that echoes the prompt back as text.
///
/// Used as the default when no real model layer is wired in, and in tests
/// that only exercise scheduling behavior.
#[derive(Debug, Clone, Default)]
pub struct EchoModel;

#[async_trait]
impl ModelInvoker for EchoModel {
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply> {
        Ok(ModelReply::Text(format!(
            "[{}] {}",
            request.model, request.prompt
        )))
    }
}

/// Invoker that replays a scripted sequence of replies.
///
/// Each `invoke` pops the next reply; an exhausted script is an error. This
/// is the standard way to drive tool-call paths deterministically in tests.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
}

impl ScriptedModel {
    /// Create a scripted invoker from a reply sequence.
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Number of replies left in the script.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn invoke(&self, _request: &ModelRequest) -> Result<ModelReply> {
        self.replies
            .lock()
            .map_err(|_| Error::model_failed("scripted model lock poisoned"))?
            .pop_front()
            .ok_or_else(|| Error::model_failed("scripted model exhausted"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn should_echo_prompt_with_model_tag() {
        let model = EchoModel;
        let reply = model
            .invoke(&ModelRequest::new("hello", "sonnet"))
            .await
            .unwrap();
        match reply {
            ModelReply::Text(text) => assert_eq!(text, "[sonnet] hello"),
            ModelReply::ToolCall { .. } => unreachable!("echo never calls tools"),
        }
    }

    #[tokio::test]
    async fn should_replay_scripted_replies_in_order() {
        let model = ScriptedModel::new([
            ModelReply::ToolCall {
                name: "search".to_string(),
                arguments: serde_json::json!({"pattern": "fn main"}),
            },
            ModelReply::Text("done".to_string()),
        ]);
        let request = ModelRequest::new("x", "default");

        assert!(matches!(
            model.invoke(&request).await.unwrap(),
            ModelReply::ToolCall { .. }
        ));
        assert!(matches!(
            model.invoke(&request).await.unwrap(),
            ModelReply::Text(_)
        ));
        assert!(model.invoke(&request).await.is_err());
    }
}

use std::collections::HashMap;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::Message;

/// Model used when no options are configured
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Generation parameters shared by every request a client sends.
///
/// Everything in a chat-completions body except the message list and the
/// streaming flag, which are always decided per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct ChatOptions {
    /// The model to use for completion
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-p sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Number of completions to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Presence penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Frequency penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Token id to bias mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<HashMap<String, f32>>,

    /// User identifier for abuse monitoring
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub user: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Per-call overrides layered on top of a client's [`ChatOptions`]
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct OptionOverrides {
    #[builder(into)]
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub n: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub logit_bias: Option<HashMap<String, f32>>,
    #[builder(into)]
    pub user: Option<String>,
}

impl ChatOptions {
    /// Merge `overrides` onto these options; every field set in `overrides` wins
    #[must_use]
    pub fn merged_with(&self, overrides: &OptionOverrides) -> Self {
        Self {
            model: overrides.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            n: overrides.n.or(self.n),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            logit_bias: overrides
                .logit_bias
                .clone()
                .or_else(|| self.logit_bias.clone()),
            user: overrides.user.clone().or_else(|| self.user.clone()),
        }
    }
}

/// Request for chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct ChatRequest {
    /// List of messages in the conversation
    #[builder(field)]
    pub messages: Vec<Message>,

    /// Generation parameters
    #[serde(flatten)]
    #[builder(default)]
    pub options: ChatOptions,

    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    /// Create a new chat request from messages and options
    pub fn new(messages: Vec<Message>, options: ChatOptions) -> Self {
        Self {
            messages,
            options,
            stream: None,
        }
    }

    /// Same request with the streaming flag forced on
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

// Builder extensions for convenience methods
impl<S: chat_request_builder::State> ChatRequestBuilder<S> {
    /// Add a user message
    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Add an assistant message
    pub fn assistant_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    /// Add a system message
    pub fn system_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    /// Add a message
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append a sequence of messages
    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }
}

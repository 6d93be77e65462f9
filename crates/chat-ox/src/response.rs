use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Role;

/// Finish reason that ends a stream successfully
pub const STOP_REASON: &str = "stop";

/// One incremental frame of a streamed chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDelta {
    /// Unique identifier shared by every frame of one completion
    pub id: String,

    /// Object type (usually "chat.completion.chunk")
    pub object: String,

    /// Unix timestamp of creation
    pub created: i64,

    /// Model used for the completion
    pub model: String,

    /// Streamed choices; the client reads the first one
    pub choices: Vec<ChoiceDelta>,
}

/// Streaming choice delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDelta {
    /// The partial message delta
    pub delta: MessageDelta,

    /// Index of this choice
    pub index: u32,

    /// Reason for stopping
    pub finish_reason: Option<String>,
}

/// Partial message for streaming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    /// Message role, usually only on the first frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Partial content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatDelta {
    /// Get the first choice, if available
    pub fn first_choice(&self) -> Option<&ChoiceDelta> {
        self.choices.first()
    }

    /// Content fragment of the first choice, empty when absent
    pub fn content(&self) -> &str {
        self.first_choice()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or_default()
    }

    /// Get the finish reason of the first choice
    pub fn finish_reason(&self) -> Option<&str> {
        self.first_choice()
            .and_then(|choice| choice.finish_reason.as_deref())
    }

    /// Whether this frame ends the completion with the "stop" reason
    pub fn is_stop(&self) -> bool {
        self.finish_reason() == Some(STOP_REASON)
    }

    /// Creation time as a UTC datetime
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }
}

/// Response from models list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

impl ModelsResponse {
    /// Model identifiers in listing order
    pub fn ids(&self) -> Vec<String> {
        self.data.iter().map(|model| model.id.clone()).collect()
    }
}

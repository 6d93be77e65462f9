use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,

    /// The content of the message
    pub content: String,
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// System message (instructions to the model)
    System,
    /// User message (human input)
    User,
    /// Assistant message (AI response)
    Assistant,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// System preamble carrying earlier turns, or an empty string without history
pub fn history_preamble<S: AsRef<str>>(history: Option<&[S]>) -> String {
    match history {
        Some(lines) => {
            let joined = lines
                .iter()
                .map(|line| line.as_ref())
                .collect::<Vec<&str>>()
                .join("\n");
            format!("History:\n{joined}\n\n")
        }
        None => String::new(),
    }
}

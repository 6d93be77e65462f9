use chat_ox_common::CommonRequestError;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

/// Errors that can occur when talking to the chat API
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key was set before a network call
    #[error("API key is not set")]
    MissingApiKey,

    /// Another request already holds the send gate
    #[error("There is already a request in progress")]
    RequestInProgress,

    /// `cancel` was called while this client had nothing in flight
    #[error("There is no request in progress")]
    NoRequestInProgress,

    /// The in-flight request was cancelled by the caller
    #[error("Request was cancelled")]
    Cancelled,

    /// HTTP client errors
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    /// Non-success status from the API
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid event data in stream
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// Unexpected response from the API
    #[error("Unexpected response from API: {0}")]
    UnexpectedResponse(String),
}

/// Coarse classification of a [`ChatError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential missing
    Auth,
    /// Single-flight rule violated
    Concurrency,
    /// Network, status, or stream decoding failure
    Transport,
    /// Cancelled by the caller
    Cancelled,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::MissingApiKey => ErrorKind::Auth,
            ChatError::RequestInProgress | ChatError::NoRequestInProgress => {
                ErrorKind::Concurrency
            }
            ChatError::Cancelled => ErrorKind::Cancelled,
            ChatError::ReqwestError(_)
            | ChatError::SerdeError(_)
            | ChatError::Api { .. }
            | ChatError::InvalidEventData(_)
            | ChatError::UnexpectedResponse(_) => ErrorKind::Transport,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    fn type_name(&self) -> &'static str {
        match self {
            ChatError::MissingApiKey => "MissingApiKey",
            ChatError::RequestInProgress => "RequestInProgress",
            ChatError::NoRequestInProgress => "NoRequestInProgress",
            ChatError::Cancelled => "Cancelled",
            ChatError::ReqwestError(_) => "ReqwestError",
            ChatError::SerdeError(_) => "SerdeError",
            ChatError::Api { .. } => "Api",
            ChatError::InvalidEventData(_) => "InvalidEventData",
            ChatError::UnexpectedResponse(_) => "UnexpectedResponse",
        }
    }
}

impl From<CommonRequestError> for ChatError {
    fn from(err: CommonRequestError) -> Self {
        match err {
            CommonRequestError::Http(e) => ChatError::ReqwestError(e),
            CommonRequestError::Json(message) | CommonRequestError::InvalidEventData(message) => {
                ChatError::InvalidEventData(message)
            }
            CommonRequestError::Utf8Error(e) => {
                ChatError::InvalidEventData(format!("UTF-8 decode error: {e}"))
            }
            CommonRequestError::Api { status, message } => ChatError::Api { status, message },
            CommonRequestError::UnexpectedResponse(message) => {
                ChatError::UnexpectedResponse(message)
            }
        }
    }
}

impl Serialize for ChatError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let with_status = matches!(self, ChatError::Api { .. });
        let mut state =
            serializer.serialize_struct("ChatError", if with_status { 3 } else { 2 })?;
        state.serialize_field("type", self.type_name())?;
        state.serialize_field("message", &self.to_string())?;
        if let ChatError::Api { status, .. } = self {
            state.serialize_field("status", status)?;
        }
        state.end()
    }
}

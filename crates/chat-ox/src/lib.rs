//! Streaming chat-completion client with single-flight requests
//!
//! This crate wraps an OpenAI-compatible chat-completions API:
//! - Streaming completions assembled into a running text buffer
//! - At most one request in flight per process, see [`SendGate::shared`]
//! - Explicit cancellation of the active request
//! - Default generation options with per-call overrides
//! - Model listing and token estimation
//!
//! # Example
//!
//! ```rust,no_run
//! use chat_ox::ChatClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new("your-api-key");
//!
//!     let reply = client
//!         .send_message("Hello, world!", None, None, |text, _frame| {
//!             println!("{text}");
//!         })
//!         .await?;
//!
//!     println!("final: {reply}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod completion;
pub mod error;
pub mod gate;
pub mod message;
pub mod request;
pub mod response;
pub mod tokens;

// Re-export main types
pub use client::{ChatClient, DEFAULT_BASE_URL};
pub use completion::{CompletionStream, DONE_SENTINEL, DeltaUpdate};
pub use error::{ChatError, ErrorKind};
pub use gate::{ClientState, SendGate, SendPermit, SenderId};
pub use message::{Message, Role};
pub use request::{ChatOptions, ChatRequest, DEFAULT_MODEL, OptionOverrides};
pub use response::{ChatDelta, ChoiceDelta, MessageDelta, ModelInfo, ModelsResponse};
pub use tokens::{Cl100kEstimator, TokenEstimator};

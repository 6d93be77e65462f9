#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

//! HTTP plumbing shared by the chat-ox client
//!
//! This crate owns the transport side of the client: building authenticated
//! requests against a base URL, decoding JSON responses, and splitting a
//! `text/event-stream` body into raw server-sent events. It knows nothing
//! about chat semantics; interpreting event payloads is left to the caller.

pub mod error;
pub mod request_builder;
pub mod streaming;

pub use error::CommonRequestError;
pub use request_builder::{AuthMethod, Endpoint, HttpMethod, RequestBuilder, RequestConfig};
pub use streaming::{SseEvent, SseParser};

pub use futures_util::stream::BoxStream;

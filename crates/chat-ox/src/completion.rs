//! The streaming completion controller.
//!
//! A completion owns the client's [`SendGate`](crate::SendGate) from the
//! moment it is started until its stream is finished or dropped. Frames are
//! read one at a time; each one is folded into the running text and handed to
//! the caller before the next frame is read. Cancellation is checked whenever
//! the controller waits on the network.

use async_stream::try_stream;
use chat_ox_common::{BoxStream, Endpoint, HttpMethod};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    ChatClient, ChatDelta, ChatError, ChatRequest, Message, OptionOverrides,
    client::COMPLETIONS_PATH, message::history_preamble,
};

/// Data payload that marks the end of the event stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Running text after one frame, together with that frame
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaUpdate {
    /// Concatenation of every content fragment received so far
    pub text: String,
    /// The frame that produced this update
    pub frame: ChatDelta,
}

/// Stream of updates for one completion
pub type CompletionStream = BoxStream<'static, Result<DeltaUpdate, ChatError>>;

impl ChatClient {
    /// Start a completion and return its updates as a stream.
    ///
    /// Fails immediately with `RequestInProgress` when the gate is held and
    /// with `MissingApiKey` when no key is set; neither touches the network.
    /// The request is sent on first poll. The stream ends after a frame with
    /// the "stop" finish reason or when the server closes the body; it yields
    /// `Cancelled` once if [`ChatClient::cancel`] is called mid-flight.
    /// Dropping the stream releases the gate.
    pub fn stream_completion(&self, request: ChatRequest) -> Result<CompletionStream, ChatError> {
        let token = CancellationToken::new();
        let permit = {
            // A cancel that sees the gate taken always reads the new token
            let mut slot = self.cancel_slot();
            let permit = self.gate().acquire(self.sender_id())?;
            *slot = token.clone();
            permit
        };
        let credential = self.check_credential()?;

        let request = request.streaming();
        let endpoint = Endpoint::new(COMPLETIONS_PATH, HttpMethod::Post);
        let mut events = self
            .request_builder(credential)
            .stream_events(&endpoint, Some(&request));

        log::debug!(
            "sender {} starting completion with {} ({} messages)",
            permit.sender(),
            request.options.model,
            request.messages.len()
        );

        Ok(Box::pin(try_stream! {
            let _permit = permit;
            let mut text = String::new();

            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    event = events.next() => Some(event),
                };

                let Some(event) = next else {
                    log::debug!("completion cancelled after {} bytes", text.len());
                    Err::<(), _>(ChatError::Cancelled)?;
                    break;
                };

                let Some(event) = event else {
                    log::debug!("event stream closed by server");
                    break;
                };

                let event = event?;
                if event.data == DONE_SENTINEL {
                    continue;
                }

                let frame: ChatDelta = serde_json::from_str(&event.data)?;
                if frame.first_choice().is_none() {
                    Err::<(), _>(ChatError::InvalidEventData(format!(
                        "delta frame {} has no choices",
                        frame.id
                    )))?;
                }

                if frame.is_stop() {
                    log::debug!("completion {} finished with stop reason", frame.id);
                    token.cancel();
                    break;
                }

                text.push_str(frame.content());
                yield DeltaUpdate {
                    text: text.clone(),
                    frame,
                };
            }
        }))
    }

    /// Run a completion to the end, calling `on_delta` with the running text
    /// and the raw frame for every content frame, in arrival order.
    ///
    /// Returns the full text once the stream ends. Transport failures and
    /// cancellation discard the partial text and are returned as errors.
    pub async fn request_completion<F>(
        &self,
        request: ChatRequest,
        mut on_delta: F,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str, &ChatDelta),
    {
        let mut stream = self.stream_completion(request)?;
        let mut text = String::new();

        while let Some(update) = stream.next().await {
            match update {
                Ok(DeltaUpdate { text: so_far, frame }) => {
                    on_delta(&so_far, &frame);
                    text = so_far;
                }
                Err(err) => {
                    if err.is_transport() {
                        log::error!("completion request failed: {err}");
                    }
                    return Err(err);
                }
            }
        }

        Ok(text)
    }

    /// Send `text` as a user turn, preceded by a system message carrying
    /// `history` (an empty system message when `history` is `None`).
    pub async fn send_message<F>(
        &self,
        text: impl Into<String>,
        history: Option<&[String]>,
        overrides: Option<&OptionOverrides>,
        on_delta: F,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str, &ChatDelta),
    {
        let options = match overrides {
            Some(overrides) => self.default_options().merged_with(overrides),
            None => self.default_options().clone(),
        };
        let messages = vec![
            Message::system(history_preamble(history)),
            Message::user(text),
        ];

        self.request_completion(ChatRequest::new(messages, options), on_delta)
            .await
    }

    /// Send an already assembled conversation with the default options
    pub async fn send_messages<F>(
        &self,
        messages: Vec<Message>,
        on_delta: F,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str, &ChatDelta),
    {
        let request = ChatRequest::new(messages, self.default_options().clone());
        self.request_completion(request, on_delta).await
    }

    /// Cancel the request this client has in flight.
    ///
    /// Fails with `NoRequestInProgress` unless this client currently owns the
    /// gate. Cancelling twice is a no-op.
    pub fn cancel(&self) -> Result<(), ChatError> {
        if self.gate().current() != Some(self.sender_id()) {
            return Err(ChatError::NoRequestInProgress);
        }

        let token = self.cancel_slot().clone();
        if !token.is_cancelled() {
            log::debug!("sender {} cancelling its request", self.sender_id());
            token.cancel();
        }

        Ok(())
    }
}

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bon::Builder;
use chat_ox_common::{AuthMethod, Endpoint, HttpMethod, RequestBuilder, RequestConfig};
use tokio_util::sync::CancellationToken;

use crate::{
    ChatError, ChatOptions, ClientState, Cl100kEstimator, ModelsResponse, SendGate, SenderId,
    TokenEstimator,
};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub(crate) const COMPLETIONS_PATH: &str = "chat/completions";
pub(crate) const MODELS_PATH: &str = "models";

/// Streaming chat-completion client
///
/// Clones share the same sender identity and cancellation slot, so a clone
/// handed to another task can cancel the request started through the
/// original.
#[derive(Debug, Clone, Builder)]
pub struct ChatClient {
    /// API key for authentication, may be set later
    #[builder(into)]
    credential: Option<String>,

    /// Base URL for the API (allows for custom endpoints and proxies)
    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    base_url: String,

    /// Generation parameters applied to every request
    #[builder(default)]
    default_options: ChatOptions,

    /// Single-flight gate, the process-wide one unless injected
    #[builder(default = SendGate::shared())]
    gate: Arc<SendGate>,

    /// Token counter behind `estimate_tokens`
    #[builder(default = default_estimator())]
    estimator: Arc<dyn TokenEstimator>,

    /// HTTP client for making requests
    #[builder(default = default_http_client())]
    http: reqwest::Client,

    #[builder(skip)]
    sender: SenderId,

    #[builder(skip)]
    cancel: Arc<Mutex<CancellationToken>>,
}

fn default_estimator() -> Arc<dyn TokenEstimator> {
    Arc::new(Cl100kEstimator)
}

fn default_http_client() -> reqwest::Client {
    // No overall timeout, completions stream for as long as the model writes
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

impl ChatClient {
    /// Create a new client with the given API key
    pub fn new(credential: impl Into<String>) -> Self {
        Self::builder().credential(credential).build()
    }

    /// Create a new client from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`
    pub fn from_env() -> Result<Self, ChatError> {
        let credential =
            std::env::var("OPENAI_API_KEY").map_err(|_| ChatError::MissingApiKey)?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::builder()
            .credential(credential)
            .base_url(base_url)
            .build())
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_options(&self) -> &ChatOptions {
        &self.default_options
    }

    pub fn sender_id(&self) -> SenderId {
        self.sender
    }

    pub fn gate(&self) -> &Arc<SendGate> {
        &self.gate
    }

    /// `Sending` while this client owns the gate
    pub fn state(&self) -> ClientState {
        if self.gate.current() == Some(self.sender) {
            ClientState::Sending
        } else {
            ClientState::Idle
        }
    }

    /// Replace the API key
    pub fn set_credential(&mut self, credential: impl Into<String>) {
        self.credential = Some(credential.into());
    }

    /// Replace the default generation parameters wholesale
    pub fn set_default_options(&mut self, options: ChatOptions) {
        self.default_options = options;
    }

    /// The API key, or `MissingApiKey` when none (or an empty one) is set
    pub fn check_credential(&self) -> Result<&str, ChatError> {
        match self.credential.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ChatError::MissingApiKey),
        }
    }

    /// Estimate how many tokens `text` encodes to
    pub fn estimate_tokens(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /// List available models, failing on any transport error
    pub async fn fetch_models(&self) -> Result<ModelsResponse, ChatError> {
        let credential = self.check_credential()?;
        let endpoint = Endpoint::new(MODELS_PATH, HttpMethod::Get);

        Ok(self
            .request_builder(credential)
            .request_json(&endpoint, None::<&()>)
            .await?)
    }

    /// Model identifiers offered by the API.
    ///
    /// Listing is advisory: transport and authorization failures are logged
    /// and resolve to `Ok(None)`. Only a missing API key is returned as an
    /// error.
    pub async fn list_models(&self) -> Result<Option<Vec<String>>, ChatError> {
        self.check_credential()?;

        match self.fetch_models().await {
            Ok(models) => Ok(Some(models.ids())),
            Err(err) => {
                log::warn!("listing models failed, the API key may be incorrect: {err}");
                Ok(None)
            }
        }
    }

    pub(crate) fn request_builder(&self, credential: &str) -> RequestBuilder {
        let config = RequestConfig::new(&self.base_url)
            .with_auth(AuthMethod::Bearer(credential.to_string()));
        RequestBuilder::new(self.http.clone(), config)
    }

    pub(crate) fn cancel_slot(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

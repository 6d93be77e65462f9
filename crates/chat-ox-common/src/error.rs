use thiserror::Error;

/// Transport-level errors raised while talking to the chat API
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// HTTP request failed (connection, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid event data in streaming response
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Non-success status returned by the API
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Successful status but a body that could not be understood
    #[error("Unexpected response from API: {0}")]
    UnexpectedResponse(String),
}

impl From<serde_json::Error> for CommonRequestError {
    fn from(e: serde_json::Error) -> Self {
        CommonRequestError::Json(e.to_string())
    }
}

/// Parse error response from HTTP status and body
pub fn parse_error_response(status: reqwest::StatusCode, body: &bytes::Bytes) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    CommonRequestError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract the message from `{"error": {"message": ...}}` or a top-level `message`
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    json.get("error")
        .and_then(|error| error.get("message"))
        .or_else(|| json.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

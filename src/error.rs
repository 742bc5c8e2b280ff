//! Error taxonomy for the voice session.
//!
//! Each collaborator failure is converted into one of these kinds at its call
//! boundary. Only `ActuationError` ends a session; the others are recovered
//! locally.

use thiserror::Error;

/// Failure while fetching a page for inspection or summarization.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("{address} returned status {status}")]
    Status { address: String, status: u16 },

    /// Connection, TLS, timeout or body read failure.
    #[error("Transport error fetching {address}: {message}")]
    Transport { address: String, message: String },
}

/// Failure while turning a recorded reply into text.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Recording failed: {0}")]
    Recording(#[from] AudioError),

    #[error("Speech-to-text failed: {0}")]
    Service(#[from] CollaboratorError),
}

/// Failure of the browser-control channel.
#[derive(Debug, Error)]
pub enum ActuationError {
    /// Chrome could not be reached or the DevTools call failed.
    #[error("Browser unavailable: {0}")]
    Unavailable(String),

    /// Only produced with strict click matching enabled.
    #[error("No button matching '{0}'")]
    NoMatchingButton(String),

    /// The action has no browser counterpart (`Stop`, `Unrecognized`).
    #[error("Action cannot be actuated: {0}")]
    NotActuatable(String),
}

/// Malformed element-scan payload pushed by the browser extension.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Malformed element scan: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure of an external service (OpenAI chat, speech, transcription).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Local audio capture or playback failure.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio command '{command}' failed: {message}")]
    Command { command: String, message: String },
}

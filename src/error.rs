//! Error types for the remote-resource client.
//!
//! Every failure is surfaced to the caller as a value; nothing is thrown
//! across the async boundary. The enum is `Clone` because a coalesced
//! in-flight request fans its result out to every attached waiter.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
  /// No response was received at all (offline, DNS, timeout).
  #[error("network error: {0}")]
  Network(String),

  /// The server answered with a non-2xx status. The body is passed
  /// through unmodified; its shape varies by endpoint.
  #[error("server rejected request with status {status}")]
  Status {
    status: u16,
    body: serde_json::Value,
  },

  /// Arguments could not be encoded into a path, query string, or body.
  /// Raised before any network call is made.
  #[error("failed to encode request: {0}")]
  Serialization(String),

  /// A 2xx response body could not be decoded into the expected type.
  #[error("failed to decode response: {0}")]
  Decode(String),

  /// Configuration could not be located, read, or validated. Raised at
  /// startup, never during a dispatch.
  #[error("configuration error: {0}")]
  Config(String),
}

impl ClientError {
  /// Status code of a server rejection, if this is one.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network(_))
  }
}

impl From<reqwest::Error> for ClientError {
  fn from(e: reqwest::Error) -> Self {
    // reqwest reports decode failures through the same error type;
    // everything else without a response is a transport failure.
    if e.is_decode() {
      ClientError::Decode(e.to_string())
    } else {
      ClientError::Network(e.to_string())
    }
  }
}

pub type Result<T> = std::result::Result<T, ClientError>;

//! Shared authentication state consulted when building request headers.
//!
//! The token and passcode are populated and cleared by the host
//! application's authentication flow; this crate only reads them. Reads
//! happen on every dispatch, never at client construction, so a token
//! refresh is honored by the very next request.

use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct AuthState {
  access_token: Option<String>,
  passcode: Option<String>,
}

/// Cloneable handle to the process-wide auth state.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
  inner: Arc<RwLock<AuthState>>,
}

impl AuthContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace the access token. `None` clears it (sign-out).
  pub fn set_access_token(&self, token: Option<String>) {
    self.write().access_token = token;
  }

  /// Replace the transaction passcode. `None` clears it.
  pub fn set_passcode(&self, passcode: Option<String>) {
    self.write().passcode = passcode;
  }

  /// Current access token, read fresh at dispatch time.
  pub fn access_token(&self) -> Option<String> {
    self.read().access_token.clone()
  }

  /// Current passcode, read fresh at dispatch time.
  pub fn passcode(&self) -> Option<String> {
    self.read().passcode.clone()
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, AuthState> {
    // A poisoned lock still holds valid data; recover rather than panic.
    self.inner.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, AuthState> {
    self.inner.write().unwrap_or_else(|e| e.into_inner())
  }
}

//! HTTP transport shared by every resource family.
//!
//! Owns the header policy: JSON content negotiation on every request, a
//! bearer token whenever one is present, and the passcode header only for
//! operations in the family's allow-list. Auth state is read at dispatch
//! time, never captured at construction, so token refreshes take effect
//! on the next request.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::auth::AuthContext;
use crate::error::{ClientError, Result};

/// Custom header carrying the transaction passcode.
pub const PASSCODE_HEADER: &str = "X-Passcode";

#[derive(Clone)]
pub struct HttpClient {
  client: Client,
  base_url: Url,
  auth: AuthContext,
  family: &'static str,
  /// Operations that must carry the passcode header.
  passcode_ops: &'static [&'static str],
}

impl HttpClient {
  pub fn new(
    base_url: Url,
    auth: AuthContext,
    family: &'static str,
    passcode_ops: &'static [&'static str],
  ) -> Result<Self> {
    let client = Client::builder()
      .build()
      .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url,
      auth,
      family,
      passcode_ops,
    })
  }

  /// GET a JSON resource, with query-string parameters.
  pub async fn get_json<Q: Serialize + ?Sized>(
    &self,
    operation: &'static str,
    path: &str,
    query: &Q,
  ) -> Result<Value> {
    let builder = self
      .request(Method::GET, operation, path, true)?
      .query(query);
    self.dispatch(builder).await
  }

  /// Send a JSON-bodied request (POST/PUT/PATCH/DELETE).
  pub async fn send_json<B: Serialize + ?Sized>(
    &self,
    operation: &'static str,
    method: Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<Value> {
    let mut builder = self.request(method, operation, path, true)?;
    if let Some(body) = body {
      let encoded = serde_json::to_vec(body)
        .map_err(|e| ClientError::Serialization(format!("invalid request body: {}", e)))?;
      builder = builder.body(encoded);
    }
    self.dispatch(builder).await
  }

  /// POST a multipart form (file uploads). reqwest supplies the
  /// boundary-bearing content type, so the JSON one is not set here.
  pub async fn send_multipart(
    &self,
    operation: &'static str,
    path: &str,
    form: reqwest::multipart::Form,
  ) -> Result<Value> {
    let builder = self
      .request(Method::POST, operation, path, false)?
      .multipart(form);
    self.dispatch(builder).await
  }

  /// Assemble a request with the family's header policy applied. Public
  /// so header composition is checkable without a live server.
  pub fn request(
    &self,
    method: Method,
    operation: &'static str,
    path: &str,
    json_body: bool,
  ) -> Result<RequestBuilder> {
    let url = self.join(path)?;
    Ok(
      self
        .client
        .request(method, url)
        .headers(self.headers(operation, json_body)),
    )
  }

  fn headers(&self, operation: &'static str, json_body: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if json_body {
      headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    if let Some(token) = self.auth.access_token() {
      match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(value) => {
          headers.insert(AUTHORIZATION, value);
        }
        Err(_) => warn!(family = self.family, "access token is not a valid header value"),
      }
    }

    if self.passcode_ops.contains(&operation) {
      match self.auth.passcode() {
        Some(passcode) => match HeaderValue::from_str(&passcode) {
          Ok(value) => {
            headers.insert(PASSCODE_HEADER, value);
          }
          Err(_) => warn!(family = self.family, "passcode is not a valid header value"),
        },
        // Non-fatal: the server is the authority that rejects it.
        None => warn!(
          family = self.family,
          operation, "passcode-required operation dispatched without a passcode"
        ),
      }
    }

    headers
  }

  fn join(&self, path: &str) -> Result<Url> {
    let joined = format!(
      "{}/{}",
      self.base_url.as_str().trim_end_matches('/'),
      path.trim_start_matches('/')
    );
    Url::parse(&joined)
      .map_err(|e| ClientError::Serialization(format!("invalid request path '{}': {}", path, e)))
  }

  async fn dispatch(&self, builder: RequestBuilder) -> Result<Value> {
    let response = builder.send().await.map_err(ClientError::from)?;
    Self::read_response(response).await
  }

  /// Turn a response into a JSON value or a structured failure. Non-2xx
  /// bodies are passed through unmodified for the caller to interpret.
  async fn read_response(response: Response) -> Result<Value> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(ClientError::from)?;

    let body = if bytes.is_empty() {
      Value::Null
    } else {
      match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) if status.is_success() => {
          return Err(ClientError::Decode(format!("invalid JSON response: {}", e)))
        }
        Err(_) => Value::Null,
      }
    };

    if status.is_success() {
      Ok(body)
    } else {
      Err(ClientError::Status {
        status: status.as_u16(),
        body,
      })
    }
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }
}

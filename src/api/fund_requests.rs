//! Fund requests: peer-to-peer requests for money.
//!
//! Queries provide the `FundRequest` tag; every mutation invalidates it,
//! so cached lists and detail views refetch after a create, pay, or
//! decline. Paying requires the transaction passcode.

use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::cache::{CacheEngine, CacheKey, Tag};
use crate::error::Result;
use crate::http::HttpClient;

use super::types::{FundRequest, ListParams, NewFundRequest, Page};

const FAMILY: &str = "fund_requests";
const TAGS: &[Tag] = &[Tag::FundRequest];
const PASSCODE_OPS: &[&str] = &["pay"];

#[derive(Clone)]
pub struct FundRequestsApi {
  http: HttpClient,
  engine: Arc<CacheEngine>,
}

impl FundRequestsApi {
  pub fn new(base_url: url::Url, auth: AuthContext, engine: Arc<CacheEngine>) -> Result<Self> {
    let http = HttpClient::new(base_url, auth, FAMILY, PASSCODE_OPS)?;
    Ok(Self { http, engine })
  }

  /// List fund requests. `force` bypasses a fresh cache entry (explicit
  /// refetch); a coalesced in-flight request is still shared.
  pub async fn list(&self, params: ListParams, force: bool) -> Result<Page<FundRequest>> {
    let key = CacheKey::new(FAMILY, "list", &params)?;
    let http = self.http.clone();
    self
      .engine
      .query_as(&key, TAGS, force, || {
        Box::pin(async move { http.get_json("list", "fund-requests", &params).await })
      })
      .await
  }

  /// Fetch one fund request by id.
  pub async fn get(&self, id: &str, force: bool) -> Result<FundRequest> {
    let key = CacheKey::new(FAMILY, "get", &json!({ "id": id }))?;
    let http = self.http.clone();
    let path = detail_path(id);
    self
      .engine
      .query_as(&key, TAGS, force, || {
        Box::pin(async move {
          http
            .get_json("get", &path, &NO_QUERY)
            .await
        })
      })
      .await
  }

  /// Create a new fund request.
  pub async fn create(&self, request: &NewFundRequest) -> Result<FundRequest> {
    let http = self.http.clone();
    let body = request.clone();
    self
      .engine
      .mutate_as(TAGS, || {
        Box::pin(async move {
          http
            .send_json("create", Method::POST, "fund-requests", Some(&body))
            .await
        })
      })
      .await
  }

  /// Pay a fund request. Passcode-required: dispatched without one, the
  /// request still goes out and the server rejects it.
  pub async fn pay(&self, id: &str) -> Result<FundRequest> {
    self.action(id, "pay").await
  }

  /// Decline a fund request.
  pub async fn decline(&self, id: &str) -> Result<FundRequest> {
    self.action(id, "decline").await
  }

  async fn action(&self, id: &str, operation: &'static str) -> Result<FundRequest> {
    let http = self.http.clone();
    let path = action_path(id, operation);
    self
      .engine
      .mutate_as(TAGS, || {
        Box::pin(async move {
          http
            .send_json::<serde_json::Value>(operation, Method::POST, &path, None)
            .await
        })
      })
      .await
  }
}

const NO_QUERY: [(&str, &str); 0] = [];

fn detail_path(id: &str) -> String {
  format!("fund-requests/{}", id)
}

fn action_path(id: &str, action: &str) -> String {
  format!("fund-requests/{}/{}", id, action)
}

//! Shared expenses: group bills split across participants.
//!
//! Queries provide the `SharedExpense` tag; create and settle invalidate
//! it. Settling a share moves money, so it sits in the passcode
//! allow-list.

use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::cache::{CacheEngine, CacheKey, Tag};
use crate::error::Result;
use crate::http::HttpClient;

use super::types::{ListParams, NewSharedExpense, Page, SharedExpense};

const FAMILY: &str = "shared_expenses";
const TAGS: &[Tag] = &[Tag::SharedExpense];
const PASSCODE_OPS: &[&str] = &["settle"];

#[derive(Clone)]
pub struct SharedExpensesApi {
  http: HttpClient,
  engine: Arc<CacheEngine>,
}

impl SharedExpensesApi {
  pub fn new(base_url: url::Url, auth: AuthContext, engine: Arc<CacheEngine>) -> Result<Self> {
    let http = HttpClient::new(base_url, auth, FAMILY, PASSCODE_OPS)?;
    Ok(Self { http, engine })
  }

  pub async fn list(&self, params: ListParams, force: bool) -> Result<Page<SharedExpense>> {
    let key = CacheKey::new(FAMILY, "list", &params)?;
    let http = self.http.clone();
    self
      .engine
      .query_as(&key, TAGS, force, || {
        Box::pin(async move { http.get_json("list", "shared-expenses", &params).await })
      })
      .await
  }

  pub async fn get(&self, id: &str, force: bool) -> Result<SharedExpense> {
    let key = CacheKey::new(FAMILY, "get", &json!({ "id": id }))?;
    let http = self.http.clone();
    let path = format!("shared-expenses/{}", id);
    self
      .engine
      .query_as(&key, TAGS, force, || {
        Box::pin(async move { http.get_json("get", &path, &NO_QUERY).await })
      })
      .await
  }

  pub async fn create(&self, expense: &NewSharedExpense) -> Result<SharedExpense> {
    let http = self.http.clone();
    let body = expense.clone();
    self
      .engine
      .mutate_as(TAGS, || {
        Box::pin(async move {
          http
            .send_json("create", Method::POST, "shared-expenses", Some(&body))
            .await
        })
      })
      .await
  }

  /// Settle the caller's share of an expense. Passcode-required.
  pub async fn settle(&self, id: &str) -> Result<SharedExpense> {
    let http = self.http.clone();
    let path = format!("shared-expenses/{}/settle", id);
    self
      .engine
      .mutate_as(TAGS, || {
        Box::pin(async move {
          http
            .send_json::<serde_json::Value>("settle", Method::POST, &path, None)
            .await
        })
      })
      .await
  }
}

const NO_QUERY: [(&str, &str); 0] = [];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_settle_requires_the_passcode() {
    assert_eq!(PASSCODE_OPS, &["settle"]);
  }
}

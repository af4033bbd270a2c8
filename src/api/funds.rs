//! Investment funds and the caller's subscriptions to them.
//!
//! Fund listings provide the `Fund` tag and change rarely; subscription
//! queries provide `FundSubscription`. Subscribing and redeeming
//! invalidate only `FundSubscription`, so fund listings stay cached
//! across those mutations. Both money-moving operations require the
//! passcode.

use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::cache::{CacheEngine, CacheKey, Tag};
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::QueryHandle;

use super::types::{Fund, FundSubscription, ListParams, Page, SubscribeFund};

const FAMILY: &str = "funds";
const FUND_TAGS: &[Tag] = &[Tag::Fund];
const SUBSCRIPTION_TAGS: &[Tag] = &[Tag::FundSubscription];
const PASSCODE_OPS: &[&str] = &["subscribe", "redeem"];

#[derive(Clone)]
pub struct FundsApi {
  http: HttpClient,
  engine: Arc<CacheEngine>,
}

impl FundsApi {
  pub fn new(base_url: url::Url, auth: AuthContext, engine: Arc<CacheEngine>) -> Result<Self> {
    let http = HttpClient::new(base_url, auth, FAMILY, PASSCODE_OPS)?;
    Ok(Self { http, engine })
  }

  pub async fn get_funds(&self, params: ListParams, force: bool) -> Result<Page<Fund>> {
    let key = CacheKey::new(FAMILY, "get_funds", &params)?;
    let http = self.http.clone();
    self
      .engine
      .query_as(&key, FUND_TAGS, force, || {
        Box::pin(async move { http.get_json("get_funds", "funds", &params).await })
      })
      .await
  }

  pub async fn get_fund(&self, id: &str, force: bool) -> Result<Fund> {
    let key = CacheKey::new(FAMILY, "get_fund", &json!({ "id": id }))?;
    let http = self.http.clone();
    let path = format!("funds/{}", id);
    self
      .engine
      .query_as(&key, FUND_TAGS, force, || {
        Box::pin(async move { http.get_json("get_fund", &path, &NO_QUERY).await })
      })
      .await
  }

  pub async fn get_my_subscriptions(
    &self,
    user_id: &str,
    params: ListParams,
    force: bool,
  ) -> Result<Page<FundSubscription>> {
    let key = CacheKey::new(
      FAMILY,
      "get_my_subscriptions",
      &json!({ "userId": user_id, "page": params.page, "limit": params.limit }),
    )?;
    let http = self.http.clone();
    let path = format!("funds/subscriptions/{}", user_id);
    self
      .engine
      .query_as(&key, SUBSCRIPTION_TAGS, force, || {
        Box::pin(async move { http.get_json("get_my_subscriptions", &path, &params).await })
      })
      .await
  }

  /// Subscribe to a fund. Passcode-required; on success every cached
  /// subscription query is invalidated.
  pub async fn subscribe(&self, fund_id: &str, order: &SubscribeFund) -> Result<FundSubscription> {
    let http = self.http.clone();
    let body = order.clone();
    let path = format!("funds/{}/subscribe", fund_id);
    self
      .engine
      .mutate_as(SUBSCRIPTION_TAGS, || {
        Box::pin(async move {
          http
            .send_json("subscribe", Method::POST, &path, Some(&body))
            .await
        })
      })
      .await
  }

  /// Redeem (exit) a subscription. Passcode-required.
  pub async fn redeem(&self, subscription_id: &str) -> Result<FundSubscription> {
    let http = self.http.clone();
    let path = format!("funds/subscriptions/{}/redeem", subscription_id);
    self
      .engine
      .mutate_as(SUBSCRIPTION_TAGS, || {
        Box::pin(async move {
          http
            .send_json::<serde_json::Value>("redeem", Method::POST, &path, None)
            .await
        })
      })
      .await
  }

  /// Event-loop handle for the funds list, subscribed to its cache entry
  /// for the handle's lifetime.
  pub fn funds_handle(&self, params: ListParams) -> Result<QueryHandle<Page<Fund>>> {
    let key = CacheKey::new(FAMILY, "get_funds", &params)?;
    let api = self.clone();
    Ok(
      QueryHandle::new(move |force| {
        let api = api.clone();
        async move { api.get_funds(params, force).await }
      })
      .with_subscription(self.engine.clone(), key),
    )
  }

  /// Handle for the caller's subscriptions. Pass `skip = true` until the
  /// user id is known; flip it off once it resolves.
  pub fn my_subscriptions_handle(
    &self,
    user_id: &str,
    params: ListParams,
    skip: bool,
  ) -> Result<QueryHandle<Page<FundSubscription>>> {
    let key = CacheKey::new(
      FAMILY,
      "get_my_subscriptions",
      &json!({ "userId": user_id, "page": params.page, "limit": params.limit }),
    )?;
    let api = self.clone();
    let user_id = user_id.to_string();
    Ok(
      QueryHandle::new(move |force| {
        let api = api.clone();
        let user_id = user_id.clone();
        async move { api.get_my_subscriptions(&user_id, params, force).await }
      })
      .with_skip(skip)
      .with_subscription(self.engine.clone(), key),
    )
  }
}

const NO_QUERY: [(&str, &str); 0] = [];

//! Wire types for the four resource families.
//!
//! Each family keeps its own status vocabulary: the backends spell
//! logically similar states differently (a paid fund request is `PAYED`,
//! a fully settled shared expense is `COMPLETED`) and no cross-family
//! equivalence is assumed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pagination arguments shared by every list endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListParams {
  pub page: u64,
  pub limit: u64,
}

impl Default for ListParams {
  fn default() -> Self {
    Self { page: 1, limit: 10 }
  }
}

/// One page of a list endpoint's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: u64,
  pub limit: u64,
  pub total: u64,
}

// ---------------------------------------------------------------------------
// Fund requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundRequestStatus {
  Pending,
  Payed,
  Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundRequest {
  pub id: String,
  pub requester_id: String,
  pub recipient_id: String,
  pub amount: f64,
  pub currency: String,
  #[serde(default)]
  pub note: Option<String>,
  pub status: FundRequestStatus,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFundRequest {
  pub recipient_id: String,
  pub amount: f64,
  pub currency: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SharedExpenseStatus {
  Open,
  PartiallyPaid,
  Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseShare {
  pub user_id: String,
  pub amount: f64,
  pub settled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedExpense {
  pub id: String,
  pub owner_id: String,
  pub title: String,
  pub total_amount: f64,
  pub currency: String,
  pub shares: Vec<ExpenseShare>,
  pub status: SharedExpenseStatus,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSharedExpense {
  pub title: String,
  pub total_amount: f64,
  pub currency: String,
  pub participant_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Funds & subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
  pub id: String,
  pub name: String,
  pub currency: String,
  pub unit_price: f64,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
  Pending,
  Active,
  Redeemed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundSubscription {
  pub id: String,
  pub fund_id: String,
  pub user_id: String,
  pub currency: String,
  pub units: f64,
  pub status: SubscriptionStatus,
  pub created_at: DateTime<Utc>,
}

/// Body of the subscribe mutation; the fund id travels in the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeFund {
  pub currency: String,
  pub amount: f64,
}

// ---------------------------------------------------------------------------
// KYC
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycState {
  NotStarted,
  Pending,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycStatus {
  pub user_id: String,
  pub state: KycState,
  #[serde(default)]
  pub reason: Option<String>,
}

/// One binary part of a KYC submission: an image file tagged with a form
/// field name, filename, and MIME type.
#[derive(Debug, Clone)]
pub struct KycDocument {
  pub field_name: String,
  pub file_name: String,
  pub mime_type: String,
  pub bytes: Vec<u8>,
}

//! Typed remote-resource client for a P2P fund-request, expense-sharing,
//! and fund-subscription backend.
//!
//! Four resource families (fund requests, shared expenses, funds/
//! subscriptions, KYC) share one cache engine: query results are cached
//! per canonicalized-argument key and tagged, mutations invalidate by tag
//! after success, concurrent dispatches coalesce onto one request, and
//! unsubscribed entries are evicted after a retention window. The UI
//! consumes [`QueryHandle`]s exposing data / loading / error plus
//! refetch, and never sees a thrown error.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod query;

pub use api::types::{
  ExpenseShare, Fund, FundRequest, FundRequestStatus, FundSubscription, KycDocument, KycState,
  KycStatus, ListParams, NewFundRequest, NewSharedExpense, Page, SharedExpense,
  SharedExpenseStatus, SubscribeFund, SubscriptionStatus,
};
pub use api::{FundlinkClient, FundRequestsApi, FundsApi, KycApi, SharedExpensesApi};
pub use auth::AuthContext;
pub use cache::{CacheEngine, CacheKey, Tag};
pub use config::{CacheConfig, Config, Endpoints};
pub use error::{ClientError, Result};
pub use query::{QueryHandle, QueryStatus};

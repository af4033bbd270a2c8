//! Typed resource-family clients.
//!
//! One struct per backend domain, one method per operation. All four
//! families share a single cache engine so tag invalidation crosses
//! family boundaries only where tags do.

pub mod fund_requests;
pub mod funds;
pub mod kyc;
pub mod shared_expenses;
pub mod types;

use std::sync::Arc;

use crate::auth::AuthContext;
use crate::cache::CacheEngine;
use crate::config::Config;
use crate::error::Result;

pub use fund_requests::FundRequestsApi;
pub use funds::FundsApi;
pub use kyc::KycApi;
pub use shared_expenses::SharedExpensesApi;

/// All resource families over one shared cache engine and auth context.
#[derive(Clone)]
pub struct FundlinkClient {
  pub fund_requests: FundRequestsApi,
  pub shared_expenses: SharedExpensesApi,
  pub funds: FundsApi,
  pub kyc: KycApi,
  engine: Arc<CacheEngine>,
}

impl FundlinkClient {
  pub fn new(config: &Config, auth: AuthContext) -> Result<Self> {
    let engine = Arc::new(CacheEngine::new(&config.cache));

    Ok(Self {
      fund_requests: FundRequestsApi::new(
        Config::base_url(&config.endpoints.fund_requests)?,
        auth.clone(),
        engine.clone(),
      )?,
      shared_expenses: SharedExpensesApi::new(
        Config::base_url(&config.endpoints.shared_expenses)?,
        auth.clone(),
        engine.clone(),
      )?,
      funds: FundsApi::new(
        Config::base_url(&config.endpoints.funds)?,
        auth.clone(),
        engine.clone(),
      )?,
      kyc: KycApi::new(Config::base_url(&config.endpoints.kyc)?, auth, engine.clone())?,
      engine,
    })
  }

  /// The shared cache engine, for wiring query handles or tests.
  pub fn engine(&self) -> &Arc<CacheEngine> {
    &self.engine
  }
}

//! Market module: volunteer marketplace with an explicit access policy.
//!
//! # Resources
//!
//! - **Account**: a student or an organization; organizations carry a
//!   verified flag set only by the external verifier
//! - **Opportunity**: a volunteering slot with a capacity
//! - **Registration**: a student's sign-up, with logged hours
//! - **Bookmark**: an opportunity saved for later
//! - **Session**: a signed-in token, revocable by signing out
//!
//! Every operation names its [`Actor`](model::Actor) and is decided by
//! [`policy::can_perform`] before the store is touched. Capacity and
//! hour totals are enforced again inside the store's atomic batches.
//!
//! # Usage
//!
//! ```ignore
//! use market::{MarketModule, service::MarketConfig};
//!
//! let module = MarketModule::new(sql, kv, MarketConfig::default())?;
//! let router = module.routes(); // Mount under /market
//! ```

pub mod api;
pub mod model;
pub mod policy;
pub mod service;
pub mod store;

#[cfg(test)]
mod scenarios;

use std::sync::Arc;

use axum::Router;

use vhub_core::{Module, ServiceError};
use vhub_kv::KVStore;
use vhub_sql::SQLStore;

use crate::service::{MarketConfig, MarketService};

/// Marketplace module implementing the Module trait.
pub struct MarketModule {
    service: Arc<MarketService>,
}

impl MarketModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        config: MarketConfig,
    ) -> Result<Self, ServiceError> {
        let service = MarketService::new(sql, kv, config).map_err(ServiceError::from)?;
        Ok(Self { service })
    }

    /// Get a reference to the underlying MarketService.
    pub fn service(&self) -> &Arc<MarketService> {
        &self.service
    }
}

impl Module for MarketModule {
    fn name(&self) -> &str {
        "market"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}

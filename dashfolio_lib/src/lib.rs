//! Library layer for Dashfolio: portfolio KPI computation and the
//! collaborators that feed and distribute it.
//!
//! The computation runs normalize, price, per-asset KPIs, portfolio
//! summary and indirect positions in that order. Market data comes through
//! the [`PriceSource`] and [`HoldingsSource`] traits, implemented over the
//! `market_data_api` crate by [`YahooSource`].

pub mod asset_kpis;
pub mod config;
pub mod error;
pub mod indirect;
pub mod mail;
pub mod normalize;
pub mod oauth;
pub mod pipeline;
pub mod portfolio;
pub mod portfolio_kpis;
pub mod prices;
pub mod retry;
pub mod schema;
pub mod sheets;
pub mod sources;
pub mod ticker_rewrite;

pub use market_data_api;

pub use asset_kpis::AssetKpis;
pub use config::{DashboardConfig, Secrets, VarsFile};
pub use error::DashboardError;
pub use indirect::{Constituent, HoldingsSource, IndirectPosition};
pub use normalize::{MissingOptionalField, RawTable};
pub use pipeline::{build_dashboard, compute_dashboard, Dashboard, DashboardSettings};
pub use portfolio::PortfolioRow;
pub use portfolio_kpis::PortfolioKpis;
pub use prices::{PriceSource, ReferenceDates};
pub use schema::{Schema, SchemaError};
pub use sources::YahooSource;

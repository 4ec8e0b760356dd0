use std::fmt::Display;

use url::Url;

use super::Query;

/// Modules of the `/v10/finance/quoteSummary/{symbol}` endpoint this client understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteSummaryModule {
    TopHoldings,
    Price,
}

impl Display for QuoteSummaryModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TopHoldings => "topHoldings",
            Self::Price => "price",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Default)]
pub struct QuoteSummaryQuery {
    pub modules: Vec<QuoteSummaryModule>,
}

impl QuoteSummaryQuery {
    pub fn with_module(mut self, module: QuoteSummaryModule) -> Self {
        if !self.modules.contains(&module) {
            self.modules.push(module);
        }
        self
    }
}

impl Query for QuoteSummaryQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        let modules = self
            .modules
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(",");
        url.query_pairs_mut().append_pair("modules", &modules);
        url
    }
}

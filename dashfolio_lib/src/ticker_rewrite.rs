//! Rewrites of fund constituent symbols that differ between data providers.
//!
//! Fund holdings data often lists share classes or foreign listings under a
//! symbol the price provider does not know (e.g. "BRK.B" vs "BRK-B"). The
//! rewrite table comes from the `tickers_to_replace` section of the config.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TickerRewriteError {
    #[error("Duplicate 'from' ticker in tickers_to_replace: {0}")]
    DuplicateFrom(String),
    #[error("Empty replacement for ticker {0}")]
    EmptyTarget(String),
}

/// Symbol rewrite table. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerRewrite {
    map: HashMap<String, String>,
}

impl TickerRewrite {
    /// Builds the table from `(from, to)` pairs.
    ///
    /// Keys are compared uppercased, so "brk.b" and "BRK.B" collide.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, TickerRewriteError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = HashMap::new();
        for (from, to) in pairs {
            let from = from.as_ref().trim().to_uppercase();
            let to = to.as_ref().trim().to_uppercase();
            if to.is_empty() {
                return Err(TickerRewriteError::EmptyTarget(from));
            }
            if map.contains_key(&from) {
                return Err(TickerRewriteError::DuplicateFrom(from));
            }
            map.insert(from, to);
        }
        Ok(Self { map })
    }

    pub fn from_config(entries: &BTreeMap<String, String>) -> Result<Self, TickerRewriteError> {
        Self::from_pairs(entries.iter())
    }

    /// The uppercased symbol after rewriting.
    pub fn apply(&self, ticker: &str) -> String {
        let key = ticker.trim().to_uppercase();
        match self.map.get(&key) {
            Some(to) => to.clone(),
            None => key,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

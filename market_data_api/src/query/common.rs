//! Shared query infrastructure: the [`Query`] trait implemented by every endpoint query.

use url::Url;

/// Trait implemented by all query builders. Provides URL serialization.
pub trait Query {
    /// Appends this query's parameters to the given URL, returning the modified URL.
    fn add_to_url(&self, url: &Url) -> Url;
}

mod common;
pub use self::common::Query;

mod chart;
pub use self::chart::{ChartInterval, ChartQuery};

mod quote_summary;
pub use self::quote_summary::{QuoteSummaryModule, QuoteSummaryQuery};

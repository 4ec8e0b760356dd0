mod common;
pub use self::common::{ApiErrorBody, RawValue};

mod chart;
pub use self::chart::{
    AdjClose, ChartEnvelope, ChartMeta, ChartResponse, ChartResult, DailyClose, Indicators, Quote,
};

mod holdings;
pub use self::holdings::{
    FundHolding, QuoteSummaryEnvelope, QuoteSummaryResponse, QuoteSummaryResult, TopHoldings,
};

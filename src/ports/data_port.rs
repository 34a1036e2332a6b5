//! Price source port trait.

use crate::domain::error::RiskcastError;
use crate::domain::price::PriceBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Close prices of `ticker` within `[start_date, end_date]`, sorted by date.
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RiskcastError>;

    fn list_tickers(&self) -> Result<Vec<String>, RiskcastError>;

    /// First date, last date and bar count, or `None` when the ticker has no data.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RiskcastError>;
}

//! Ticker universe: parsing the configured list and loading each ticker's
//! prices, skipping tickers that have nothing usable.

use crate::domain::error::RiskcastError;
use crate::domain::price::PriceSeries;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Two closes give the first return.
pub const MIN_PRICE_BARS: usize = 2;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

impl From<UniverseError> for RiskcastError {
    fn from(err: UniverseError) -> Self {
        RiskcastError::ConfigInvalid {
            section: "analysis".into(),
            key: "tickers".into(),
            reason: err.to_string(),
        }
    }
}

/// Splits a comma-separated list into uppercase tickers, keeping input order.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    FetchFailed(String),
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

pub struct LoadedUniverse {
    pub series: Vec<PriceSeries>,
    pub skipped: Vec<SkippedTicker>,
}

impl LoadedUniverse {
    pub fn tickers(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.ticker.as_str()).collect()
    }
}

/// Fetches every ticker's closes in range. Tickers that fail or have fewer
/// than [`MIN_PRICE_BARS`] bars are skipped; an empty result is an error.
pub fn load_universe(
    data_port: &dyn DataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<LoadedUniverse, RiskcastError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for ticker in tickers {
        let reason = match data_port.fetch_closes(ticker, start_date, end_date) {
            Err(e) => SkipReason::FetchFailed(e.to_string()),
            Ok(bars) if bars.is_empty() => SkipReason::NoData,
            Ok(bars) if bars.len() < MIN_PRICE_BARS => {
                SkipReason::InsufficientBars { bars: bars.len() }
            }
            Ok(bars) => {
                tracing::debug!(ticker = %ticker, bars = bars.len(), "loaded prices");
                series.push(PriceSeries::new(ticker.clone(), bars));
                continue;
            }
        };
        tracing::warn!(ticker = %ticker, ?reason, "skipping ticker");
        skipped.push(SkippedTicker {
            ticker: ticker.clone(),
            reason,
        });
    }

    if series.is_empty() {
        return match tickers {
            [only] => Err(RiskcastError::NoData {
                ticker: only.clone(),
            }),
            _ => Err(RiskcastError::insufficient("ticker universe", 1, 0)),
        };
    }

    Ok(LoadedUniverse { series, skipped })
}

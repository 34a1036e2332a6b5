#![allow(dead_code)]

use chrono::NaiveDate;
use riskcast::domain::error::RiskcastError;
pub use riskcast::domain::price::PriceBar;
use riskcast::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RiskcastError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(RiskcastError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, RiskcastError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RiskcastError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(RiskcastError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(ticker: &str, date: &str, close: f64) -> PriceBar {
    PriceBar {
        ticker: ticker.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        close,
    }
}

/// Closes on consecutive days starting at `start_date`.
pub fn bars_from_closes(ticker: &str, start_date: &str, closes: &[f64]) -> Vec<PriceBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            ticker: ticker.to_string(),
            date: start + chrono::Duration::days(i as i64),
            close,
        })
        .collect()
}

/// Closes that compound the given returns from 100.0.
pub fn closes_from_returns(returns: &[f64]) -> Vec<f64> {
    let mut closes = vec![100.0];
    for r in returns {
        let last = *closes.last().unwrap();
        closes.push(last * (1.0 + r));
    }
    closes
}

/// A deterministic wiggly price path of `count` closes.
pub fn generate_bars(ticker: &str, start_date: &str, count: usize, phase: f64) -> Vec<PriceBar> {
    let returns: Vec<f64> = (0..count.saturating_sub(1))
        .map(|i| 0.01 * ((i as f64) * 0.7 + phase).sin() + 0.002 * ((i as f64) * 1.9).cos())
        .collect();
    bars_from_closes(ticker, start_date, &closes_from_returns(&returns))
}

pub fn write_price_csv(dir: &Path, ticker: &str, bars: &[PriceBar]) {
    let mut content = String::from("Date,Open,High,Low,Close,Volume\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},1000\n",
            bar.date,
            bar.close,
            bar.close + 1.0,
            bar.close - 1.0,
            bar.close
        ));
    }
    fs::write(dir.join(format!("{ticker}_stock_data.csv")), content).unwrap();
}

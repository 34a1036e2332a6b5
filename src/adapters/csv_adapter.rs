//! CSV price adapter.
//!
//! Reads one `{TICKER}_stock_data.csv` file per ticker from a directory. The
//! date column is the one headed `Date` (any case), else the first column;
//! closes come from the column headed `Close`. Rows whose date or close does
//! not parse are skipped, which also drops the extra header rows some
//! downloaders emit.

use crate::domain::error::RiskcastError;
use crate::domain::price::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const FILE_SUFFIX: &str = "_stock_data.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}{FILE_SUFFIX}"))
    }

    /// Every parseable bar in `path`, sorted by date with duplicate dates
    /// collapsed to their first row.
    pub fn read_file(path: &Path, ticker: &str) -> Result<Vec<PriceBar>, RiskcastError> {
        let file = File::open(path).map_err(|e| RiskcastError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let headers = rdr.headers().map_err(|e| RiskcastError::DataSource {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let date_col = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("date"))
            .unwrap_or(0);
        let close_col = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("close"))
            .ok_or_else(|| RiskcastError::DataSource {
                reason: format!("no Close column in {}", path.display()),
            })?;

        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| RiskcastError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date = record.get(date_col).and_then(parse_date);
            let close = record
                .get(close_col)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|c| c.is_finite());

            match (date, close) {
                (Some(date), Some(close)) => bars.push(PriceBar {
                    ticker: ticker.to_string(),
                    date,
                    close,
                }),
                _ => {
                    skipped += 1;
                    tracing::warn!(
                        file = %path.display(),
                        row = line + 2,
                        "skipping row with unparseable date or close"
                    );
                }
            }
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        tracing::info!(
            file = %path.display(),
            bars = bars.len(),
            skipped,
            "read price file"
        );
        Ok(bars)
    }
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

impl DataPort for CsvAdapter {
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RiskcastError> {
        let mut bars = Self::read_file(&self.csv_path(ticker), ticker)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RiskcastError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RiskcastError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RiskcastError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(FILE_SUFFIX) {
                if !ticker.is_empty() {
                    tickers.push(ticker.to_string());
                }
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RiskcastError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let bars = Self::read_file(&path, ticker)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "Date,Open,High,Low,Close,Volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";

        fs::write(path.join("AAPL_stock_data.csv"), csv_content).unwrap();
        fs::write(path.join("MSFT_stock_data.csv"), "Date,Close\n").unwrap();
        fs::write(path.join("notes.txt"), "ignore me").unwrap();

        (dir, path)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn fetch_closes_returns_sorted_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_closes("AAPL", date(15), date(17)).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(15));
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[2].close, 115.0);
        assert_eq!(bars[1].ticker, "AAPL");
    }

    #[test]
    fn fetch_closes_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_closes("AAPL", date(16), date(16)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, date(16));
    }

    #[test]
    fn fetch_closes_missing_file_is_data_source_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_closes("XYZ", date(1), date(31));
        assert!(matches!(result, Err(RiskcastError::DataSource { .. })));
    }

    #[test]
    fn unparseable_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prices.csv");
        fs::write(
            &file,
            "Price,Close,High\n\
             Ticker,AAPL,AAPL\n\
             Date,,\n\
             2024-01-02 00:00:00-05:00,185.5,188.4\n\
             2024-01-03,not_a_number,1.0\n\
             2024-01-04,181.9,182.7\n",
        )
        .unwrap();

        let bars = CsvAdapter::read_file(&file, "AAPL").unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![185.5, 181.9]);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn close_column_found_by_name_in_any_case() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prices.csv");
        fs::write(&file, "day,volume,CLOSE\n2024-01-02,10,5.5\n").unwrap();

        let bars = CsvAdapter::read_file(&file, "X").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 5.5);
    }

    #[test]
    fn missing_close_column_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prices.csv");
        fs::write(&file, "Date,Open\n2024-01-02,1.0\n").unwrap();

        let result = CsvAdapter::read_file(&file, "X");
        assert!(matches!(result, Err(RiskcastError::DataSource { .. })));
    }

    #[test]
    fn list_tickers_strips_suffix() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_tickers().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn data_range_reports_bounds() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(
            adapter.get_data_range("AAPL").unwrap(),
            Some((date(15), date(17), 3))
        );
        assert_eq!(adapter.get_data_range("MSFT").unwrap(), None);
        assert_eq!(adapter.get_data_range("XYZ").unwrap(), None);
    }
}

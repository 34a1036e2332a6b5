//! SQLite price store adapter.

use crate::domain::error::RiskcastError;
use crate::domain::price::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn source_error(e: r2d2::Error) -> RiskcastError {
    RiskcastError::DataSource {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> RiskcastError {
    RiskcastError::DataQuery {
        reason: e.to_string(),
    }
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate, RiskcastError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| RiskcastError::DataQuery {
        reason: format!("bad stored date '{raw}': {e}"),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RiskcastError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| RiskcastError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(source_error)?;

        tracing::info!(path = %db_path, pool_size, "opened price store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, RiskcastError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(source_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, RiskcastError> {
        self.pool.get().map_err(source_error)
    }

    pub fn initialize_schema(&self) -> Result<(), RiskcastError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
            )
            .map_err(query_error)
    }

    /// Upserts `bars` in one transaction; returns the number written.
    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, RiskcastError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO prices (ticker, date, close) VALUES (?1, ?2, ?3)",
                params![bar.ticker, bar.date.format(DATE_FORMAT).to_string(), bar.close],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        tracing::debug!(rows = bars.len(), "inserted price bars");
        Ok(bars.len())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RiskcastError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, close FROM prices
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, close) = row.map_err(query_error)?;
            bars.push(PriceBar {
                ticker: ticker.to_string(),
                date: parse_stored_date(&date)?,
                close,
            });
        }
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RiskcastError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM prices ORDER BY ticker")
            .map_err(query_error)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RiskcastError> {
        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => Ok(Some((
                parse_stored_date(&min)?,
                parse_stored_date(&max)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

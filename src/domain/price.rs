//! Close-price bars and per-ticker price series.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: f64,
}

/// Date-indexed close prices for one ticker, sorted by date.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl PriceSeries {
    pub fn new(ticker: String, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            ticker,
            bars,
            date_index,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.date_index.get(&date).map(|&i| self.bars[i].close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Dates on which every series has a close, ascending.
pub fn common_timeline(series: &[PriceSeries]) -> Vec<NaiveDate> {
    let Some((first, rest)) = series.split_first() else {
        return vec![];
    };
    let mut dates: BTreeSet<NaiveDate> = first.bars.iter().map(|b| b.date).collect();
    for s in rest {
        dates.retain(|d| s.date_index.contains_key(d));
    }
    dates.into_iter().collect()
}

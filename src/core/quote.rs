//! Quote abstractions and core types

use crate::core::error::FetchError;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A base/counter currency combination, e.g. `USD-BRL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    pub base: String,
    pub counter: String,
}

impl CurrencyPair {
    pub fn new(base: &str, counter: &str) -> Self {
        CurrencyPair {
            base: base.trim().to_uppercase(),
            counter: counter.trim().to_uppercase(),
        }
    }

    /// Key the quote provider uses for this pair in its response, e.g. `USDBRL`.
    pub fn payload_key(&self) -> String {
        format!("{}{}", self.base, self.counter)
    }

    pub fn default_set() -> Vec<CurrencyPair> {
        ["USD", "EUR", "BTC", "GBP"]
            .iter()
            .map(|base| CurrencyPair::new(base, "BRL"))
            .collect()
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.counter)
    }
}

impl FromStr for CurrencyPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, counter) = s
            .split_once(['-', '/'])
            .ok_or_else(|| anyhow!("Invalid currency pair: {}", s))?;
        let pair = CurrencyPair::new(base, counter);
        let is_code = |code: &str| !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric());
        if !is_code(&pair.base) || !is_code(&pair.counter) {
            return Err(anyhow!("Invalid currency pair: {}", s));
        }
        Ok(pair)
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> String {
        pair.to_string()
    }
}

/// A normalized quote, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecord {
    pub id: String,
    pub pair: String,
    pub name: String,
    pub price: f64,
    pub variation_percent: f64,
    pub variation_absolute: f64,
    pub last_update: String,
}

impl DisplayRecord {
    /// Parses `last_update`, which is either `YYYY-MM-DD HH:MM:SS` or epoch seconds.
    pub fn last_update_at(&self) -> Option<NaiveDateTime> {
        let raw = self.last_update.trim();
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .or_else(|| {
                raw.parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .map(|dt| dt.naive_utc())
            })
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quotes(&self, pairs: &[CurrencyPair]) -> Result<Vec<DisplayRecord>, FetchError>;
}

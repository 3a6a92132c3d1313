//! CSV data loading for the `5SecData` directory layout.
//!
//! Layout per symbol (directory name upper-cased):
//!
//! ```text
//! 5SecData/QQQ/2025-08-13_BK.csv     option tape: timestamp,type,strike,price
//! 5SecData/QQQ/Spot/qqq.csv          spot tape: date,timestamp,o,h,l,close
//! 5SecData/QQQ/2025-08-13.prop       key=value metadata, incl. jobEndIdx
//! ```
//!
//! Fallback policy: a day that is missing or unreadable loads as `None`
//! (skipped by the engine, warned, never fatal); malformed rows within a
//! readable file are dropped individually. A deterministic synthetic
//! generator covers offline development and tests.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use optlab_core::data::DataSource;
use optlab_core::domain::{OptionChain, OptionType, TradingDayData};

/// Default job-end index when the property file carries none.
const DEFAULT_JOB_END_IDX: i64 = 4660;

/// Errors from the loading layer. The [`DataSource`] impl degrades these to
/// `None` with a warning; callers that want the cause use [`CsvDataLoader::try_load_trading_day`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("option tape not found: {0}")]
    OptionTapeMissing(PathBuf),

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error reading {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Loader over the on-disk CSV layout, with a bounded rayon pool for batch
/// loads.
pub struct CsvDataLoader {
    data_path: PathBuf,
    workers: usize,
}

impl CsvDataLoader {
    pub const DEFAULT_WORKERS: usize = 4;

    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            workers: Self::DEFAULT_WORKERS,
        }
    }

    /// Bound the batch-load worker pool. Loading is I/O-bound fan-out; the
    /// simulation itself never runs here.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.data_path.join(symbol.to_uppercase())
    }

    /// Load one symbol-day or explain why it could not be loaded.
    pub fn try_load_trading_day(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<TradingDayData, LoadError> {
        let symbol_dir = self.symbol_dir(symbol);

        let option_path = symbol_dir.join(format!("{date}_BK.csv"));
        if !option_path.exists() {
            return Err(LoadError::OptionTapeMissing(option_path));
        }
        let options = parse_option_tape(&option_path)?;

        let spot_path = symbol_dir
            .join("Spot")
            .join(format!("{}.csv", symbol.to_lowercase()));
        let spot = parse_spot_tape(&spot_path, date).unwrap_or_else(|e| {
            tracing::warn!(symbol, %date, error = %e, "spot tape unreadable, day has no spot data");
            BTreeMap::new()
        });

        let prop_path = symbol_dir.join(format!("{date}.prop"));
        let metadata = parse_prop_file(&prop_path).unwrap_or_else(|e| {
            tracing::warn!(symbol, %date, error = %e, "property file unreadable, using defaults");
            BTreeMap::new()
        });
        let job_end_idx = metadata
            .get("jobEndIdx")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_JOB_END_IDX);

        Ok(TradingDayData {
            date,
            spot,
            options,
            job_end_idx,
            metadata,
        })
    }
}

impl DataSource for CsvDataLoader {
    fn available_dates(&self, symbol: &str) -> Vec<NaiveDate> {
        let Ok(entries) = std::fs::read_dir(self.symbol_dir(symbol)) else {
            return Vec::new();
        };
        let mut dates: Vec<NaiveDate> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let stem = name.strip_suffix("_BK.csv")?;
                NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
            })
            .collect();
        dates.sort();
        dates
    }

    fn load_trading_day(&self, symbol: &str, date: NaiveDate) -> Option<TradingDayData> {
        match self.try_load_trading_day(symbol, date) {
            Ok(day) => Some(day),
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "failed to load trading day");
                None
            }
        }
    }

    /// Fan the batch over a private bounded pool; results join back into a
    /// plain vector before any simulation state is touched.
    fn load_many(&self, requests: &[(String, NaiveDate)]) -> Vec<Option<TradingDayData>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                requests
                    .par_iter()
                    .map(|(symbol, date)| self.load_trading_day(symbol, *date))
                    .collect()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "thread pool unavailable, loading sequentially");
                requests
                    .iter()
                    .map(|(symbol, date)| self.load_trading_day(symbol, *date))
                    .collect()
            }
        }
    }
}

fn parse_option_tape(path: &Path) -> Result<BTreeMap<i64, OptionChain>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut options: BTreeMap<i64, OptionChain> = BTreeMap::new();
    let mut dropped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = (|| {
            let timestamp: i64 = record.get(0)?.trim().parse().ok()?;
            let option_type = OptionType::from_tape(record.get(1)?.trim())?;
            let strike: f64 = record.get(2)?.trim().parse().ok()?;
            let price: f64 = record.get(3)?.trim().parse().ok()?;
            Some((timestamp, option_type, strike, price))
        })();

        match parsed {
            Some((timestamp, option_type, strike, price)) => {
                options
                    .entry(timestamp)
                    .or_default()
                    .insert(option_type, strike, price);
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "dropped malformed option tape rows");
    }
    Ok(options)
}

/// Spot tape rows: `date,timestamp,open,high,low,close`. Only rows matching
/// the requested date are kept; the close column prices the simulation.
fn parse_spot_tape(path: &Path, date: NaiveDate) -> Result<BTreeMap<i64, f64>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let date_str = date.to_string();
    let mut spot = BTreeMap::new();

    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if record.get(0).map(str::trim) != Some(date_str.as_str()) {
            continue;
        }
        let parsed = (|| {
            let timestamp: i64 = record.get(1)?.trim().parse().ok()?;
            let close: f64 = record.get(5)?.trim().parse().ok()?;
            Some((timestamp, close))
        })();
        if let Some((timestamp, close)) = parsed {
            spot.insert(timestamp, close);
        }
    }
    Ok(spot)
}

fn parse_prop_file(path: &Path) -> Result<BTreeMap<String, String>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut metadata = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(metadata)
}

/// Deterministic BLAKE3 hash over a loaded day, for run fingerprinting.
pub fn dataset_hash(day: &TradingDayData) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(day.date.to_string().as_bytes());
    hasher.update(&day.job_end_idx.to_le_bytes());
    for (&ts, &price) in &day.spot {
        hasher.update(&ts.to_le_bytes());
        hasher.update(&price.to_le_bytes());
    }
    for (&ts, chain) in &day.options {
        hasher.update(&ts.to_le_bytes());
        for option_type in [OptionType::Call, OptionType::Put] {
            let series = chain.series(option_type);
            for (&strike, &price) in series.strikes().iter().zip(series.prices()) {
                hasher.update(&strike.to_le_bytes());
                hasher.update(&price.to_le_bytes());
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate a deterministic synthetic trading day.
///
/// Seeded from (symbol, date) via BLAKE3, so the same inputs always produce
/// the same tape. Spot follows a small random walk; option quotes are an
/// intrinsic-plus-decaying-time-value proxy. Development/test data only.
pub fn synthetic_trading_day(symbol: &str, date: NaiveDate, ticks: usize) -> TradingDayData {
    let seed_input = format!("{symbol}:{date}");
    let seed: [u8; 32] = *blake3::hash(seed_input.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut spot = BTreeMap::new();
    let mut options = BTreeMap::new();
    let mut price: f64 = 100.0 + rng.gen_range(-5.0..5.0);
    let strikes: Vec<f64> = (-10..=10).map(|i| (price.round()) + i as f64).collect();

    for i in 0..ticks {
        let ts = 1000 + i as i64;
        price *= 1.0 + rng.gen_range(-0.0005..0.0005);
        spot.insert(ts, price);

        let time_left = 1.0 - i as f64 / ticks.max(1) as f64;
        let mut chain = OptionChain::default();
        for &strike in &strikes {
            let call_intrinsic = (price - strike).max(0.0);
            let put_intrinsic = (strike - price).max(0.0);
            let time_value = (2.0 * time_left) / (1.0 + (price - strike).abs());
            chain.insert(OptionType::Call, strike, call_intrinsic + time_value);
            chain.insert(OptionType::Put, strike, put_intrinsic + time_value);
        }
        options.insert(ts, chain);
    }

    TradingDayData {
        date,
        spot,
        options,
        job_end_idx: 1000 + ticks as i64 - 1,
        metadata: BTreeMap::from([("synthetic".to_string(), "true".to_string())]),
    }
}

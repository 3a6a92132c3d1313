//! Rolling cross-symbol correlation over price velocities.
//!
//! Each symbol's per-step velocity is pushed into a bounded window; the
//! pairwise estimate is the Pearson correlation of the two velocity series
//! over their most recent overlapping samples. Recomputed on demand, never
//! locked — all reads happen after the per-symbol steps of a timestamp.

use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone)]
pub struct CorrelationTracker {
    window: usize,
    velocities: BTreeMap<String, VecDeque<f64>>,
}

impl CorrelationTracker {
    pub const DEFAULT_WINDOW: usize = 60;

    pub fn new(window: usize) -> Self {
        Self {
            window,
            velocities: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, symbol: &str, velocity: f64) {
        let series = self
            .velocities
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.window));
        if series.len() == self.window {
            series.pop_front();
        }
        series.push_back(velocity);
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.velocities.keys().map(String::as_str).collect()
    }

    /// Pearson correlation of two symbols' velocity windows, aligned on
    /// their most recent samples. 0.0 when either series is too short or
    /// has no variance.
    pub fn correlation(&self, a: &str, b: &str) -> f64 {
        let (Some(series_a), Some(series_b)) = (self.velocities.get(a), self.velocities.get(b))
        else {
            return 0.0;
        };
        let n = series_a.len().min(series_b.len());
        if n < 2 {
            return 0.0;
        }

        let tail_a: Vec<f64> = series_a.iter().rev().take(n).rev().copied().collect();
        let tail_b: Vec<f64> = series_b.iter().rev().take(n).rev().copied().collect();

        let mean_a = tail_a.iter().sum::<f64>() / n as f64;
        let mean_b = tail_b.iter().sum::<f64>() / n as f64;

        let mut covariance = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for i in 0..n {
            let da = tail_a[i] - mean_a;
            let db = tail_b[i] - mean_b;
            covariance += da * db;
            var_a += da * da;
            var_b += db * db;
        }
        if var_a == 0.0 || var_b == 0.0 {
            return 0.0;
        }
        covariance / (var_a.sqrt() * var_b.sqrt())
    }

    /// Correlations of `symbol` against every other tracked symbol.
    pub fn correlations_for(&self, symbol: &str) -> BTreeMap<String, f64> {
        self.velocities
            .keys()
            .filter(|other| other.as_str() != symbol)
            .map(|other| (other.clone(), self.correlation(symbol, other)))
            .collect()
    }
}

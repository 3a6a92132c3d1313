//! Market regime detection over a fixed-capacity rolling window.
//!
//! The detector consumes one symbol's snapshot stream and maintains rolling
//! spot/option-price history (default 60 samples ≈ 5 minutes on the
//! 5-second grid). Each update recomputes, in order: price velocity, trend
//! strength (OLS slope), a volatility estimate (realized, blended with an
//! option-price proxy), and the regime classification with its confidence.
//! Derived indicators are written back onto the snapshot.

use std::collections::{BTreeMap, VecDeque};

use crate::domain::{MarketSnapshot, Regime, RegimeIndicators};

// Classification thresholds.
const HIGH_VOL_THRESHOLD: f64 = 0.25;
const LOW_VOL_THRESHOLD: f64 = 0.10;
const STRONG_TREND_THRESHOLD: f64 = 0.3;
const WEAK_TREND_THRESHOLD: f64 = 0.1;
const HIGH_VELOCITY_THRESHOLD: f64 = 0.002;

/// Minimum samples before any classification is attempted.
const MIN_CLASSIFY_SAMPLES: usize = 10;

/// Annualization grid: 252 trading days of 78 five-minute periods.
const PERIODS_PER_YEAR: f64 = 252.0 * 78.0;

/// Width of a time-of-day aggregation bucket, in timestamp units.
const TIME_BUCKET: i64 = 300;

/// Running time-of-day aggregates for one 5-minute bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeBucketStats {
    pub avg_volatility: f64,
    pub avg_trend_strength: f64,
    pub regime_stability: f64,
    pub samples: u32,
}

#[derive(Debug, Clone)]
pub struct MarketRegimeDetector {
    lookback: usize,
    prices: VecDeque<f64>,
    timestamps: VecDeque<i64>,
    option_prices: VecDeque<f64>,

    current_regime: Regime,
    confidence: f64,
    velocity: f64,
    trend_strength: f64,
    volatility: f64,

    previous_regime: Regime,
    regime_changes: u32,

    time_effects: BTreeMap<i64, TimeBucketStats>,
}

impl MarketRegimeDetector {
    pub const DEFAULT_LOOKBACK: usize = 60;

    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            prices: VecDeque::with_capacity(lookback),
            timestamps: VecDeque::with_capacity(lookback),
            option_prices: VecDeque::with_capacity(lookback),
            current_regime: Regime::Unknown,
            confidence: 0.0,
            velocity: 0.0,
            trend_strength: 0.0,
            volatility: 0.0,
            previous_regime: Regime::Unknown,
            regime_changes: 0,
            time_effects: BTreeMap::new(),
        }
    }

    /// Drop the rolling window and classification for a new trading day.
    /// Time-of-day aggregates persist: buckets are keyed by time index and
    /// accumulate across days.
    pub fn reset_daily(&mut self) {
        self.prices.clear();
        self.timestamps.clear();
        self.option_prices.clear();
        self.current_regime = Regime::Unknown;
        self.previous_regime = Regime::Unknown;
        self.confidence = 0.0;
        self.velocity = 0.0;
        self.trend_strength = 0.0;
        self.volatility = 0.0;
        self.regime_changes = 0;
    }

    /// Ingest a snapshot, recompute all indicators, classify the regime,
    /// and write the derived fields back onto the snapshot.
    pub fn update_market_data(&mut self, snapshot: &mut MarketSnapshot<'_>) {
        self.push_bounded_price(snapshot.spot_price, snapshot.timestamp);
        if !snapshot.chain.is_empty() {
            let avg = snapshot.chain.average_price();
            if self.option_prices.len() == self.lookback {
                self.option_prices.pop_front();
            }
            self.option_prices.push_back(avg);
        }

        if self.prices.len() < 2 {
            return;
        }

        self.velocity = self.compute_velocity();
        self.trend_strength = self.compute_trend_strength();
        self.volatility = self.compute_volatility();

        self.previous_regime = self.current_regime;
        let (regime, confidence) = self.classify();
        self.current_regime = regime;
        self.confidence = confidence;

        if self.current_regime != self.previous_regime && self.previous_regime != Regime::Unknown
        {
            self.regime_changes += 1;
            tracing::debug!(
                from = %self.previous_regime,
                to = %self.current_regime,
                confidence,
                "regime change"
            );
        }

        self.update_time_effects(snapshot.timestamp);

        snapshot.indicators = Some(RegimeIndicators {
            velocity: self.velocity,
            volatility: self.volatility,
            trend_strength: self.trend_strength,
            regime: self.current_regime,
        });
    }

    pub fn current_regime(&self) -> Regime {
        self.current_regime
    }

    pub fn regime_confidence(&self) -> f64 {
        self.confidence
    }

    pub fn price_velocity(&self) -> f64 {
        self.velocity
    }

    /// Trend strength in [-1, 1]; negative values are downtrends.
    pub fn trend_strength(&self) -> f64 {
        self.trend_strength
    }

    pub fn volatility_estimate(&self) -> f64 {
        self.volatility
    }

    pub fn regime_change_count(&self) -> u32 {
        self.regime_changes
    }

    pub fn sample_count(&self) -> usize {
        self.prices.len()
    }

    /// True iff the regime moved this update; the first classification out
    /// of UNKNOWN never counts as a change.
    pub fn detect_regime_change(&self) -> bool {
        self.current_regime != self.previous_regime && self.previous_regime != Regime::Unknown
    }

    /// Time-of-day aggregates for the bucket containing `timeindex`, falling
    /// back to the current live indicators when the bucket is empty.
    pub fn analyze_time_effects(&self, timeindex: i64) -> TimeBucketStats {
        let bucket = (timeindex / TIME_BUCKET) * TIME_BUCKET;
        self.time_effects
            .get(&bucket)
            .copied()
            .unwrap_or(TimeBucketStats {
                avg_volatility: self.volatility,
                avg_trend_strength: self.trend_strength.abs(),
                regime_stability: self.stability(),
                samples: 0,
            })
    }

    /// Divergence against another symbol's detector, in [0, 1].
    ///
    /// Weighted blend: 0.5 for a differing regime label, 0.3 for trend
    /// separation, 0.2 for relative volatility separation.
    pub fn detect_cross_symbol_divergence(&self, other: &MarketRegimeDetector) -> f64 {
        if other.prices.len() < 2 {
            return 0.0;
        }

        let regime_divergence = if self.current_regime == other.current_regime {
            0.0
        } else {
            1.0
        };
        let trend_divergence = (self.trend_strength - other.trend_strength).abs() / 2.0;
        let vol_divergence = (self.volatility - other.volatility).abs()
            / (self.volatility + other.volatility).max(0.01);

        (regime_divergence * 0.5 + trend_divergence * 0.3 + vol_divergence * 0.2).min(1.0)
    }

    fn push_bounded_price(&mut self, price: f64, timestamp: i64) {
        if self.prices.len() == self.lookback {
            self.prices.pop_front();
            self.timestamps.pop_front();
        }
        self.prices.push_back(price);
        self.timestamps.push_back(timestamp);
    }

    /// Mean percentage change over the most recent min(5, n-1) steps.
    fn compute_velocity(&self) -> f64 {
        let n = self.prices.len();
        if n < 2 {
            return 0.0;
        }
        let steps = 5.min(n - 1);
        let mut total = 0.0;
        for i in 0..steps {
            let current = self.prices[n - 1 - i];
            let previous = self.prices[n - 2 - i];
            total += (current - previous) / previous;
        }
        total / steps as f64
    }

    /// OLS slope of price against sample index over the whole window,
    /// normalized by mean price, scaled x1000, clamped to [-1, 1].
    fn compute_trend_strength(&self) -> f64 {
        let n = self.prices.len();
        if n < MIN_CLASSIFY_SAMPLES {
            return 0.0;
        }
        let nf = n as f64;
        let mut x_sum = 0.0;
        let mut y_sum = 0.0;
        let mut xy_sum = 0.0;
        let mut x2_sum = 0.0;
        for (i, &price) in self.prices.iter().enumerate() {
            let x = i as f64;
            x_sum += x;
            y_sum += price;
            xy_sum += x * price;
            x2_sum += x * x;
        }
        let denom = nf * x2_sum - x_sum * x_sum;
        if denom == 0.0 {
            return 0.0;
        }
        let slope = (nf * xy_sum - x_sum * y_sum) / denom;
        let avg_price = y_sum / nf;
        let normalized = if avg_price > 0.0 { slope / avg_price } else { 0.0 };
        (normalized * 1000.0).clamp(-1.0, 1.0)
    }

    /// Population stdev of log-returns over the window, annualized; blended
    /// 70/30 with the option-price proxy when enough option samples exist.
    fn compute_volatility(&self) -> f64 {
        if self.prices.len() < 5 {
            return 0.0;
        }
        let realized = annualized_log_return_vol(&self.prices);

        if self.option_prices.len() >= 5 {
            // Option prices move more than spot per unit of volatility, so
            // the proxy is scaled down before blending.
            let option_vol = annualized_log_return_vol(&self.option_prices) * 0.5;
            0.7 * realized + 0.3 * option_vol
        } else {
            realized
        }
    }

    fn classify(&self) -> (Regime, f64) {
        if self.prices.len() < MIN_CLASSIFY_SAMPLES {
            return (Regime::Unknown, 0.0);
        }

        let trend = self.trend_strength;
        let vol = self.volatility;
        let trend_regime = if trend > 0.0 {
            Regime::TrendingUp
        } else {
            Regime::TrendingDown
        };

        let (regime, confidence) = if trend.abs() > STRONG_TREND_THRESHOLD {
            (trend_regime, (trend.abs() + 0.2).min(0.9))
        } else if vol > HIGH_VOL_THRESHOLD {
            (
                Regime::HighVol,
                (vol / HIGH_VOL_THRESHOLD * 0.5 + 0.3).min(0.8),
            )
        } else if vol < LOW_VOL_THRESHOLD {
            // Quiet tape: a moderate trend still dominates a low-vol label.
            if trend.abs() > WEAK_TREND_THRESHOLD * 2.0 {
                (trend_regime, (trend.abs() + 0.2).min(0.7))
            } else {
                (
                    Regime::LowVol,
                    ((LOW_VOL_THRESHOLD - vol) / LOW_VOL_THRESHOLD * 0.5 + 0.3).min(0.8),
                )
            }
        } else if trend.abs() > WEAK_TREND_THRESHOLD * 1.5 {
            (trend_regime, trend.abs().min(0.8))
        } else if trend.abs() < WEAK_TREND_THRESHOLD
            && self.velocity.abs() < HIGH_VELOCITY_THRESHOLD
        {
            (
                Regime::Ranging,
                ((WEAK_TREND_THRESHOLD - trend.abs()) / WEAK_TREND_THRESHOLD * 0.4 + 0.3)
                    .min(0.7),
            )
        } else {
            (Regime::Ranging, 0.3)
        };

        // Persistence bonus: a regime that survives consecutive updates is
        // more trustworthy.
        if regime == self.previous_regime {
            (regime, (confidence + 0.1).min(1.0))
        } else {
            (regime, confidence)
        }
    }

    fn stability(&self) -> f64 {
        1.0 - self.regime_changes as f64 / self.prices.len().max(1) as f64
    }

    fn update_time_effects(&mut self, timestamp: i64) {
        let bucket = (timestamp / TIME_BUCKET) * TIME_BUCKET;
        let stability = self.stability();
        let stats = self.time_effects.entry(bucket).or_default();
        let count = stats.samples as f64;

        stats.avg_volatility = (stats.avg_volatility * count + self.volatility) / (count + 1.0);
        stats.avg_trend_strength =
            (stats.avg_trend_strength * count + self.trend_strength.abs()) / (count + 1.0);
        stats.regime_stability = (stats.regime_stability * count + stability) / (count + 1.0);
        stats.samples += 1;
    }
}

impl Default for MarketRegimeDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOOKBACK)
    }
}

fn annualized_log_return_vol(series: &VecDeque<f64>) -> f64 {
    let mut returns = Vec::with_capacity(series.len().saturating_sub(1));
    for i in 1..series.len() {
        if series[i - 1] > 0.0 {
            returns.push((series[i] / series[i - 1]).ln());
        }
    }
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt() * PERIODS_PER_YEAR.sqrt()
}

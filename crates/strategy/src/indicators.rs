//! Technical indicators over plain `f64` series, oldest value first.
//!
//! Each function returns the indicator value at the last element, or `None`
//! when the series is too short. Exponential averages use span smoothing
//! (`alpha = 2 / (span + 1)`) seeded with the first value.

/// Smallest denominator treated as non-zero
pub const EPSILON: f64 = 1e-10;

/// `num / den`, or 0 when `den` is (near) zero
pub fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() < EPSILON { 0.0 } else { num / den }
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Sample standard deviation of the last `period` values
pub fn stddev(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    let mean = tail.iter().sum::<f64>() / period as f64;
    let var = tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
    Some(var.sqrt())
}

/// Full EMA series; element `i` is the EMA after `values[i]`
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut acc = None;
    for &v in values {
        let next = match acc {
            None => v,
            Some(prev) => alpha * v + (1.0 - alpha) * prev,
        };
        acc = Some(next);
        out.push(next);
    }
    out
}

/// EMA at the last value; needs at least `span` values
pub fn ema(values: &[f64], span: usize) -> Option<f64> {
    if span == 0 || values.len() < span {
        return None;
    }
    ema_series(values, span).last().copied()
}

/// Relative Strength Index (0-100) with EMA-smoothed gains and losses
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();
    let avg_gain = *ema_series(&gains, period).last()?;
    let avg_loss = *ema_series(&losses, period).last()?;
    if avg_loss < EPSILON {
        return Some(if avg_gain < EPSILON { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line, signal line and histogram
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// The signal EMA starts once the slow EMA has `slow` values
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal == 0 || values.len() < slow + signal - 1 {
        return None;
    }
    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .skip(slow - 1)
        .map(|(f, s)| f - s)
        .collect();
    let line_last = *line.last()?;
    let signal_last = *ema_series(&line, signal).last()?;
    Some(Macd {
        line: line_last,
        signal: signal_last,
        histogram: line_last - signal_last,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bollinger {
    /// Band width as a percentage of the middle band
    pub fn width_pct(&self) -> f64 {
        ratio(self.upper - self.lower, self.middle) * 100.0
    }

    /// Position of `price` within the bands, in percent (%B)
    pub fn percent_b(&self, price: f64) -> f64 {
        ratio(price - self.lower, self.upper - self.lower) * 100.0
    }
}

pub fn bollinger(values: &[f64], period: usize, num_std: f64) -> Option<Bollinger> {
    let middle = sma(values, period)?;
    let sd = stddev(values, period)?;
    Some(Bollinger {
        upper: middle + sd * num_std,
        middle,
        lower: middle - sd * num_std,
    })
}

/// True range per bar; the first bar uses its high-low range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    (0..n)
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                hl
            } else {
                let prev = close[i - 1];
                hl.max((high[i] - prev).abs()).max((low[i] - prev).abs())
            }
        })
        .collect()
}

/// Average True Range: EMA of the true range
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    ema(&true_range(high, low, close), period)
}

/// Percent change over `period` values
pub fn roc(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let last = values[values.len() - 1];
    let base = values[values.len() - 1 - period];
    Some(ratio(last - base, base) * 100.0)
}

/// Percent change of the `period`-bar SMA over the last `lag` bars
pub fn sma_slope(values: &[f64], period: usize, lag: usize) -> Option<f64> {
    if values.len() < period + lag {
        return None;
    }
    let now = sma(values, period)?;
    let then = sma(&values[..values.len() - lag], period)?;
    Some(ratio(now - then, then) * 100.0)
}

/// Forex session code for a UTC hour:
/// 0 off hours, 1 Tokyo, 2 London, 3 New York, 4 London/New York overlap
pub fn forex_session(hour_utc: u32) -> u8 {
    match hour_utc {
        13..=16 => 4,
        0..=8 => 1,
        9..=12 => 2,
        17..=21 => 3,
        _ => 0,
    }
}

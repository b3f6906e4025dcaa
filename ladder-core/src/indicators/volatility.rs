//! Rolling return volatility and rolling quantile bands.

/// Sample standard deviation (ddof = 1). NaN for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Rolling sample std-dev of simple returns `r_t = (p_t - p_{t-1}) / p_{t-1}`.
///
/// The value at index `i` uses the `window` returns ending at price `i`, so
/// the first defined index is `window`. Requires `window >= 2`.
pub fn rolling_std_returns(prices: &[f64], window: usize) -> Vec<f64> {
    let n = prices.len();
    let mut result = vec![f64::NAN; n];

    if window <= 1 || n < window + 1 {
        return result;
    }

    let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();

    for i in window..n {
        result[i] = sample_std(&returns[i - window..i]);
    }
    result
}

/// Rolling low/high quantiles over the `window` values preceding each index.
///
/// Defined from index `window`. NaNs inside a window are ignored; a window
/// with no finite values yields NaN. Quantiles interpolate linearly between
/// order statistics.
pub fn rolling_quantiles(
    series: &[f64],
    window: usize,
    low_q: f64,
    high_q: f64,
) -> (Vec<f64>, Vec<f64>) {
    let n = series.len();
    let mut lows = vec![f64::NAN; n];
    let mut highs = vec![f64::NAN; n];

    if window <= 1 || n < window {
        return (lows, highs);
    }

    for i in window..n {
        let mut sorted: Vec<f64> = series[i - window..i]
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if sorted.is_empty() {
            continue;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        lows[i] = quantile_sorted(&sorted, low_q);
        highs[i] = quantile_sorted(&sorted, high_q);
    }
    (lows, highs)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

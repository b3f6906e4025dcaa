//! Timeframe resampling.

use ladder_core::domain::Bar;

/// Merge each complete group of `factor` consecutive bars into one.
///
/// The merged bar takes the time and close of the group's last bar, the open
/// of its first, the max high, the min low and the summed volume. A trailing
/// partial group is dropped, so the output never contains an unfinished bar.
/// `factor == 0` yields nothing.
pub fn resample(bars: &[Bar], factor: usize) -> Vec<Bar> {
    if factor == 0 {
        return Vec::new();
    }
    bars.chunks_exact(factor)
        .map(|group| {
            let first = &group[0];
            let last = &group[group.len() - 1];
            Bar {
                time: last.time,
                open: first.open,
                high: group.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
                low: group.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
                close: last.close,
                volume: group.iter().map(|b| b.volume).sum(),
            }
        })
        .collect()
}

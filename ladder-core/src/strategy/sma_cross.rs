//! Stateless SMA crossover.
//!
//! Buy when the fast SMA crosses above the slow SMA on the last bar, sell on
//! the opposite cross. Needs at least `slow + 1` closes.

use super::{MarketView, Signal, Strategy};
use crate::indicators::sma;

#[derive(Debug, Clone)]
pub struct SmaCross {
    pub fast: usize,
    pub slow: usize,
}

impl SmaCross {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }
}

impl Default for SmaCross {
    fn default() -> Self {
        Self::new(20, 50)
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn generate_signal(&mut self, view: &MarketView<'_>) -> Signal {
        let closes = view.closes;
        let n = closes.len();
        if n < self.slow + 1 || n < 2 {
            return Signal::Hold;
        }

        let fast = sma(closes, self.fast);
        let slow = sma(closes, self.slow);
        let (f_prev, f_now) = (fast[n - 2], fast[n - 1]);
        let (s_prev, s_now) = (slow[n - 2], slow[n - 1]);

        // NaN comparisons are false, so undefined averages hold.
        if f_prev <= s_prev && f_now > s_now {
            Signal::Buy
        } else if f_prev >= s_prev && f_now < s_now {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_below_min_history() {
        let mut strat = SmaCross::new(2, 4);
        assert_eq!(strat.generate_signal(&MarketView::new(&[1.0, 2.0, 3.0, 4.0])), Signal::Hold);
    }

    #[test]
    fn golden_cross_buys() {
        // sma2 vs sma4 at the last two bars: prev 10 vs 10, now 12 vs 11
        let closes = [10.0, 10.0, 10.0, 10.0, 10.0, 14.0];
        let mut strat = SmaCross::new(2, 4);
        assert_eq!(strat.generate_signal(&MarketView::new(&closes)), Signal::Buy);
    }

    #[test]
    fn death_cross_sells() {
        let closes = [10.0, 10.0, 10.0, 10.0, 10.0, 6.0];
        let mut strat = SmaCross::new(2, 4);
        assert_eq!(strat.generate_signal(&MarketView::new(&closes)), Signal::Sell);
    }

    #[test]
    fn steady_trend_holds() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let mut strat = SmaCross::new(2, 4);
        assert_eq!(strat.generate_signal(&MarketView::new(&closes)), Signal::Hold);
        assert!(strat.position().is_flat());
        assert_eq!(strat.trade_count(), 0);
    }
}

//! Bit-error-rate estimator (spec §4.14): sliding window with a warm-up
//! grace period so the very first groups after connect/reset don't count.

use std::collections::VecDeque;

const WINDOW_CAP: usize = 40;
const GRACE_GROUPS: u32 = 10;

#[derive(Debug, Clone)]
pub struct BerEstimator {
    window: VecDeque<u8>,
    grace_counter: u32,
}

impl Default for BerEstimator {
    fn default() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_CAP),
            grace_counter: GRACE_GROUPS,
        }
    }
}

impl BerEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame-ingester outcome. During grace, successful groups
    /// are consumed by the grace counter and never enter the window.
    pub fn record(&mut self, ok: bool) {
        if self.grace_counter > 0 {
            if ok {
                self.grace_counter -= 1;
            }
            // Errors during grace still don't enter the window per spec:
            // "the first 10 successful groups after connect/reset do not
            // contribute" — only successes burn down the grace counter,
            // but nothing is pushed to the window while grace is active.
            return;
        }
        if self.window.len() == WINDOW_CAP {
            self.window.pop_front();
        }
        self.window.push_back(if ok { 0 } else { 1 });
    }

    /// `100 * mean(window)` percent; `0` while grace is still active.
    pub fn ber(&self) -> f32 {
        if self.grace_counter > 0 || self.window.is_empty() {
            return 0.0;
        }
        let sum: u32 = self.window.iter().map(|&b| b as u32).sum();
        100.0 * (sum as f32) / (self.window.len() as f32)
    }

    pub fn in_grace(&self) -> bool {
        self.grace_counter > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_during_grace() {
        let mut ber = BerEstimator::new();
        for _ in 0..9 {
            ber.record(false);
        }
        assert_eq!(ber.ber(), 0.0);
        assert!(ber.in_grace());
    }

    #[test]
    fn grace_consumed_only_by_successes() {
        let mut ber = BerEstimator::new();
        for _ in 0..GRACE_GROUPS {
            ber.record(true);
        }
        assert!(!ber.in_grace());
    }

    #[test]
    fn bounds_and_window_cap() {
        let mut ber = BerEstimator::new();
        for _ in 0..GRACE_GROUPS {
            ber.record(true);
        }
        for _ in 0..100 {
            ber.record(false);
        }
        assert!(ber.ber() <= 100.0);
        assert!(ber.ber() >= 0.0);
        assert_eq!(ber.ber(), 100.0);
    }

    #[test]
    fn mixed_window_mean() {
        let mut ber = BerEstimator::new();
        for _ in 0..GRACE_GROUPS {
            ber.record(true);
        }
        for _ in 0..20 {
            ber.record(true);
        }
        for _ in 0..20 {
            ber.record(false);
        }
        assert_eq!(ber.ber(), 50.0);
    }
}

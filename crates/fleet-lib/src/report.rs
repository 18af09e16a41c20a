//! Occupancy report and scale-delta computation

use serde::Serialize;

/// Values this close to an integer are treated as that integer before truncation
const INTEGER_SNAP_EPSILON: f64 = 1e-9;

/// Ready/occupied counts taken from one status table snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub ready_pods: usize,
    pub occupied_pods: usize,
}

impl UsageReport {
    pub fn new(ready_pods: usize, occupied_pods: usize) -> Self {
        Self {
            ready_pods,
            occupied_pods,
        }
    }

    pub fn total(&self) -> usize {
        self.ready_pods + self.occupied_pods
    }

    /// Fraction of reporting pods that are occupied.
    ///
    /// `None` when no pod is reporting.
    pub fn usage(&self) -> Option<f64> {
        if self.total() == 0 {
            return None;
        }
        Some(self.occupied_pods as f64 / self.total() as f64)
    }

    /// Exact (non-truncated) pod delta that brings usage to `target_usage`.
    ///
    /// Solves `(occupied + x) / (ready + occupied + x) = t` for `x`:
    /// `x = t * ready / (1 - t) - occupied`.
    pub fn raw_delta(&self, target_usage: f64) -> Option<f64> {
        if self.total() == 0 {
            return None;
        }
        let ready = self.ready_pods as f64;
        let occupied = self.occupied_pods as f64;
        Some(target_usage * ready / (1.0 - target_usage) - occupied)
    }

    /// Signed number of pods to create (positive) or delete (negative),
    /// truncated toward zero.
    ///
    /// `None` when no pod is reporting; callers skip scaling in that case.
    pub fn delta(&self, target_usage: f64) -> Option<i64> {
        self.raw_delta(target_usage).map(truncate_toward_zero)
    }
}

fn truncate_toward_zero(value: f64) -> i64 {
    let nearest = value.round();
    if (value - nearest).abs() < INTEGER_SNAP_EPSILON {
        nearest as i64
    } else {
        value.trunc() as i64
    }
}

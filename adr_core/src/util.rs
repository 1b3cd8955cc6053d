//! Common time helpers for adr_core.

use std::time::Duration;

/// Below this elapsed time a cycle's finite-difference denominators are not
/// meaningful (same-cycle re-entry); rate clamps are skipped rather than
/// evaluated against a near-zero dt.
pub const DT_EPS_S: f64 = 1e-6;

/// Cycle period as a `Duration`, clamped to at least 1 ms.
#[inline]
pub fn period(period_ms: u64) -> Duration {
    Duration::from_millis(period_ms.max(1))
}

/// Delay until the next tick, compensating for the work the tick just did.
#[inline]
pub fn compensated_delay(period: Duration, work: Duration) -> Duration {
    period.saturating_sub(work)
}

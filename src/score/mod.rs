//! Deterministic scoring core.
//!
//! Pure functions only: weekly time-overlap metrics, haversine distance with
//! a coarse travel-time model, and percentile wage normalization. No I/O, no
//! shared state; everything here is recomputed per call and safe to unit
//! test in isolation.

pub mod overlap;
pub mod travel;
pub mod wage;

pub use overlap::{overlap_metrics, parse_work_days, Availability, OverlapMetrics, WEEKDAYS};
pub use travel::{estimate_travel_min, haversine_km};
pub use wage::{pay_norm, percentile};

/// Round to 2 decimal places, the precision of every exported ratio.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

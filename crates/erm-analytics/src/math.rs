//! Rounding helpers shared by the aggregations.

/// Round to the nearest integer, halves toward positive infinity.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Round to one decimal place, halves toward positive infinity.
pub fn round1(value: f64) -> f64 {
    round_half_up(value * 10.0) / 10.0
}

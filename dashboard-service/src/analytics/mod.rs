//! Derived metrics computed from stored readings. Everything here is pure:
//! the same inputs always give the same output.

pub mod aggregate;
pub mod alerts;
pub mod billing;
pub mod comparison;
pub mod fleet;
pub mod forecast;
pub mod latest;

/// Round to `places` decimals, halves away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_rounds_halves_away_from_zero() {
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(-0.375, 2), -0.38);
        assert_eq!(round_to(0.8125, 3), 0.813);
        assert_eq!(round_to(3.0000000000000004, 2), 3.0);
    }
}

use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};

use chain_events::{STRIKE_SCALE, Strike};

/// Strike nearest to `price`, lower strike on a tie.
///
/// Distances are measured against the unrounded price; only the strikes are
/// fixed-point. Prices outside the chain clamp to the nearest end. Returns
/// `None` only for an empty strike set.
pub fn closest_strike(strikes: &BTreeSet<Strike>, price: f64) -> Option<Strike> {
    // every strike <= floor is <= price, every strike above it is > price
    let floor = Strike((price * STRIKE_SCALE as f64).floor() as i64);
    let lo = strikes.range(..=floor).next_back().copied();
    let hi = strikes.range((Excluded(floor), Unbounded)).next().copied();

    match (lo, hi) {
        (Some(lo), _) if lo.as_f64() == price => Some(lo),
        (Some(lo), None) => Some(lo),
        (None, hi) => hi,
        (Some(lo), Some(hi)) => {
            if hi.as_f64() - price < price - lo.as_f64() {
                Some(hi)
            } else {
                Some(lo)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(px: &[f64]) -> BTreeSet<Strike> {
        px.iter().map(|p| Strike::from_f64(*p)).collect()
    }

    fn closest(strikes: &[f64], price: f64) -> f64 {
        closest_strike(&set(strikes), price)
            .unwrap()
            .as_f64()
    }

    #[test]
    fn tie_goes_to_lower_strike() {
        assert_eq!(closest(&[100.0, 110.0], 105.0), 100.0);
    }

    #[test]
    fn exact_match() {
        assert_eq!(closest(&[100.0, 110.0], 100.0), 100.0);
        assert_eq!(closest(&[100.0, 110.0], 110.0), 110.0);
    }

    #[test]
    fn clamps_outside_range() {
        assert_eq!(closest(&[100.0, 110.0], 50.0), 100.0);
        assert_eq!(closest(&[100.0, 110.0], 500.0), 110.0);
    }

    #[test]
    fn nearer_side_wins() {
        assert_eq!(closest(&[100.0, 110.0], 105.01), 110.0);
        assert_eq!(closest(&[100.0, 110.0], 104.99), 100.0);
        assert_eq!(closest(&[4990.0, 4995.0, 5000.0, 5005.0], 5003.25), 5005.0);
    }

    /// The price is not rounded to strike precision before comparing.
    #[test]
    fn sub_cent_distance_decides() {
        assert_eq!(closest(&[100.0, 110.0], 105.004), 110.0);
        assert_eq!(closest(&[100.0, 110.0], 104.996), 100.0);
        assert_eq!(closest(&[100.0, 100.5], 100.005), 100.0);
    }

    #[test]
    fn single_and_empty() {
        assert_eq!(closest(&[100.0], 1.0), 100.0);
        assert_eq!(closest_strike(&BTreeSet::new(), 1.0), None);
    }
}

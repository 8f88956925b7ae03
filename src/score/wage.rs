//! Wage percentile normalization against a comparison pool.

/// Linear-interpolated percentile (the R-7 method) over an ascending slice.
/// `p` is in percent (25.0, 75.0, ...). Empty input yields 0.0.
pub fn percentile(sorted_vals: &[f64], p: f64) -> f64 {
    if sorted_vals.is_empty() {
        return 0.0;
    }
    let k = (sorted_vals.len() - 1) as f64 * (p / 100.0);
    let f = k.floor() as usize;
    let c = k.ceil() as usize;
    if f == c {
        return sorted_vals[f];
    }
    sorted_vals[f] * (c as f64 - k) + sorted_vals[c] * (k - f as f64)
}

/// Normalize a wage to its position inside the pool's p25..p75 band,
/// clamped to [0, 1] and rounded to 2 decimals.
///
/// Empty pool -> 0.0. Degenerate pool (p75 <= p25, e.g. uniform wages) ->
/// neutral 0.5. The caller picks the pool (same-region wages, falling back
/// to the full candidate set when the region has fewer than 4 entries).
pub fn pay_norm(wages: &[f64], wage: f64) -> f64 {
    if wages.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = wages.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let p25 = percentile(&sorted, 25.0);
    let p75 = percentile(&sorted, 75.0);
    if p75 <= p25 {
        return 0.5;
    }
    let norm = (wage - p25) / (p75 - p25);
    super::round2(norm.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let v = [10.0, 20.0, 30.0, 40.0];
        assert!((percentile(&v, 25.0) - 17.5).abs() < 1e-9);
        assert!((percentile(&v, 75.0) - 32.5).abs() < 1e-9);
        assert!((percentile(&v, 50.0) - 25.0).abs() < 1e-9);
        assert_eq!(percentile(&v, 0.0), 10.0);
        assert_eq!(percentile(&v, 100.0), 40.0);
    }

    #[test]
    fn pay_norm_matches_linear_interpolation() {
        // (20 - 17.5) / (32.5 - 17.5) = 0.1667 -> 0.17
        assert_eq!(pay_norm(&[10.0, 20.0, 30.0, 40.0], 20.0), 0.17);
    }

    #[test]
    fn pay_norm_clamps_outliers() {
        let pool = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(pay_norm(&pool, 5.0), 0.0);
        assert_eq!(pay_norm(&pool, 100.0), 1.0);
    }

    #[test]
    fn degenerate_pool_is_neutral() {
        assert_eq!(pay_norm(&[12.0, 12.0, 12.0, 12.0], 12.0), 0.5);
        assert_eq!(pay_norm(&[9.0], 15.0), 0.5);
    }

    #[test]
    fn empty_pool_is_zero() {
        assert_eq!(pay_norm(&[], 15.0), 0.0);
    }

    #[test]
    fn unsorted_pool_is_tolerated() {
        assert_eq!(pay_norm(&[40.0, 10.0, 30.0, 20.0], 20.0), 0.17);
    }
}

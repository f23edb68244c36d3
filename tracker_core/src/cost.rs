//! Cost function and block helpers shared by both cost-matrix builders.
//!
//! # Linking cost
//! For two spots `a`, `b` with squared distance `d²`:
//! - `d² > max_distance²` → blocking value;
//! - otherwise `P = 1 + Σ wₖ · 1.5 · |fa − fb| / (fa + fb)` over the penalised
//!   features present on both spots (NaN contributions skipped), and the cost
//!   is `d² · P²`.
//!
//! A feature mismatch therefore compounds the distance quadratically: with a
//! weight of 1, two spots whose feature differs by a factor of two look twice
//! as far apart.
//!
//! # Square LAP layout
//! Both stages solve a matrix of the form
//! ```text
//! [ costs (r×c)        | alternative diag (r×r) ]
//! [ alternative (c×c)  | filler (c×r)           ]
//! ```
//! where `filler` is `costsᵀ` with every non-blocked value replaced by the
//! alternative cost.

use crate::settings::FeaturePenalties;
use crate::types::{CostMatrix, Spot};
use nalgebra::DMatrix;

/// Cutoff used when a block holds no usable cost at all.
pub const FALLBACK_CUTOFF: f64 = 10.0;

/// Cost of linking `s0` to `s1` under a distance cutoff and feature penalties.
pub fn linking_cost(
    s0: &Spot,
    s1: &Spot,
    max_distance: f64,
    blocking_value: f64,
    penalties: &FeaturePenalties,
) -> f64 {
    let d2 = s0.square_distance_to(s1);
    if d2 > max_distance * max_distance {
        return blocking_value;
    }

    let mut penalty = 1.0;
    for (feature, weight) in penalties {
        let Some(ndiff) = s0.normalized_diff_to(s1, feature) else {
            continue;
        };
        if ndiff.is_nan() {
            continue;
        }
        penalty += weight * 1.5 * ndiff;
    }
    d2 * penalty * penalty
}

/// Percentile `p ∈ (0, 1]` with linear interpolation at position `p·(n+1)`.
///
/// A single value is returned as is; an empty slice gives NaN.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return values[0];
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = p * (n as f64 + 1.0);
    if pos < 1.0 {
        return sorted[0];
    }
    if pos >= n as f64 {
        return sorted[n - 1];
    }
    let fpos = pos.floor();
    let idx = fpos as usize;
    let lower = sorted[idx - 1];
    let upper = sorted[idx];
    lower + (pos - fpos) * (upper - lower)
}

/// Entries strictly below the blocking value.
pub fn unblocked_values(m: &CostMatrix, blocking_value: f64) -> Vec<f64> {
    m.iter().copied().filter(|&v| v < blocking_value).collect()
}

/// True if no entry of `m` is below the blocking value.
pub fn all_blocked(m: &CostMatrix, blocking_value: f64) -> bool {
    m.iter().all(|&v| !(v < blocking_value))
}

/// `factor ×` the percentile of the non-blocked entries of `m`.
///
/// When `m` holds no usable entry the percentile is replaced by
/// [`FALLBACK_CUTOFF`].
pub fn alternative_cost(m: &CostMatrix, blocking_value: f64, percentile_p: f64, factor: f64) -> f64 {
    let values = unblocked_values(m, blocking_value);
    let mut cutoff = percentile(&values, percentile_p);
    if !(cutoff < blocking_value) {
        cutoff = FALLBACK_CUTOFF;
    }
    factor * cutoff
}

/// n×n block with `alternative` on the diagonal and blocking elsewhere.
pub fn alternative_block(n: usize, alternative: f64, blocking_value: f64) -> CostMatrix {
    let mut m = DMatrix::from_element(n, n, blocking_value);
    m.fill_diagonal(alternative);
    m
}

/// Transpose of `top_left` with every non-blocked value set to `alternative`.
pub fn lower_right_block(top_left: &CostMatrix, alternative: f64, blocking_value: f64) -> CostMatrix {
    top_left
        .transpose()
        .map(|v| if v < blocking_value { alternative } else { blocking_value })
}

/// Assemble the full square LAP matrix around a `top_left` block.
pub fn assemble(top_left: &CostMatrix, alternative: f64, blocking_value: f64) -> CostMatrix {
    let (rows, cols) = top_left.shape();
    let size = rows + cols;
    let mut full = DMatrix::from_element(size, size, blocking_value);

    full.view_mut((0, 0), (rows, cols)).copy_from(top_left);
    full.view_mut((0, cols), (rows, rows))
        .copy_from(&alternative_block(rows, alternative, blocking_value));
    full.view_mut((rows, 0), (cols, cols))
        .copy_from(&alternative_block(cols, alternative, blocking_value));
    full.view_mut((rows, cols), (cols, rows))
        .copy_from(&lower_right_block(top_left, alternative, blocking_value));
    full
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_without_penalty_is_squared_distance() {
        let a = Spot::new(0, 0, vec![0.0, 0.0]);
        let b = Spot::new(1, 1, vec![1.0, 0.0]);
        let c = linking_cost(&a, &b, 5.0, f64::INFINITY, &FeaturePenalties::new());
        assert_eq!(c, 1.0);
    }

    #[test]
    fn cost_beyond_cutoff_is_blocked() {
        let a = Spot::new(0, 0, vec![0.0, 0.0]);
        let b = Spot::new(1, 1, vec![100.0, 0.0]);
        let c = linking_cost(&a, &b, 5.0, f64::INFINITY, &FeaturePenalties::new());
        assert_eq!(c, f64::INFINITY);
    }

    #[test]
    fn feature_penalty_compounds_distance() {
        // |2-1|/(2+1) = 1/3 → P = 1 + 1 × 1.5 / 3 = 1.5 → cost = 4 × 2.25
        let a = Spot::new(0, 0, vec![0.0, 0.0]).with_feature("MEAN_INTENSITY", 2.0);
        let b = Spot::new(1, 1, vec![2.0, 0.0]).with_feature("MEAN_INTENSITY", 1.0);
        let mut penalties = FeaturePenalties::new();
        penalties.insert("MEAN_INTENSITY".into(), 1.0);
        penalties.insert("RADIUS".into(), 1.0);
        let c = linking_cost(&a, &b, 5.0, f64::INFINITY, &penalties);
        assert!((c - 9.0).abs() < 1e-12, "got {c}");
    }

    #[test]
    fn nan_feature_difference_ignored() {
        let a = Spot::new(0, 0, vec![0.0]).with_feature("Q", 0.0);
        let b = Spot::new(1, 1, vec![2.0]).with_feature("Q", 0.0);
        let mut penalties = FeaturePenalties::new();
        penalties.insert("Q".into(), 3.0);
        assert_eq!(linking_cost(&a, &b, 5.0, f64::INFINITY, &penalties), 4.0);
    }

    #[test]
    fn percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        // pos = 0.5 × 5 = 2.5 → between sorted[1]=2 and sorted[2]=3
        assert!((percentile(&v, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&v, 0.9), 4.0);
        assert_eq!(percentile(&v, 0.1), 1.0);
        assert_eq!(percentile(&[7.0], 0.9), 7.0);
        assert!(percentile(&[], 0.9).is_nan());
    }

    #[test]
    fn alternative_cost_falls_back_when_everything_blocked() {
        let m = DMatrix::from_element(2, 2, f64::INFINITY);
        assert!(all_blocked(&m, f64::INFINITY));
        let alt = alternative_cost(&m, f64::INFINITY, 0.9, 1.05);
        assert!((alt - 10.5).abs() < 1e-12);
    }

    #[test]
    fn assembled_matrix_layout() {
        let inf = f64::INFINITY;
        // 1 source × 2 targets, second target blocked.
        let top_left = DMatrix::from_row_slice(1, 2, &[1.0, inf]);
        let full = assemble(&top_left, 2.0, inf);
        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[
                1.0, inf, 2.0, //
                2.0, inf, 2.0, // initiator for target 0, filler for target 0
                inf, 2.0, inf, // initiator for target 1, filler blocked
            ],
        );
        assert_eq!(full, expected);
    }
}

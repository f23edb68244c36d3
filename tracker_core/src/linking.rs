//! Frame-to-frame linking cost matrix (stage 1).
//!
//! For `n0` spots in the source frame and `n1` in the target frame the matrix
//! is `(n0+n1)×(n0+n1)`:
//! - top-left `n0×n1`: linking costs;
//! - top-right `n0×n0`: "track terminates" alternative on the diagonal;
//! - bottom-left `n1×n1`: "track initiates" alternative on the diagonal;
//! - bottom-right `n1×n0`: transposed filler.

use crate::cost::{all_blocked, alternative_cost, assemble, linking_cost};
use crate::settings::TrackerSettings;
use crate::types::{CostMatrix, Spot};
use nalgebra::DMatrix;

/// Cost matrix for one frame pair, with the block sizes needed to read a solution.
#[derive(Clone, Debug)]
pub struct LinkingCostMatrix {
    pub costs: CostMatrix,
    pub n_sources: usize,
    pub n_targets: usize,
    /// Cost of "no link" for any spot of the pair
    pub alternative: f64,
    pub blocking_value: f64,
}

impl LinkingCostMatrix {
    /// Keep the solved pairs that fall in the top-left block, as
    /// `(source_idx, target_idx, cost)`. Blocked pairings are never links.
    pub fn links(&self, pairs: &[(usize, usize)]) -> Vec<(usize, usize, f64)> {
        pairs
            .iter()
            .filter(|&&(i, j)| i < self.n_sources && j < self.n_targets)
            .map(|&(i, j)| (i, j, self.costs[(i, j)]))
            .filter(|&(_, _, cost)| cost < self.blocking_value)
            .collect()
    }
}

/// Linking cost block `t0 × t1` alone.
pub fn linking_cost_block(t0: &[Spot], t1: &[Spot], settings: &TrackerSettings) -> CostMatrix {
    let max_distance = settings.linking.max_distance;
    let blocking = settings.blocking_value;
    let penalties = &settings.linking.feature_penalties;
    DMatrix::from_fn(t0.len(), t1.len(), |i, j| {
        linking_cost(&t0[i], &t1[j], max_distance, blocking, penalties)
    })
}

/// Build the stage-1 matrix for one frame pair.
///
/// Returns `None` when there is nothing to solve: one of the frames is empty
/// or no spot pair is within the linking distance.
pub fn linking_cost_matrix(
    t0: &[Spot],
    t1: &[Spot],
    settings: &TrackerSettings,
) -> Option<LinkingCostMatrix> {
    if t0.is_empty() || t1.is_empty() {
        return None;
    }
    let blocking = settings.blocking_value;
    let top_left = linking_cost_block(t0, t1, settings);
    if all_blocked(&top_left, blocking) {
        return None;
    }

    let alternative = alternative_cost(
        &top_left,
        blocking,
        settings.cutoff_percentile,
        settings.alternative_linking_cost_factor,
    );
    Some(LinkingCostMatrix {
        costs: assemble(&top_left, alternative, blocking),
        n_sources: t0.len(),
        n_targets: t1.len(),
        alternative,
        blocking_value: blocking,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

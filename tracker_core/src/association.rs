//! Assignment solvers for square LAP cost matrices.
//!
//! # Contract
//! Given an n×n cost matrix, return one `(row, col)` pair per row forming a
//! perfect matching of minimal total cost. Blocked pairings show up as
//! `+∞` and are only used when no other perfect matching exists. Matrices
//! built with a finite blocking sentinel go through [`solve_blocked`], which
//! turns the sentinel into `+∞` first.
//!
//! Two implementations are provided and picked through [`SolverKind`]:
//! - [`HungarianSolver`]: O(n³) shortest augmenting path with row/column
//!   potentials, on `f64` costs.
//! - [`MunkresKuhnSolver`]: the `pathfinding` Kuhn-Munkres on costs rescaled to
//!   `i64`. Near-ties closer than the rescaling step may resolve differently.

use crate::error::SolverError;
use crate::types::CostMatrix;
use pathfinding::prelude::{kuhn_munkres_min, Matrix};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Solves a square linear assignment problem.
pub trait AssignmentSolver: Send + Sync {
    /// Optimal perfect matching: `(row, col)` pairs, one per row, sorted by row.
    fn solve(&self, costs: &CostMatrix) -> Result<Vec<(usize, usize)>, SolverError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Configuration-level solver selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    #[default]
    Hungarian,
    MunkresKuhn,
}

impl SolverKind {
    pub fn build(self) -> Arc<dyn AssignmentSolver> {
        match self {
            SolverKind::Hungarian => Arc::new(HungarianSolver),
            SolverKind::MunkresKuhn => Arc::new(MunkresKuhnSolver),
        }
    }
}

/// Sum of the costs picked by an assignment.
pub fn assignment_cost(costs: &CostMatrix, pairs: &[(usize, usize)]) -> f64 {
    pairs.iter().map(|&(r, c)| costs[(r, c)]).sum()
}

// ---------------------------------------------------------------------------
// Input checks shared by both solvers
// ---------------------------------------------------------------------------

/// Finite range of a cost matrix, and whether it holds any `+∞` entry.
#[derive(Clone, Copy, Debug, Default)]
struct CostRange {
    finite: Option<(f64, f64)>,
    has_infinite: bool,
}

/// Rejects non-square matrices, NaN and -∞; returns the finite range of the
/// matrix.
fn check_costs(costs: &CostMatrix) -> Result<CostRange, SolverError> {
    let (rows, cols) = costs.shape();
    if rows != cols {
        return Err(SolverError::NotSquare { rows, cols });
    }
    let mut range = CostRange::default();
    for row in 0..rows {
        for col in 0..cols {
            let c = costs[(row, col)];
            if c.is_nan() {
                return Err(SolverError::NotANumber { row, col });
            }
            if c == f64::NEG_INFINITY {
                return Err(SolverError::NegativeInfinity { row, col });
            }
            if c.is_finite() {
                range.finite = Some(match range.finite {
                    Some((lo, hi)) => (lo.min(c), hi.max(c)),
                    None => (c, c),
                });
            } else {
                range.has_infinite = true;
            }
        }
    }
    Ok(range)
}

/// Finite stand-in for `+∞` entries: larger than the cost of any matching that
/// avoids them, so an infinite entry is only used when nothing else is possible.
fn infinity_surrogate(n: usize, range: Option<(f64, f64)>) -> Result<f64, SolverError> {
    let (lo, hi) = range.unwrap_or((0.0, 0.0));
    let span = hi.abs().max(lo.abs()) + 1.0;
    let big = span * 2.0 * (n as f64 + 1.0);
    if big.is_finite() {
        Ok(big)
    } else {
        Err(SolverError::Overflow { size: n })
    }
}

/// Copy of `costs` where every entry at or above `blocking_value` is `+∞`.
///
/// A finite blocking sentinel then never enters a solver's cost range.
pub fn mask_blocked(costs: &CostMatrix, blocking_value: f64) -> CostMatrix {
    costs.map(|v| if v >= blocking_value { f64::INFINITY } else { v })
}

/// Solve a LAP matrix built with `blocking_value` as its blocked marker.
pub fn solve_blocked(
    solver: &dyn AssignmentSolver,
    costs: &CostMatrix,
    blocking_value: f64,
) -> Result<Vec<(usize, usize)>, SolverError> {
    if blocking_value.is_finite() {
        solver.solve(&mask_blocked(costs, blocking_value))
    } else {
        solver.solve(costs)
    }
}

// ---------------------------------------------------------------------------
// Hungarian algorithm - O(n³) Kuhn-Munkres with potentials
// ---------------------------------------------------------------------------

/// O(n³) Hungarian solver on `f64` costs.
#[derive(Clone, Copy, Debug, Default)]
pub struct HungarianSolver;

impl AssignmentSolver for HungarianSolver {
    fn solve(&self, costs: &CostMatrix) -> Result<Vec<(usize, usize)>, SolverError> {
        let n = costs.nrows();
        let range = check_costs(costs)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let big = if range.has_infinite {
            infinity_surrogate(n, range.finite)?
        } else {
            f64::INFINITY
        };
        let cost = |r: usize, c: usize| {
            let v = costs[(r, c)];
            if v.is_finite() {
                v
            } else {
                big
            }
        };

        let row_assign = run_hungarian(n, cost);
        let pairs: Vec<(usize, usize)> = row_assign.into_iter().enumerate().collect();
        check_permutation(&pairs, n)?;
        Ok(pairs)
    }

    fn name(&self) -> &'static str {
        "Hungarian"
    }
}

/// Core Hungarian algorithm on a square n×n cost function.
/// Returns row_assignment[row] = assigned_column.
fn run_hungarian(n: usize, cost: impl Fn(usize, usize) -> f64) -> Vec<usize> {
    // Potentials for rows (u) and columns (v)
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    // p[j] = row assigned to column j (1-indexed, 0 = none)
    let mut p = vec![0usize; n + 1];
    // way[j] = previous column in augmenting path
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if !used[j] {
                    let val = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if val < minv[j] {
                        minv[j] = val;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    // Decode: p[j] = row for column j (1-indexed)
    let mut row_assign = vec![0usize; n];
    for j in 1..=n {
        if p[j] != 0 {
            row_assign[p[j] - 1] = j - 1;
        }
    }
    row_assign
}

fn check_permutation(pairs: &[(usize, usize)], n: usize) -> Result<(), SolverError> {
    let mut seen = vec![false; n];
    let mut assigned = 0;
    for &(_, c) in pairs {
        if c < n && !seen[c] {
            seen[c] = true;
            assigned += 1;
        }
    }
    if assigned == n {
        Ok(())
    } else {
        Err(SolverError::Incomplete { assigned, size: n })
    }
}

// ---------------------------------------------------------------------------
// Kuhn-Munkres from `pathfinding`
// ---------------------------------------------------------------------------

/// Largest integer weight a finite cost is mapped to.
const MAX_SCALED_COST: i64 = 1 << 40;

/// Kuhn-Munkres solver from the `pathfinding` crate, on rescaled integer costs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MunkresKuhnSolver;

impl AssignmentSolver for MunkresKuhnSolver {
    fn solve(&self, costs: &CostMatrix) -> Result<Vec<(usize, usize)>, SolverError> {
        let n = costs.nrows();
        let range = check_costs(costs)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        // The total of a matching touching every blocked entry must stay in i64.
        let n1 = (n as i64).saturating_add(1);
        let budget = i64::MAX / 4 / n1.saturating_mul(n1).max(1);
        let scale_top = budget.min(MAX_SCALED_COST);
        if scale_top < 1 {
            return Err(SolverError::Overflow { size: n });
        }
        let blocked = (scale_top + 1) * 2 * n1;

        let (lo, hi) = range.finite.unwrap_or((0.0, 0.0));
        let span = hi - lo;
        if !span.is_finite() {
            return Err(SolverError::Overflow { size: n });
        }
        let mut weights = Matrix::new(n, n, 0i64);
        for r in 0..n {
            for c in 0..n {
                let v = costs[(r, c)];
                weights[(r, c)] = if !v.is_finite() {
                    blocked
                } else if span > 0.0 {
                    ((v - lo) / span * scale_top as f64).round() as i64
                } else {
                    0
                };
            }
        }

        let (_, row_assign) = kuhn_munkres_min(&weights);
        let pairs: Vec<(usize, usize)> = row_assign.into_iter().enumerate().collect();
        check_permutation(&pairs, n)?;
        Ok(pairs)
    }

    fn name(&self) -> &'static str {
        "Munkres-Kuhn"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn solvers() -> Vec<Arc<dyn AssignmentSolver>> {
        vec![SolverKind::Hungarian.build(), SolverKind::MunkresKuhn.build()]
    }

    #[test]
    fn hungarian_3x3_known() {
        // Cost matrix:
        // [4, 1, 3]
        // [2, 0, 5]
        // [3, 2, 2]
        // Optimal: row0→col1 (1), row1→col0 (2), row2→col2 (2) = 5
        let cost = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 3.0, 2.0, 0.0, 5.0, 3.0, 2.0, 2.0]);
        for solver in solvers() {
            let pairs = solver.solve(&cost).unwrap();
            let total = assignment_cost(&cost, &pairs);
            assert!(
                (total - 5.0).abs() < 1e-9,
                "{}: expected total cost 5, got {total}",
                solver.name()
            );
        }
    }

    #[test]
    fn infinite_entries_avoided_when_possible() {
        let inf = f64::INFINITY;
        // Only the anti-diagonal is finite.
        let cost = DMatrix::from_row_slice(3, 3, &[inf, inf, 7.0, inf, 1.0, inf, 2.0, inf, inf]);
        for solver in solvers() {
            let pairs = solver.solve(&cost).unwrap();
            assert_eq!(pairs, vec![(0, 2), (1, 1), (2, 0)], "{}", solver.name());
        }
    }

    #[test]
    fn lap_with_alternatives_prefers_cheap_link() {
        // Linking layout for one spot per frame: link cost 1, alternative 1.05.
        let cost = DMatrix::from_row_slice(2, 2, &[1.0, 1.05, 1.05, 1.05]);
        for solver in solvers() {
            assert_eq!(solver.solve(&cost).unwrap(), vec![(0, 0), (1, 1)]);
        }
    }

    #[test]
    fn rejects_bad_matrices() {
        let rect = DMatrix::from_element(2, 3, 1.0);
        let nan = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, 0.0, 1.0]);
        for solver in solvers() {
            assert_eq!(
                solver.solve(&rect),
                Err(SolverError::NotSquare { rows: 2, cols: 3 })
            );
            assert_eq!(
                solver.solve(&nan),
                Err(SolverError::NotANumber { row: 0, col: 1 })
            );
        }
    }

    #[test]
    fn empty_matrix_gives_empty_assignment() {
        let empty = DMatrix::<f64>::zeros(0, 0);
        for solver in solvers() {
            assert!(solver.solve(&empty).unwrap().is_empty());
        }
    }

    #[test]
    fn solvers_agree_on_random_like_matrix() {
        let n = 7;
        let cost = DMatrix::from_fn(n, n, |r, c| ((r * 31 + c * 17) % 11) as f64 + 0.5 * r as f64);
        let h = HungarianSolver.solve(&cost).unwrap();
        let m = MunkresKuhnSolver.solve(&cost).unwrap();
        assert!((assignment_cost(&cost, &h) - assignment_cost(&cost, &m)).abs() < 1e-9);
    }

    /// Two crossing pairs with `blocking` in the blocked cells.
    /// Optimum: 0→1, 1→0, 2→3, 3→2.
    fn crossing_pairs(blocking: f64) -> CostMatrix {
        let b = blocking;
        let alt = 110.0;
        DMatrix::from_row_slice(
            4,
            4,
            &[
                110.25, 0.25, alt, b, //
                0.25, 90.25, b, alt, //
                alt, b, 110.25, 0.25, //
                b, alt, 0.25, 90.25,
            ],
        )
    }

    #[test]
    fn finite_blocking_value_is_masked() {
        let masked = mask_blocked(&crossing_pairs(1e15), 1e15);
        assert_eq!(masked[(0, 3)], f64::INFINITY);
        assert_eq!(masked[(0, 1)], 0.25);
        assert_eq!(masked[(0, 2)], 110.0);
    }

    #[test]
    fn solvers_stay_optimal_with_a_finite_blocking_value() {
        for blocking in [1e15, 1e300, f64::MAX] {
            let cost = crossing_pairs(blocking);
            for solver in solvers() {
                let pairs = solve_blocked(solver.as_ref(), &cost, blocking).unwrap();
                assert_eq!(
                    pairs,
                    vec![(0, 1), (1, 0), (2, 3), (3, 2)],
                    "{} with blocking {blocking}",
                    solver.name()
                );
            }
        }
    }

    #[test]
    fn hungarian_without_infinite_entries_skips_the_surrogate() {
        // a surrogate built from these would overflow
        let big = f64::MAX / 4.0;
        let cost = DMatrix::from_row_slice(2, 2, &[big, 1.0, 2.0, big]);
        assert_eq!(HungarianSolver.solve(&cost).unwrap(), vec![(0, 1), (1, 0)]);
    }
}

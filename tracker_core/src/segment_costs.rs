//! Track-segment cost matrix (stage 2): gap closing, merging and splitting.
//!
//! With `S` segments, `M` merging candidates and `P` splitting candidates the
//! top-left block is `(S+P)×(S+M)`:
//! ```text
//!            S heads          M middle points
//! S tails  [ gap closing    | merging  ]
//! P middle [ splitting      | blocked  ]
//! ```
//! and is wrapped in the same alternative/filler layout as stage 1, for a
//! square matrix of size `2S+P+M`.
//!
//! Middle points are interior spots of a segment. A merge links a segment end
//! to a middle point one frame later, a split links a middle point to a
//! segment start one frame later. Candidates that cannot be reached by any
//! segment are dropped before assembly.

use crate::cost::{all_blocked, alternative_cost, assemble, linking_cost};
use crate::error::{Result, TrackerError};
use crate::segments::TrackSegment;
use crate::settings::TrackerSettings;
use crate::types::{CostMatrix, LinkKind, Spot, SpotId};
use nalgebra::DMatrix;
use tracing::debug;

/// One link read back from a solved stage-2 matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentLink {
    pub source: SpotId,
    pub target: SpotId,
    pub cost: f64,
    pub kind: LinkKind,
}

/// A middle point and the segment it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub segment: usize,
    pub spot: &'a Spot,
}

/// Stage-2 cost matrix plus what is needed to interpret its solution.
#[derive(Clone, Debug)]
pub struct SegmentCostMatrix<'a> {
    pub costs: CostMatrix,
    pub n_segments: usize,
    /// Columns `S..S+M` of the top-left block
    pub merging_points: Vec<Candidate<'a>>,
    /// Rows `S..S+P` of the top-left block
    pub splitting_points: Vec<Candidate<'a>>,
    pub alternative: f64,
    pub blocking_value: f64,
}

impl<'a> SegmentCostMatrix<'a> {
    /// Read the solved pairs back as gap-closing, merging or splitting links.
    ///
    /// Pairs outside the top-left block, and blocked pairings, give no link.
    pub fn interpret(
        &self,
        segments: &[TrackSegment<'a>],
        pairs: &[(usize, usize)],
    ) -> Vec<SegmentLink> {
        let s = self.n_segments;
        let m = self.merging_points.len();
        let p = self.splitting_points.len();

        let mut links = Vec::new();
        for &(row, col) in pairs {
            if row >= s + p || col >= s + m {
                continue;
            }
            let cost = self.costs[(row, col)];
            if !(cost < self.blocking_value) {
                continue;
            }
            let link = match (row < s, col < s) {
                (true, true) => SegmentLink {
                    source: segments[row].last().id,
                    target: segments[col].first().id,
                    cost,
                    kind: LinkKind::GapClosing,
                },
                (true, false) => SegmentLink {
                    source: segments[row].last().id,
                    target: self.merging_points[col - s].spot.id,
                    cost,
                    kind: LinkKind::Merging,
                },
                (false, true) => SegmentLink {
                    source: self.splitting_points[row - s].spot.id,
                    target: segments[col].first().id,
                    cost,
                    kind: LinkKind::Splitting,
                },
                (false, false) => continue,
            };
            links.push(link);
        }
        links
    }
}

/// Build the stage-2 matrix over `segments`.
///
/// Fails with [`TrackerError::NoTrackSegments`] when there is no segment and
/// with [`TrackerError::InconsistentCostMatrix`] when a segment is not
/// strictly ordered in time. Returns `Ok(None)` when every pairing is blocked.
pub fn segment_cost_matrix<'a>(
    segments: &[TrackSegment<'a>],
    settings: &TrackerSettings,
) -> Result<Option<SegmentCostMatrix<'a>>> {
    if segments.is_empty() {
        return Err(TrackerError::NoTrackSegments);
    }
    check_segments(segments)?;

    let blocking = settings.blocking_value;
    let gap_closing = gap_closing_block(segments, settings);

    let (merging_points, merging_block) = if settings.merging.allowed {
        merging_block(segments, settings)
    } else {
        (Vec::new(), DMatrix::from_element(segments.len(), 0, blocking))
    };
    let (splitting_points, splitting_block) = if settings.splitting.allowed {
        splitting_block(segments, settings)
    } else {
        (Vec::new(), DMatrix::from_element(0, segments.len(), blocking))
    };

    let s = segments.len();
    let m = merging_points.len();
    let p = splitting_points.len();
    let mut top_left = DMatrix::from_element(s + p, s + m, blocking);
    top_left.view_mut((0, 0), (s, s)).copy_from(&gap_closing);
    top_left.view_mut((0, s), (s, m)).copy_from(&merging_block);
    top_left.view_mut((s, 0), (p, s)).copy_from(&splitting_block);

    debug!(
        segments = s,
        merging_candidates = m,
        splitting_candidates = p,
        "stage-2 top-left block assembled"
    );

    if all_blocked(&top_left, blocking) {
        return Ok(None);
    }

    let alternative = alternative_cost(
        &top_left,
        blocking,
        settings.cutoff_percentile,
        settings.alternative_linking_cost_factor,
    );
    Ok(Some(SegmentCostMatrix {
        costs: assemble(&top_left, alternative, blocking),
        n_segments: s,
        merging_points,
        splitting_points,
        alternative,
        blocking_value: blocking,
    }))
}

fn check_segments(segments: &[TrackSegment<'_>]) -> Result<()> {
    for (index, segment) in segments.iter().enumerate() {
        let ordered = segment
            .spots()
            .windows(2)
            .all(|w| w[0].frame < w[1].frame);
        if !ordered {
            return Err(TrackerError::cost_matrix(format!(
                "segment {index} (starting at {}) holds two spots in the same frame",
                segment.first().id
            )));
        }
    }
    Ok(())
}

/// `S×S` block: end of segment i to start of segment j.
fn gap_closing_block(segments: &[TrackSegment<'_>], settings: &TrackerSettings) -> CostMatrix {
    let s = segments.len();
    let blocking = settings.blocking_value;
    let gc = &settings.gap_closing;
    if !gc.allowed {
        return DMatrix::from_element(s, s, blocking);
    }

    DMatrix::from_fn(s, s, |i, j| {
        if i == j {
            return blocking;
        }
        let end = segments[i].last();
        let start = segments[j].first();
        let gap = i64::from(start.frame) - i64::from(end.frame);
        if gap < 1 || gap > i64::from(gc.max_frame_gap) {
            return blocking;
        }
        linking_cost(end, start, gc.max_distance, blocking, &gc.feature_penalties)
    })
}

/// Interior spots of every segment, in segment order.
fn middle_points<'a>(segments: &[TrackSegment<'a>]) -> Vec<Candidate<'a>> {
    segments
        .iter()
        .enumerate()
        .flat_map(|(segment, track)| {
            track
                .interior()
                .iter()
                .map(move |&spot| Candidate { segment, spot })
        })
        .collect()
}

/// `S×M` block: end of segment i to a middle point one frame later, keeping
/// only the candidates reachable from at least one segment.
fn merging_block<'a>(
    segments: &[TrackSegment<'a>],
    settings: &TrackerSettings,
) -> (Vec<Candidate<'a>>, CostMatrix) {
    let blocking = settings.blocking_value;
    let ev = &settings.merging;

    let mut kept = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for candidate in middle_points(segments) {
        let column: Vec<f64> = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let end = segment.last();
                if i == candidate.segment || end.frame + 1 != candidate.spot.frame {
                    return blocking;
                }
                linking_cost(end, candidate.spot, ev.max_distance, blocking, &ev.feature_penalties)
            })
            .collect();
        if column.iter().any(|&c| c < blocking) {
            kept.push(candidate);
            columns.push(column);
        }
    }

    let block = DMatrix::from_fn(segments.len(), kept.len(), |i, c| columns[c][i]);
    (kept, block)
}

/// `P×S` block: a middle point to the start of segment j one frame later,
/// keeping only the candidates that reach at least one segment.
fn splitting_block<'a>(
    segments: &[TrackSegment<'a>],
    settings: &TrackerSettings,
) -> (Vec<Candidate<'a>>, CostMatrix) {
    let blocking = settings.blocking_value;
    let ev = &settings.splitting;

    let mut kept = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for candidate in middle_points(segments) {
        let row: Vec<f64> = segments
            .iter()
            .enumerate()
            .map(|(j, segment)| {
                let start = segment.first();
                if j == candidate.segment || candidate.spot.frame + 1 != start.frame {
                    return blocking;
                }
                linking_cost(candidate.spot, start, ev.max_distance, blocking, &ev.feature_penalties)
            })
            .collect();
        if row.iter().any(|&c| c < blocking) {
            kept.push(candidate);
            rows.push(row);
        }
    }

    let block = DMatrix::from_fn(kept.len(), segments.len(), |r, j| rows[r][j]);
    (kept, block)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

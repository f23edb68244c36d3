//! Fundamental types used across the entire workspace.

use crate::error::{Result, TrackerError};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::warn;

/// Dense cost matrix handed to the assignment solvers. Always square.
pub type CostMatrix = DMatrix<f64>;

/// Index of one time point in the sequence. Frames need not be contiguous.
pub type FrameIndex = u32;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SpotId(pub u64);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spot
// ---------------------------------------------------------------------------

/// A single detected point object at one time frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    /// Stable identifier, unique over the whole collection
    pub id: SpotId,
    /// Frame the spot was detected in
    pub frame: FrameIndex,
    /// Position, any dimensionality (all spots of a collection share it)
    pub position: Vec<f64>,
    /// Numeric features (intensity, radius, ...), only used for cost penalties
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

impl Spot {
    pub fn new(id: u64, frame: FrameIndex, position: impl Into<Vec<f64>>) -> Self {
        Self {
            id: SpotId(id),
            frame,
            position: position.into(),
            features: BTreeMap::new(),
        }
    }

    /// Builder-style feature setter.
    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    pub fn dim(&self) -> usize {
        self.position.len()
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    /// Squared euclidean distance between the two positions.
    pub fn square_distance_to(&self, other: &Spot) -> f64 {
        self.position
            .iter()
            .zip(&other.position)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// `|fa - fb| / (fa + fb)` for a feature present on both spots.
    ///
    /// Returns `None` when either spot lacks the feature. The value is NaN when
    /// both features are zero and is not symmetric for negative values; callers
    /// skip NaN contributions.
    pub fn normalized_diff_to(&self, other: &Spot, feature: &str) -> Option<f64> {
        let a = self.feature(feature)?;
        let b = other.feature(feature)?;
        Some((a - b).abs() / (a + b))
    }
}

// ---------------------------------------------------------------------------
// SpotCollection
// ---------------------------------------------------------------------------

/// Ordered mapping frame → spots detected in that frame.
///
/// A frame may be registered with no spot in it (imaged, nothing detected);
/// stage-1 linking pairs up consecutive *registered* frames, so such a frame
/// sits between its neighbours as a real gap.
#[derive(Clone, Debug, Default)]
pub struct SpotCollection {
    frames: BTreeMap<FrameIndex, Vec<Spot>>,
    ids: HashSet<SpotId>,
    dim: Option<usize>,
}

impl SpotCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a spot in its frame. Rejects duplicated ids and positions whose
    /// dimensionality differs from the spots already stored.
    pub fn add(&mut self, spot: Spot) -> Result<()> {
        if self.ids.contains(&spot.id) {
            return Err(TrackerError::DuplicateSpot(spot.id));
        }
        match self.dim {
            Some(expected) if expected != spot.dim() => {
                return Err(TrackerError::DimensionMismatch {
                    id: spot.id,
                    expected,
                    actual: spot.dim(),
                });
            }
            None => self.dim = Some(spot.dim()),
            _ => {}
        }
        self.ids.insert(spot.id);
        self.frames.entry(spot.frame).or_default().push(spot);
        Ok(())
    }

    /// Register a frame even if it holds no spot.
    pub fn ensure_frame(&mut self, frame: FrameIndex) {
        self.frames.entry(frame).or_default();
    }

    /// Registered frames, ascending.
    pub fn frames(&self) -> impl Iterator<Item = FrameIndex> + '_ {
        self.frames.keys().copied()
    }

    /// Spots of one frame (empty slice for an unknown frame).
    pub fn spots_in(&self, frame: FrameIndex) -> &[Spot] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All spots, frame order then insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Spot> + '_ {
        self.frames.values().flatten()
    }

    /// Total number of spots.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no frame holds any spot.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Dimensionality shared by all spots, `None` while empty.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Consecutive pairs of registered frames, ascending.
    pub fn frame_pairs(&self) -> Vec<(FrameIndex, FrameIndex)> {
        let frames: Vec<FrameIndex> = self.frames().collect();
        frames.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

impl FromIterator<Spot> for SpotCollection {
    /// Collects spots, logging and dropping the ones `add` rejects.
    /// Use [`SpotCollection::add`] directly to handle those errors.
    fn from_iter<I: IntoIterator<Item = Spot>>(iter: I) -> Self {
        let mut collection = SpotCollection::new();
        for spot in iter {
            let id = spot.id;
            if let Err(e) = collection.add(spot) {
                warn!(spot = %id, error = %e, "spot dropped from collection");
            }
        }
        collection
    }
}

// ---------------------------------------------------------------------------
// Link kinds
// ---------------------------------------------------------------------------

/// What kind of event an accepted link stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Stage 1: frame-to-frame link
    Linking,
    /// Stage 2: end of a segment to the start of another, across missed frames
    GapClosing,
    /// Stage 2: end of a segment into the middle of another
    Merging,
    /// Stage 2: middle of a segment to the start of another
    Splitting,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkKind::Linking => "linking",
            LinkKind::GapClosing => "gap-closing",
            LinkKind::Merging => "merging",
            LinkKind::Splitting => "splitting",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_distance_is_euclidean() {
        let a = Spot::new(0, 0, vec![0.0, 0.0, 0.0]);
        let b = Spot::new(1, 1, vec![1.0, 2.0, 2.0]);
        assert_eq!(a.square_distance_to(&b), 9.0);
    }

    #[test]
    fn normalized_diff_missing_and_zero() {
        let a = Spot::new(0, 0, vec![0.0]).with_feature("I", 3.0);
        let b = Spot::new(1, 1, vec![0.0]).with_feature("I", 1.0);
        assert_eq!(a.normalized_diff_to(&b, "I"), Some(0.5));
        assert_eq!(a.normalized_diff_to(&b, "RADIUS"), None);

        let z0 = Spot::new(2, 0, vec![0.0]).with_feature("I", 0.0);
        let z1 = Spot::new(3, 1, vec![0.0]).with_feature("I", 0.0);
        assert!(z0.normalized_diff_to(&z1, "I").unwrap().is_nan());
    }

    #[test]
    fn collection_rejects_duplicates_and_bad_dims() {
        let mut spots = SpotCollection::new();
        spots.add(Spot::new(0, 0, vec![0.0, 0.0])).unwrap();
        assert!(matches!(
            spots.add(Spot::new(0, 1, vec![1.0, 1.0])),
            Err(TrackerError::DuplicateSpot(SpotId(0)))
        ));
        assert!(matches!(
            spots.add(Spot::new(1, 1, vec![1.0])),
            Err(TrackerError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
        assert_eq!(spots.len(), 1);
    }

    #[test]
    fn collecting_keeps_the_first_of_conflicting_spots() {
        let spots: SpotCollection = [
            Spot::new(0, 0, vec![0.0, 0.0]),
            Spot::new(0, 1, vec![5.0, 5.0]),
            Spot::new(1, 1, vec![1.0]),
            Spot::new(2, 1, vec![1.0, 0.0]),
        ]
        .into_iter()
        .collect();

        assert_eq!(spots.len(), 2);
        assert_eq!(spots.spots_in(0)[0].position, vec![0.0, 0.0]);
        assert_eq!(spots.spots_in(1).iter().map(|s| s.id).collect::<Vec<_>>(), vec![SpotId(2)]);
    }

    #[test]
    fn frame_pairs_include_empty_registered_frames() {
        let mut spots = SpotCollection::new();
        spots.add(Spot::new(0, 5, vec![0.0])).unwrap();
        spots.add(Spot::new(1, 1, vec![0.0])).unwrap();
        spots.ensure_frame(3);
        assert_eq!(spots.frame_pairs(), vec![(1, 3), (3, 5)]);
        assert_eq!(spots.iter().map(|s| s.id.0).collect::<Vec<_>>(), vec![1, 0]);
        assert!(spots.spots_in(3).is_empty());
        assert!(!spots.is_empty());
    }
}

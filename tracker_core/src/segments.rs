//! Track segments: maximal chains of spots joined by frame-to-frame links.

use crate::error::{Result, TrackerError};
use crate::graph::ResultGraph;
use crate::types::{FrameIndex, Spot, SpotCollection, SpotId};
use std::collections::HashMap;

/// Frame-ordered spots of one connected component of the stage-1 graph.
///
/// Never empty: a spot without any stage-1 link forms a one-spot segment.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackSegment<'a> {
    spots: Vec<&'a Spot>,
}

impl<'a> TrackSegment<'a> {
    /// Build a segment from its spots in any order. `None` if `spots` is empty.
    pub fn new(mut spots: Vec<&'a Spot>) -> Option<Self> {
        if spots.is_empty() {
            return None;
        }
        spots.sort_by_key(|s| (s.frame, s.id));
        Some(Self { spots })
    }

    pub fn first(&self) -> &'a Spot {
        self.spots[0]
    }

    pub fn last(&self) -> &'a Spot {
        self.spots[self.spots.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    /// A segment holds at least one spot, so this is always false.
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn spots(&self) -> &[&'a Spot] {
        &self.spots
    }

    /// Spots with both a predecessor and a successor in the segment.
    pub fn interior(&self) -> &[&'a Spot] {
        if self.spots.len() < 3 {
            return &[];
        }
        &self.spots[1..self.spots.len() - 1]
    }

    pub fn start_frame(&self) -> FrameIndex {
        self.first().frame
    }

    pub fn end_frame(&self) -> FrameIndex {
        self.last().frame
    }

    pub fn contains(&self, id: SpotId) -> bool {
        self.spots.iter().any(|s| s.id == id)
    }
}

/// Split the graph into segments, one per connected component.
///
/// Segment order follows the first spot of each component in collection
/// order, so the result depends only on connectivity.
pub fn compile_track_segments<'a>(
    graph: &ResultGraph,
    spots: &'a SpotCollection,
) -> Result<Vec<TrackSegment<'a>>> {
    let by_id: HashMap<SpotId, &'a Spot> = spots.iter().map(|s| (s.id, s)).collect();

    let mut segments = Vec::new();
    for component in graph.connected_components() {
        let members = component
            .into_iter()
            .map(|id| by_id.get(&id).copied().ok_or(TrackerError::UnknownVertex(id)))
            .collect::<Result<Vec<&Spot>>>()?;
        if let Some(segment) = TrackSegment::new(members) {
            segments.push(segment);
        }
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

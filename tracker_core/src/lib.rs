//! `tracker_core` - Two-stage LAP (linear assignment problem) particle tracking.
//!
//! Spots detected frame by frame are linked into tracks in two solves:
//! frame-to-frame linking between consecutive frames, then gap closing,
//! merging and splitting over the resulting track segments.
//!
//! # Module layout
//! - [`types`]         - Spot, SpotCollection, identifiers, link kinds
//! - [`error`]         - TrackerError / SolverError
//! - [`settings`]      - Typed tracker settings, defaults, validation
//! - [`cost`]          - Linking cost, percentile, square LAP layout
//! - [`association`]   - Assignment solvers (Hungarian, Munkres-Kuhn)
//! - [`linking`]       - Stage-1 frame-pair cost matrix
//! - [`graph`]         - Result graph and connected components
//! - [`segments`]      - Track segment compilation
//! - [`segment_costs`] - Stage-2 segment cost matrix
//! - [`tracker`]       - Orchestrator running both stages
//! - [`progress`]      - Progress listeners
//! - [`metrics`]       - Link precision/recall against true links

pub mod association;
pub mod cost;
pub mod error;
pub mod graph;
pub mod linking;
pub mod metrics;
pub mod progress;
pub mod segment_costs;
pub mod segments;
pub mod settings;
pub mod tracker;
pub mod types;

pub use association::{solve_blocked, AssignmentSolver, HungarianSolver, MunkresKuhnSolver, SolverKind};
pub use error::{Result, SolverError, TrackerError};
pub use graph::{Edge, ResultGraph};
pub use metrics::LinkMetrics;
pub use progress::{ProgressListener, SilentProgress, TracingProgress};
pub use segments::TrackSegment;
pub use settings::TrackerSettings;
pub use tracker::{LapTracker, TrackerStats};
pub use types::{FrameIndex, LinkKind, Spot, SpotCollection, SpotId};

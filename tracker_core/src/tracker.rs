//! LAP tracker orchestrator: the full two-stage tracking run.
//!
//! # Processing steps
//! 1. Check settings and input
//! 2. Reset the result graph (one vertex per spot, no edge)
//! 3. Frame-to-frame linking over every pair of consecutive frames (parallel)
//! 4. Compile track segments from the stage-1 graph
//! 5. Gap closing, merging and splitting over the segments (single solve)
//!
//! Failures local to one frame pair are logged and cost that pair its links.
//! A failed stage 5 is logged and leaves the stage-1 result in place.

use crate::{
    association::{solve_blocked, AssignmentSolver},
    error::{Result, SolverError, TrackerError},
    graph::ResultGraph,
    linking::linking_cost_matrix,
    progress::{ProgressListener, TracingProgress},
    segment_costs::segment_cost_matrix,
    segments::{compile_track_segments, TrackSegment},
    settings::TrackerSettings,
    types::{LinkKind, Spot, SpotCollection, SpotId},
};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters and timings of the last run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackerStats {
    /// Consecutive frame pairs considered in stage 1
    pub frame_pairs: usize,
    pub frame_pairs_solved: usize,
    /// Pairs with an empty frame or a fully blocked matrix
    pub frame_pairs_skipped: usize,
    /// Pairs whose solve failed; they contribute no edge
    pub frame_pairs_failed: usize,
    pub linking_edges: usize,
    pub gap_closing_edges: usize,
    pub merging_edges: usize,
    pub splitting_edges: usize,
    /// Links the result graph refused
    pub dropped_edges: usize,
    pub segments: usize,
    pub merging_candidates: usize,
    pub splitting_candidates: usize,
    /// Side of the stage-2 matrix, 0 when stage 2 did not solve anything
    pub segment_matrix_size: usize,
    /// Stage 2 failed and the stage-1 result was kept
    pub segment_linking_abandoned: bool,
    /// Timings in microseconds
    pub timing_linking_us: u64,
    pub timing_segments_us: u64,
    pub timing_segment_linking_us: u64,
    pub total_time_us: u64,
}

/// Outcome of one stage-1 frame pair.
enum PairOutcome {
    Linked(Vec<(SpotId, SpotId, f64)>),
    Skipped,
    Failed(SolverError),
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Two-stage LAP tracker over a borrowed spot collection.
pub struct LapTracker<'a> {
    spots: &'a SpotCollection,
    settings: TrackerSettings,
    solver: Arc<dyn AssignmentSolver>,
    progress: Arc<dyn ProgressListener>,
    num_threads: usize,
    graph: ResultGraph,
    segments: Vec<TrackSegment<'a>>,
    stats: TrackerStats,
}

impl<'a> LapTracker<'a> {
    /// Tracker using the solver named in `settings`, one worker per core and
    /// debug-level progress logs.
    pub fn new(spots: &'a SpotCollection, settings: TrackerSettings) -> Self {
        let solver = settings.solver.build();
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            spots,
            settings,
            solver,
            progress: Arc::new(TracingProgress),
            num_threads,
            graph: ResultGraph::default(),
            segments: Vec::new(),
            stats: TrackerStats::default(),
        }
    }

    /// Replace the assignment solver used by both stages.
    pub fn with_solver(mut self, solver: Arc<dyn AssignmentSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Number of stage-1 worker threads (at least one).
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Graph of the last run: every spot, plus the accepted links.
    pub fn result(&self) -> &ResultGraph {
        &self.graph
    }

    /// Segments compiled from the stage-1 graph of the last run.
    pub fn track_segments(&self) -> &[TrackSegment<'a>] {
        &self.segments
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// Reject invalid settings and an empty collection before any work.
    pub fn check_input(&self) -> Result<()> {
        self.settings.validate()?;
        if self.spots.is_empty() {
            return Err(TrackerError::EmptyInput);
        }
        Ok(())
    }

    /// Fresh graph with one vertex per spot and no edge.
    pub fn reset(&mut self) {
        self.graph = ResultGraph::new(self.spots.iter().map(|s| s.id));
        self.segments.clear();
        self.stats = TrackerStats::default();
    }

    /// Run every step. Fails only on invalid settings or input.
    pub fn process(&mut self) -> Result<()> {
        let start_total = Instant::now();

        // ----------------------------------------------------------------
        // Step 1-2: Input checks, fresh graph
        // ----------------------------------------------------------------
        self.check_input()?;
        info!(
            spots = self.spots.len(),
            frames = self.spots.n_frames(),
            solver = self.solver.name(),
            "starting LAP tracking with settings:\n{}",
            self.settings
        );
        self.reset();
        self.progress.set_progress(0.0);

        // ----------------------------------------------------------------
        // Step 3: Frame-to-frame linking
        // ----------------------------------------------------------------
        self.progress.set_status("Frame to frame linking...");
        self.link_frame_pairs()?;

        // ----------------------------------------------------------------
        // Step 4: Track segments
        // ----------------------------------------------------------------
        self.compile_track_segments()?;

        if !self.settings.links_segments() {
            self.finish(start_total);
            return Ok(());
        }

        // ----------------------------------------------------------------
        // Step 5: Gap closing, merging, splitting
        // ----------------------------------------------------------------
        self.progress.set_status("Linking track segments...");
        self.progress.set_progress(0.75);
        match self.link_track_segments() {
            Ok(()) => {}
            Err(TrackerError::NoTrackSegments) => {
                info!("no track segment to link, keeping frame-to-frame links only");
            }
            Err(e) => {
                error!(error = %e, "segment linking failed, keeping frame-to-frame links only");
                self.stats.segment_linking_abandoned = true;
            }
        }

        self.finish(start_total);
        Ok(())
    }

    fn finish(&mut self, start_total: Instant) {
        self.stats.total_time_us = start_total.elapsed().as_micros() as u64;
        self.progress.set_progress(1.0);
        self.progress.set_status("Tracking done.");
        info!(
            edges = self.graph.edge_count(),
            linking = self.stats.linking_edges,
            gap_closing = self.stats.gap_closing_edges,
            merging = self.stats.merging_edges,
            splitting = self.stats.splitting_edges,
            segments = self.stats.segments,
            total_us = self.stats.total_time_us,
            "LAP tracking done"
        );
    }

    /// Stage 1: solve every consecutive frame pair on the worker pool and add
    /// the resulting links to the graph.
    ///
    /// Workers only build and solve; edges are inserted afterwards in frame
    /// order by this thread, so the graph never needs a lock.
    pub fn link_frame_pairs(&mut self) -> Result<()> {
        let t0 = Instant::now();
        let pairs = self.spots.frame_pairs();
        self.stats.frame_pairs = pairs.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("lap-linker-{i}"))
            .build()
            .map_err(|e| TrackerError::ThreadPool(e.to_string()))?;

        let spots = self.spots;
        let settings = &self.settings;
        let solver = self.solver.as_ref();
        let progress = self.progress.as_ref();
        let done = AtomicUsize::new(0);
        let total = pairs.len().max(1);

        let outcomes: Vec<PairOutcome> = pool.install(|| {
            pairs
                .par_iter()
                .map(|&(f0, f1)| {
                    let outcome = link_pair(spots.spots_in(f0), spots.spots_in(f1), settings, solver);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.set_progress(0.5 * n as f64 / total as f64);
                    outcome
                })
                .collect()
        });

        for (&(f0, f1), outcome) in pairs.iter().zip(outcomes) {
            match outcome {
                PairOutcome::Linked(links) => {
                    self.stats.frame_pairs_solved += 1;
                    debug!(from = f0, to = f1, links = links.len(), "frame pair linked");
                    for (source, target, cost) in links {
                        self.insert_edge(source, target, cost, LinkKind::Linking);
                    }
                }
                PairOutcome::Skipped => {
                    self.stats.frame_pairs_skipped += 1;
                    debug!(from = f0, to = f1, "frame pair has nothing to link");
                }
                PairOutcome::Failed(e) => {
                    self.stats.frame_pairs_failed += 1;
                    warn!(from = f0, to = f1, error = %e, "frame pair dropped");
                }
            }
        }

        self.stats.timing_linking_us = t0.elapsed().as_micros() as u64;
        info!(
            pairs = self.stats.frame_pairs,
            solved = self.stats.frame_pairs_solved,
            skipped = self.stats.frame_pairs_skipped,
            failed = self.stats.frame_pairs_failed,
            edges = self.stats.linking_edges,
            us = self.stats.timing_linking_us,
            "frame-to-frame linking done"
        );
        Ok(())
    }

    /// Split the current graph into track segments.
    pub fn compile_track_segments(&mut self) -> Result<()> {
        let t0 = Instant::now();
        self.segments = compile_track_segments(&self.graph, self.spots)?;
        self.stats.segments = self.segments.len();
        self.stats.timing_segments_us = t0.elapsed().as_micros() as u64;
        info!(segments = self.stats.segments, "track segments compiled");
        Ok(())
    }

    /// Stage 2: one solve over the segments, adding gap-closing, merging and
    /// splitting links to the graph.
    ///
    /// Errors leave the graph untouched.
    pub fn link_track_segments(&mut self) -> Result<()> {
        let t0 = Instant::now();
        if !self.settings.links_segments() {
            return Ok(());
        }

        let Some(matrix) = segment_cost_matrix(&self.segments, &self.settings)? else {
            info!("every segment pairing is blocked, nothing to close");
            self.stats.timing_segment_linking_us = t0.elapsed().as_micros() as u64;
            return Ok(());
        };
        self.stats.merging_candidates = matrix.merging_points.len();
        self.stats.splitting_candidates = matrix.splitting_points.len();
        debug!(
            size = matrix.costs.nrows(),
            alternative = matrix.alternative,
            "solving segment cost matrix"
        );

        let pairs = solve_blocked(self.solver.as_ref(), &matrix.costs, matrix.blocking_value)?;
        self.stats.segment_matrix_size = matrix.costs.nrows();

        let links = matrix.interpret(&self.segments, &pairs);
        for link in links {
            self.insert_edge(link.source, link.target, link.cost, link.kind);
        }

        self.stats.timing_segment_linking_us = t0.elapsed().as_micros() as u64;
        info!(
            gap_closing = self.stats.gap_closing_edges,
            merging = self.stats.merging_edges,
            splitting = self.stats.splitting_edges,
            us = self.stats.timing_segment_linking_us,
            "segment linking done"
        );
        Ok(())
    }

    fn insert_edge(&mut self, source: SpotId, target: SpotId, cost: f64, kind: LinkKind) {
        match self.graph.add_edge(source, target, cost, kind) {
            Ok(()) => match kind {
                LinkKind::Linking => self.stats.linking_edges += 1,
                LinkKind::GapClosing => self.stats.gap_closing_edges += 1,
                LinkKind::Merging => self.stats.merging_edges += 1,
                LinkKind::Splitting => self.stats.splitting_edges += 1,
            },
            Err(e) => {
                self.stats.dropped_edges += 1;
                warn!(%source, %target, %kind, error = %e, "link dropped");
            }
        }
    }
}

/// Build and solve the matrix of one frame pair.
fn link_pair(
    t0: &[Spot],
    t1: &[Spot],
    settings: &TrackerSettings,
    solver: &dyn AssignmentSolver,
) -> PairOutcome {
    let Some(matrix) = linking_cost_matrix(t0, t1, settings) else {
        return PairOutcome::Skipped;
    };
    match solve_blocked(solver, &matrix.costs, matrix.blocking_value) {
        Ok(pairs) => PairOutcome::Linked(
            matrix
                .links(&pairs)
                .into_iter()
                .map(|(i, j, cost)| (t0[i].id, t1[j].id, cost))
                .collect(),
        ),
        Err(e) => PairOutcome::Failed(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

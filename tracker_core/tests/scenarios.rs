//! End-to-end tracking scenarios and graph-level properties.

use tracker_core::{
    LapTracker, LinkKind, MunkresKuhnSolver, ResultGraph, Spot, SpotCollection, SpotId,
    TrackerError, TrackerSettings,
};
use std::collections::HashMap;
use std::sync::Arc;

fn settings_with_linking(max_distance: f64) -> TrackerSettings {
    let mut settings = TrackerSettings::default();
    settings.linking.max_distance = max_distance;
    settings
}

fn run(spots: &SpotCollection, settings: TrackerSettings) -> LapTracker<'_> {
    let mut tracker = LapTracker::new(spots, settings);
    tracker.process().unwrap();
    tracker
}

/// Three particles drifting in parallel, one of them missed at frame 4.
fn three_lanes() -> SpotCollection {
    let mut spots = SpotCollection::new();
    let mut id = 0;
    for frame in 0..8u32 {
        spots.ensure_frame(frame);
        for lane in 0..3 {
            if lane == 1 && frame == 4 {
                continue;
            }
            let x = frame as f64 * 1.2 + lane as f64 * 0.1;
            let y = lane as f64 * 20.0;
            spots.add(Spot::new(id, frame, vec![x, y])).unwrap();
            id += 1;
        }
    }
    spots
}

fn frames_by_id(spots: &SpotCollection) -> HashMap<SpotId, u32> {
    spots.iter().map(|s| (s.id, s.frame)).collect()
}

// ---------------------------------------------------------------------------
// Concrete scenarios
// ---------------------------------------------------------------------------

#[test]
fn two_close_spots_make_one_link() {
    let spots: SpotCollection = [
        Spot::new(0, 0, vec![0.0, 0.0]),
        Spot::new(1, 1, vec![1.0, 0.0]),
    ]
    .into_iter()
    .collect();

    let tracker = run(&spots, settings_with_linking(5.0));
    let graph = tracker.result();
    assert_eq!(graph.edge_count(), 1);
    let edge = graph.edge(SpotId(0), SpotId(1)).unwrap();
    assert_eq!(edge.weight, 1.0);
    assert_eq!(edge.kind, LinkKind::Linking);
}

#[test]
fn two_far_spots_stay_apart() {
    let spots: SpotCollection = [
        Spot::new(0, 0, vec![0.0, 0.0]),
        Spot::new(1, 1, vec![100.0, 0.0]),
    ]
    .into_iter()
    .collect();

    let tracker = run(&spots, settings_with_linking(5.0));
    assert_eq!(tracker.result().edge_count(), 0);
    assert_eq!(tracker.result().vertex_count(), 2);
}

#[test]
fn missed_frame_is_bridged_by_gap_closing() {
    let mut spots = SpotCollection::new();
    spots.add(Spot::new(0, 1, vec![0.0, 0.0])).unwrap();
    spots.ensure_frame(2);
    spots.add(Spot::new(1, 3, vec![2.0, 0.0])).unwrap();

    let mut settings = settings_with_linking(5.0);
    settings.gap_closing.max_frame_gap = 2;
    settings.gap_closing.max_distance = 5.0;

    let tracker = run(&spots, settings);
    assert_eq!(tracker.track_segments().len(), 2);
    let graph = tracker.result();
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(
        graph.edge(SpotId(0), SpotId(1)).map(|e| e.kind),
        Some(LinkKind::GapClosing)
    );
    assert_eq!(graph.connected_components().len(), 1);
}

#[test]
fn short_track_merges_into_a_middle_point() {
    let spots: SpotCollection = [
        // long track on y = 0, frames 1..=3
        Spot::new(0, 1, vec![0.0, 0.0]),
        Spot::new(1, 2, vec![1.0, 0.0]),
        Spot::new(2, 3, vec![2.0, 0.0]),
        // short track ending at frame 1, next to the long track's frame-2 spot
        Spot::new(3, 1, vec![1.0, 1.5]),
    ]
    .into_iter()
    .collect();

    let mut settings = settings_with_linking(5.0);
    settings.merging.allowed = true;
    settings.merging.max_distance = 5.0;

    let tracker = run(&spots, settings);
    assert_eq!(tracker.track_segments().len(), 2);
    let graph = tracker.result();
    assert_eq!(
        graph.edge(SpotId(3), SpotId(1)).map(|e| e.kind),
        Some(LinkKind::Merging)
    );
    assert_eq!(graph.connected_components().len(), 1);
    assert_eq!(graph.predecessors(SpotId(1)).len(), 2);
}

#[test]
fn empty_collection_is_rejected() {
    let spots = SpotCollection::new();
    let mut tracker = LapTracker::new(&spots, TrackerSettings::default());
    assert!(matches!(tracker.process(), Err(TrackerError::EmptyInput)));

    let mut only_frames = SpotCollection::new();
    only_frames.ensure_frame(0);
    only_frames.ensure_frame(1);
    let mut tracker = LapTracker::new(&only_frames, TrackerSettings::default());
    assert!(matches!(tracker.process(), Err(TrackerError::EmptyInput)));
}

#[test]
fn everything_out_of_range_gives_singleton_segments() {
    let mut spots = SpotCollection::new();
    for frame in 0..4u32 {
        for k in 0..3u64 {
            let id = u64::from(frame) * 3 + k;
            let x = 1000.0 * frame as f64 + 100.0 * k as f64;
            spots.add(Spot::new(id, frame, vec![x, 0.0])).unwrap();
        }
    }

    let tracker = run(&spots, settings_with_linking(5.0));
    let graph = tracker.result();
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.vertex_count(), spots.len());
    assert_eq!(tracker.track_segments().len(), spots.len());
    assert_eq!(tracker.stats().frame_pairs_skipped, 3);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn edge_set(graph: &ResultGraph) -> Vec<(SpotId, SpotId, u64, LinkKind)> {
    let mut edges: Vec<_> = graph
        .edges()
        .iter()
        .map(|e| (e.source, e.target, e.weight.to_bits(), e.kind))
        .collect();
    edges.sort_by_key(|&(s, t, _, _)| (s, t));
    edges
}

#[test]
fn repeated_runs_are_identical() {
    let spots = three_lanes();
    let a = run(&spots, TrackerSettings::default());
    let b = run(&spots, TrackerSettings::default());
    assert_eq!(edge_set(a.result()), edge_set(b.result()));

    let mut single = LapTracker::new(&spots, TrackerSettings::default()).with_num_threads(1);
    single.process().unwrap();
    assert_eq!(edge_set(a.result()), edge_set(single.result()));
}

#[test]
fn every_spot_is_one_vertex_and_in_one_segment() {
    let spots = three_lanes();
    let tracker = run(&spots, TrackerSettings::default());

    let graph = tracker.result();
    assert_eq!(graph.vertex_count(), spots.len());
    for spot in spots.iter() {
        assert!(graph.contains_vertex(spot.id));
        let owners = tracker
            .track_segments()
            .iter()
            .filter(|seg| seg.contains(spot.id))
            .count();
        assert_eq!(owners, 1, "{}", spot.id);
    }
}

#[test]
fn edges_point_forward_in_time() {
    let spots = three_lanes();
    let frames = frames_by_id(&spots);
    let tracker = run(&spots, TrackerSettings::default());
    for edge in tracker.result().edges() {
        assert_ne!(edge.source, edge.target);
        assert!(frames[&edge.source] < frames[&edge.target]);
    }
}

#[test]
fn lanes_and_gap_are_recovered() {
    let spots = three_lanes();
    let tracker = run(&spots, TrackerSettings::default());
    let stats = tracker.stats();
    // 3 lanes × 7 steps, minus the 2 steps around the missed spot
    assert_eq!(stats.linking_edges, 19);
    assert_eq!(stats.gap_closing_edges, 1);
    assert_eq!(tracker.track_segments().len(), 4);
    assert_eq!(tracker.result().connected_components().len(), 3);
}

#[test]
fn no_link_beyond_its_distance_cutoff() {
    let spots = three_lanes();
    let mut settings = TrackerSettings::default();
    settings.linking.max_distance = 1.5;
    settings.gap_closing.max_distance = 2.0;
    let by_id: HashMap<SpotId, &Spot> = spots.iter().map(|s| (s.id, s)).collect();

    let tracker = run(&spots, settings.clone());
    for edge in tracker.result().edges() {
        let d = by_id[&edge.source]
            .square_distance_to(by_id[&edge.target])
            .sqrt();
        let cutoff = match edge.kind {
            LinkKind::Linking => settings.linking.max_distance,
            LinkKind::GapClosing => settings.gap_closing.max_distance,
            LinkKind::Merging => settings.merging.max_distance,
            LinkKind::Splitting => settings.splitting.max_distance,
        };
        assert!(d <= cutoff, "{} -> {} is {d} apart", edge.source, edge.target);
    }
    // the missed spot leaves a 2.4 jump, beyond the gap-closing cutoff
    assert_eq!(tracker.stats().gap_closing_edges, 0);
}

#[test]
fn gap_closing_respects_max_frame_gap() {
    let mut spots = SpotCollection::new();
    spots.add(Spot::new(0, 0, vec![0.0, 0.0])).unwrap();
    for frame in 1..4 {
        spots.ensure_frame(frame);
    }
    spots.add(Spot::new(1, 4, vec![1.0, 0.0])).unwrap();

    let mut settings = TrackerSettings::default();
    settings.gap_closing.max_frame_gap = 3;
    assert_eq!(run(&spots, settings.clone()).result().edge_count(), 0);

    settings.gap_closing.max_frame_gap = 4;
    assert_eq!(run(&spots, settings).stats().gap_closing_edges, 1);
}

#[test]
fn segments_do_not_depend_on_insertion_order() {
    let forward = three_lanes();
    let reversed: SpotCollection = {
        let mut all: Vec<Spot> = forward.iter().cloned().collect();
        all.reverse();
        let mut spots = SpotCollection::new();
        for frame in forward.frames() {
            spots.ensure_frame(frame);
        }
        for spot in all {
            spots.add(spot).unwrap();
        }
        spots
    };

    let membership = |spots: &SpotCollection| {
        let tracker = run(spots, TrackerSettings::default());
        let mut segments: Vec<Vec<SpotId>> = tracker
            .track_segments()
            .iter()
            .map(|seg| {
                let mut ids: Vec<SpotId> = seg.spots().iter().map(|s| s.id).collect();
                ids.sort();
                ids
            })
            .collect();
        segments.sort();
        segments
    };
    assert_eq!(membership(&forward), membership(&reversed));
}

#[test]
fn munkres_kuhn_solver_finds_the_same_tracks() {
    let spots = three_lanes();
    let hungarian = run(&spots, TrackerSettings::default());
    let mut munkres = LapTracker::new(&spots, TrackerSettings::default())
        .with_solver(Arc::new(MunkresKuhnSolver));
    munkres.process().unwrap();

    let links = |graph: &ResultGraph| {
        let mut v: Vec<_> = graph.edges().iter().map(|e| (e.source, e.target)).collect();
        v.sort();
        v
    };
    assert_eq!(links(hungarian.result()), links(munkres.result()));
}

// ---------------------------------------------------------------------------
// Finite blocking values
// ---------------------------------------------------------------------------

fn with_blocking(blocking_value: f64) -> TrackerSettings {
    let mut settings = TrackerSettings::default();
    settings.blocking_value = blocking_value;
    settings
}

#[test]
fn finite_blocking_value_tracks_like_infinity() {
    let spots = three_lanes();
    let reference = run(&spots, TrackerSettings::default());

    for blocking in [f64::MAX, 1e15] {
        let hungarian = run(&spots, with_blocking(blocking));
        let mut munkres =
            LapTracker::new(&spots, with_blocking(blocking)).with_solver(Arc::new(MunkresKuhnSolver));
        munkres.process().unwrap();

        for tracker in [&hungarian, &munkres] {
            let stats = tracker.stats();
            assert_eq!(stats.frame_pairs_failed, 0, "blocking {blocking}");
            assert!(!stats.segment_linking_abandoned, "blocking {blocking}");
            assert_eq!(stats.linking_edges, 19, "blocking {blocking}");
            assert_eq!(stats.gap_closing_edges, 1, "blocking {blocking}");
            assert_eq!(edge_set(tracker.result()), edge_set(reference.result()));
        }
    }
}

#[test]
fn crossing_pairs_link_optimally_with_a_large_blocking_value() {
    let spots: SpotCollection = [
        Spot::new(0, 0, vec![0.0, 0.0]),
        Spot::new(1, 0, vec![10.0, 0.0]),
        Spot::new(2, 1, vec![9.5, 0.0]),
        Spot::new(3, 1, vec![0.5, 0.0]),
    ]
    .into_iter()
    .collect();

    for blocking in [f64::MAX, 1e15] {
        let hungarian = run(&spots, with_blocking(blocking));
        let mut munkres =
            LapTracker::new(&spots, with_blocking(blocking)).with_solver(Arc::new(MunkresKuhnSolver));
        munkres.process().unwrap();

        for tracker in [&hungarian, &munkres] {
            let graph = tracker.result();
            assert_eq!(graph.edge_count(), 2, "blocking {blocking}");
            assert_eq!(graph.edge(SpotId(0), SpotId(3)).map(|e| e.weight), Some(0.25));
            assert_eq!(graph.edge(SpotId(1), SpotId(2)).map(|e| e.weight), Some(0.25));
        }
    }
}

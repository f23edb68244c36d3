//! `laptrack` CLI: scenario runs, tracking of recorded spot logs, default settings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sim::replay::{load_spot_log, save_spot_log, SpotLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};
use tracker_core::{
    LapTracker, LinkMetrics, ResultGraph, SpotId, TrackerSettings, TrackerStats,
};

#[derive(Parser)]
#[command(name = "laptrack", about = "Two-stage LAP particle tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a named scenario, track it and score the links.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Tracker settings JSON (defaults to the scenario's own settings)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the simulated spots
        #[arg(long)]
        save_spots: Option<PathBuf>,
    },
    /// Track a previously recorded spot log.
    Track {
        /// Path to spot log JSON file
        input: PathBuf,
        /// Tracker settings JSON (defaults to the built-in defaults)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the default tracker settings as JSON.
    DefaultSettings,
}

/// Everything written by `--output`.
#[derive(Serialize)]
struct Report<'a> {
    scenario: &'a str,
    seed: u64,
    settings: &'a TrackerSettings,
    stats: &'a TrackerStats,
    /// Connected components of the final graph
    tracks: usize,
    metrics: Option<LinkMetrics>,
    graph: &'a ResultGraph,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            settings,
            output,
            save_spots,
        } => {
            run_scenario(
                scenario,
                seed,
                settings.as_deref(),
                output.as_deref(),
                save_spots.as_deref(),
            )?;
        }
        Commands::Track {
            input,
            settings,
            output,
        } => {
            let log = load_spot_log(&input)?;
            let settings = load_settings(settings.as_deref(), TrackerSettings::default())?;
            track_log(&log, &settings, output.as_deref())?;
        }
        Commands::DefaultSettings => {
            println!("{}", serde_json::to_string_pretty(&TrackerSettings::default())?);
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>, fallback: TrackerSettings) -> Result<TrackerSettings> {
    match path {
        Some(path) => TrackerSettings::from_json_file(path)
            .with_context(|| format!("cannot load settings from {}", path.display())),
        None => Ok(fallback),
    }
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    settings_path: Option<&Path>,
    output_path: Option<&Path>,
    spots_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let settings = load_settings(settings_path, scenario.settings.clone())?;

    println!("Simulating scenario '{}' (seed={})...", scenario.name, seed);
    let log = scenario.spot_log()?;

    if let Some(spath) = spots_path {
        save_spot_log(&log, spath)?;
        println!("Spots saved to {}", spath.display());
    }

    track_log(&log, &settings, output_path)
}

fn track_log(log: &SpotLog, settings: &TrackerSettings, output_path: Option<&Path>) -> Result<()> {
    let spots = log.collection()?;
    println!(
        "Tracking '{}': {} spots over {} frames...",
        log.scenario_name,
        spots.len(),
        spots.n_frames()
    );

    let mut tracker = LapTracker::new(&spots, settings.clone());
    tracker.process()?;

    let stats = tracker.stats();
    let graph = tracker.result();
    let tracks = graph.connected_components().len();
    println!(
        "Done: {} segments, {} tracks, {} links ({} linking, {} gap-closing, {} merging, {} splitting), elapsed={:.3}s",
        stats.segments,
        tracks,
        graph.edge_count(),
        stats.linking_edges,
        stats.gap_closing_edges,
        stats.merging_edges,
        stats.splitting_edges,
        stats.total_time_us as f64 * 1e-6,
    );

    let metrics = score(graph, &log.movie.truth_links);
    if let Some(m) = &metrics {
        println!(
            "Links: precision={:.3} recall={:.3} jaccard={:.3} (TP={} FP={} FN={})",
            m.precision(),
            m.recall(),
            m.jaccard(),
            m.true_positives,
            m.false_positives,
            m.false_negatives,
        );
    }

    if let Some(opath) = output_path {
        let report = Report {
            scenario: &log.scenario_name,
            seed: log.seed,
            settings,
            stats,
            tracks,
            metrics,
            graph,
        };
        std::fs::write(opath, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("cannot write {}", opath.display()))?;
        println!("Report saved to {}", opath.display());
    }

    Ok(())
}

/// Link metrics, when the log carries ground truth.
fn score(graph: &ResultGraph, truth: &[(SpotId, SpotId)]) -> Option<LinkMetrics> {
    if truth.is_empty() {
        return None;
    }
    Some(LinkMetrics::evaluate(graph, truth))
}

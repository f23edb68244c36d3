//! Replay: serialize/deserialize spot logs so a movie can be tracked again offline.

use crate::particles::SimulatedMovie;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracker_core::SpotCollection;

/// A recorded movie: every detection, every imaged frame, and the true links.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotLog {
    pub scenario_name: String,
    pub seed: u64,
    #[serde(flatten)]
    pub movie: SimulatedMovie,
}

impl SpotLog {
    /// Rebuild the spot collection, refusing duplicated ids or mixed dimensions.
    pub fn collection(&self) -> anyhow::Result<SpotCollection> {
        self.movie
            .collection()
            .with_context(|| format!("invalid spots in log '{}'", self.scenario_name))
    }
}

/// Save a spot log to a JSON file.
pub fn save_spot_log(log: &SpotLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a spot log from a JSON file.
pub fn load_spot_log(path: &Path) -> anyhow::Result<SpotLog> {
    let file =
        std::fs::File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let reader = BufReader::new(file);
    let log: SpotLog = serde_json::from_reader(reader)
        .with_context(|| format!("{} is not a spot log", path.display()))?;
    Ok(log)
}

//! Tracker configuration: typed settings, defaults, validation, JSON loading.
//!
//! Every event the tracker can create (frame-to-frame linking, gap closing,
//! merging, splitting) carries its own distance cutoff and feature penalties.
//! Settings are validated once, before any matrix is built.

use crate::association::SolverKind;
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const DEFAULT_LINKING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_ALLOW_GAP_CLOSING: bool = true;
pub const DEFAULT_GAP_CLOSING_MAX_FRAME_GAP: u32 = 2;
pub const DEFAULT_GAP_CLOSING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_ALLOW_TRACK_MERGING: bool = false;
pub const DEFAULT_MERGING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_ALLOW_TRACK_SPLITTING: bool = false;
pub const DEFAULT_SPLITTING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_ALTERNATIVE_LINKING_COST_FACTOR: f64 = 1.05;
pub const DEFAULT_CUTOFF_PERCENTILE: f64 = 0.9;
pub const DEFAULT_BLOCKING_VALUE: f64 = f64::INFINITY;

/// Feature name → penalty weight.
pub type FeaturePenalties = BTreeMap<String, f64>;

/// Frame-to-frame linking conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingSettings {
    pub max_distance: f64,
    pub feature_penalties: FeaturePenalties,
}

impl Default for LinkingSettings {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_LINKING_MAX_DISTANCE,
            feature_penalties: FeaturePenalties::new(),
        }
    }
}

/// Gap-closing conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapClosingSettings {
    pub allowed: bool,
    pub max_distance: f64,
    /// Largest frame difference a gap-closing link may span
    pub max_frame_gap: u32,
    pub feature_penalties: FeaturePenalties,
}

impl Default for GapClosingSettings {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_ALLOW_GAP_CLOSING,
            max_distance: DEFAULT_GAP_CLOSING_MAX_DISTANCE,
            max_frame_gap: DEFAULT_GAP_CLOSING_MAX_FRAME_GAP,
            feature_penalties: FeaturePenalties::new(),
        }
    }
}

/// Merging or splitting conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub allowed: bool,
    pub max_distance: f64,
    pub feature_penalties: FeaturePenalties,
}

impl EventSettings {
    fn disabled(max_distance: f64) -> Self {
        Self {
            allowed: false,
            max_distance,
            feature_penalties: FeaturePenalties::new(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self::disabled(DEFAULT_MERGING_MAX_DISTANCE)
    }
}

/// Full configuration of the LAP tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub linking: LinkingSettings,
    pub gap_closing: GapClosingSettings,
    pub merging: EventSettings,
    pub splitting: EventSettings,
    /// Multiplies the cutoff percentile to get the "no link" cost. Must be > 1.
    pub alternative_linking_cost_factor: f64,
    /// Fraction in (0, 1] of the non-blocked costs used as cutoff.
    pub cutoff_percentile: f64,
    /// Cost of forbidden pairings. `f64::INFINITY` by default.
    #[serde(with = "blocking_value")]
    pub blocking_value: f64,
    /// Which assignment solver to use for both stages.
    pub solver: SolverKind,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            linking: LinkingSettings::default(),
            gap_closing: GapClosingSettings::default(),
            merging: EventSettings {
                allowed: DEFAULT_ALLOW_TRACK_MERGING,
                ..EventSettings::disabled(DEFAULT_MERGING_MAX_DISTANCE)
            },
            splitting: EventSettings {
                allowed: DEFAULT_ALLOW_TRACK_SPLITTING,
                ..EventSettings::disabled(DEFAULT_SPLITTING_MAX_DISTANCE)
            },
            alternative_linking_cost_factor: DEFAULT_ALTERNATIVE_LINKING_COST_FACTOR,
            cutoff_percentile: DEFAULT_CUTOFF_PERCENTILE,
            blocking_value: DEFAULT_BLOCKING_VALUE,
            solver: SolverKind::default(),
        }
    }
}

impl TrackerSettings {
    /// True if stage 2 has anything to do.
    pub fn links_segments(&self) -> bool {
        self.gap_closing.allowed || self.merging.allowed || self.splitting.allowed
    }

    /// Parse settings from JSON. Missing keys take their default value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file. Missing keys take their default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems: Vec<String> = Vec::new();

        let d = self.linking.max_distance;
        if !(d.is_finite() && d > 0.0) {
            problems.push(format!("linking max distance must be finite and > 0, got {d}"));
        }
        check_penalties("linking", &self.linking.feature_penalties, &mut problems);

        if self.gap_closing.allowed {
            check_event_distance("gap-closing", self.gap_closing.max_distance, &mut problems);
            if self.gap_closing.max_frame_gap < 1 {
                problems.push("gap-closing max frame gap must be at least 1".to_owned());
            }
        }
        check_penalties(
            "gap-closing",
            &self.gap_closing.feature_penalties,
            &mut problems,
        );

        if self.merging.allowed {
            check_event_distance("merging", self.merging.max_distance, &mut problems);
        }
        check_penalties("merging", &self.merging.feature_penalties, &mut problems);

        if self.splitting.allowed {
            check_event_distance("splitting", self.splitting.max_distance, &mut problems);
        }
        check_penalties("splitting", &self.splitting.feature_penalties, &mut problems);

        let f = self.alternative_linking_cost_factor;
        if !(f.is_finite() && f > 1.0) {
            problems.push(format!(
                "alternative linking cost factor must be finite and > 1, got {f}"
            ));
        }
        let p = self.cutoff_percentile;
        if !(p > 0.0 && p <= 1.0) {
            problems.push(format!("cutoff percentile must be in (0, 1], got {p}"));
        }
        let b = self.blocking_value;
        if !(b > 0.0) {
            problems.push(format!("blocking value must be > 0, got {b}"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TrackerError::settings(problems.join("; ")))
        }
    }
}

fn check_event_distance(event: &str, d: f64, problems: &mut Vec<String>) {
    if !(d > 0.0) {
        problems.push(format!("{event} max distance must be > 0, got {d}"));
    }
}

fn check_penalties(event: &str, penalties: &FeaturePenalties, problems: &mut Vec<String>) {
    for (feature, weight) in penalties {
        if !(weight.is_finite() && *weight >= 0.0) {
            problems.push(format!(
                "{event} penalty for feature '{feature}' must be finite and >= 0, got {weight}"
            ));
        }
    }
}

fn fmt_penalties(f: &mut fmt::Formatter<'_>, penalties: &FeaturePenalties) -> fmt::Result {
    if penalties.is_empty() {
        return writeln!(f, "    - no feature penalties");
    }
    writeln!(f, "    - with feature penalties:")?;
    for (feature, weight) in penalties {
        writeln!(f, "      - {feature}: weight = {weight:.1}")?;
    }
    Ok(())
}

impl fmt::Display for TrackerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Linking conditions:")?;
        writeln!(f, "    - distance cutoff: {:.1}", self.linking.max_distance)?;
        fmt_penalties(f, &self.linking.feature_penalties)?;

        if self.gap_closing.allowed {
            writeln!(f, "  Gap-closing conditions:")?;
            writeln!(f, "    - distance cutoff: {:.1}", self.gap_closing.max_distance)?;
            writeln!(f, "    - max frame gap: {}", self.gap_closing.max_frame_gap)?;
            fmt_penalties(f, &self.gap_closing.feature_penalties)?;
        } else {
            writeln!(f, "  Gap-closing not allowed.")?;
        }

        if self.splitting.allowed {
            writeln!(f, "  Track splitting conditions:")?;
            writeln!(f, "    - distance cutoff: {:.1}", self.splitting.max_distance)?;
            fmt_penalties(f, &self.splitting.feature_penalties)?;
        } else {
            writeln!(f, "  Track splitting not allowed.")?;
        }

        if self.merging.allowed {
            writeln!(f, "  Track merging conditions:")?;
            writeln!(f, "    - distance cutoff: {:.1}", self.merging.max_distance)?;
            fmt_penalties(f, &self.merging.feature_penalties)?;
        } else {
            writeln!(f, "  Track merging not allowed.")?;
        }

        writeln!(
            f,
            "  Alternative cost: {:.2} x {:.0}th percentile, blocking value {}, solver {:?}",
            self.alternative_linking_cost_factor,
            self.cutoff_percentile * 100.0,
            self.blocking_value,
            self.solver
        )
    }
}

/// JSON has no infinity: the blocking value is written as `null` when infinite.
mod blocking_value {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

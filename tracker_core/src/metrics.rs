//! Link-level tracking metrics against known true links: precision, recall, Jaccard.

use crate::graph::ResultGraph;
use crate::types::SpotId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Link counts of one result graph compared with the true links.
///
/// A link counts as found only with the right direction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetrics {
    /// Links present in both the result and the truth
    pub true_positives: u64,
    /// Result links absent from the truth
    pub false_positives: u64,
    /// True links the tracker missed
    pub false_negatives: u64,
}

impl LinkMetrics {
    /// Compare every edge of `graph` with `truth`. Duplicated true links count once.
    pub fn evaluate(graph: &ResultGraph, truth: &[(SpotId, SpotId)]) -> Self {
        let truth: HashSet<(SpotId, SpotId)> = truth.iter().copied().collect();

        let mut metrics = LinkMetrics::default();
        for edge in graph.edges() {
            if truth.contains(&(edge.source, edge.target)) {
                metrics.true_positives += 1;
            } else {
                metrics.false_positives += 1;
            }
        }
        metrics.false_negatives = truth
            .iter()
            .filter(|&&(source, target)| !graph.contains_edge(source, target))
            .count() as u64;
        metrics
    }

    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = (self.true_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Jaccard = TP / (TP + FP + FN)
    pub fn jaccard(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Label consensus across noisy samples
//!
//! Greedy, order-dependent clustering of near-duplicate labels. Each cluster
//! that reaches the minimum size contributes its most frequent member, unless
//! that member is too close to a representative already emitted.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Result of a consensus pass
#[derive(Debug, Clone, PartialEq)]
pub enum Consensus {
    Agreed(Vec<String>),
    /// No cluster reached the minimum size
    NoConsensus,
}

#[derive(Debug, Clone)]
pub struct FuzzyAggregator {
    threshold: f64,
    min_cluster_size: usize,
}

/// Normalized Levenshtein similarity over trimmed, lower-cased labels
pub fn label_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    strsim::normalized_levenshtein(&a, &b)
}

impl FuzzyAggregator {
    pub fn new(threshold: f64, min_cluster_size: usize) -> Self {
        Self {
            threshold,
            min_cluster_size,
        }
    }

    fn similar(&self, a: &str, b: &str) -> bool {
        label_similarity(a, b) >= self.threshold
    }

    /// Partition labels into clusters of similar strings, in input order
    pub fn clusters<'a>(&self, labels: &'a [String]) -> Vec<Vec<&'a str>> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut clusters = Vec::new();

        for anchor in labels {
            if claimed.contains(anchor.as_str()) {
                continue;
            }

            let members: Vec<&str> = labels
                .iter()
                .map(String::as_str)
                .filter(|label| !claimed.contains(label) && self.similar(anchor, label))
                .collect();

            if members.len() >= self.min_cluster_size {
                claimed.extend(members.iter().copied());
                clusters.push(members);
            }
        }

        clusters
    }

    /// One representative per surviving cluster
    pub fn aggregate(&self, labels: &[String]) -> Consensus {
        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for label in labels {
            *frequency.entry(label.as_str()).or_insert(0) += 1;
        }

        let mut representatives: Vec<String> = Vec::new();
        for cluster in self.clusters(labels) {
            // First member with the highest count wins
            let mut best: Option<(&str, usize)> = None;
            for member in &cluster {
                let count = frequency.get(member).copied().unwrap_or(0);
                if best.map_or(true, |(_, c)| count > c) {
                    best = Some((member, count));
                }
            }

            let Some((representative, count)) = best else {
                continue;
            };

            if representatives
                .iter()
                .any(|existing| self.similar(representative, existing))
            {
                debug!("Skipping '{}': too close to an earlier label", representative);
                continue;
            }

            debug!(
                "Cluster of {} -> '{}' (seen {} times)",
                cluster.len(),
                representative,
                count
            );
            representatives.push(representative.to_string());
        }

        if representatives.is_empty() {
            Consensus::NoConsensus
        } else {
            Consensus::Agreed(representatives)
        }
    }

    /// Consensus labels, or the de-duplicated input when no cluster qualifies
    pub fn aggregate_or_fallback(&self, labels: &[String]) -> Vec<String> {
        match self.aggregate(labels) {
            Consensus::Agreed(representatives) => representatives,
            Consensus::NoConsensus => {
                info!(
                    "No label cluster reached size {}; using all {} labels",
                    self.min_cluster_size,
                    labels.len()
                );
                dedup_preserving_order(labels)
            }
        }
    }
}

/// Exact de-duplication keeping first occurrences
pub fn dedup_preserving_order(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .filter(|label| seen.insert(label.as_str()))
        .cloned()
        .collect()
}

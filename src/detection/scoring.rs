// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Primary-object selection by weighted confidence, area and centrality

use serde::{Deserialize, Serialize};

use super::types::{DetectionCandidate, DetectionResult};

/// Relative weights of the three score terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub confidence: f64,
    pub area: f64,
    pub center: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            area: 0.3,
            center: 0.2,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("confidence", self.confidence),
            ("area", self.area),
            ("center", self.center),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "{} weight must be finite and non-negative, got {}",
                    name, value
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoredSelector {
    weights: ScoringWeights,
}

impl ScoredSelector {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Raw score of one candidate on a `width x height` image
    pub fn score(&self, candidate: &DetectionCandidate, width: u32, height: u32) -> f64 {
        let img_w = width.max(1) as f64;
        let img_h = height.max(1) as f64;
        let b = &candidate.box_xywh;

        let area_ratio = (b.w as f64 * b.h as f64) / (img_w * img_h);

        let dx = b.cx as f64 - img_w / 2.0;
        let dy = b.cy as f64 - img_h / 2.0;
        let diagonal = (img_w * img_w + img_h * img_h).sqrt();
        let center_term = 1.0 - ((dx * dx + dy * dy).sqrt() / diagonal).powi(2);

        self.weights.confidence * candidate.confidence as f64
            + self.weights.area * area_ratio
            + self.weights.center * center_term
    }

    /// Score a batch and pick the winner. Empty input yields the sentinel.
    pub fn select(
        &self,
        candidates: Vec<DetectionCandidate>,
        width: u32,
        height: u32,
    ) -> DetectionResult {
        if candidates.is_empty() {
            return DetectionResult::empty();
        }

        let raw: Vec<f64> = candidates
            .iter()
            .map(|c| self.score(c, width, height))
            .collect();

        let mut best_index = 0;
        for (i, score) in raw.iter().enumerate() {
            if *score > raw[best_index] {
                best_index = i;
            }
        }

        let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;
        let normalized_scores = raw
            .iter()
            .map(|s| if span > 0.0 { (s - min) / span } else { 1.0 })
            .collect();

        let best = candidates[best_index].clone();
        let all_labels = candidates.iter().map(|c| c.class_label.clone()).collect();

        DetectionResult {
            best_label: Some(best.class_label.clone()),
            best_candidate: Some(best),
            all_labels,
            all_candidates: candidates,
            normalized_scores,
        }
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection boxes and results

use serde::{Deserialize, Serialize};

/// Box as center point plus size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxXywh {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Box as top-left and bottom-right corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxXyxy {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoxXyxy {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn to_xywh(&self) -> BoxXywh {
        let w = (self.x2 - self.x1).abs();
        let h = (self.y2 - self.y1).abs();
        BoxXywh {
            cx: (self.x1 + self.x2) / 2.0,
            cy: (self.y1 + self.y2) / 2.0,
            w,
            h,
        }
    }

    /// Integer pixel rectangle `(x, y, width, height)` clamped to an image.
    /// `None` when nothing of the box lies inside the image.
    pub fn clamped_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
        let x1 = clamp(self.x1.min(self.x2), width);
        let x2 = clamp(self.x1.max(self.x2), width);
        let y1 = clamp(self.y1.min(self.y2), height);
        let y2 = clamp(self.y1.max(self.y2), height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// One detector hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub box_xywh: BoxXywh,
    pub box_xyxy: BoxXyxy,
    pub class_label: String,
    pub confidence: f32,
}

impl DetectionCandidate {
    pub fn from_xyxy(box_xyxy: BoxXyxy, class_label: impl Into<String>, confidence: f32) -> Self {
        Self {
            box_xywh: box_xyxy.to_xywh(),
            box_xyxy,
            class_label: class_label.into(),
            confidence,
        }
    }
}

/// Scored detection batch. `best_candidate == None` means no object was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    pub all_candidates: Vec<DetectionCandidate>,
    pub all_labels: Vec<String>,
    pub best_candidate: Option<DetectionCandidate>,
    pub best_label: Option<String>,
    pub normalized_scores: Vec<f64>,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_object(&self) -> bool {
        self.best_candidate.is_some()
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection seam, sidecar client and primary-object scoring

pub mod client;
pub mod scoring;
pub mod types;

pub use client::{DetectorClient, ObjectDetector};
pub use scoring::{ScoredSelector, ScoringWeights};
pub use types::{BoxXywh, BoxXyxy, DetectionCandidate, DetectionResult};

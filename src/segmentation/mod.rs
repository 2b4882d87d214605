// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object segmentation seam and mask post-processing

pub mod client;
pub mod result;

pub use client::{Segmenter, SegmenterClient};
pub use result::{SegmentationError, SegmentationResult};

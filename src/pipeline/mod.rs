// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline coordination, stage errors and run records

pub mod error;
pub mod processor;
pub mod types;

pub use error::{PipelineError, Stage};
pub use processor::{output_name, Backends, ImageProcessor};
pub use types::{PipelineSettings, TransformOutcome, UploadedImage};

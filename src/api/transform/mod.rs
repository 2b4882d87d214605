// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Photo-to-toy transform endpoint

pub mod handler;
pub mod response;

pub use handler::{transform_handler, UPLOAD_FIELD};
pub use response::TransformResponse;

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the toy transformer service

/// Semantic version number
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "multi-sample-stages",
    "label-consensus",
    "detection-fallback",
    "bounded-storage",
    "prompt-catalog",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Toy Transformer {} ({})", VERSION, FEATURES.join(", "))
}

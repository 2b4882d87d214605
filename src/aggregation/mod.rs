// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reductions applied to sampled model outputs

pub mod fuzzy;
pub mod longest;

pub use fuzzy::{dedup_preserving_order, label_similarity, Consensus, FuzzyAggregator};
pub use longest::select_longest;

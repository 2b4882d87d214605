// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-attempt outcome of a sampled stage

/// Outcome of one logical attempt after its retries have played out
#[derive(Debug, Clone, PartialEq)]
pub enum SampleAttempt<T> {
    Success(T),
    /// Every try failed; the attempt contributes nothing to the reduction
    Exhausted { attempts: u32 },
}

impl<T> SampleAttempt<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            SampleAttempt::Success(value) => Some(value),
            SampleAttempt::Exhausted { .. } => None,
        }
    }
}

/// Drop exhausted attempts, keeping successful values
pub fn survivors<T>(attempts: Vec<SampleAttempt<T>>) -> Vec<T> {
    attempts
        .into_iter()
        .filter_map(SampleAttempt::into_value)
        .collect()
}

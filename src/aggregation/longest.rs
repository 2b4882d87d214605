// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Longest-text reduction for free-form samples

use anyhow::{anyhow, Result};

/// Pick the longest candidate by character count; ties keep the earliest
pub fn select_longest<I, S>(candidates: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut best: Option<(usize, String)> = None;
    for candidate in candidates {
        let text: String = candidate.into();
        let len = text.chars().count();
        if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
            best = Some((len, text));
        }
    }

    best.map(|(_, text)| text)
        .ok_or_else(|| anyhow!("no candidates to select from"))
}

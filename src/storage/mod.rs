// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod governor;

pub use governor::{StorageError, StorageGovernor};

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image synthesis seam and the prompt-to-image HTTP client

pub mod client;

pub use client::{ImageSize, ImageSynthesizer, PromptImageClient, SynthesizedImage};

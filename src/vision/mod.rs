// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision helpers and the generative model seam
//!
//! This module provides:
//! - Image decoding/encoding utilities
//! - The `GenerativeModel` trait used by every sampled stage
//! - A VLM sidecar client implementing it over an OpenAI-compatible API

pub mod generative;
pub mod image_utils;
pub mod vlm_client;

pub use generative::{GenerationOptions, GenerationRequest, GenerativeModel, PromptPart};
pub use image_utils::{
    decode_base64_image, decode_image_bytes, detect_format, encode_base64_png, encode_png,
    format_to_extension, ImageError, ImageInfo, DEFAULT_MAX_IMAGE_SIZE,
};
pub use vlm_client::VlmClient;

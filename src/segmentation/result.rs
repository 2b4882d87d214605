// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Mask post-processing: white-background isolation and box crop

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use thiserror::Error;

use crate::detection::BoxXyxy;

/// Mask values above this count as foreground
const MASK_THRESHOLD: u8 = 127;

#[derive(Debug, Error, PartialEq)]
pub enum SegmentationError {
    #[error("mask is {mask_w}x{mask_h} but image is {image_w}x{image_h}")]
    DimensionMismatch {
        mask_w: u32,
        mask_h: u32,
        image_w: u32,
        image_h: u32,
    },

    #[error("box {0:?} does not overlap the image")]
    EmptyCrop(BoxXyxy),
}

/// Mask plus the isolated object, whole-frame and cropped
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub binary_mask: GrayImage,
    pub isolated_object_image: DynamicImage,
    pub isolated_box_crop: DynamicImage,
}

impl SegmentationResult {
    /// Composite the masked object on white and crop it to `box_xyxy`.
    /// Fails when the mask and image sizes differ.
    pub fn isolate(
        image: &DynamicImage,
        mask: GrayImage,
        box_xyxy: &BoxXyxy,
    ) -> Result<Self, SegmentationError> {
        let (image_w, image_h) = (image.width(), image.height());
        if mask.dimensions() != (image_w, image_h) {
            return Err(SegmentationError::DimensionMismatch {
                mask_w: mask.width(),
                mask_h: mask.height(),
                image_w,
                image_h,
            });
        }

        let (x, y, w, h) = box_xyxy
            .clamped_rect(image_w, image_h)
            .ok_or(SegmentationError::EmptyCrop(*box_xyxy))?;

        let source = image.to_rgb8();
        let isolated = RgbImage::from_fn(image_w, image_h, |px, py| {
            if mask.get_pixel(px, py)[0] > MASK_THRESHOLD {
                *source.get_pixel(px, py)
            } else {
                Rgb([255, 255, 255])
            }
        });

        let isolated_object_image = DynamicImage::ImageRgb8(isolated);
        let isolated_box_crop = isolated_object_image.crop_imm(x, y, w, h);

        Ok(Self {
            binary_mask: mask,
            isolated_object_image,
            isolated_box_crop,
        })
    }
}

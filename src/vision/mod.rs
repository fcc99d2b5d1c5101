// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! External vision capabilities: region detection and piece identification
//!
//! The pipeline only ever sees these traits. Production uses the HTTP-backed
//! [`remote::RemoteVision`] client; tests substitute deterministic doubles.

pub mod remote;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Axis-aligned rectangle in normalized [0, 1] image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Convert to a pixel rectangle `(x, y, w, h)` within an image of the
    /// given dimensions, clamped to the image bounds.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let x = (self.x.clamp(0.0, 1.0) * image_width as f32) as u32;
        let y = (self.y.clamp(0.0, 1.0) * image_height as f32) as u32;
        let w = (self.width.clamp(0.0, 1.0) * image_width as f32) as u32;
        let h = (self.height.clamp(0.0, 1.0) * image_height as f32) as u32;
        let w = w.min(image_width.saturating_sub(x));
        let h = h.min(image_height.saturating_sub(y));
        (x, y, w, h)
    }
}

/// A candidate rectangular sub-area likely to contain one piece
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionProposal {
    pub bounding_box: BoundingBox,
    pub score: f32,
}

/// Identity of a piece as reported by the external classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceIdentity {
    pub part_number: String,
    pub part_name: String,
    pub category: String,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
}

/// Proposes piece regions for a full captured image
#[async_trait]
pub trait RegionDetector: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<RegionProposal>>;
}

/// Identifies the piece shown in one cropped region
#[async_trait]
pub trait PieceClassifier: Send + Sync {
    async fn identify(&self, crop: &DynamicImage) -> Result<PieceIdentity>;
}

/// Encode a crop as JPEG bytes for transport or storage.
/// JPEG carries no alpha, so the crop is flattened to RGB first.
pub fn encode_crop_jpeg(crop: &DynamicImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(crop.to_rgb8());
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    rgb.write_to(&mut cursor, image::ImageFormat::Jpeg)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_to_pixels() {
        let bb = BoundingBox { x: 0.25, y: 0.5, width: 0.5, height: 0.25 };
        assert_eq!(bb.to_pixels(400, 400), (100, 200, 200, 100));
    }

    #[test]
    fn test_bounding_box_clamped_to_image() {
        let bb = BoundingBox { x: 0.75, y: 0.0, width: 0.5, height: 1.0 };
        let (x, _, w, h) = bb.to_pixels(100, 50);
        assert_eq!(x, 75);
        assert_eq!(w, 25);
        assert_eq!(h, 50);
    }

    #[test]
    fn test_encode_crop_jpeg_produces_decodable_bytes() {
        let crop = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            4,
            4,
            image::Rgba([10, 20, 30, 255]),
        ));
        let bytes = encode_crop_jpeg(&crop).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
    }
}

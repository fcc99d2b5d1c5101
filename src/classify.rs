// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Deterministic average-color classification against the reference palette

use image::{DynamicImage, GenericImageView};

use crate::palette::{ColorSample, Palette, PaletteColor};
use crate::{BrickscanError, Result};

/// Maps a cropped region to its nearest reference color.
///
/// The whole crop is averaged rather than a re-cropped center window: region
/// crops come from the detector and are already tight around the piece.
#[derive(Debug, Clone, Default)]
pub struct ColorClassifier {
    palette: Palette,
}

impl ColorClassifier {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Average the region's pixels and return the nearest palette entry.
    ///
    /// Deterministic for identical pixel input: channels are accumulated in
    /// row-major left-to-right order. The alpha channel is ignored.
    pub fn classify(&self, region: &DynamicImage) -> Result<&PaletteColor> {
        let sample = self.average_color(region)?;
        Ok(self.palette.nearest(&sample))
    }

    /// Compute the mean R, G, B of the region, normalized to [0, 1].
    pub fn average_color(&self, region: &DynamicImage) -> Result<ColorSample> {
        let (width, height) = region.dimensions();
        if width == 0 || height == 0 {
            return Err(BrickscanError::InvalidRegion(format!(
                "zero-area region ({}x{})",
                width, height
            )));
        }

        let rgba = region.to_rgba8();
        let mut total = [0.0f64; 3];
        for pixel in rgba.pixels() {
            total[0] += pixel.0[0] as f64 / 255.0;
            total[1] += pixel.0[1] as f64 / 255.0;
            total[2] += pixel.0[2] as f64 / 255.0;
        }

        let count = (width as f64) * (height as f64);
        Ok(ColorSample {
            rgb: [
                (total[0] / count) as f32,
                (total[1] / count) as f32,
                (total[2] / count) as f32,
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid_region(width: u32, height: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    #[test]
    fn test_classify_solid_red_region() {
        let classifier = ColorClassifier::default();
        let region = solid_region(8, 8, [201, 26, 9, 255]);
        let color = classifier.classify(&region).unwrap();
        assert_eq!(color.id, 5);
        assert_eq!(color.name, "Red");
    }

    #[test]
    fn test_average_of_mixed_pixels() {
        let classifier = ColorClassifier::default();
        let mut buf = RgbaImage::new(2, 1);
        buf.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        buf.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        let sample = classifier
            .average_color(&DynamicImage::ImageRgba8(buf))
            .unwrap();
        for channel in sample.rgb {
            assert!((channel - 0.5).abs() < 1e-3, "channel {}", channel);
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = ColorClassifier::default();
        let region = solid_region(16, 16, [0, 140, 180, 255]);
        let first = classifier.classify(&region).unwrap().id;
        for _ in 0..10 {
            assert_eq!(classifier.classify(&region).unwrap().id, first);
        }
    }

    #[test]
    fn test_alpha_channel_is_ignored() {
        let classifier = ColorClassifier::default();
        let opaque = classifier
            .average_color(&solid_region(4, 4, [75, 151, 74, 255]))
            .unwrap();
        let translucent = classifier
            .average_color(&solid_region(4, 4, [75, 151, 74, 32]))
            .unwrap();
        assert_eq!(opaque, translucent);
    }

    #[test]
    fn test_zero_area_region_is_rejected() {
        let classifier = ColorClassifier::default();
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        match classifier.classify(&empty) {
            Err(BrickscanError::InvalidRegion(_)) => {}
            other => panic!("expected InvalidRegion, got {:?}", other.map(|c| c.id)),
        }
    }
}

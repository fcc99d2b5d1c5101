// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Fixed reference palette and nearest-color lookup

use serde::{Deserialize, Serialize};

/// One entry in the reference palette
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteColor {
    /// Stable color id from the part database numbering
    pub id: i64,
    pub name: &'static str,
    /// sRGB components in [0, 1]
    pub rgb: [f32; 3],
}

/// An averaged color sample taken from a cropped region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub rgb: [f32; 3],
}

macro_rules! rgb {
    ($r:literal, $g:literal, $b:literal) => {
        [$r as f32 / 255.0, $g as f32 / 255.0, $b as f32 / 255.0]
    };
}

/// Official reference colors. Ordering matters: when two entries are
/// equidistant from a sample, the earlier one wins.
pub const REFERENCE_COLORS: &[PaletteColor] = &[
    PaletteColor { id: 5, name: "Red", rgb: rgb!(201, 26, 9) },
    PaletteColor { id: 7, name: "Blue", rgb: rgb!(0, 85, 191) },
    PaletteColor { id: 14, name: "Yellow", rgb: rgb!(255, 205, 3) },
    PaletteColor { id: 10, name: "Green", rgb: rgb!(75, 151, 74) },
    PaletteColor { id: 11, name: "Black", rgb: rgb!(33, 33, 33) },
    PaletteColor { id: 15, name: "White", rgb: rgb!(255, 255, 255) },
    PaletteColor { id: 9, name: "Light Gray", rgb: rgb!(161, 165, 162) },
    PaletteColor { id: 85, name: "Dark Bluish Gray", rgb: rgb!(99, 95, 97) },
    PaletteColor { id: 4, name: "Orange", rgb: rgb!(252, 94, 2) },
    PaletteColor { id: 8, name: "Brown", rgb: rgb!(91, 49, 35) },
    PaletteColor { id: 28, name: "Dark Green", rgb: rgb!(0, 69, 26) },
    PaletteColor { id: 2, name: "Tan", rgb: rgb!(222, 198, 156) },
    PaletteColor { id: 23, name: "Pink", rgb: rgb!(255, 158, 205) },
    PaletteColor { id: 24, name: "Purple", rgb: rgb!(129, 0, 123) },
    PaletteColor { id: 34, name: "Lime", rgb: rgb!(163, 195, 0) },
    PaletteColor { id: 321, name: "Dark Azure", rgb: rgb!(0, 143, 185) },
];

/// Immutable, ordered set of reference colors
#[derive(Debug, Clone)]
pub struct Palette {
    colors: &'static [PaletteColor],
}

impl Palette {
    /// Palette over the built-in reference colors
    pub fn reference() -> Self {
        Self { colors: REFERENCE_COLORS }
    }

    /// All entries, in palette order
    pub fn colors(&self) -> &[PaletteColor] {
        self.colors
    }

    /// Look up an entry by its color id
    pub fn by_id(&self, id: i64) -> Option<&PaletteColor> {
        self.colors.iter().find(|c| c.id == id)
    }

    /// Return the palette entry closest to the sample in RGB space.
    ///
    /// Strict `<` comparison: equidistant entries resolve to the one that
    /// appears earlier in the palette.
    pub fn nearest(&self, sample: &ColorSample) -> &PaletteColor {
        let mut min_distance = f32::INFINITY;
        // Non-empty by construction, so the first iteration always assigns.
        let mut closest = &self.colors[0];

        for color in self.colors {
            let distance = squared_distance(sample.rgb, color.rgb);
            if distance < min_distance {
                min_distance = distance;
                closest = color;
            }
        }

        closest
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::reference()
    }
}

/// Squared Euclidean distance in RGB. Monotonic with true distance, so the
/// square root is skipped for comparison purposes.
fn squared_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_reference_color_maps_to_itself() {
        let palette = Palette::reference();
        for color in palette.colors() {
            let sample = ColorSample { rgb: color.rgb };
            assert_eq!(palette.nearest(&sample).id, color.id, "color {}", color.name);
        }
    }

    #[test]
    fn test_nearest_picks_minimum_distance() {
        let palette = Palette::reference();
        // Slightly off pure red still resolves to Red (id 5)
        let sample = ColorSample { rgb: [0.78, 0.10, 0.03] };
        assert_eq!(palette.nearest(&sample).name, "Red");

        let sample = ColorSample { rgb: [0.0, 0.33, 0.75] };
        assert_eq!(palette.nearest(&sample).name, "Blue");
    }

    #[test]
    fn test_equidistant_sample_resolves_to_earlier_entry() {
        // Two fixture colors placed symmetrically around the sample, using
        // exactly representable components so the distances are bit-equal
        const FIXTURE: &[PaletteColor] = &[
            PaletteColor { id: 1, name: "Low", rgb: [0.25, 0.25, 0.25] },
            PaletteColor { id: 2, name: "High", rgb: [0.75, 0.75, 0.75] },
        ];
        let palette = Palette { colors: FIXTURE };

        let midpoint = ColorSample { rgb: [0.5, 0.5, 0.5] };
        assert_eq!(palette.nearest(&midpoint).id, 1);
    }

    #[test]
    fn test_by_id() {
        let palette = Palette::reference();
        assert_eq!(palette.by_id(5).map(|c| c.name), Some("Red"));
        assert_eq!(palette.by_id(321).map(|c| c.name), Some("Dark Azure"));
        assert!(palette.by_id(9999).is_none());
    }
}

use serde::{Deserialize, Serialize};

use crate::{MediaMetadata, RatioMode};

/// Pixel geometry of the two generated bands. Both span the full image
/// width; only vertical placement varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutGeometry {
    pub width: u32,
    pub waves_height: i64,
    pub waves_background_height: i64,
    /// Vertical offset of the waves inside the background band.
    pub waves_offset: i64,
    /// Vertical offset of the background band inside the image.
    pub waves_background_offset: i64,
}

impl LayoutGeometry {
    /// Derives band heights and centering offsets. Offsets are not clamped
    /// and go negative when an inner band is taller than its container.
    pub fn compute(metadata: &MediaMetadata, ratios: &RatioMode) -> Self {
        let image_height = i64::from(metadata.height);
        let waves_height = band_height(ratios.waves_ratio(), metadata.height);
        let waves_background_height = band_height(ratios.background_ratio(), metadata.height);

        Self {
            width: metadata.width,
            waves_height,
            waves_background_height,
            waves_offset: center_offset(waves_background_height, waves_height),
            waves_background_offset: center_offset(image_height, waves_background_height),
        }
    }
}

/// `floor(ratio * height)`.
pub fn band_height(ratio: f64, height: u32) -> i64 {
    (ratio * f64::from(height)).floor() as i64
}

/// `floor((outer - inner) / 2)`, rounding toward negative infinity.
pub fn center_offset(outer: i64, inner: i64) -> i64 {
    (outer - inner).div_euclid(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(width: u32, height: u32) -> MediaMetadata {
        MediaMetadata {
            duration_seconds: 5.0,
            width,
            height,
        }
    }

    #[test]
    fn default_ratios_on_640x360() {
        let layout = LayoutGeometry::compute(&metadata(640, 360), &RatioMode::default());
        assert_eq!(
            layout,
            LayoutGeometry {
                width: 640,
                waves_height: 54,
                waves_background_height: 72,
                waves_offset: 9,
                waves_background_offset: 144,
            }
        );
    }

    #[test]
    fn centering_is_symmetric_within_a_pixel() {
        for height in [1_u32, 99, 360, 361, 719, 1080, 1081] {
            for (waves, background) in [(0.15, 0.2), (0.1, 0.33), (0.0, 1.0), (0.5, 0.5)] {
                let layout = LayoutGeometry::compute(
                    &metadata(100, height),
                    &RatioMode::Dual { waves, background },
                );
                let filled = 2 * layout.waves_offset + layout.waves_height;
                let slack = layout.waves_background_height - filled;
                assert!((0..=1).contains(&slack), "height {height}: slack {slack}");
            }
        }
    }

    #[test]
    fn band_height_is_floored_and_deterministic() {
        assert_eq!(band_height(0.2, 1081), 216);
        assert_eq!(band_height(0.15, 719), 107);
        assert_eq!(band_height(0.2, 1081), band_height(0.2, 1081));
    }

    #[test]
    fn shared_ratio_leaves_no_inner_offset() {
        let layout = LayoutGeometry::compute(&metadata(1920, 1080), &RatioMode::Shared(0.2));
        assert_eq!(layout.waves_height, 216);
        assert_eq!(layout.waves_offset, 0);
        assert_eq!(layout.waves_background_offset, 432);
    }

    #[test]
    fn offsets_go_negative_without_clamping() {
        let layout = LayoutGeometry::compute(
            &metadata(640, 360),
            &RatioMode::Dual {
                waves: 0.5,
                background: 0.25,
            },
        );
        assert_eq!(layout.waves_offset, -45);
        assert_eq!(center_offset(0, 3), -2);
    }
}

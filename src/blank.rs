// Heuristic "is this signature blank?" check used before embedding.
//
// Only a short horizontal run of pixels is sampled. A signature drawn entirely
// outside that run is reported as blank; callers that need an exact answer
// should use `Raster::is_empty` instead.

use log::debug;
use serde::Deserialize;

use crate::codec::{self, SignatureImage};
use crate::types::{Raster, Rgba};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BlankDetector {
    /// Row to sample, in image pixels.
    pub sample_row: usize,
    /// How many pixels from the left edge of that row are inspected.
    pub sample_width: usize,
    /// A channel at or above this value counts as white.
    pub whiteness_threshold: u8,
}

impl Default for BlankDetector {
    fn default() -> Self {
        Self { sample_row: 0, sample_width: 10, whiteness_threshold: 255 }
    }
}

impl BlankDetector {
    pub fn is_blank(&self, raster: &Raster) -> bool {
        if self.sample_row >= raster.height {
            return true;
        }
        let n = self.sample_width.min(raster.width);
        let start = self.sample_row * raster.width;
        raster.pixels[start..start + n].iter().all(|&px| {
            let c = Rgba::unpack(px);
            c.a == 0
                || (c.r >= self.whiteness_threshold
                    && c.g >= self.whiteness_threshold
                    && c.b >= self.whiteness_threshold)
        })
    }

    /// An image that cannot be decoded is treated as drawn, not blank.
    pub fn is_blank_image(&self, image: &SignatureImage) -> bool {
        match codec::decode(image) {
            Ok(raster) => self.is_blank(&raster),
            Err(e) => {
                debug!("blank check could not decode signature: {e}");
                false
            }
        }
    }
}

// Encoded signature images.
//
// A `SignatureImage` is the PNG a save produces. It is immutable: a pad
// replaces its image wholesale on save/clear/load and never edits one in place,
// so clones share the same bytes.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};
use crate::types::{Raster, Rgba};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Clone, PartialEq, Eq)]
pub struct SignatureImage {
    png: Arc<[u8]>,
}

impl SignatureImage {
    /// Wrap PNG bytes after checking they decode.
    pub fn from_png(bytes: Vec<u8>) -> Result<Self> {
        image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
        Ok(Self { png: bytes.into() })
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", B64.encode(&self.png))
    }

    pub fn from_data_url(url: &str) -> Result<Self> {
        let payload = url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| Error::DataUrl("expected a base64 png data url".into()))?;
        let bytes = B64
            .decode(payload.trim().as_bytes())
            .map_err(|e| Error::DataUrl(e.to_string()))?;
        Self::from_png(bytes)
    }

    /// Pixel size without decoding the whole image.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let reader = image::ImageReader::with_format(Cursor::new(&self.png[..]), ImageFormat::Png);
        Ok(reader.into_dimensions()?)
    }
}

impl std::fmt::Debug for SignatureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureImage").field("png_len", &self.png.len()).finish()
    }
}

fn to_rgba_image(raster: &Raster) -> RgbaImage {
    let mut bytes = Vec::with_capacity(raster.pixels.len() * 4);
    for &px in &raster.pixels {
        let c = Rgba::unpack(px);
        bytes.extend_from_slice(&[c.r, c.g, c.b, c.a]);
    }
    // Length always matches width*height*4.
    RgbaImage::from_raw(raster.width as u32, raster.height as u32, bytes)
        .unwrap_or_else(|| RgbaImage::new(raster.width as u32, raster.height as u32))
}

fn from_rgba_image(img: &RgbaImage) -> Raster {
    let (w, h) = img.dimensions();
    let pixels = img
        .pixels()
        .map(|p| Rgba { r: p[0], g: p[1], b: p[2], a: p[3] }.pack())
        .collect();
    Raster { width: w as usize, height: h as usize, pixels }
}

/// Rasterize a surface into a PNG, like `canvas.toDataURL("image/png")`.
pub fn encode(raster: &Raster) -> Result<SignatureImage> {
    let img = DynamicImage::ImageRgba8(to_rgba_image(raster));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(SignatureImage { png: out.into_inner().into() })
}

pub fn decode(image: &SignatureImage) -> Result<Raster> {
    let img = image::load_from_memory_with_format(image.png_bytes(), ImageFormat::Png)?.to_rgba8();
    Ok(from_rgba_image(&img))
}

/// Bilinear rescale to `width` x `height`. Same size returns a plain copy.
pub fn resample(raster: &Raster, width: usize, height: usize) -> Raster {
    if raster.width == width && raster.height == height {
        return raster.clone();
    }
    if raster.width == 0 || raster.height == 0 || width == 0 || height == 0 {
        return Raster::new(width, height);
    }
    let scaled = imageops::resize(&to_rgba_image(raster), width as u32, height as u32, FilterType::Triangle);
    from_rgba_image(&scaled)
}

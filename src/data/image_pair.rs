// ============================================================
// Layer 4 — Paired Raster Codec
// ============================================================
// A packaged example image is one grayscale raster of size
// (2·canvas) × canvas:
//
//   ┌──────────┬──────────┐
//   │  target  │  source  │   ← canvas tall
//   └──────────┴──────────┘
//      canvas     canvas
//
// Decoding splits it into two normalised square images.
// Encoding does the reverse, and is what the packager and the
// tests use to build records.

use std::io::Cursor;

use image::{imageops, DynamicImage, GrayImage, ImageFormat};
use rand::Rng;

use crate::domain::error::{GanError, GanResult};
use crate::domain::example::{denormalize_pixel, normalize_pixel, ImagePair};

/// Decode encoded image bytes into a normalised pair.
pub fn decode_pair(bytes: &[u8], canvas: usize) -> GanResult<ImagePair> {
    let gray = image::load_from_memory(bytes)?.to_luma8();
    split_raster(&gray, canvas)
}

/// Split a (2·canvas × canvas) raster into target (left) and source (right).
pub fn split_raster(gray: &GrayImage, canvas: usize) -> GanResult<ImagePair> {
    let (w, h) = gray.dimensions();
    if w as usize != 2 * canvas || h as usize != canvas {
        return Err(GanError::data(format!(
            "image pair is {w}x{h}, expected {}x{canvas}",
            2 * canvas
        )));
    }
    let mut target = Vec::with_capacity(canvas * canvas);
    let mut source = Vec::with_capacity(canvas * canvas);
    for y in 0..canvas as u32 {
        for x in 0..canvas as u32 {
            target.push(normalize_pixel(gray.get_pixel(x, y).0[0]));
            source.push(normalize_pixel(gray.get_pixel(x + canvas as u32, y).0[0]));
        }
    }
    Ok(ImagePair::new(canvas, source, target))
}

/// Turn normalised pixels back into an 8-bit image.
pub fn to_gray_image(pixels: &[f32], size: usize) -> GanResult<GrayImage> {
    let raw: Vec<u8> = pixels.iter().map(|&v| denormalize_pixel(v)).collect();
    let len = raw.len();
    GrayImage::from_raw(size as u32, size as u32, raw).ok_or_else(|| {
        GanError::data(format!("{len} pixels do not fill a {size}x{size} image"))
    })
}

/// Lay out a pair in the packaged orientation and encode it as PNG.
pub fn encode_pair_png(pair: &ImagePair) -> GanResult<Vec<u8>> {
    let size = pair.size as u32;
    let mut sheet = GrayImage::new(size * 2, size);
    imageops::replace(&mut sheet, &to_gray_image(&pair.target, pair.size)?, 0, 0);
    imageops::replace(&mut sheet, &to_gray_image(&pair.source, pair.size)?, size as i64, 0);
    encode_png(sheet)
}

pub fn encode_png(img: GrayImage) -> GanResult<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Random zoom-and-crop applied identically to both halves so the
/// pair stays aligned. Scale is drawn from [1.0, 1.2).
pub fn augment_pair<R: Rng>(pair: &ImagePair, rng: &mut R) -> GanResult<ImagePair> {
    let size   = pair.size as u32;
    let scale  = rng.gen_range(1.0f32..1.2);
    let zoomed = ((size as f32) * scale).round() as u32;
    if zoomed <= size {
        return Ok(pair.clone());
    }
    let max_off = zoomed - size;
    let off_x   = rng.gen_range(0..=max_off);
    let off_y   = rng.gen_range(0..=max_off);

    let shift = |pixels: &[f32]| -> GanResult<Vec<f32>> {
        let img  = to_gray_image(pixels, pair.size)?;
        let big  = imageops::resize(&img, zoomed, zoomed, imageops::FilterType::Triangle);
        let crop = imageops::crop_imm(&big, off_x, off_y, size, size).to_image();
        Ok(crop.pixels().map(|p| normalize_pixel(p.0[0])).collect())
    };
    Ok(ImagePair::new(pair.size, shift(&pair.source)?, shift(&pair.target)?))
}

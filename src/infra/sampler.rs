// ============================================================
// Layer 6 — Image Sampler
// ============================================================
// Writes what the generator produces to PNG files.
//
//   ImageSampler — SampleSink for the trainer: one sheet per
//                  sample step, one row per validation glyph,
//                  laid out  source | target | generated
//   GlyphWriter  — one PNG per generated glyph (the infer command)

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{imageops, GrayImage, ImageFormat};

use crate::data::image_pair::to_gray_image;
use crate::domain::error::{GanError, GanResult};
use crate::domain::traits::{SampleSheet, SampleSink};

// ─── ImageSampler ─────────────────────────────────────────────────────────────
pub struct ImageSampler {
    dir: PathBuf,
}

impl ImageSampler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn sheet_path(&self, epoch: usize, step: usize) -> PathBuf {
        self.dir.join(format!("sample_{epoch:02}_{step:04}.png"))
    }
}

/// Stack rows of `[source | target | generated]`.
pub fn compose_sheet(sheet: &SampleSheet) -> GanResult<GrayImage> {
    let rows = sheet.generated.len();
    if rows == 0 || sheet.sources.len() != rows || sheet.targets.len() != rows {
        return Err(GanError::data(format!(
            "sample sheet needs matching rows, got {} sources, {} targets, {} generated",
            sheet.sources.len(), sheet.targets.len(), rows
        )));
    }
    let size = sheet.size as u32;
    let mut canvas = GrayImage::new(3 * size, rows as u32 * size);
    for row in 0..rows {
        let panels = [&sheet.sources[row], &sheet.targets[row], &sheet.generated[row]];
        for (col, pixels) in panels.into_iter().enumerate() {
            let tile = to_gray_image(pixels, sheet.size)?;
            imageops::replace(&mut canvas, &tile, (col as u32 * size) as i64, (row as u32 * size) as i64);
        }
    }
    Ok(canvas)
}

impl SampleSink for ImageSampler {
    fn write_sample(&mut self, sheet: &SampleSheet) -> GanResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.sheet_path(sheet.epoch, sheet.step);
        compose_sheet(sheet)?.save_with_format(&path, ImageFormat::Png)?;
        tracing::info!("Sample saved: '{}'", path.display());
        Ok(())
    }
}

// ─── GlyphWriter ──────────────────────────────────────────────────────────────
pub struct GlyphWriter {
    dir: PathBuf,
}

impl GlyphWriter {
    pub fn create(dir: &Path) -> GanResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn write(&self, name: &str, pixels: &[f32], size: usize) -> GanResult<PathBuf> {
        let path = self.dir.join(format!("{name}.png"));
        to_gray_image(pixels, size)?.save_with_format(&path, ImageFormat::Png)?;
        Ok(path)
    }
}

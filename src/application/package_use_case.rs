// ============================================================
// Layer 2 — PackageUseCase
// ============================================================
// Turns a directory of rasterised pair images into the two
// record stores a training run reads:
//
//   Step 1: List `*.png` files in the input directory
//   Step 2: Split into train / validation         (Layer 4 - data)
//   Step 3: Write train.obj and val.obj           (Layer 4 - data)
//
// File names carry the labels: `<style>_<rest>.png`, and in
// fixed-sample mode `<style>_<unicode>_<rest>.png`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::record_store::{RecordPayload, RecordWriter};
use crate::data::splitter::{split_by_file_name, split_train_val};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    pub input_dir:    String,
    pub save_dir:     String,
    /// Fraction of images sent to validation in random mode
    pub split_ratio:  f64,
    /// Split by file name and keep the unicode field
    pub fixed_sample: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            input_dir:    "paired_images".to_string(),
            save_dir:     "experiment/data".to_string(),
            split_ratio:  0.1,
            fixed_sample: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageReport {
    pub train:   usize,
    pub val:     usize,
    pub skipped: usize,
}

pub struct PackageUseCase {
    config: PackageConfig,
}

impl PackageUseCase {
    pub fn new(config: PackageConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PackageReport> {
        let cfg = &self.config;
        if !(0.0..=1.0).contains(&cfg.split_ratio) {
            anyhow::bail!("split_ratio must lie in [0, 1], got {}", cfg.split_ratio);
        }

        // ── Step 1: Collect images ────────────────────────────────────────────
        let paths = list_png(Path::new(&cfg.input_dir))?;
        tracing::info!("Found {} images in '{}'", paths.len(), cfg.input_dir);

        // ── Step 2: Split ─────────────────────────────────────────────────────
        let (train, val) = if cfg.fixed_sample {
            split_by_file_name(paths)
        } else {
            split_train_val(paths, 1.0 - cfg.split_ratio)
        };

        // ── Step 3: Write record stores ───────────────────────────────────────
        let save_dir = PathBuf::from(&cfg.save_dir);
        fs::create_dir_all(&save_dir)
            .with_context(|| format!("Cannot create '{}'", save_dir.display()))?;
        let (train_n, train_skipped) = self.write_store(&train, &save_dir.join("train.obj"))?;
        let (val_n, val_skipped)     = self.write_store(&val, &save_dir.join("val.obj"))?;

        let report = PackageReport { train: train_n, val: val_n, skipped: train_skipped + val_skipped };
        tracing::info!(
            "Packaged {} train and {} validation records ({} skipped) into '{}'",
            report.train, report.val, report.skipped, save_dir.display()
        );
        Ok(report)
    }

    fn write_store(&self, paths: &[PathBuf], out: &Path) -> Result<(usize, usize)> {
        let mut writer = RecordWriter::create(out)
            .with_context(|| format!("Cannot create record store '{}'", out.display()))?;
        let mut skipped = 0;
        for path in paths {
            match payload_for(path, self.config.fixed_sample)? {
                Some(record) => writer.append(&record)?,
                None => {
                    tracing::warn!("Skipping '{}': file name carries no usable label", path.display());
                    skipped += 1;
                }
            }
        }
        Ok((writer.finish()?, skipped))
    }
}

fn list_png(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read image directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// None when the file name doesn't follow the naming scheme.
fn payload_for(path: &Path, fixed_sample: bool) -> Result<Option<RecordPayload>> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let mut fields = stem.split('_');
    let Some(label) = fields.next().and_then(|f| f.parse::<u32>().ok()) else {
        return Ok(None);
    };
    let unicode = fields.next().map(str::to_string);

    let image = fs::read(path).with_context(|| format!("Cannot read '{}'", path.display()))?;
    Ok(match (fixed_sample, unicode) {
        (true, Some(unicode)) => Some(RecordPayload::FixedSample { label, unicode, image }),
        (true, None)          => None,
        (false, _)            => Some(RecordPayload::Labeled { label, image }),
    })
}

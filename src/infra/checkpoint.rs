// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the full training state of an experiment.
//
// File naming convention:
//   checkpoint/experiment_<id>/
//     model_config.json          ← architecture, checked on resume
//     train_config.json          ← every option of the run
//     step_500/
//       generator.mpk            ← parameters, full precision
//       discriminator.mpk
//       optim_generator.mpk      ← Adam moments
//       optim_discriminator.mpk
//       state.json               ← global_step, epoch, learning_rate
//     step_1000/ …
//
// A checkpoint is written into step_<n>.tmp/ and renamed into
// place once complete; "latest" is the highest complete step_<n>.
// Full precision keeps a resumed model bit-identical to the one
// that was saved.

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::{GanError, GanResult};
use crate::ml::discriminator::Discriminator;
use crate::ml::generator::Generator;
use crate::ml::model::ModelConfig;

type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

const MODEL_CONFIG: &str = "model_config.json";
const TRAIN_CONFIG: &str = "train_config.json";
const STATE: &str = "state.json";
const STEP_PREFIX: &str = "step_";

/// Progress counters persisted with every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Optimizer steps taken so far
    pub global_step:   usize,
    /// Epoch in progress (equal to the epoch count once finished)
    pub epoch:         usize,
    pub learning_rate: f64,
}

impl TrainingState {
    pub fn fresh(learning_rate: f64) -> Self {
        Self { global_step: 0, epoch: 0, learning_rate }
    }
}

/// Everything restored from one checkpoint.
pub struct RestoredTraining<B: AutodiffBackend, OG, OD> {
    pub generator:     Generator<B>,
    pub discriminator: Discriminator<B>,
    pub optim_g:       OG,
    pub optim_d:       OD,
    pub state:         TrainingState,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn step_dir(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{STEP_PREFIX}{step}"))
    }

    // ─── Configs ──────────────────────────────────────────────────────────────

    pub fn save_model_config(&self, cfg: &ModelConfig) -> GanResult<()> {
        self.write_json(MODEL_CONFIG, cfg)
    }

    /// None when no run has written a model config yet.
    pub fn load_model_config(&self) -> GanResult<Option<ModelConfig>> {
        let path = self.dir.join(MODEL_CONFIG);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let cfg = serde_json::from_str(&json).map_err(|e| {
            GanError::checkpoint(format!("unreadable '{}': {e}", path.display()))
        })?;
        Ok(Some(cfg))
    }

    pub fn save_train_config(&self, cfg: &TrainConfig) -> GanResult<()> {
        self.write_json(TRAIN_CONFIG, cfg)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> GanResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    // ─── Step discovery ───────────────────────────────────────────────────────

    /// Every complete checkpoint step, ascending.
    pub fn steps(&self) -> GanResult<Vec<usize>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut steps = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let step = name
                .to_str()
                .and_then(|n| n.strip_prefix(STEP_PREFIX))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(step) = step {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    pub fn latest_step(&self) -> GanResult<Option<usize>> {
        Ok(self.steps()?.last().copied())
    }

    // ─── Save ─────────────────────────────────────────────────────────────────

    pub fn save<B, OG, OD>(
        &self,
        generator:     &Generator<B>,
        discriminator: &Discriminator<B>,
        optim_g:       &OG,
        optim_d:       &OD,
        state:         &TrainingState,
    ) -> GanResult<PathBuf>
    where
        B:  AutodiffBackend,
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Discriminator<B>, B>,
    {
        let final_dir = self.step_dir(state.global_step);
        let tmp_dir   = self.dir.join(format!("{STEP_PREFIX}{}.tmp", state.global_step));
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        let recorder = CheckpointRecorder::new();
        record(&recorder, generator.clone().into_record(), tmp_dir.join("generator"))?;
        record(&recorder, discriminator.clone().into_record(), tmp_dir.join("discriminator"))?;
        record(&recorder, optim_g.to_record(), tmp_dir.join("optim_generator"))?;
        record(&recorder, optim_d.to_record(), tmp_dir.join("optim_discriminator"))?;
        fs::write(tmp_dir.join(STATE), serde_json::to_string_pretty(state)?)?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        tracing::info!(
            "Checkpoint saved: step {} (epoch {}) → '{}'",
            state.global_step, state.epoch, final_dir.display()
        );
        Ok(final_dir)
    }

    // ─── Load ─────────────────────────────────────────────────────────────────

    pub fn load_state(&self, step: usize) -> GanResult<TrainingState> {
        let path = self.step_dir(step).join(STATE);
        let json = fs::read_to_string(&path).map_err(|e| {
            GanError::checkpoint(format!("cannot read '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            GanError::checkpoint(format!("unreadable '{}': {e}", path.display()))
        })
    }

    /// Restore networks, optimizer moments and counters from `step`.
    pub fn load_training<B, OG, OD>(
        &self,
        step:          usize,
        generator:     Generator<B>,
        discriminator: Discriminator<B>,
        optim_g:       OG,
        optim_d:       OD,
        device:        &B::Device,
    ) -> GanResult<RestoredTraining<B, OG, OD>>
    where
        B:  AutodiffBackend,
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Discriminator<B>, B>,
    {
        let dir = self.step_dir(step);
        let recorder = CheckpointRecorder::new();

        let generator     = generator.load_record(load::<B, _>(&recorder, dir.join("generator"), device)?);
        let discriminator = discriminator.load_record(load::<B, _>(&recorder, dir.join("discriminator"), device)?);
        let optim_g       = optim_g.load_record(load::<B, _>(&recorder, dir.join("optim_generator"), device)?);
        let optim_d       = optim_d.load_record(load::<B, _>(&recorder, dir.join("optim_discriminator"), device)?);
        let state         = self.load_state(step)?;

        tracing::info!("Restored checkpoint step {} from '{}'", step, dir.display());
        Ok(RestoredTraining { generator, discriminator, optim_g, optim_d, state })
    }

    /// Generator weights of the latest checkpoint, for inference.
    pub fn load_latest_generator<B: Backend>(
        &self,
        generator: Generator<B>,
        device:    &B::Device,
    ) -> GanResult<(Generator<B>, usize)> {
        let step = self.latest_step()?.ok_or_else(|| {
            GanError::checkpoint(format!(
                "no checkpoint under '{}'. Have you run 'train' first?",
                self.dir.display()
            ))
        })?;
        let recorder = CheckpointRecorder::new();
        let record = load::<B, _>(&recorder, self.step_dir(step).join("generator"), device)?;
        Ok((generator.load_record(record), step))
    }
}

fn record<B: Backend, R: burn::record::Record<B>>(
    recorder: &CheckpointRecorder,
    item:     R,
    path:     PathBuf,
) -> GanResult<()> {
    Recorder::<B>::record(recorder, item, path.clone()).map_err(|e| {
        GanError::checkpoint(format!("cannot write '{}': {e}", path.display()))
    })
}

fn load<B: Backend, R: burn::record::Record<B>>(
    recorder: &CheckpointRecorder,
    path:     PathBuf,
    device:   &B::Device,
) -> GanResult<R> {
    Recorder::<B>::load(recorder, path.clone(), device).map_err(|e| {
        GanError::checkpoint(format!("cannot restore '{}': {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_ignore_partial_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path());
        for name in ["step_5", "step_10", "step_15.tmp", "notes"] {
            fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        fs::write(tmp.path().join("step_99"), b"file, not dir").unwrap();
        assert_eq!(mgr.steps().unwrap(), vec![5, 10]);
        assert_eq!(mgr.latest_step().unwrap(), Some(10));
    }

    #[test]
    fn test_missing_dir_has_no_steps() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path().join("absent"));
        assert_eq!(mgr.latest_step().unwrap(), None);
        assert!(mgr.load_model_config().unwrap().is_none());
    }

    #[test]
    fn test_model_config_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path());
        let cfg = ModelConfig::new(64, 3, 16).with_inst_norm(true);
        mgr.save_model_config(&cfg).unwrap();
        let loaded = mgr.load_model_config().unwrap().unwrap();
        assert!(cfg.ensure_compatible(&loaded).is_ok());
    }

    #[test]
    fn test_missing_state_is_checkpoint_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path());
        assert!(matches!(mgr.load_state(3), Err(GanError::Checkpoint(_))));
    }
}

// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `package`, `train` and `infer`
// and all their configurable flags.

use clap::{ArgAction, Args, Subcommand, ValueEnum};

use crate::application::infer_use_case::InferConfig;
use crate::application::package_use_case::PackageConfig;
use crate::application::train_use_case::TrainConfig;
use crate::domain::style::FineTuneScope;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack paired glyph images into train.obj / val.obj record stores
    Package(PackageArgs),

    /// Train (or resume training) an experiment
    Train(TrainArgs),

    /// Render glyphs with the latest checkpoint of an experiment
    Infer(InferArgs),
}

// ─── package ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Directory of `<style>_<...>.png` pair images
    #[arg(long = "dir")]
    pub input_dir: String,

    /// Where train.obj and val.obj are written (usually <experiment_dir>/data)
    #[arg(long)]
    pub save_dir: String,

    /// Fraction of images sent to validation
    #[arg(long, default_value_t = 0.1)]
    pub split_ratio: f64,

    /// Split by file name (`val` in the name) and keep the unicode field
    #[arg(long)]
    pub fixed_sample: bool,
}

impl From<PackageArgs> for PackageConfig {
    fn from(a: PackageArgs) -> Self {
        PackageConfig {
            input_dir:    a.input_dir,
            save_dir:     a.save_dir,
            split_ratio:  a.split_ratio,
            fixed_sample: a.fixed_sample,
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ScopeArg {
    Embedding,
    EmbeddingAndClassifier,
}

impl From<ScopeArg> for FineTuneScope {
    fn from(s: ScopeArg) -> Self {
        match s {
            ScopeArg::Embedding => FineTuneScope::Embedding,
            ScopeArg::EmbeddingAndClassifier => FineTuneScope::EmbeddingAndClassifier,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Experiment root: holds data/, checkpoint/, sample/ and logs/
    #[arg(long)]
    pub experiment_dir: String,

    #[arg(long, default_value_t = 0)]
    pub experiment_id: usize,

    #[arg(long, default_value_t = 128)]
    pub image_size: usize,

    /// Weight of the L1 reconstruction loss
    #[arg(long = "L1_penalty", default_value_t = 100.0)]
    pub l1_penalty: f64,

    /// Weight of the bottleneck consistency loss
    #[arg(long = "Lconst_penalty", default_value_t = 15.0)]
    pub lconst_penalty: f64,

    /// Weight of the total-variation loss, 0 disables it
    #[arg(long = "Ltv_penalty", default_value_t = 0.0)]
    pub ltv_penalty: f64,

    /// Weight of the style classification loss
    #[arg(long = "Lcategory_penalty", default_value_t = 1.0)]
    pub lcategory_penalty: f64,

    /// Number of styles (rows of the embedding table)
    #[arg(long, default_value_t = 40)]
    pub embedding_num: usize,

    #[arg(long, default_value_t = 128)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 100)]
    pub epoch: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.001)]
    pub lr: f64,

    /// Epochs between learning-rate halvings
    #[arg(long, default_value_t = 10)]
    pub schedule: usize,

    /// Resume from the latest checkpoint (`--resume false` to start over)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub resume: bool,

    /// Keep the encoder fixed
    #[arg(long)]
    pub freeze_encoder: bool,

    /// Only update these style ids, e.g. "1,4,7"
    #[arg(long)]
    pub fine_tune: Option<String>,

    /// Which parameters the fine-tune restriction covers
    #[arg(long, value_enum, default_value = "embedding")]
    pub fine_tune_scope: ScopeArg,

    /// Conditional instance normalisation in the decoder
    #[arg(long)]
    pub inst_norm: bool,

    #[arg(long, default_value_t = 10)]
    pub sample_steps: usize,

    #[arg(long, default_value_t = 500)]
    pub checkpoint_steps: usize,

    /// Swap source and target on alternate steps
    #[arg(long)]
    pub flip_labels: bool,

    /// Skip validation samples
    #[arg(long)]
    pub no_val: bool,

    #[arg(long, default_value_t = 64)]
    pub generator_dim: usize,

    #[arg(long, default_value_t = 64)]
    pub discriminator_dim: usize,

    /// Floor of the learning-rate schedule
    #[arg(long, default_value_t = 0.0002)]
    pub min_lr: f64,

    #[arg(long, default_value_t = 0.5)]
    pub beta1: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Random zoom-and-crop of every training pair
    #[arg(long)]
    pub augment: bool,

    /// Largest tolerated share of bad records per batch-sized window
    #[arg(long, default_value_t = 0.1)]
    pub max_bad_record_fraction: f64,

    /// Log losses every N steps
    #[arg(long, default_value_t = 1)]
    pub log_steps: usize,

    /// Train on the CPU (ndarray) instead of the GPU (wgpu)
    #[arg(long)]
    pub cpu: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            experiment_dir:    a.experiment_dir,
            experiment_id:     a.experiment_id,
            image_size:        a.image_size,
            l1_penalty:        a.l1_penalty,
            lconst_penalty:    a.lconst_penalty,
            ltv_penalty:       a.ltv_penalty,
            lcategory_penalty: a.lcategory_penalty,
            embedding_num:     a.embedding_num,
            embedding_dim:     a.embedding_dim,
            epoch:             a.epoch,
            batch_size:        a.batch_size,
            lr:                a.lr,
            schedule:          a.schedule,
            resume:            a.resume,
            freeze_encoder:    a.freeze_encoder,
            fine_tune:         a.fine_tune,
            inst_norm:         a.inst_norm,
            sample_steps:      a.sample_steps,
            checkpoint_steps:  a.checkpoint_steps,
            flip_labels:       a.flip_labels,
            no_val:            a.no_val,
            generator_dim:     a.generator_dim,
            discriminator_dim: a.discriminator_dim,
            min_lr:            a.min_lr,
            beta1:             a.beta1,
            seed:              a.seed,
            augment:           a.augment,
            fine_tune_scope:   a.fine_tune_scope.into(),
            max_bad_record_fraction: a.max_bad_record_fraction,
            log_steps:         a.log_steps,
            cpu:               a.cpu,
        }
    }
}

// ─── infer ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct InferArgs {
    #[arg(long)]
    pub experiment_dir: String,

    #[arg(long, default_value_t = 0)]
    pub experiment_id: usize,

    /// Record store whose source glyphs are rendered
    #[arg(long)]
    pub source_obj: String,

    /// Style to render in
    #[arg(long)]
    pub style_id: usize,

    #[arg(long, default_value = "generated")]
    pub output_dir: String,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long)]
    pub cpu: bool,
}

impl From<InferArgs> for InferConfig {
    fn from(a: InferArgs) -> Self {
        InferConfig {
            experiment_dir: a.experiment_dir,
            experiment_id:  a.experiment_id,
            source_obj:     a.source_obj,
            style_id:       a.style_id,
            output_dir:     a.output_dir,
            batch_size:     a.batch_size,
            cpu:            a.cpu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "glyph-gan", "train",
            "--experiment-dir", "exp",
            "--L1_penalty", "50",
            "--fine-tune", "1,2",
            "--resume", "false",
            "--fine-tune-scope", "embedding-and-classifier",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.l1_penalty, 50.0);
        assert!(!cfg.resume);
        assert_eq!(cfg.fine_tune.as_deref(), Some("1,2"));
        assert_eq!(cfg.fine_tune_scope, FineTuneScope::EmbeddingAndClassifier);
        assert_eq!(cfg.lconst_penalty, 15.0);
    }
}

mod common;

use burn::prelude::*;
use common::{dataset, tiny_config, TrainBackend};
use glyph_gan::application::train_use_case::TrainConfig;
use glyph_gan::data::batcher::GlyphBatch;
use glyph_gan::data::dataset::GlyphDataset;
use glyph_gan::domain::error::GanError;
use glyph_gan::domain::phase::TrainerPhase;
use glyph_gan::domain::style::{FineTuneScope, StyleId};
use glyph_gan::ml::session::Session;
use glyph_gan::ml::trainer::build_trainer;

fn trainer(
    cfg: TrainConfig,
    train: GlyphDataset,
) -> glyph_gan::domain::error::GanResult<
    glyph_gan::ml::trainer::GanTrainer<
        TrainBackend,
        impl burn::optim::Optimizer<glyph_gan::ml::generator::Generator<TrainBackend>, TrainBackend> + Clone,
        impl burn::optim::Optimizer<glyph_gan::ml::discriminator::Discriminator<TrainBackend>, TrainBackend> + Clone,
    >,
> {
    let session = Session::<TrainBackend>::new(Default::default(), cfg.seed);
    let mode = cfg.build_mode();
    build_trainer(session, cfg, mode, train, GlyphDataset::new(Vec::new()))
}

#[test]
fn test_one_epoch_run_writes_two_checkpoints() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(tiny_config(tmp.path()), dataset(100, 2)).unwrap();
    assert_eq!(t.phase(), TrainerPhase::Built);
    assert_eq!(t.batches_per_epoch(), 10);

    let report = t.run().unwrap();
    assert_eq!(report.batches, 10);
    assert_eq!(report.checkpoints_written, 2);
    assert_eq!(report.final_step, 10);
    assert_eq!(report.phase, TrainerPhase::Stopped);
    assert_eq!(t.checkpoints().steps().unwrap(), vec![5, 10]);

    let exp = tmp.path().join("checkpoint/experiment_0");
    assert!(exp.join("model_config.json").exists());
    assert!(exp.join("train_config.json").exists());
    assert!(exp.join("step_10/generator.mpk").exists());
    assert!(exp.join("step_10/state.json").exists());
    // lock released on stop
    assert!(!exp.join(".lock").exists());
    assert!(tmp.path().join("logs/experiment_0/metrics.csv").exists());
}

#[test]
fn test_final_checkpoint_when_last_step_unaligned() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { checkpoint_steps: 4, ..tiny_config(tmp.path()) };
    let report = trainer(cfg, dataset(100, 2)).unwrap().run().unwrap();
    // steps 4 and 8, then the final step 10
    assert_eq!(report.checkpoints_written, 3);
}

#[test]
fn test_resume_without_checkpoint_starts_fresh() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { epoch: 1, checkpoint_steps: 100, ..tiny_config(tmp.path()) };
    let report = trainer(cfg, dataset(20, 2)).unwrap().run().unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.phase, TrainerPhase::Stopped);
}

#[test]
fn test_zero_step_resume_is_bit_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let mut first = trainer(tiny_config(tmp.path()), dataset(100, 2)).unwrap();
    first.run().unwrap();
    let saved = first.snapshot().unwrap();
    drop(first);

    let mut resumed = trainer(tiny_config(tmp.path()), dataset(100, 2)).unwrap();
    let report = resumed.run().unwrap();
    assert_eq!(report.batches, 0);
    assert_eq!(report.checkpoints_written, 0);
    assert_eq!(report.final_step, 10);
    assert_eq!(resumed.snapshot().unwrap(), saved);
}

#[test]
fn test_resume_with_different_architecture_fails() {
    let tmp = tempfile::tempdir().unwrap();
    trainer(tiny_config(tmp.path()), dataset(20, 2)).unwrap().run().unwrap();

    let cfg = TrainConfig { embedding_dim: 8, ..tiny_config(tmp.path()) };
    let mut t = trainer(cfg, dataset(20, 2)).unwrap();
    assert!(matches!(t.start(), Err(GanError::Checkpoint(_))));
}

#[test]
fn test_second_trainer_is_locked_out() {
    let tmp = tempfile::tempdir().unwrap();
    let mut a = trainer(tiny_config(tmp.path()), dataset(20, 2)).unwrap();
    a.start().unwrap();
    let mut b = trainer(tiny_config(tmp.path()), dataset(20, 2)).unwrap();
    assert!(matches!(b.start(), Err(GanError::Checkpoint(_))));
}

#[test]
fn test_fine_tune_leaves_other_embedding_rows_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { fine_tune: Some("1".into()), ..tiny_config(tmp.path()) };
    let mut t = trainer(cfg, dataset(20, 2)).unwrap();
    t.start().unwrap();

    let before = t.snapshot().unwrap();
    let batch = t.make_batch(&(0..10).collect::<Vec<_>>());
    t.step_batch(batch).unwrap();
    let after = t.snapshot().unwrap();

    assert_eq!(after.embedding_row(StyleId(0)), before.embedding_row(StyleId(0)));
    assert_ne!(after.embedding_row(StyleId(1)), before.embedding_row(StyleId(1)));
    // classifier head is unrestricted with the default scope
    assert_ne!(after.discriminator_classifier, before.discriminator_classifier);
}

#[test]
fn test_fine_tune_classifier_scope_holds_columns() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig {
        fine_tune: Some("1".into()),
        fine_tune_scope: FineTuneScope::EmbeddingAndClassifier,
        ..tiny_config(tmp.path())
    };
    let mut t = trainer(cfg, dataset(20, 2)).unwrap();
    t.start().unwrap();

    // weight [C, 2] row-major, then bias [2]: style 0 is every even entry
    let column0 = |v: &[f32]| v.iter().step_by(2).copied().collect::<Vec<_>>();
    let column1 = |v: &[f32]| v.iter().skip(1).step_by(2).copied().collect::<Vec<_>>();

    let before = t.snapshot().unwrap();
    let batch = t.make_batch(&(0..10).collect::<Vec<_>>());
    t.step_batch(batch).unwrap();
    let after = t.snapshot().unwrap();

    assert_eq!(column0(&after.discriminator_classifier), column0(&before.discriminator_classifier));
    assert_ne!(column1(&after.discriminator_classifier), column1(&before.discriminator_classifier));
}

#[test]
fn test_freeze_encoder_keeps_encoder_fixed() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { freeze_encoder: true, ..tiny_config(tmp.path()) };
    let mut t = trainer(cfg, dataset(20, 2)).unwrap();
    t.start().unwrap();

    let before = t.snapshot().unwrap();
    let batch = t.make_batch(&(0..10).collect::<Vec<_>>());
    t.step_batch(batch).unwrap();
    let after = t.snapshot().unwrap();

    assert_eq!(after.encoder, before.encoder);
    assert_ne!(after.decoder, before.decoder);
    assert_eq!(t.state().global_step, 1);
}

#[test]
fn test_non_finite_loss_is_divergence() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(tiny_config(tmp.path()), dataset(20, 2)).unwrap();
    t.start().unwrap();

    let batch = t.make_batch(&(0..10).collect::<Vec<_>>());
    let poisoned = GlyphBatch { source: batch.source.clone() * f32::NAN, ..batch };
    let err = t.step_batch(poisoned).unwrap_err();
    assert!(matches!(err, GanError::Divergence { step: 1, .. }));
    assert_eq!(t.state().global_step, 0);
}

#[test]
fn test_step_requires_running_phase() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(tiny_config(tmp.path()), dataset(20, 2)).unwrap();
    let batch = t.make_batch(&[0, 1]);
    assert!(matches!(t.step_batch(batch), Err(GanError::Config(_))));
}

#[test]
fn test_samples_written_at_sample_steps() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { no_val: false, sample_steps: 1, ..tiny_config(tmp.path()) };
    let session = Session::<TrainBackend>::new(Default::default(), cfg.seed);
    let mode = cfg.build_mode();
    let mut t = build_trainer(session, cfg, mode, dataset(20, 2), dataset(5, 2)).unwrap();
    t.run().unwrap();

    let samples = tmp.path().join("sample/experiment_0");
    assert!(samples.join("sample_00_0001.png").exists());
    assert!(samples.join("sample_00_0002.png").exists());
}

#[test]
fn test_generator_and_discriminator_shapes() {
    let tmp = tempfile::tempdir().unwrap();
    let t = trainer(tiny_config(tmp.path()), dataset(20, 2)).unwrap();
    let batch = t.make_batch(&[0, 1, 2]);

    let out = t.generator().generate(batch.source.clone(), &batch.styles).unwrap();
    assert_eq!(out.image.dims(), [3, 1, 16, 16]);

    let judged = t.discriminator().discriminate(batch.source, out.image);
    assert_eq!(judged.realness.dims(), [3, 1, 2, 2]);
    assert_eq!(judged.style_logits.dims(), [3, 2]);

    let bad = t.generator().generate(batch.target, &[StyleId(0), StyleId(1), StyleId(2)]);
    assert!(bad.is_err());
}

#[test]
fn test_fine_tune_holds_conditional_norm_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { fine_tune: Some("1".into()), inst_norm: true, ..tiny_config(tmp.path()) };
    let mut t = trainer(cfg, dataset(20, 2)).unwrap();
    t.start().unwrap();

    let before = t.snapshot().unwrap();
    assert!(!before.style_norm_row(StyleId(0)).is_empty());
    let batch = t.make_batch(&(0..10).collect::<Vec<_>>());
    t.step_batch(batch).unwrap();
    let after = t.snapshot().unwrap();

    assert_eq!(after.style_norm_row(StyleId(0)), before.style_norm_row(StyleId(0)));
    assert_ne!(after.style_norm_row(StyleId(1)), before.style_norm_row(StyleId(1)));
    assert_eq!(after.embedding_row(StyleId(0)), before.embedding_row(StyleId(0)));
}

#[test]
fn test_fine_tune_after_resume_holds_frozen_rows() {
    let tmp = tempfile::tempdir().unwrap();
    // a plain run leaves non-zero Adam moments on every style row
    let cfg = TrainConfig { inst_norm: true, ..tiny_config(tmp.path()) };
    trainer(cfg, dataset(20, 2)).unwrap().run().unwrap();

    let cfg = TrainConfig { inst_norm: true, fine_tune: Some("1".into()), ..tiny_config(tmp.path()) };
    let mut t = trainer(cfg, dataset(20, 2)).unwrap();
    t.start().unwrap();
    assert_eq!(t.state().global_step, 2);

    let before = t.snapshot().unwrap();
    for _ in 0..2 {
        let batch = t.make_batch(&(0..10).collect::<Vec<_>>());
        t.step_batch(batch).unwrap();
    }
    let after = t.snapshot().unwrap();

    assert_eq!(after.embedding_row(StyleId(0)), before.embedding_row(StyleId(0)));
    assert_eq!(after.style_norm_row(StyleId(0)), before.style_norm_row(StyleId(0)));
    assert_ne!(after.embedding_row(StyleId(1)), before.embedding_row(StyleId(1)));
}

#[test]
fn test_flip_labels_run_completes() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { flip_labels: true, epoch: 2, ..tiny_config(tmp.path()) };
    assert!(cfg.build_mode().no_target_source);
    let report = trainer(cfg, dataset(20, 2)).unwrap().run().unwrap();
    assert_eq!(report.batches, 4);
    assert_eq!(report.final_epoch, 2);
    assert_eq!(report.phase, TrainerPhase::Stopped);
}

#[test]
fn test_no_val_skips_samples() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { no_val: true, sample_steps: 1, ..tiny_config(tmp.path()) };
    let session = Session::<TrainBackend>::new(Default::default(), cfg.seed);
    let mode = cfg.build_mode();
    let mut t = build_trainer(session, cfg, mode, dataset(20, 2), dataset(5, 2)).unwrap();
    let report = t.run().unwrap();

    assert_eq!(report.batches, 2);
    assert!(!tmp.path().join("sample/experiment_0").exists());
}

#[test]
fn test_augmented_run_completes() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainConfig { augment: true, ..tiny_config(tmp.path()) };
    let report = trainer(cfg, dataset(20, 2)).unwrap().run().unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.checkpoints_written, 1);
}

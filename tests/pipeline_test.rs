mod common;

use std::fs;

use common::{example, tiny_config};
use glyph_gan::application::infer_use_case::{InferConfig, InferUseCase};
use glyph_gan::application::package_use_case::{PackageConfig, PackageUseCase};
use glyph_gan::application::train_use_case::{TrainConfig, TrainUseCase};
use glyph_gan::data::image_pair::encode_pair_png;
use glyph_gan::domain::phase::TrainerPhase;

#[test]
fn test_package_train_infer() {
    let raw = tempfile::tempdir().unwrap();
    let exp = tempfile::tempdir().unwrap();

    // ── pair images named <style>_<n>.png ──
    for i in 0..20 {
        let ex = example(i, i % 2);
        let png = encode_pair_png(&ex.pair).unwrap();
        fs::write(raw.path().join(format!("{}_{i:03}.png", i % 2)), png).unwrap();
    }

    let packaged = PackageUseCase::new(PackageConfig {
        input_dir:    raw.path().display().to_string(),
        save_dir:     exp.path().join("data").display().to_string(),
        split_ratio:  0.2,
        fixed_sample: false,
    })
    .execute()
    .unwrap();
    assert_eq!((packaged.train, packaged.val), (16, 4));

    let cfg = TrainConfig { batch_size: 4, ..tiny_config(exp.path()) };
    let report = TrainUseCase::new(cfg).execute().unwrap();
    assert_eq!(report.batches, 4);
    assert_eq!(report.phase, TrainerPhase::Stopped);

    let out = exp.path().join("generated");
    let written = InferUseCase::new(InferConfig {
        experiment_dir: exp.path().display().to_string(),
        experiment_id:  0,
        source_obj:     exp.path().join("data/val.obj").display().to_string(),
        style_id:       1,
        output_dir:     out.display().to_string(),
        batch_size:     3,
        cpu:            true,
    })
    .execute()
    .unwrap();
    assert_eq!(written.len(), 4);
    for path in &written {
        let img = image::open(path).unwrap();
        assert_eq!((img.width(), img.height()), (16, 16));
    }
}

#[test]
fn test_infer_without_training_fails() {
    let exp = tempfile::tempdir().unwrap();
    let result = InferUseCase::new(InferConfig {
        experiment_dir: exp.path().display().to_string(),
        experiment_id:  0,
        source_obj:     exp.path().join("data/val.obj").display().to_string(),
        style_id:       0,
        output_dir:     exp.path().join("out").display().to_string(),
        batch_size:     1,
        cpu:            true,
    })
    .execute();
    assert!(result.is_err());
}

#[test]
fn test_fine_tune_run_filters_styles() {
    let exp = tempfile::tempdir().unwrap();
    let data = exp.path().join("data");
    fs::create_dir_all(&data).unwrap();

    let mut writer = glyph_gan::data::record_store::RecordWriter::create(data.join("train.obj")).unwrap();
    for i in 0..20 {
        let ex = example(i, i % 2);
        writer
            .append(&glyph_gan::data::record_store::RecordPayload::Labeled {
                label: (i % 2) as u32,
                image: encode_pair_png(&ex.pair).unwrap(),
            })
            .unwrap();
    }
    writer.finish().unwrap();

    // only the 10 style-1 examples remain: one batch of 10
    let cfg = TrainConfig { fine_tune: Some("1".into()), ..tiny_config(exp.path()) };
    let report = TrainUseCase::new(cfg).execute().unwrap();
    assert_eq!(report.batches, 1);
}

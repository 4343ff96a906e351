// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and routes each subcommand
// to its use case in Layer 2.
//
//   1. `package` — pair images → record stores
//   2. `train`   — run or resume an experiment
//   3. `infer`   — render glyphs from the latest checkpoint

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, PackageArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "glyph-gan",
    version = "0.1.0",
    about = "Train a conditional GAN that redraws a reference font in learned target styles."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Package(args) => run_package(args),
            Commands::Train(args)   => run_train(args),
            Commands::Infer(args)   => run_infer(args),
        }
    }
}

fn run_package(args: PackageArgs) -> Result<()> {
    use crate::application::package_use_case::PackageUseCase;

    let report = PackageUseCase::new(args.into()).execute()?;
    println!(
        "Packaged {} train / {} validation records ({} skipped).",
        report.train, report.val, report.skipped
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting experiment {} in '{}'", args.experiment_id, args.experiment_dir);
    let report = TrainUseCase::new(args.into()).execute()?;
    println!(
        "Training {}: {} batches, {} checkpoints, final step {}.",
        report.phase, report.batches, report.checkpoints_written, report.final_step
    );
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::InferUseCase;

    let written = InferUseCase::new(args.into()).execute()?;
    println!("Wrote {} glyph images.", written.len());
    Ok(())
}

// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands them to Layer 2.
// The only layer that prints to stdout.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs, InspectArgs, ScoreArgs};

#[derive(Parser, Debug)]
#[command(
    name = "s2s-train",
    version,
    about = "Corpus, batching and BLEU tooling for seq2seq translation training."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Inspect(args) => run_inspect(args),
            Commands::Score(args)   => run_score(args),
            Commands::Config(args)  => run_config(args),
        }
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let json = args.json;
    let report = InspectUseCase::new(args.into()).execute()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Split '{}'", report.split);
    println!("  examples      {:>8}", report.examples);
    println!("  dropped empty {:>8}", report.skipped_empty);
    println!("  dropped long  {:>8}", report.skipped_long);
    println!("  unpaired      {:>8}", report.unpaired);
    println!("  vocab src/trg {:>8} / {}", report.src_vocab, report.trg_vocab);
    println!("  batches       {:>8}  (size {}..={})", report.batches, report.min_batch, report.max_batch);
    println!("  max cost      {:>8}", report.max_cost);
    println!("  padding       {:>7.1}%", report.mean_padding * 100.0);
    println!("  target tokens {:>8}", report.target_tokens);
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<()> {
    use crate::application::score_use_case::ScoreUseCase;

    let report = ScoreUseCase::new(args.into()).execute()?;
    match &report.corpus {
        Some(stats) => println!("{stats}"),
        None => println!("{} BLEU = {:.2} ({} sentences)", report.method, report.percent(), report.sentences),
    }
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    use crate::application::train_use_case::TrainConfig;

    let cfg = TrainConfig::try_from(args)?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

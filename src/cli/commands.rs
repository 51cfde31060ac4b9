// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//   inspect — batching dry run over one corpus split
//   score   — BLEU of a hypothesis file against a reference file
//   config  — print the resolved training configuration as JSON

use clap::{Args, Subcommand};

use crate::application::{
    inspect_use_case::InspectConfig,
    score_use_case::ScoreConfig,
    train_use_case::{resolve_device, CorpusConfig, TrainConfig, DEFAULT_MIN_FREQ},
};
use crate::data::{
    batcher::{BatchConfig, DEFAULT_POOL_FACTOR},
    filter::DEFAULT_MAX_LEN,
    loader::AlignmentPolicy,
};
use crate::infra::side_files::SideFiles;
use crate::ml::{evaluator::BleuMethod, trainer::TrainerConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a split, build its vocabulary and report how it batches
    Inspect(InspectArgs),

    /// Score a hypothesis file against a reference file
    Score(ScoreArgs),

    /// Print the training configuration these flags resolve to
    Config(ConfigArgs),
}

/// Corpus location and loading flags shared by several commands.
#[derive(Args, Debug)]
pub struct CorpusArgs {
    /// Root holding train/, val/ and dev5/
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    #[arg(long, default_value = "pt")]
    pub src_lang: String,

    #[arg(long, default_value = "en")]
    pub trg_lang: String,

    /// Examples with more tokens on either side are dropped
    #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
    pub max_len: usize,

    /// Minimum token frequency for the vocabulary
    #[arg(long, default_value_t = DEFAULT_MIN_FREQ)]
    pub min_freq: usize,

    /// Fail when source and target files differ in line count
    #[arg(long)]
    pub strict: bool,

    /// Directory with tokenizer.<lang>.json files
    #[arg(long)]
    pub tokenizer_dir: Option<String>,
}

impl From<CorpusArgs> for CorpusConfig {
    fn from(a: CorpusArgs) -> Self {
        CorpusConfig {
            data_dir:      a.data_dir,
            src_lang:      a.src_lang,
            trg_lang:      a.trg_lang,
            max_len:       a.max_len,
            min_freq:      a.min_freq,
            alignment:     if a.strict { AlignmentPolicy::Strict } else { AlignmentPolicy::Truncate },
            tokenizer_dir: a.tokenizer_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Split directory under --data-dir
    #[arg(long, default_value = "train")]
    pub split: String,

    /// Token budget per batch
    #[arg(long, default_value_t = 1408)]
    pub budget: usize,

    /// Pool size in multiples of the budget
    #[arg(long, default_value_t = DEFAULT_POOL_FACTOR)]
    pub pool_factor: usize,

    /// Batch like a train pass shuffled with this seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<InspectArgs> for InspectConfig {
    fn from(a: InspectArgs) -> Self {
        InspectConfig {
            corpus:      a.corpus.into(),
            split:       a.split,
            budget:      a.budget,
            pool_factor: a.pool_factor,
            seed:        a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// One detokenised hypothesis per line
    #[arg(long)]
    pub hypotheses: String,

    /// One reference per line, aligned with --hypotheses
    #[arg(long)]
    pub references: String,

    /// sentence | corpus
    #[arg(long, default_value = "corpus")]
    pub method: String,
}

impl From<ScoreArgs> for ScoreConfig {
    fn from(a: ScoreArgs) -> Self {
        ScoreConfig {
            files: SideFiles {
                hypotheses: a.hypotheses.into(),
                references: a.references.into(),
            },
            method: a.method,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    #[arg(long, default_value = "pt_to_en")]
    pub task: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1408)]
    pub train_budget: usize,

    #[arg(long, default_value_t = 1280)]
    pub val_budget: usize,

    #[arg(long, default_value_t = 512)]
    pub bleu_budget: usize,

    /// sentence | corpus | none
    #[arg(long, default_value = "corpus")]
    pub bleu: String,

    /// First epoch that runs the BLEU pass
    #[arg(long, default_value_t = 0)]
    pub bleu_threshold: usize,

    #[arg(long)]
    pub skip_train: bool,

    #[arg(long)]
    pub skip_validation: bool,

    /// Requested compute device (cpu, cuda, ...)
    #[arg(long, default_value = "cpu")]
    pub device: String,
}

impl TryFrom<ConfigArgs> for TrainConfig {
    type Error = crate::domain::PipelineError;

    fn try_from(a: ConfigArgs) -> Result<Self, Self::Error> {
        let bleu_method = match a.bleu.as_str() {
            "none" => None,
            other => Some(other.parse::<BleuMethod>()?),
        };
        let defaults = TrainerConfig::default();
        Ok(TrainConfig {
            task:           a.task,
            checkpoint_dir: a.checkpoint_dir,
            corpus:         a.corpus.into(),
            trainer: TrainerConfig {
                epochs: a.epochs,
                batch: BatchConfig {
                    train_budget: a.train_budget,
                    val_budget:   a.val_budget,
                    bleu_budget:  a.bleu_budget,
                    seed:         a.seed,
                    ..BatchConfig::default()
                },
                run_train:      !a.skip_train,
                run_validation: !a.skip_validation,
                bleu_method,
                bleu_threshold: a.bleu_threshold,
                ..defaults
            },
            device: resolve_device(&a.device),
        })
    }
}

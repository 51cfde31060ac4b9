// Drives the crate through its public library surface.

use clap::Parser;
use seq2seq_bleu_trainer::{
    application::score_use_case::{ScoreConfig, ScoreUseCase},
    cli::Cli,
    infra::side_files::SideFiles,
    ml::evaluator::BleuMethod,
};
use std::fs;

fn side_files(dir: &std::path::Path) -> SideFiles {
    let files = SideFiles::in_dir(dir, "lib");
    fs::write(&files.hypotheses, "the cat sat on the mat\nhello there\n").unwrap();
    fs::write(&files.references, "the cat sat on the mat\nhello there\n").unwrap();
    files
}

#[test]
fn test_score_use_case_is_reachable_from_library() {
    let dir = tempfile::tempdir().unwrap();
    let report = ScoreUseCase::new(ScoreConfig {
        files:  side_files(dir.path()),
        method: "corpus".into(),
    })
    .execute()
    .unwrap();

    assert_eq!(report.method, BleuMethod::Corpus);
    assert!(report.corpus.is_some());
    assert_eq!(report.sentences, 2);
    assert!((report.score - 1.0).abs() < 1e-9);
}

#[test]
fn test_cli_parses_and_runs_from_library() {
    let dir = tempfile::tempdir().unwrap();
    let files = side_files(dir.path());
    let cli = Cli::try_parse_from([
        "s2s-train",
        "score",
        "--hypotheses",
        files.hypotheses.to_str().unwrap(),
        "--references",
        files.references.to_str().unwrap(),
    ])
    .unwrap();
    cli.run().unwrap();
}

mod util;

use assert_cmd::Command;
use assert_fs::prelude::*;
use clap::Parser;
use predicates::prelude::*;
use serde::Deserialize;
use threadloom::cli::{Cli, Commands, GraphArgs, HeadRuleArg, OutputFormat};
use util::{snapshot_fixture, training_fixture};

fn tloom() -> Command {
    Command::cargo_bin("tloom").expect("tloom binary")
}

#[derive(Debug, Deserialize)]
struct ThreadRow {
    thread: String,
    head: u64,
    posts: usize,
    edges: usize,
    components: usize,
}

#[test]
fn graph_flag_parsing() {
    // Given
    let argv = ["tloom", "--quiet", "graph", "corpus.tsv", "--head-rule", "subject-id", "--format", "json"];

    // When
    let cli = Cli::parse_from(argv);

    // Then
    assert!(cli.quiet);
    match cli.command {
        Commands::Graph(GraphArgs { corpus, head_rule, format, dot_dir }) => {
            assert!(corpus.ends_with("corpus.tsv"));
            assert!(matches!(head_rule, Some(HeadRuleArg::SubjectId)));
            assert!(matches!(format, OutputFormat::Json));
            assert!(dot_dir.is_none());
        }
        _ => panic!("expected Graph command"),
    }
}

#[test]
fn init_dry_run_prints_defaults_without_writing() {
    let tmp = assert_fs::TempDir::new().unwrap();

    tloom()
        .current_dir(tmp.path())
        .args(["--dry-run", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[training]").and(predicate::str::contains("per_class_quota = 100")));

    tmp.child("threadloom.toml").assert(predicate::path::missing());
}

#[test]
fn ingest_then_graph_reports_each_thread() {
    let tmp = snapshot_fixture();

    tloom()
        .current_dir(tmp.path())
        .args(["--quiet", "ingest", "week1.csv", "week2.csv", "-o", "corpus.tsv"])
        .assert()
        .success();
    tmp.child("corpus.tsv").assert(predicate::path::is_file());

    let assert = tloom()
        .current_dir(tmp.path())
        .args(["--quiet", "graph", "corpus.tsv", "--format", "json", "--dot-dir", "dot"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    let rows: Vec<ThreadRow> = serde_json::from_str(&stdout).expect("JSON rows");

    let summary: Vec<String> = rows
        .iter()
        .map(|r| format!("{} head={} posts={} edges={} components={}", r.thread, r.head, r.posts, r.edges, r.components))
        .collect();
    insta::assert_snapshot!(summary.join("\n"), @r"
    general head=10000001 posts=3 edges=2 components=1
    other head=20000001 posts=2 edges=1 components=1
    ");

    tmp.child("dot/0000_general.dot").assert(predicate::str::starts_with("digraph"));
    tmp.child("dot/0001_other.dot").assert(predicate::path::is_file());
}

#[test]
fn missing_snapshot_column_is_a_diagnostic() {
    let tmp = assert_fs::TempDir::new().unwrap();
    tmp.child("bad.csv").write_str("subject,id,author,date,content\ngeneral,10000001,Anonymous,03/01/24,hi\n").unwrap();

    tloom()
        .current_dir(tmp.path())
        .args(["--quiet", "--no-color", "ingest", "bad.csv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("time"));
}

#[test]
fn train_writes_labels_and_round_report() {
    let tmp = training_fixture(40, 16);

    tloom()
        .current_dir(tmp.path())
        .args([
            "--quiet",
            "--config",
            "threadloom.toml",
            "ingest",
            "snapshot.tsv",
            "--labels",
            "labels.tsv",
            "--embeddings",
            "vectors.tsv",
        ])
        .assert()
        .success();

    tloom()
        .current_dir(tmp.path())
        .args([
            "--quiet",
            "--config",
            "threadloom.toml",
            "train",
            "corpus.tsv",
            "--rounds",
            "2",
            "-k",
            "3",
            "--report",
            "report.json",
        ])
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(tmp.child("report.json").path()).unwrap()).unwrap();
    let rounds = report.as_array().expect("round list");
    assert_eq!(rounds.len(), 2);
    assert_eq!(rounds[1]["train_size"], 10 + 12);
    assert_eq!(rounds[1]["unlabeled_size"], 24 - 12);

    let labeled = threadloom::infra::store::load_corpus(tmp.child("labeled.tsv").path()).unwrap();
    assert_eq!(labeled.iter().filter(|p| p.label.is_some()).count(), 16 + 12);
}

#[test]
fn completions_go_to_stdout() {
    tloom()
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tloom"));
}

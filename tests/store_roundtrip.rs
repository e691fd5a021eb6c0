// tests/store_roundtrip.rs
mod util;

use std::sync::Arc;

use assert_fs::prelude::*;
use threadloom::{
    Label, ParseError, PostId, TextPipeline,
    core::corpus::{MergePolicy, merge_snapshots, normalize_posts},
    infra::store::{load_corpus, load_embeddings, load_labels, load_raw_posts, save_corpus},
};
use util::{post, snapshot_fixture};

const CORPUS_HEADER: &str =
    "id\tsubject\tauthor\ttimestamp\traw_content\tclean_content\treferences\turls\ttokens\tlabel\n";

#[test]
fn saved_corpus_loads_back_identically()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let path = tmp.child("corpus.tsv");

    let mut posts = vec![
        post(10000001, "general", 0, "tabs\tand \"quotes\" at example.com/x"),
        post(10000002, "general", 1, ">>10000001\nmulti\nline"),
        post(10000003, "general", 2, ""),
    ];
    posts[0].label = Some(Label::Positive);
    posts[1].label = Some(Label::Negative);
    posts[0].embedding = Some(Arc::from(vec![0.25f32, -1.5, 3.0]));
    posts[1].embedding = Some(Arc::from(vec![0.1f32, 0.2, 0.3]));

    save_corpus(path.path(), &posts).unwrap();
    let back = load_corpus(path.path()).unwrap();

    assert_eq!(back, posts);
}

#[test]
fn corpus_without_vectors_has_no_embedding_column()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let path = tmp.child("corpus.tsv");

    save_corpus(path.path(), &[post(10000001, "general", 0, "hello")]).unwrap();

    path.assert(predicates::str::starts_with(CORPUS_HEADER.replace('\n', "\tis_head\n")));
    let back = load_corpus(path.path()).unwrap();
    assert!(back[0].embedding.is_none());
}

#[test]
fn malformed_list_cell_is_reported_with_its_line()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let path = tmp.child("corpus.tsv");
    path.write_str(&format!(
        "{CORPUS_HEADER}\
         10000001\tgeneral\tAnonymous\t2024-03-01 00:00:00\thi\thi\t[]\t[]\t[\"hi\"]\t\n\
         10000002\tgeneral\tAnonymous\t2024-03-01 00:01:00\t>>10000001\t\t[10000001\t[]\t[]\t1\n"
    ))
    .unwrap();

    let err = load_corpus(path.path()).unwrap_err();
    let parse = err
        .downcast_ref::<ParseError>()
        .expect("parse error");
    assert_eq!(parse.line, 3);
    assert_eq!(parse.column, "references");
}

#[test]
fn overlapping_snapshots_merge_into_their_union()
{
    let tmp = snapshot_fixture();

    let week1 = load_raw_posts(tmp.child("week1.csv").path()).unwrap();
    let week2 = load_raw_posts(tmp.child("week2.csv").path()).unwrap();
    assert_eq!(week1[0].content, "first post, details at example.com/page");

    let (merged, stats) = merge_snapshots(vec![week1, week2], MergePolicy::KeepFirst);
    assert_eq!(stats.rows_in, 6);
    assert_eq!(stats.unique, 5);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.threads, 2);

    let ids: Vec<u64> = merged
        .iter()
        .map(|p| p.id.0)
        .collect();
    assert_eq!(ids, vec![10000001, 10000002, 10000003, 20000001, 20000002]);

    let posts = normalize_posts(merged, &TextPipeline::new());
    assert_eq!(posts[0].urls, vec!["example.com/page"]);
    assert_eq!(posts[2].references, vec![PostId(10000002), PostId(99999999)]);
}

#[test]
fn labels_and_vectors_load_from_tsv()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let labels = tmp.child("labels.tsv");
    labels
        .write_str("id\tlabel\n10000001\t1\n10000002\t\n10000003\t0\n")
        .unwrap();
    let vectors = tmp.child("vectors.tsv");
    vectors
        .write_str("id\tembedding\n10000001\t[1.0, 2.0]\n10000002\t[3, 4]\n")
        .unwrap();

    let labels = load_labels(labels.path()).unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[&PostId(10000001)].0, Label::Positive);
    assert_eq!(labels[&PostId(10000003)].0, Label::Negative);

    let table = load_embeddings(vectors.path(), 2).unwrap();
    assert_eq!(table.len(), 2);
    assert!(load_embeddings(vectors.path(), 3).is_err());
}

#[test]
fn ragged_embedding_column_is_reported_with_its_line()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let path = tmp.child("corpus.tsv");
    let header = CORPUS_HEADER.replace('\n', "\tembedding\n");
    path.write_str(&format!(
        "{header}\
         10000001\tgeneral\tAnonymous\t2024-03-01 00:00:00\thi\thi\t[]\t[]\t[\"hi\"]\t1\t[0.5, 1.5]\n\
         10000002\tgeneral\tAnonymous\t2024-03-01 00:01:00\tyo\tyo\t[]\t[]\t[\"yo\"]\t\t[0.25]\n"
    ))
    .unwrap();

    let err = load_corpus(path.path()).unwrap_err();
    let parse = err
        .downcast_ref::<ParseError>()
        .expect("parse error");
    assert_eq!(parse.line, 3);
    assert_eq!(parse.column, "embedding");
}

#[test]
fn saved_corpus_flags_the_earliest_post_of_each_thread()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let path = tmp.child("corpus.tsv");
    let posts = vec![
        post(10000002, "general", 5, "reply"),
        post(10000001, "general", 0, "head"),
        post(20000001, "other", 3, "lone"),
    ];

    save_corpus(path.path(), &posts).unwrap();

    let text = std::fs::read_to_string(path.path()).unwrap();
    let flags: Vec<&str> = text
        .lines()
        .skip(1)
        .map(|l| {
            l.split('\t')
                .last()
                .unwrap()
        })
        .collect();
    assert_eq!(flags, vec!["0", "1", "1"]);
    assert_eq!(load_corpus(path.path()).unwrap(), posts);
}

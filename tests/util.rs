//! Shared test utilities for integration tests
//!
//! Provides scraper snapshot, label and embedding fixtures plus a compact
//! post constructor used across multiple test files.

#![allow(dead_code)]

use assert_fs::prelude::*;
use chrono::NaiveDate;
use threadloom::{Post, PostId, RawPost, TextPipeline};

pub const WEEK_1: &str = "\
subject,id,author,date,time,content
general,10000001,Anonymous,03/01/24,10:00:00,\"first post, details at example.com/page\"
general,10000002,Anonymous,03/01/24,10:05:00,>>10000001 agreed
general,10000003,Anonymous,03/01/24,10:07:00,>>10000002 >>99999999 no
";

pub const WEEK_2: &str = "\
subject,id,author,date,time,content
general,10000003,Anonymous,03/01/24,10:07:00,>>10000002 >>99999999 no
other,20000001,Anonymous,03/02/24,09:00:00,new thread
other,20000002,Anonymous,03/02/24,09:01:00,>>20000001 reply
";

/// Two overlapping weekly snapshots: five unique posts in two threads.
pub fn snapshot_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("week1.csv")
        .write_str(WEEK_1)
        .expect("write week1");
    tmp.child("week2.csv")
        .write_str(WEEK_2)
        .expect("write week2");
    tmp
}

/// `n` posts across four threads with separable 2-d embeddings: even ids sit
/// near (+3, +3) and are on topic, odd ids near (-3, -3). The first
/// `labeled` posts get gold labels.
pub fn training_fixture(
    n: usize,
    labeled: usize,
) -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    let mut snapshot = String::from("subject\tid\tauthor\tdate\ttime\tcontent\n");
    let mut vectors = String::from("id\tembedding\n");
    let mut labels = String::from("id\tlabel\n");

    for i in 0..n
    {
        let id = 30_000_000 + i as u64;
        let on_topic = i % 2 == 0;
        let jitter = (i % 7) as f32 * 0.1;
        let v = if on_topic { 3.0 + jitter } else { -3.0 - jitter };

        snapshot.push_str(&format!(
            "thread{}\t{id}\tAnonymous\t03/0{}/24\t10:{:02}:00\tpost number {i}\n",
            i % 4,
            1 + i % 4,
            i % 60
        ));
        vectors.push_str(&format!("{id}\t[{v}, {v}]\n"));
        if i < labeled
        {
            labels.push_str(&format!("{id}\t{}\n", u8::from(on_topic)));
        }
    }

    tmp.child("snapshot.tsv")
        .write_str(&snapshot)
        .expect("write snapshot");
    tmp.child("vectors.tsv")
        .write_str(&vectors)
        .expect("write vectors");
    tmp.child("labels.tsv")
        .write_str(&labels)
        .expect("write labels");
    tmp.child("threadloom.toml")
        .write_str("[embedding]\ndimension = 2\n")
        .expect("write config");
    tmp
}

/// Raw scraper row at 2024-03-01 00:`minute`.
pub fn raw(
    id: u64,
    subject: &str,
    minute: u32,
    content: &str,
) -> RawPost
{
    RawPost {
        subject: subject.to_string(),
        id: PostId(id),
        author: "Anonymous".to_string(),
        timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
            .expect("date")
            .and_hms_opt(0, minute, 0)
            .expect("time"),
        content: content.to_string(),
    }
}

/// Normalized post built from [`raw`].
pub fn post(
    id: u64,
    subject: &str,
    minute: u32,
    content: &str,
) -> Post
{
    Post::from_raw(raw(id, subject, minute, content), &TextPipeline::new())
}

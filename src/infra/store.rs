//! Reading and writing scraper snapshots, corpora and embedding tables.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::{
    core::{
        corpus::EmbeddingTable,
        error::ParseError,
        post::{Label, LabelSource, Post, PostId, RawPost},
        thread::label_heads,
    },
    infra::{
        cells::{self, CellRef},
        io::{read_text, write_atomic},
        tabular::{Table, separator_for, write_row},
    },
};

/// Timestamp layout of the persisted corpus.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SNAPSHOT_COLUMNS: [&str; 6] = ["subject", "id", "author", "date", "time", "content"];

const CORPUS_COLUMNS: [&str; 10] = [
    "id",
    "subject",
    "author",
    "timestamp",
    "raw_content",
    "clean_content",
    "references",
    "urls",
    "tokens",
    "label",
];

/// Derived on save (earliest post of its thread), ignored on load.
const HEAD_COLUMN: &str = "is_head";

const EMBEDDING_COLUMN: &str = "embedding";

/// Scraper date `MM/DD/YY` plus `HH:MM:SS`; the last two year digits count, in 20xx.
pub fn parse_scrape_datetime(
    date: &str,
    time: &str,
    at: CellRef<'_>,
) -> Result<NaiveDateTime, ParseError>
{
    let parts: Vec<&str> = date
        .trim()
        .split('/')
        .collect();
    let [m, d, y] = parts[..]
    else
    {
        return Err(at.error(format!("date {date:?} is not MM/DD/YY")));
    };
    if y.len() < 2
    {
        return Err(at.error(format!("date {date:?} has a one-digit year")));
    }

    let num = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| at.error(format!("date {date:?} is not MM/DD/YY")))
    };
    if !y.is_ascii()
    {
        return Err(at.error(format!("date {date:?} is not MM/DD/YY")));
    }
    let year = 2000 + num(&y[y.len() - 2..])? as i32;
    let day = NaiveDate::from_ymd_opt(year, num(m)?, num(d)?)
        .ok_or_else(|| at.error(format!("date {date:?} does not exist")))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S")
        .map_err(|e| at.error(format!("time {time:?}: {e}")))?;
    Ok(day.and_time(time))
}

fn load_table(path: &Path) -> Result<Table>
{
    let text = read_text(path)?;
    Ok(Table::parse(path.display().to_string(), &text, separator_for(path))?)
}

/// Load one scraper snapshot (`.csv` comma, otherwise tab separated).
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_raw_posts(path: &Path) -> Result<Vec<RawPost>>
{
    let table = load_table(path)?;
    let [subject, id, author, date, time, content] = table.require(SNAPSHOT_COLUMNS)?;

    let mut out = Vec::with_capacity(
        table
            .records()
            .len(),
    );
    for r in table.records()
    {
        let at = |column| CellRef { file: table.file(), line: r.line, column };
        out.push(RawPost {
            subject: table
                .cell(r, subject)?
                .to_string(),
            id: cells::parse_id(table.cell(r, id)?, at("id"))?,
            author: table
                .cell(r, author)?
                .to_string(),
            timestamp: parse_scrape_datetime(table.cell(r, date)?, table.cell(r, time)?, at("date"))?,
            content: table
                .cell(r, content)?
                .to_string(),
        });
    }

    debug!(rows = out.len(), "loaded snapshot");
    Ok(out)
}

/// Load a persisted corpus, with embeddings when the column is present.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_corpus(path: &Path) -> Result<Vec<Post>>
{
    let table = load_table(path)?;
    let cols = table.require(CORPUS_COLUMNS)?;
    let embedding_col = if table.has_column(EMBEDDING_COLUMN)
    {
        Some(table.require([EMBEDDING_COLUMN])?[0])
    }
    else
    {
        None
    };

    let mut posts = Vec::with_capacity(
        table
            .records()
            .len(),
    );
    // Set by the first non-empty embedding cell
    let mut dimension: Option<usize> = None;
    for r in table.records()
    {
        let at = |column| CellRef { file: table.file(), line: r.line, column };
        let cell = |i: usize| table.cell(r, cols[i]);

        let ts = cell(3)?;
        let timestamp = NaiveDateTime::parse_from_str(ts.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| at("timestamp").error(format!("{ts:?}: {e}")))?;

        let embedding = match embedding_col
        {
            Some(c) if !table
                .cell(r, c)?
                .trim()
                .is_empty() =>
            {
                let vector = cells::parse_floats(table.cell(r, c)?, at(EMBEDDING_COLUMN))?;
                let expected = *dimension.get_or_insert(vector.len());
                if vector.len() != expected
                {
                    return Err(at(EMBEDDING_COLUMN)
                        .error(format!("vector has {} values, expected {expected}", vector.len()))
                        .into());
                }
                Some(vector.into())
            }
            _ => None,
        };

        posts.push(Post {
            id: cells::parse_id(cell(0)?, at("id"))?,
            subject: cell(1)?.to_string(),
            author: cell(2)?.to_string(),
            timestamp,
            raw_content: cell(4)?.to_string(),
            clean_content: cell(5)?.to_string(),
            references: cells::parse_ids(cell(6)?, at("references"))?,
            urls: cells::parse_strings(cell(7)?, at("urls"))?,
            tokens: cells::parse_strings(cell(8)?, at("tokens"))?,
            embedding,
            label: cells::parse_label(cell(9)?, at("label"))?,
        });
    }

    info!(posts = posts.len(), "loaded corpus");
    Ok(posts)
}

/// Write the corpus as TSV with a head flag per post; the embedding column
/// appears when any post has one.
#[instrument(skip_all, fields(path = %path.display(), posts = posts.len()))]
pub fn save_corpus(
    path: &Path,
    posts: &[Post],
) -> Result<()>
{
    let with_embedding = posts
        .iter()
        .any(|p| {
            p.embedding
                .is_some()
        });
    let sep = '\t';

    let mut header: Vec<String> = CORPUS_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect();
    header.push(HEAD_COLUMN.to_string());
    if with_embedding
    {
        header.push(EMBEDDING_COLUMN.to_string());
    }

    let mut buf = Vec::new();
    write_row(&mut buf, &header, sep)?;
    for (p, head) in posts
        .iter()
        .zip(label_heads(posts))
    {
        let mut row = vec![
            p.id.to_string(),
            p.subject
                .clone(),
            p.author
                .clone(),
            p.timestamp
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            p.raw_content
                .clone(),
            p.clean_content
                .clone(),
            cells::format_list(&p.references),
            cells::format_list(&p.urls),
            cells::format_list(&p.tokens),
            cells::format_label(p.label),
            u8::from(head).to_string(),
        ];
        if with_embedding
        {
            row.push(
                p.embedding
                    .as_deref()
                    .map_or_else(String::new, cells::format_list),
            );
        }
        write_row(&mut buf, &row, sep)?;
    }

    write_atomic(path, &buf).with_context(|| format!("Failed to save corpus to {}", path.display()))
}

/// Load an `id, embedding` table, checking every vector against `dimension`.
#[instrument(skip_all, fields(path = %path.display(), dimension = dimension))]
pub fn load_embeddings(
    path: &Path,
    dimension: usize,
) -> Result<EmbeddingTable>
{
    let table = load_table(path)?;
    let [id_col, vec_col] = table.require(["id", EMBEDDING_COLUMN])?;

    let mut out = EmbeddingTable::new(dimension);
    for r in table.records()
    {
        let at = |column| CellRef { file: table.file(), line: r.line, column };
        let id = cells::parse_id(table.cell(r, id_col)?, at("id"))?;
        let vector = cells::parse_floats(table.cell(r, vec_col)?, at(EMBEDDING_COLUMN))?;
        out.insert(id, vector)
            .with_context(|| format!("{}:{}", table.file(), r.line))?;
    }

    info!(vectors = out.len(), "loaded embeddings");
    Ok(out)
}

/// Load an `id, label` table of gold labels; rows with an empty label are skipped.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_labels(path: &Path) -> Result<IndexMap<PostId, (Label, LabelSource)>>
{
    let table = load_table(path)?;
    let [id_col, label_col] = table.require(["id", "label"])?;

    let mut out = IndexMap::new();
    for r in table.records()
    {
        let at = |column| CellRef { file: table.file(), line: r.line, column };
        let id = cells::parse_id(table.cell(r, id_col)?, at("id"))?;
        if let Some(label) = cells::parse_label(table.cell(r, label_col)?, at("label"))?
        {
            out.insert(id, (label, LabelSource::Gold));
        }
    }

    info!(labels = out.len(), "loaded gold labels");
    Ok(out)
}

//! Delimited text tables (CSV/TSV), quote and CRLF tolerant.

use std::{
    io::{self, Write},
    mem::take,
    path::Path,
};

use crate::core::error::ParseError;

/// Field separator implied by a file name: `.csv` is comma, anything else tab.
pub fn separator_for(path: &Path) -> char
{
    match path
        .extension()
        .and_then(|e| e.to_str())
    {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => ',',
        _ => '\t',
    }
}

/// One parsed row and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record
{
    pub line: usize,
    pub cells: Vec<String>,
}

/// Split `text` into rows; quoted fields may span lines, `""` escapes a quote.
///
/// Blank lines are skipped. An unterminated quote runs to end of input.
pub fn parse_records(
    text: &str,
    sep: char,
) -> Vec<Record>
{
    let mut records = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut chars = text
        .chars()
        .peekable();

    while let Some(ch) = chars.next()
    {
        match ch
        {
            '"' =>
            {
                if in_quotes
                {
                    if matches!(chars.peek(), Some('"'))
                    {
                        chars.next();
                        field.push('"');
                    }
                    else
                    {
                        in_quotes = false;
                    }
                }
                else
                {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes =>
            {
                if ch == '\r' && matches!(chars.peek(), Some('\n'))
                {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty())
                {
                    records.push(Record { line: row_line, cells: take(&mut row) });
                }
                row.clear();
                line += 1;
                row_line = line;
            }
            c =>
            {
                if c == '\n'
                {
                    line += 1;
                }
                field.push(c);
            }
        }
    }

    if !field.is_empty() || !row.is_empty()
    {
        row.push(field);
        records.push(Record { line: row_line, cells: row });
    }

    records
}

/// Header-addressed view over parsed records.
#[derive(Debug, Clone)]
pub struct Table
{
    file: String,
    header: Vec<String>,
    records: Vec<Record>,
}

impl Table
{
    /// First record is the header; header cells are matched case-insensitively.
    pub fn parse(
        file: impl Into<String>,
        text: &str,
        sep: char,
    ) -> Result<Self, ParseError>
    {
        let file = file.into();
        let mut records = parse_records(text, sep);
        if records.is_empty()
        {
            return Err(ParseError::new(file, 1, "<header>", "missing header row"));
        }
        let header = records
            .remove(0)
            .cells
            .into_iter()
            .map(|h| {
                h.trim()
                    .to_ascii_lowercase()
            })
            .collect();
        Ok(Self { file, header, records })
    }

    pub fn file(&self) -> &str
    {
        &self.file
    }

    pub fn records(&self) -> &[Record]
    {
        &self.records
    }

    pub fn has_column(
        &self,
        name: &str,
    ) -> bool
    {
        self.position(name)
            .is_some()
    }

    fn position(
        &self,
        name: &str,
    ) -> Option<usize>
    {
        self.header
            .iter()
            .position(|h| h == name)
    }

    /// Column positions for `names`, or an error naming the first absent one.
    pub fn require<const N: usize>(
        &self,
        names: [&str; N],
    ) -> Result<[usize; N], ParseError>
    {
        let mut out = [0; N];
        for (slot, name) in out
            .iter_mut()
            .zip(names)
        {
            *slot = self
                .position(name)
                .ok_or_else(|| ParseError::new(self.file.clone(), 1, name, "column missing from header"))?;
        }
        Ok(out)
    }

    /// Cell `col` of `record`, or an error pointing at the short row.
    pub fn cell<'r>(
        &self,
        record: &'r Record,
        col: usize,
    ) -> Result<&'r str, ParseError>
    {
        record
            .cells
            .get(col)
            .map(String::as_str)
            .ok_or_else(|| {
                ParseError::new(
                    self.file.clone(),
                    record.line,
                    self.header
                        .get(col)
                        .map_or("?", String::as_str),
                    format!("row has {} cells, expected at least {}", record.cells.len(), col + 1),
                )
            })
    }
}

fn needs_quotes(
    field: &str,
    sep: char,
) -> bool
{
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one row, quoting cells that contain the separator, quotes or newlines.
pub fn write_row<W: Write>(
    mut w: W,
    row: &[String],
    sep: char,
) -> io::Result<()>
{
    for (i, cell) in row
        .iter()
        .enumerate()
    {
        if i > 0
        {
            write!(w, "{sep}")?;
        }
        if needs_quotes(cell, sep)
        {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        }
        else
        {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

//! Typed cell codecs for the persisted corpus.
//!
//! List cells are JSON arrays of the column's element type; whitespace between
//! tokens is allowed, everything else is rejected.

use serde::de::DeserializeOwned;

use crate::core::{
    error::ParseError,
    post::{Label, PostId},
};

/// Where a cell sits, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct CellRef<'a>
{
    pub file: &'a str,
    pub line: usize,
    pub column: &'a str,
}

impl CellRef<'_>
{
    pub fn error(
        &self,
        reason: impl Into<String>,
    ) -> ParseError
    {
        ParseError::new(self.file, self.line, self.column, reason)
    }
}

fn parse_list<T: DeserializeOwned>(
    cell: &str,
    at: CellRef<'_>,
) -> Result<Vec<T>, ParseError>
{
    let trimmed = cell.trim_matches([' ', '\t', '\r', '\n']);
    if !trimmed.starts_with('[')
    {
        return Err(at.error(format!("expected a `[...]` list, found {:?}", truncate(cell))));
    }
    serde_json::from_str(trimmed).map_err(|e| at.error(format!("malformed list {:?}: {e}", truncate(cell))))
}

fn truncate(s: &str) -> String
{
    const MAX: usize = 40;
    match s
        .char_indices()
        .nth(MAX)
    {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}

pub fn parse_ids(
    cell: &str,
    at: CellRef<'_>,
) -> Result<Vec<PostId>, ParseError>
{
    parse_list(cell, at)
}

pub fn parse_strings(
    cell: &str,
    at: CellRef<'_>,
) -> Result<Vec<String>, ParseError>
{
    parse_list(cell, at)
}

pub fn parse_floats(
    cell: &str,
    at: CellRef<'_>,
) -> Result<Vec<f32>, ParseError>
{
    parse_list(cell, at)
}

/// Empty cell means unlabeled.
pub fn parse_label(
    cell: &str,
    at: CellRef<'_>,
) -> Result<Option<Label>, ParseError>
{
    match cell.trim()
    {
        "" => Ok(None),
        "0" => Ok(Some(Label::Negative)),
        "1" => Ok(Some(Label::Positive)),
        other => Err(at.error(format!("label must be empty, 0 or 1, found {other:?}"))),
    }
}

pub fn parse_id(
    cell: &str,
    at: CellRef<'_>,
) -> Result<PostId, ParseError>
{
    cell.trim()
        .parse::<u64>()
        .map(PostId)
        .map_err(|e| at.error(format!("invalid post id {cell:?}: {e}")))
}

/// Compact JSON rendering of a list cell.
pub fn format_list<T: serde::Serialize>(items: &[T]) -> String
{
    // Vec of plain scalars and strings cannot fail to serialize
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

pub fn format_label(label: Option<Label>) -> String
{
    label.map_or_else(String::new, |l| l.to_string())
}

#[cfg(test)]
mod tests
{
    use super::*;

    const AT: CellRef<'static> = CellRef { file: "corpus.tsv", line: 7, column: "references" };

    #[test]
    fn accepts_irregular_whitespace()
    {
        assert_eq!(
            parse_ids(" [ 12345678 ,\n 87654321\t] ", AT).unwrap(),
            vec![PostId(12345678), PostId(87654321)]
        );
        assert_eq!(parse_ids("[]", AT).unwrap(), vec![]);
        assert_eq!(parse_ids("[\r\n]", AT).unwrap(), vec![]);
        assert_eq!(parse_strings(r#"["it's", "a, b"]"#, AT).unwrap(), vec!["it's", "a, b"]);
        assert_eq!(parse_floats("[0.5, -1, 2e-1]", AT).unwrap(), vec![0.5, -1.0, 0.2]);
    }

    #[test]
    fn rejects_malformed_lists()
    {
        for bad in ["", "1, 2", "[1 2]", "[1, 2,]", "[1, 2", "1, 2]", "[\"a\"]", "[1.5]", "[-3]"]
        {
            let err = parse_ids(bad, AT).unwrap_err();
            assert_eq!(err.line, 7, "{bad}");
            assert_eq!(err.column, "references");
        }
        assert!(parse_strings("['a']", AT).is_err());
        assert!(parse_floats("[nan]", AT).is_err());
    }

    #[test]
    fn label_cells()
    {
        assert_eq!(parse_label("", AT).unwrap(), None);
        assert_eq!(parse_label(" 1 ", AT).unwrap(), Some(Label::Positive));
        assert_eq!(parse_label("0", AT).unwrap(), Some(Label::Negative));
        assert!(parse_label("2", AT).is_err());
        assert!(parse_label("yes", AT).is_err());
    }

    #[test]
    fn format_round_trips_through_parse()
    {
        let ids = vec![PostId(1), PostId(22222222)];
        assert_eq!(format_list(&ids), "[1,22222222]");
        assert_eq!(parse_ids(&format_list(&ids), AT).unwrap(), ids);
        assert_eq!(format_label(Some(Label::Positive)), "1");
        assert_eq!(format_label(None), "");
    }
}

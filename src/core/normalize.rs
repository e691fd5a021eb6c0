//! Content normalization for raw post text.
//!
//! URL and reply-reference extraction plus the cleaning pass that removes
//! both. Patterns are compiled once into a [`ContentNormalizer`], which the
//! [`TextPipeline`] owns together with the tokenizer. The pipeline is built at
//! startup and only ever borrowed afterwards.

use std::ops::Range;

use regex::Regex;

use crate::core::post::PostId;

/// Two-character token that prefixes a reply reference.
pub const REPLY_MARKER: &str = ">>";

/// Number of digits in a referenceable post ID.
pub const REFERENCE_DIGITS: usize = 8;

/// Permissive, scheme-optional URL grammar (host + optional path).
const URL_PATTERN: &str =
    r"[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*";

const REFERENCE_PATTERN: &str = r">>([0-9]{8})";

const WORD_PATTERN: &str = r"[\p{L}\p{N}_]+(?:['’][\p{L}\p{N}_]+)*";

/// A reply reference found in text: byte span of the whole token and its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpan
{
    pub span: Range<usize>,
    pub target: PostId,
}

/// URL and reference extraction and removal.
#[derive(Debug, Clone)]
pub struct ContentNormalizer
{
    url_re: Regex,
    reference_re: Regex,
}

impl Default for ContentNormalizer
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl ContentNormalizer
{
    pub fn new() -> Self
    {
        Self {
            url_re: Regex::new(URL_PATTERN).expect("URL pattern is valid"),
            reference_re: Regex::new(REFERENCE_PATTERN).expect("reference pattern is valid"),
        }
    }

    /// All URL-like substrings, in order.
    pub fn extract_urls(
        &self,
        text: &str,
    ) -> Vec<String>
    {
        self.url_re
            .find_iter(text)
            .map(|m| {
                m.as_str()
                    .to_string()
            })
            .collect()
    }

    /// Referenced post IDs in order of appearance, duplicates preserved.
    pub fn extract_references(
        &self,
        text: &str,
    ) -> Vec<PostId>
    {
        self.reference_spans(text)
            .into_iter()
            .map(|r| r.target)
            .collect()
    }

    /// Reference tokens with their byte spans.
    ///
    /// A token is the marker followed by exactly eight digits; a ninth digit
    /// right after disqualifies it.
    pub fn reference_spans(
        &self,
        text: &str,
    ) -> Vec<ReferenceSpan>
    {
        let bytes = text.as_bytes();
        let mut out = Vec::new();

        for caps in self
            .reference_re
            .captures_iter(text)
        {
            let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1))
            else
            {
                continue;
            };

            if bytes
                .get(whole.end())
                .is_some_and(u8::is_ascii_digit)
            {
                continue;
            }

            // Eight ASCII digits always fit in u64
            let Ok(id) = digits
                .as_str()
                .parse::<u64>()
            else
            {
                continue;
            };

            out.push(ReferenceSpan { span: whole.range(), target: PostId(id) });
        }

        out
    }

    /// Remove every URL (replaced by a space) and reference token (replaced by
    /// a newline), repeating until neither pattern matches any more.
    ///
    /// Each changing pass shortens the text, so the loop terminates, and the
    /// result is a fixed point, which makes `clean` idempotent.
    pub fn clean(
        &self,
        text: &str,
    ) -> String
    {
        let mut current = self.clean_once(text);
        loop
        {
            let next = self.clean_once(&current);
            if next == current
            {
                return current;
            }
            current = next;
        }
    }

    fn clean_once(
        &self,
        text: &str,
    ) -> String
    {
        let without_urls = self
            .url_re
            .replace_all(text, " ");

        let spans = self.reference_spans(&without_urls);
        if spans.is_empty()
        {
            return without_urls.into_owned();
        }

        let mut out = String::with_capacity(without_urls.len());
        let mut last = 0;
        for r in spans
        {
            out.push_str(&without_urls[last..r.span.start]);
            out.push('\n');
            last = r.span.end;
        }
        out.push_str(&without_urls[last..]);
        out
    }
}

/// Word tokenizer for cleaned text; punctuation-only tokens never appear.
#[derive(Debug, Clone)]
pub struct Tokenizer
{
    word_re: Regex,
}

impl Default for Tokenizer
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Tokenizer
{
    pub fn new() -> Self
    {
        Self { word_re: Regex::new(WORD_PATTERN).expect("word pattern is valid") }
    }

    pub fn tokenize(
        &self,
        text: &str,
    ) -> Vec<String>
    {
        self.word_re
            .find_iter(text)
            .map(|m| {
                m.as_str()
                    .to_string()
            })
            .collect()
    }
}

/// Text processing state shared by every normalization call.
///
/// Constructed once at startup and passed by reference; nothing in here is
/// mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct TextPipeline
{
    normalizer: ContentNormalizer,
    tokenizer: Tokenizer,
}

impl TextPipeline
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn normalizer(&self) -> &ContentNormalizer
    {
        &self.normalizer
    }

    pub fn tokenizer(&self) -> &Tokenizer
    {
        &self.tokenizer
    }
}

//! Front matter splitting and decoding for content and theme files.
//!
//! A front matter block is a metadata section at the very top of a file,
//! fenced by a delimiter line. Two formats are recognized:
//!
//! ```text
//! ---                      +++
//! title: Hello             title = "Hello"
//! template: base.html      template = "base.html"
//! ---                      +++
//! # Body                   # Body
//! ```
//!
//! A file without an opening delimiter on its first line, or whose block is
//! never closed, has no front matter: the decoded shape is its `Default` and
//! the whole file is body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("YAML front matter error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML front matter error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("front matter is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
}

/// Front matter formats, keyed by their delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontMatterFormat {
    /// YAML delimited by `---`.
    Yaml,
    /// TOML delimited by `+++`.
    Toml,
}

impl FrontMatterFormat {
    pub fn delimiter(&self) -> &'static [u8] {
        match self {
            Self::Yaml => b"---",
            Self::Toml => b"+++",
        }
    }
}

/// A located front matter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontMatterBlock<'a> {
    pub format: FrontMatterFormat,
    /// Bytes between the delimiter lines.
    pub raw: &'a [u8],
}

/// Generic page front matter, recognized on every content file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFrontMatter {
    pub title: String,
    pub meta: Vec<PageMeta>,
    pub links: Vec<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// One `<meta>` entry declared in front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One `<link>` entry declared in front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub link_as: Option<String>,
}

/// Locate the front matter block of `source`.
///
/// Returns the block (if any) and the body that follows it.
pub fn split(source: &[u8]) -> (Option<FrontMatterBlock<'_>>, &[u8]) {
    let Some(format) = opening_format(source) else {
        return (None, source);
    };
    let delimiter = format.delimiter();

    let mut lines = LineIter::new(source);
    // Opening delimiter, already validated.
    let Some((_, _, raw_start)) = lines.next() else {
        return (None, source);
    };
    for (line_start, line, next_start) in lines {
        if line == delimiter {
            let block = FrontMatterBlock {
                format,
                raw: &source[raw_start..line_start],
            };
            return (Some(block), &source[next_start..]);
        }
    }
    (None, source)
}

/// Decode the front matter of `source` into `T` and return the remaining body.
pub fn decode<T>(source: &[u8]) -> Result<(T, &[u8]), FrontMatterError>
where
    T: DeserializeOwned + Default,
{
    let (block, body) = split(source);
    let value = match block {
        Some(block) => decode_block(block)?,
        None => T::default(),
    };
    Ok((value, body))
}

fn decode_block<T>(block: FrontMatterBlock<'_>) -> Result<T, FrontMatterError>
where
    T: DeserializeOwned + Default,
{
    let text = std::str::from_utf8(block.raw)?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    match block.format {
        FrontMatterFormat::Yaml => Ok(serde_yaml::from_str(text)?),
        FrontMatterFormat::Toml => Ok(toml::from_str(text)?),
    }
}

fn opening_format(source: &[u8]) -> Option<FrontMatterFormat> {
    let first = LineIter::new(source).next()?.1;
    [FrontMatterFormat::Yaml, FrontMatterFormat::Toml]
        .into_iter()
        .find(|format| first == format.delimiter())
}

/// Iterates `(line_start, line_without_eol, next_line_start)`.
struct LineIter<'a> {
    source: &'a [u8],
    pos: usize,
}

impl<'a> LineIter<'a> {
    fn new(source: &'a [u8]) -> Self {
        Self { source, pos: 0 }
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = (usize, &'a [u8], usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.source.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.source[start..];
        let (line, next) = match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => (&rest[..nl], start + nl + 1),
            None => (rest, self.source.len()),
        };
        self.pos = next;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = trim_trailing_spaces(line);
        Some((start, line, next))
    }
}

fn trim_trailing_spaces(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |i| i + 1);
    &line[..end]
}

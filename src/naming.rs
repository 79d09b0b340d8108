//! Filename parsing for the `kind.extra....slug.ext` convention.
//!
//! Content files carry their classification in their name. The name is split
//! on `.` and each position has a fixed meaning:
//!
//! ```text
//! post.1700000000000.my-title.md
//! ^^^^ ^^^^^^^^^^^^^ ^^^^^^^^ ^^
//! kind extra...      slug     ext
//! ```
//!
//! Shorter names collapse positions from the middle outwards:
//!
//! - `about.md` → kind=`about`, slug=`about`, ext=`md`, extra=`[]`
//! - `page.about.md` → kind=`page`, slug=`about`, ext=`md`, extra=`[]`
//! - `post.1.2.hello.md` → kind=`post`, extra=`["1", "2"]`, slug=`hello`
//!
//! A name with no `.` at all cannot be decoded. Parsers that rely on the
//! convention reject such entries, which is how `README` or `LICENSE` end up
//! skipped during the parse pass.

/// Result of parsing an entry name like `post.1700000000000.my-title.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNameParts {
    /// The full, unmodified file name.
    pub raw: String,
    /// Final dot-segment.
    pub ext: String,
    /// First dot-segment.
    pub kind: String,
    /// Second-to-last dot-segment, or `kind` when the name has only two segments.
    pub slug: String,
    /// Every segment strictly between `kind` and `slug`.
    pub extra: Vec<String>,
}

impl PageNameParts {
    /// Re-join the parts into their dot-segments.
    ///
    /// For two-segment names `kind` and `slug` are the same segment and it is
    /// emitted once, so the result always has as many segments as `raw`.
    pub fn segments(&self) -> Vec<&str> {
        let mut out = vec![self.kind.as_str()];
        out.extend(self.extra.iter().map(String::as_str));
        if self.raw.split('.').count() > 2 {
            out.push(self.slug.as_str());
        }
        out.push(self.ext.as_str());
        out
    }
}

/// Parse an entry name following the `kind.extra....slug.ext` convention.
///
/// Returns `None` when the name has fewer than two dot-segments.
pub fn parse_entry_name(name: &str) -> Option<PageNameParts> {
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() < 2 {
        return None;
    }

    let last = segments.len() - 1;
    let kind = segments[0].to_string();
    let slug = if segments.len() > 2 {
        segments[last - 1].to_string()
    } else {
        kind.clone()
    };
    let extra = if segments.len() > 3 {
        segments[1..last - 1].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    Some(PageNameParts {
        raw: name.to_string(),
        ext: segments[last].to_string(),
        kind,
        slug,
        extra,
    })
}

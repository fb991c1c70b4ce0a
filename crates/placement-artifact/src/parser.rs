//! Tagged-block parser
//!
//! Generated artifact text carries one logical document per recipient,
//! delimited as
//!
//! ```text
//! <artifact id="Acme Insurance" title="Quote request">
//! ...body...
//! </artifact>
//! ```
//!
//! Blocks are repeatable and non-nested. The generator sometimes wraps the
//! whole output in an `<artifacts>` container; the container is ignored.
//! Text with no tags at all is one implicit block. Parsing never fails:
//! upstream text is unreliable, so malformed regions become diagnostics and
//! the parse degrades instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const OPEN_TAG: &str = "<artifact";
const CLOSE_TAG: &str = "</artifact>";
const WRAPPER_OPEN: &str = "<artifacts";
const WRAPPER_CLOSE: &str = "</artifacts>";

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is valid")
});

/// Overall shape of a parsed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentShape {
    /// One or more top-level `<artifact>` blocks
    Tagged,
    /// `<artifact>` blocks inside an `<artifacts>` container
    Wrapped,
    /// No tags; the whole text is one implicit block
    Bare,
    /// Nothing but whitespace
    Empty,
}

/// One logical sub-document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedBlock {
    /// `id` attribute
    pub id: Option<String>,
    /// `title` attribute
    pub title: Option<String>,
    /// All attributes, keys lowercased
    pub attributes: BTreeMap<String, String>,
    /// Inner text, trimmed
    pub body: String,
    /// True for the implicit block of a bare document
    pub implicit: bool,
}

impl ParsedBlock {
    fn tagged(attributes: BTreeMap<String, String>, body: &str) -> Self {
        let non_empty = |key: &str| {
            attributes
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            id: non_empty("id"),
            title: non_empty("title"),
            body: body.trim().to_string(),
            attributes,
            implicit: false,
        }
    }

    fn bare(body: &str) -> Self {
        Self {
            id: None,
            title: None,
            attributes: BTreeMap::new(),
            body: body.trim().to_string(),
            implicit: true,
        }
    }

    /// `id`, falling back to `title`
    #[inline]
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.id.as_deref().or(self.title.as_deref())
    }

    /// Attribute by (lowercase) name
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Something the parser had to work around
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ParseDiagnostic {
    /// Opening tag never closed with `>`
    #[error("opening tag at byte {offset} is never closed")]
    UnclosedTag {
        /// Byte offset of the tag
        offset: usize,
    },

    /// Block has no `</artifact>`
    #[error("block at byte {offset} has no closing tag")]
    Unterminated {
        /// Byte offset of the block
        offset: usize,
    },

    /// A block opens inside another block
    #[error("block at byte {offset} opens inside the previous block")]
    Nested {
        /// Byte offset of the inner tag
        offset: usize,
    },
}

/// Result of parsing one artifact's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    /// Document shape
    pub shape: DocumentShape,
    /// Blocks in document order
    pub blocks: Vec<ParsedBlock>,
    /// Problems worked around
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseOutcome {
    /// Whether the parser had to work around anything
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse artifact text into blocks
#[must_use]
pub fn parse(content: &str) -> ParseOutcome {
    // ASCII lowercasing keeps byte offsets aligned with `content`.
    let lower = content.to_ascii_lowercase();
    let mut blocks = Vec::new();
    let mut diagnostics = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_open_tag(&lower, cursor) {
        let attrs_start = start + OPEN_TAG.len();
        let Some(tag_end) = find_tag_end(&lower, attrs_start) else {
            diagnostics.push(ParseDiagnostic::UnclosedTag { offset: start });
            break;
        };
        let raw_attrs = &content[attrs_start..tag_end];
        let attributes = parse_attributes(raw_attrs);

        if raw_attrs.trim_end().ends_with('/') {
            blocks.push(ParsedBlock::tagged(attributes, ""));
            cursor = tag_end + 1;
            continue;
        }

        let body_start = tag_end + 1;
        let Some(body_len) = lower[body_start..].find(CLOSE_TAG) else {
            diagnostics.push(ParseDiagnostic::Unterminated { offset: start });
            break;
        };
        let body_end = body_start + body_len;
        if let Some(inner) = find_open_tag(&lower[..body_end], body_start) {
            diagnostics.push(ParseDiagnostic::Nested { offset: inner });
        }

        blocks.push(ParsedBlock::tagged(
            attributes,
            &content[body_start..body_end],
        ));
        cursor = body_end + CLOSE_TAG.len();
    }

    let wrapped = find_tag(&lower, WRAPPER_OPEN, 0).is_some();
    if !blocks.is_empty() {
        let shape = if wrapped {
            DocumentShape::Wrapped
        } else {
            DocumentShape::Tagged
        };
        return ParseOutcome {
            shape,
            blocks,
            diagnostics,
        };
    }

    let text = if wrapped {
        strip_wrapper(content, &lower)
    } else {
        content
    };
    if text.trim().is_empty() {
        return ParseOutcome {
            shape: DocumentShape::Empty,
            blocks: Vec::new(),
            diagnostics,
        };
    }
    ParseOutcome {
        shape: DocumentShape::Bare,
        blocks: vec![ParsedBlock::bare(text)],
        diagnostics,
    }
}

/// Next `<artifact` tag at or after `from`, excluding `<artifacts`
/// Offset of the `>` closing an opening tag, skipping quoted attribute
/// values. A quote that is never closed is treated as a plain character.
fn find_tag_end(lower: &str, from: usize) -> Option<usize> {
    let bytes = lower.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Some(i),
            quote @ (b'"' | b'\'') => {
                if let Some(len) = lower[i + 1..].find(char::from(quote)) {
                    i += len + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn find_open_tag(lower: &str, from: usize) -> Option<usize> {
    find_tag(lower, OPEN_TAG, from)
}

/// Next occurrence of `tag` whose name ends at a delimiter
fn find_tag(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let mut from = from;
    while let Some(offset) = lower.get(from..)?.find(tag) {
        let start = from + offset;
        let after = start + tag.len();
        match lower.as_bytes().get(after) {
            None => return None,
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            Some(_) => from = after,
        }
    }
    None
}

fn strip_wrapper<'a>(content: &'a str, lower: &str) -> &'a str {
    let Some(open) = find_tag(lower, WRAPPER_OPEN, 0) else {
        return content;
    };
    let Some(open_len) = lower[open..].find('>') else {
        return content;
    };
    let inner_start = open + open_len + 1;
    let inner_end = lower[inner_start..]
        .find(WRAPPER_CLOSE)
        .map_or(content.len(), |len| inner_start + len);
    &content[inner_start..inner_end]
}

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((key, unescape(value)))
        })
        .collect()
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

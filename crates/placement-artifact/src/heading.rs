//! Markdown heading extraction

use pulldown_cmark::{Event, Parser as MdParser, Tag, TagEnd};

/// Text of the first Markdown heading in `body`, if any.
///
/// Inline markup is flattened to its text; empty headings are skipped.
#[must_use]
pub fn first_heading(body: &str) -> Option<String> {
    let mut current: Option<String> = None;

    for event in MdParser::new(body) {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(ref mut title) = current {
                    title.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(ref mut title) = current {
                    title.push(' ');
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(title) = current.take() {
                    let title = title.trim();
                    if !title.is_empty() {
                        return Some(title.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

//! Diagram block extraction from markdown documents.
//!
//! A markdown source carries its diagram in a fenced code block:
//!
//! ````text
//! # Architecture
//!
//! ```mermaid
//! graph LR
//!     A --> B
//! ```
//! ````
//!
//! [`extract`] copies the body of the first such block into a standalone
//! definition file the renderer can consume.

use std::path::Path;

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::atomic::{publish, temp_sibling};
use crate::error::RenderError;

/// Return the body of the first fenced block tagged `tag`.
///
/// Fences are recognized the CommonMark way (backticks or tildes, up to three
/// spaces of indentation, inside lists and block quotes). The tag is matched
/// case-insensitively against the first word of the info string, so
/// `` ``` Mermaid `` and `` ```mermaid {theme=dark} `` both qualify. An
/// unclosed block runs to the end of its container. Every body line is
/// emitted with a trailing `\n`.
///
/// Returns `None` when no qualifying block exists or its body is empty.
#[must_use]
pub fn extract_block(document: &str, tag: &str) -> Option<String> {
    let mut events = Parser::new(document);

    events.by_ref().find(|event| {
        matches!(
            event,
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if info_matches(info, tag)
        )
    })?;

    let mut raw = String::new();
    for event in events {
        match event {
            Event::Text(text) => raw.push_str(&text),
            Event::End(TagEnd::CodeBlock) => break,
            _ => {}
        }
    }

    let mut body = String::new();
    for line in raw.lines() {
        body.push_str(line);
        body.push('\n');
    }

    (!body.is_empty()).then_some(body)
}

fn info_matches(info: &str, tag: &str) -> bool {
    info.split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case(tag))
}

/// Extract the `tag` block of `document` into `destination`, replacing it
/// atomically.
///
/// Bytes that are not valid UTF-8 are decoded lossily, so stray encodings in
/// the surrounding prose do not prevent extraction.
///
/// # Errors
///
/// - [`RenderError::NoDiagramBlock`] if the document has no such block.
/// - [`RenderError::SourceRead`] if the document cannot be read.
/// - [`RenderError::Io`] if the destination cannot be written.
pub async fn extract(destination: &Path, document: &Path, tag: &str) -> Result<(), RenderError> {
    let bytes = tokio::fs::read(document)
        .await
        .map_err(|source| RenderError::SourceRead {
            path: document.to_path_buf(),
            source,
        })?;

    let Some(body) = extract_block(&String::from_utf8_lossy(&bytes), tag) else {
        return Err(RenderError::NoDiagramBlock {
            path: document.to_path_buf(),
            tag: tag.to_owned(),
        });
    };

    let temp = temp_sibling(destination)?;
    tokio::fs::write(temp.path(), body)
        .await
        .map_err(|e| RenderError::io(temp.path(), e))?;
    publish(temp, destination)
}

//! Strict XML-fragment parsing
//!
//! Turns the decoded text of one completed span into an element tree.
//! Accepts exactly the profile a stanza may use: start/end/self-closing
//! tags, attributes, and character data. Comments, CDATA, processing
//! instructions, DOCTYPE, and anything else are rejected.
//!
//! Unlike the framing scanner, this parser is quote-aware when locating the
//! end of a tag - it plays the role of the full markup parser and only ever
//! sees spans the framer already completed.

use super::element::{Attribute, Element, Node};
use crate::core::attributes;
use crate::core::scanner::{is_whitespace, Scanner};
use thiserror::Error;

/// Fragment parse failure, with the byte offset where parsing stopped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {position}")]
pub struct XmlError {
    pub message: String,
    pub position: usize,
}

impl XmlError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        XmlError {
            message: message.into(),
            position,
        }
    }
}

/// Parse a complete XML fragment into a single root element.
///
/// Whitespace around the root is tolerated; any other content outside it is
/// an error, as is an unterminated or mismatched tag anywhere.
pub fn parse_fragment(text: &str) -> Result<Element, XmlError> {
    let bytes = text.as_bytes();
    let mut scanner = Scanner::new(bytes);
    let mut stack: Vec<Element> = Vec::new();

    while let Some(b) = scanner.peek() {
        if b != b'<' {
            // Character data run up to the next tag
            let start = scanner.position();
            let end = scanner.find_byte(b'<').unwrap_or(bytes.len());
            match stack.last_mut() {
                Some(parent) => parent.children.push(Node::Text(text[start..end].to_string())),
                None => {
                    if !bytes[start..end].iter().copied().all(is_whitespace) {
                        return Err(XmlError::new("text outside root element", start));
                    }
                }
            }
            scanner.set_position(end);
            continue;
        }

        let tag_start = scanner.position();
        match scanner.peek_at(1) {
            None => return Err(XmlError::new("unterminated tag", tag_start)),

            Some(b'/') => {
                scanner.advance(2);
                let name_start = scanner.position();
                if scanner.read_name().is_none() {
                    return Err(XmlError::new("invalid name in closing tag", name_start));
                }
                let name = &text[name_start..scanner.position()];
                scanner.skip_whitespace();
                if scanner.peek() != Some(b'>') {
                    return Err(XmlError::new(
                        "expected '>' in closing tag",
                        scanner.position(),
                    ));
                }
                scanner.advance(1);

                let el = match stack.pop() {
                    Some(el) => el,
                    None => {
                        return Err(XmlError::new(
                            "closing tag without matching open tag",
                            tag_start,
                        ))
                    }
                };
                if el.name != name {
                    return Err(XmlError::new(
                        format!(
                            "mismatched closing tag: expected </{}>, found </{}>",
                            el.name, name
                        ),
                        tag_start,
                    ));
                }

                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(el)),
                    None => return finish_root(el, &mut scanner),
                }
            }

            Some(b'!') | Some(b'?') => {
                return Err(XmlError::new("unsupported markup", tag_start));
            }

            Some(_) => {
                scanner.advance(1);
                let name_start = scanner.position();
                if scanner.read_name().is_none() {
                    return Err(XmlError::new("invalid element name", name_start));
                }
                let name = &text[name_start..scanner.position()];

                let gt = match scanner.find_tag_end_quoted() {
                    Some(gt) => gt,
                    None => return Err(XmlError::new("unterminated start tag", tag_start)),
                };
                let self_closing = bytes[gt - 1] == b'/';
                let attr_end = if self_closing { gt - 1 } else { gt };

                let mut el = Element::new(name);
                el.attributes = parse_attr_region(text, scanner.position(), attr_end)
                    .map_err(|msg| XmlError::new(msg, tag_start))?;
                scanner.set_position(gt + 1);

                if self_closing {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(el)),
                        None => return finish_root(el, &mut scanner),
                    }
                } else {
                    stack.push(el);
                }
            }
        }
    }

    if stack.is_empty() {
        Err(XmlError::new("no element found", 0))
    } else {
        Err(XmlError::new("unterminated element", bytes.len()))
    }
}

/// Parse a single start tag (`<name attrs...>`) into its name and
/// attributes. Used for the stream header, which never closes.
pub(crate) fn parse_start_tag(text: &str) -> Result<(String, Vec<Attribute>), XmlError> {
    let bytes = text.as_bytes();
    let mut scanner = Scanner::new(bytes);

    if scanner.peek() != Some(b'<') {
        return Err(XmlError::new("expected '<'", 0));
    }
    scanner.advance(1);

    let name_start = scanner.position();
    if scanner.read_name().is_none() {
        return Err(XmlError::new("invalid tag name", name_start));
    }
    let name = &text[name_start..scanner.position()];

    let gt = match scanner.find_tag_end_quoted() {
        Some(gt) => gt,
        None => return Err(XmlError::new("unterminated start tag", 0)),
    };
    let attr_start = scanner.position();
    let attributes =
        parse_attr_region(text, attr_start, gt).map_err(|msg| XmlError::new(msg, attr_start))?;

    if gt + 1 != bytes.len() {
        return Err(XmlError::new("content after tag", gt + 1));
    }

    Ok((name.to_string(), attributes))
}

/// Materialize the attribute region `text[start..end]` into owned pairs
fn parse_attr_region(
    text: &str,
    start: usize,
    end: usize,
) -> Result<Vec<Attribute>, &'static str> {
    let spans = attributes::parse_spans(&text.as_bytes()[start..end])?;
    Ok(spans
        .into_iter()
        .map(|s| Attribute {
            name: text[start + s.name.start..start + s.name.end].to_string(),
            value: text[start + s.value.start..start + s.value.end].to_string(),
        })
        .collect())
}

/// After the root element closes, only trailing whitespace may remain
fn finish_root(el: Element, scanner: &mut Scanner<'_>) -> Result<Element, XmlError> {
    scanner.skip_whitespace();
    if !scanner.is_eof() {
        return Err(XmlError::new(
            "content after root element",
            scanner.position(),
        ));
    }
    Ok(el)
}

//! Structural stanza framing
//!
//! Locates syntax boundaries on raw bytes, before and without character
//! decoding: the end of the opening stream-header tag, and the span of one
//! complete top-level element tracked across nested tags. A scan either
//! completes with an end offset, needs more bytes, or reports the stream as
//! irrecoverably malformed.
//!
//! `>` always ends the current tag token; quoted attribute values get no
//! special treatment here. The header span is validated strictly after the
//! naive `>` search, so an attribute quote left open before that `>`
//! (`<stream p='>`) fails the stream instead of waiting for a closing quote
//! that may never come.

use super::attributes;
use super::scanner::Scanner;

/// Result of one structural scan over the pending buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// A complete span ends at this offset (exclusive)
    Complete(usize),
    /// The buffer ends before the span does; wait for more bytes
    Incomplete,
    /// The stream can never produce a valid span from here
    Malformed(String),
}

/// Classification of a single raw byte at nesting depth zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    /// Space, tab, CR, or LF - ignorable between stanzas
    Whitespace,
    /// `<` - the only legal start of a stanza
    ElementStart,
    /// Anything else, including any byte >= 0x80. A multi-byte character
    /// can never begin legal top-level content, so even a lone lead byte
    /// classifies without waiting for the rest of its sequence.
    LooseText,
}

/// Classify a raw top-level byte between elements
#[inline]
pub fn classify(byte: u8) -> ByteClass {
    match byte {
        b' ' | b'\t' | b'\n' | b'\r' => ByteClass::Whitespace,
        b'<' => ByteClass::ElementStart,
        _ => ByteClass::LooseText,
    }
}

/// Scan for the opening stream-header tag at the start of `buf`.
///
/// Finds the first `>` without quote tracking, then validates the span
/// against the strict start-tag grammar (tag name, well-formed attributes,
/// balanced quoting). The header is the single never-closed tag framing the
/// connection, so a self-closing `/>` is malformed.
pub fn scan_header(buf: &[u8]) -> Scan {
    let Some(&first) = buf.first() else {
        return Scan::Incomplete;
    };
    if first != b'<' {
        return Scan::Malformed(format!(
            "expected '<' to open the stream, found byte 0x{first:02x}"
        ));
    }

    let mut scanner = Scanner::new(buf);
    scanner.advance(1); // Skip '<'

    let Some(gt) = scanner.find_tag_end() else {
        return Scan::Incomplete;
    };

    if scanner.read_name().is_none() {
        return Scan::Malformed("invalid stream tag name".to_string());
    }

    if buf[gt - 1] == b'/' {
        return Scan::Malformed("stream header cannot be self-closing".to_string());
    }

    if let Err(msg) = attributes::parse_spans(&buf[scanner.position()..gt]) {
        return Scan::Malformed(format!("malformed attribute in stream header: {msg}"));
    }

    Scan::Complete(gt + 1)
}

/// Scan for one complete top-level element at the start of `buf`.
///
/// Requires `buf[0] == b'<'`. Tracks nesting depth with a tag-name stack
/// across `<name...>` / `<name.../>` / `</name>` tokens until the outer
/// element closes. Interior tag tokens end at the first `>` without quote
/// awareness - a scoped limitation; the fragment parser applied to the
/// completed span is the authority on the markup itself.
pub fn scan_element(buf: &[u8], max_depth: usize) -> Scan {
    debug_assert_eq!(buf.first(), Some(&b'<'));

    let mut scanner = Scanner::new(buf);
    let mut stack: Vec<&[u8]> = Vec::new();

    loop {
        match scanner.peek() {
            None => return Scan::Incomplete,

            Some(b'<') => {
                scanner.advance(1);
                match scanner.peek() {
                    // '<' was the last pending byte
                    None => return Scan::Incomplete,

                    Some(b'/') => {
                        scanner.advance(1);
                        match scan_closing_tag(&mut scanner, &mut stack) {
                            ClosingTag::NeedMore => return Scan::Incomplete,
                            ClosingTag::Bad(msg) => return Scan::Malformed(msg),
                            ClosingTag::Closed => {
                                if stack.is_empty() {
                                    return Scan::Complete(scanner.position());
                                }
                            }
                        }
                    }

                    // Comments, CDATA, and processing instructions are
                    // protocol violations in an XMPP stream
                    Some(b'!') | Some(b'?') => {
                        return Scan::Malformed("unsupported markup in stream".to_string());
                    }

                    Some(_) => {
                        let Some(name) = scanner.read_name() else {
                            return Scan::Malformed("invalid element name".to_string());
                        };

                        if stack.len() >= max_depth {
                            return Scan::Malformed(format!(
                                "element nesting exceeds depth limit of {max_depth}"
                            ));
                        }

                        // '>' ends the tag token even inside quoted
                        // attribute values
                        let Some(gt) = scanner.find_tag_end() else {
                            return Scan::Incomplete;
                        };

                        let self_closing = buf[gt - 1] == b'/';
                        scanner.set_position(gt + 1);

                        if self_closing {
                            if stack.is_empty() {
                                return Scan::Complete(scanner.position());
                            }
                        } else {
                            stack.push(name);
                        }
                    }
                }
            }

            // Character data inside the element; skip to the next tag.
            // Bytes >= 0x80 (including partial UTF-8 sequences) are fine
            // here - the span is decoded only once it is complete.
            Some(_) => match scanner.find_byte(b'<') {
                Some(pos) => scanner.set_position(pos),
                None => return Scan::Incomplete,
            },
        }
    }
}

enum ClosingTag {
    Closed,
    NeedMore,
    Bad(String),
}

/// Parse `name>` of a closing tag (scanner is past `</`) and match it
/// against the top of the open-tag stack.
fn scan_closing_tag(scanner: &mut Scanner<'_>, stack: &mut Vec<&[u8]>) -> ClosingTag {
    let name = scanner.read_name().unwrap_or(b"");
    scanner.skip_whitespace();

    match scanner.peek() {
        // The name or the '>' may still be in flight
        None => ClosingTag::NeedMore,
        Some(b'>') => {
            if name.is_empty() {
                return ClosingTag::Bad("invalid name in closing tag".to_string());
            }
            let Some(open) = stack.pop() else {
                return ClosingTag::Bad("closing tag without matching open tag".to_string());
            };
            if open != name {
                return ClosingTag::Bad(format!(
                    "mismatched closing tag: expected </{}>, found </{}>",
                    String::from_utf8_lossy(open),
                    String::from_utf8_lossy(name),
                ));
            }
            scanner.advance(1);
            ClosingTag::Closed
        }
        Some(_) => ClosingTag::Bad("invalid name in closing tag".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        for b in [b' ', b'\t', b'\r', b'\n'] {
            assert_eq!(classify(b), ByteClass::Whitespace);
        }
        assert_eq!(classify(b'<'), ByteClass::ElementStart);
        assert_eq!(classify(b'e'), ByteClass::LooseText);
        // Lead byte of a multi-byte sequence is loose text immediately
        assert_eq!(classify(0xD1), ByteClass::LooseText);
        assert_eq!(classify(0xF0), ByteClass::LooseText);
    }

    #[test]
    fn test_header_complete() {
        assert_eq!(scan_header(b"<stream>"), Scan::Complete(8));
        assert_eq!(scan_header(b"<stream><iq/>"), Scan::Complete(8));
        assert_eq!(
            scan_header(b"<stream:stream id=\"s1\" version='1.0'>"),
            Scan::Complete(37)
        );
    }

    #[test]
    fn test_header_incomplete() {
        assert_eq!(scan_header(b""), Scan::Incomplete);
        assert_eq!(scan_header(b"<"), Scan::Incomplete);
        assert_eq!(scan_header(b"<stream id=\"s1\""), Scan::Incomplete);
    }

    #[test]
    fn test_header_not_a_tag() {
        assert!(matches!(scan_header(b"stream"), Scan::Malformed(_)));
        assert!(matches!(scan_header(&[0xD1, 0x84]), Scan::Malformed(_)));
    }

    #[test]
    fn test_header_open_quote_fails_at_naive_gt() {
        // The '>' inside the unterminated quote ends the scan; strict
        // validation of the span then rejects it
        assert!(matches!(scan_header(b"<stream p='>"), Scan::Malformed(_)));
    }

    #[test]
    fn test_header_self_closing_rejected() {
        assert!(matches!(scan_header(b"<stream/>"), Scan::Malformed(_)));
    }

    #[test]
    fn test_header_bad_name() {
        assert!(matches!(scan_header(b"<1stream>"), Scan::Malformed(_)));
        assert!(matches!(scan_header(b"< stream>"), Scan::Malformed(_)));
    }

    #[test]
    fn test_element_simple() {
        assert_eq!(scan_element(b"<iq>text</iq>", 64), Scan::Complete(13));
        assert_eq!(scan_element(b"<iq>text</iq><iq/>", 64), Scan::Complete(13));
    }

    #[test]
    fn test_element_self_closing() {
        assert_eq!(scan_element(b"<ping/>", 64), Scan::Complete(7));
        assert_eq!(scan_element(b"<ping/><iq/>", 64), Scan::Complete(7));
    }

    #[test]
    fn test_element_nested() {
        assert_eq!(
            scan_element(b"<message><body>hi</body></message>", 64),
            Scan::Complete(34)
        );
        assert_eq!(
            scan_element(b"<a><b/><b><c/></b></a>", 64),
            Scan::Complete(22)
        );
    }

    #[test]
    fn test_element_incomplete() {
        assert_eq!(scan_element(b"<", 64), Scan::Incomplete);
        assert_eq!(scan_element(b"<iq", 64), Scan::Incomplete);
        assert_eq!(scan_element(b"<iq>text", 64), Scan::Incomplete);
        assert_eq!(scan_element(b"<iq>text</iq", 64), Scan::Incomplete);
        assert_eq!(scan_element(b"<iq>text</i", 64), Scan::Incomplete);
        assert_eq!(scan_element(b"<a><b></b>", 64), Scan::Incomplete);
    }

    #[test]
    fn test_element_partial_utf8_content_is_fine() {
        // Lead byte of a 2-byte sequence with its continuation byte still
        // in flight; framing proceeds on the ASCII structure around it
        assert_eq!(scan_element(b"<iq>\xD1", 64), Scan::Incomplete);
        assert_eq!(scan_element(b"<iq>\xD1</iq>", 64), Scan::Complete(10));
    }

    #[test]
    fn test_element_mismatched_close() {
        assert!(matches!(
            scan_element(b"<iq>text</msg>", 64),
            Scan::Malformed(_)
        ));
    }

    #[test]
    fn test_element_closing_tag_first() {
        assert!(matches!(scan_element(b"</iq>", 64), Scan::Malformed(_)));
    }

    #[test]
    fn test_element_bad_name() {
        assert!(matches!(scan_element(b"<>", 64), Scan::Malformed(_)));
        assert!(matches!(scan_element(b"<1a>", 64), Scan::Malformed(_)));
    }

    #[test]
    fn test_element_comment_rejected() {
        assert!(matches!(
            scan_element(b"<!-- hi --><iq/>", 64),
            Scan::Malformed(_)
        ));
        assert!(matches!(scan_element(b"<?xml?>", 64), Scan::Malformed(_)));
    }

    #[test]
    fn test_element_depth_limit() {
        assert_eq!(scan_element(b"<a><b><c/></b></a>", 3), Scan::Complete(18));
        assert!(matches!(
            scan_element(b"<a><b><c><d/></c></b></a>", 3),
            Scan::Malformed(_)
        ));
    }

    #[test]
    fn test_element_closing_tag_trailing_whitespace() {
        assert_eq!(scan_element(b"<iq>text</iq >", 64), Scan::Complete(14));
    }
}

//! Stream error taxonomy
//!
//! Every failure is terminal for the parser instance: a framing failure
//! destroys trust in where the next element begins, so there is no resync
//! path. The error callback is the sole reporting channel and fires at most
//! once.

use crate::dom::XmlError;
use thiserror::Error;

/// A fatal stream error
#[derive(Debug, Error)]
pub enum StreamError {
    /// The opening stream tag failed strict validation
    #[error("malformed stream header: {0}")]
    MalformedHeader(String),

    /// Non-whitespace character data between stanzas
    #[error("unexpected character data at stream level (byte 0x{byte:02x})")]
    LooseText {
        /// The first offending raw byte
        byte: u8,
    },

    /// A top-level element could not be framed
    #[error("malformed element: {0}")]
    MalformedElement(String),

    /// A completed span was not valid UTF-8
    #[error("invalid UTF-8 in framed span: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// A completed span was not a well-formed fragment
    #[error("invalid stanza: {0}")]
    Xml(#[from] XmlError),

    /// The pending span outgrew the configured limit before completing
    #[error("pending span exceeds maximum size ({buffered} bytes buffered, limit {max})")]
    StanzaTooLarge {
        /// Bytes buffered for the still-incomplete span
        buffered: usize,
        /// Configured limit
        max: usize,
    },
}

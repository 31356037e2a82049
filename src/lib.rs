//! RustyXMPP - incremental XMPP stanza framing
//!
//! Frames a long-lived XMPP byte stream into discrete stanzas, surviving
//! arbitrary network chunking and partial multi-byte characters, and
//! failing fast on protocol violations.
//!
//! Pipeline:
//! - ByteBuffer: raw received bytes, consumed from the front
//! - Framing: structural scanning on raw bytes (header tag, element spans,
//!   top-level byte classification) - no decoding required
//! - Materialization: strict UTF-8 decode plus fragment parse of each
//!   completed span
//! - StreamParser: the state machine dispatching stanzas and the single
//!   terminal error through caller-supplied callbacks
//!
//! ```
//! use rustyxmpp::StreamParser;
//!
//! let mut parser = StreamParser::new();
//! parser.set_callbacks(
//!     |stanza| println!("stanza: {stanza}"),
//!     |err| eprintln!("stream failed: {err}"),
//! );
//! parser.append_data(b"<stream><iq>text</iq>");
//! ```

mod core;
mod dom;
mod error;
mod stream;

pub use dom::{parse_fragment, Attribute, Element, Node, XmlError};
pub use error::StreamError;
pub use stream::{
    ParserConfig, StreamHeader, StreamParser, StreamState, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_STANZA_BYTES,
};

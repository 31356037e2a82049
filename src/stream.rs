//! Incremental stanza stream parsing
//!
//! Stateful parser that frames a long-lived byte stream into discrete
//! stanzas: raw chunks go in via `append_data`, complete elements come out
//! through the stanza callback, in wire order, synchronously. Any protocol
//! violation permanently fails the stream; the error callback fires exactly
//! once and the parser ignores all further input.

use crate::core::buffer::ByteBuffer;
use crate::core::framing::{self, ByteClass, Scan};
use crate::dom::{self, Attribute, Element};
use crate::error::StreamError;
use tracing::{debug, trace};

/// Default cap on one pending span, header or stanza (1 MiB)
pub const DEFAULT_MAX_STANZA_BYTES: usize = 1024 * 1024;

/// Default cap on element nesting inside one stanza
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser lifecycle state. Monotonic: nothing leaves `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Waiting for the opening stream-header tag
    AwaitingHeader,
    /// Header consumed; framing top-level stanzas
    InBody,
    /// A violation occurred; all further input is ignored
    Failed,
}

/// Resource limits for a parser instance
#[derive(Debug, Clone)]
pub struct ParserConfig {
    max_stanza_bytes: usize,
    max_depth: usize,
}

impl ParserConfig {
    /// Create a config with default limits
    pub fn new() -> Self {
        ParserConfig {
            max_stanza_bytes: DEFAULT_MAX_STANZA_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the maximum size of one pending span. A header or stanza still
    /// incomplete past this many buffered bytes fails the stream.
    pub fn max_stanza_bytes(mut self, max: usize) -> Self {
        self.max_stanza_bytes = max;
        self
    }

    /// Set the maximum element nesting depth inside one stanza
    pub fn max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The framed opening tag of the stream
#[derive(Debug, Clone)]
pub struct StreamHeader {
    name: String,
    attributes: Vec<Attribute>,
}

impl StreamHeader {
    /// Tag name of the header (e.g. `stream:stream`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a header attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// All header attributes in document order
    pub fn attrs(&self) -> &[Attribute] {
        &self.attributes
    }
}

type StanzaCallback = Box<dyn FnMut(Element)>;
type ErrorCallback = Box<dyn FnMut(StreamError)>;

/// Stateful incremental stream parser.
///
/// One instance serves one signaling connection: feed it every received
/// chunk, in wire order, from one thread. There is no reset - discard the
/// instance when the connection ends or fails.
pub struct StreamParser {
    /// Received-but-unconsumed raw bytes
    buffer: ByteBuffer,
    state: StreamState,
    header: Option<StreamHeader>,
    config: ParserConfig,
    on_stanza: Option<StanzaCallback>,
    on_error: Option<ErrorCallback>,
}

impl StreamParser {
    /// Create a parser with default limits
    pub fn new() -> Self {
        Self::with_config(ParserConfig::new())
    }

    /// Create a parser with explicit limits
    pub fn with_config(config: ParserConfig) -> Self {
        StreamParser {
            buffer: ByteBuffer::new(),
            state: StreamState::AwaitingHeader,
            header: None,
            config,
            on_stanza: None,
            on_error: None,
        }
    }

    /// Register the delivery callbacks. Call once, before any data.
    ///
    /// `on_stanza` receives each framed stanza in wire order; `on_error`
    /// receives the single terminal error, after which nothing else fires.
    pub fn set_callbacks<S, E>(&mut self, on_stanza: S, on_error: E)
    where
        S: FnMut(Element) + 'static,
        E: FnMut(StreamError) + 'static,
    {
        self.on_stanza = Some(Box::new(on_stanza));
        self.on_error = Some(Box::new(on_error));
    }

    /// Feed one received chunk. Runs the extraction loop to completion
    /// before returning; callbacks fire synchronously from inside this
    /// call. After a failure this accepts input with no observable effect.
    pub fn append_data(&mut self, data: &[u8]) {
        if self.state == StreamState::Failed {
            trace!(bytes = data.len(), "dropping data after stream failure");
            return;
        }
        trace!(bytes = data.len(), "appending chunk");
        self.buffer.append(data);
        self.run();
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The framed stream header, once the parser has left `AwaitingHeader`
    pub fn header(&self) -> Option<&StreamHeader> {
        self.header.as_ref()
    }

    /// Bytes received but not yet structurally consumed
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Extraction loop: framed spans are consumed and delivered left to
    /// right until the buffer is exhausted, a span is incomplete, or the
    /// stream fails.
    fn run(&mut self) {
        loop {
            match self.state {
                StreamState::Failed => return,

                StreamState::AwaitingHeader => {
                    match framing::scan_header(self.buffer.as_slice()) {
                        Scan::Complete(end) => match self.materialize_header(end) {
                            Ok(header) => {
                                trace!(name = %header.name, "stream header framed");
                                self.header = Some(header);
                                self.buffer.consume(end);
                                self.state = StreamState::InBody;
                            }
                            Err(err) => return self.fail(err),
                        },
                        Scan::Incomplete => return self.check_pending_size(),
                        Scan::Malformed(msg) => {
                            return self.fail(StreamError::MalformedHeader(msg))
                        }
                    }
                }

                StreamState::InBody => {
                    if self.buffer.is_empty() {
                        return;
                    }
                    let byte = self.buffer.as_slice()[0];
                    match framing::classify(byte) {
                        ByteClass::Whitespace => self.buffer.consume(1),

                        // No amount of further data rehabilitates top-level
                        // character data; fail without waiting
                        ByteClass::LooseText => {
                            return self.fail(StreamError::LooseText { byte })
                        }

                        ByteClass::ElementStart => {
                            match framing::scan_element(
                                self.buffer.as_slice(),
                                self.config.max_depth,
                            ) {
                                Scan::Complete(end) => {
                                    match materialize(&self.buffer.as_slice()[..end]) {
                                        Ok(stanza) => {
                                            trace!(bytes = end, name = %stanza.name(), "stanza framed");
                                            self.buffer.consume(end);
                                            self.emit(stanza);
                                        }
                                        Err(err) => return self.fail(err),
                                    }
                                }
                                Scan::Incomplete => return self.check_pending_size(),
                                Scan::Malformed(msg) => {
                                    return self.fail(StreamError::MalformedElement(msg))
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Decode and parse the completed header span
    fn materialize_header(&self, end: usize) -> Result<StreamHeader, StreamError> {
        let text = std::str::from_utf8(&self.buffer.as_slice()[..end])?;
        let (name, attributes) = dom::parse_start_tag(text)?;
        Ok(StreamHeader { name, attributes })
    }

    /// A span is incomplete; make sure it has not outgrown the limit
    fn check_pending_size(&mut self) {
        let buffered = self.buffer.len();
        if buffered > self.config.max_stanza_bytes {
            self.fail(StreamError::StanzaTooLarge {
                buffered,
                max: self.config.max_stanza_bytes,
            });
        }
    }

    fn emit(&mut self, stanza: Element) {
        if let Some(cb) = self.on_stanza.as_mut() {
            cb(stanza);
        }
    }

    /// Transition to `Failed` and deliver the terminal error. Every caller
    /// returns out of the extraction loop immediately afterwards, so the
    /// error callback can never fire twice.
    fn fail(&mut self, err: StreamError) {
        debug!(error = %err, "stream failed");
        self.state = StreamState::Failed;
        self.buffer.clear();
        if let Some(cb) = self.on_error.as_mut() {
            cb(err);
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Strict UTF-8 decode of exactly the completed span, then fragment parse.
///
/// Decoding the whole span at once is what makes a genuinely invalid
/// reassembled byte sequence fail while a validly split-then-reassembled
/// sequence (same bytes, delivered across calls) succeeds.
fn materialize(span: &[u8]) -> Result<Element, StreamError> {
    let text = std::str::from_utf8(span)?;
    Ok(dom::parse_fragment(text)?)
}

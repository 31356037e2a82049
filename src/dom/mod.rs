//! Stanza materialization
//!
//! Owned element trees and the strict fragment parser that produces them
//! from the decoded text of a completed span.

pub mod element;
pub mod parser;

pub use element::{Attribute, Element, Node};
pub use parser::{parse_fragment, XmlError};

pub(crate) use parser::parse_start_tag;

//! Chat completion stream parser
//!
//! Decodes the `data:`-line event stream of the chat completions endpoint
//! into typed deltas

pub mod delta;
pub mod error;
pub mod escape;
pub mod splitter;

pub use delta::{Delta, DeltaParser};
pub use error::{ParseError, ParseResult};
pub use escape::{descape, escape};
pub use splitter::{EventRecord, FrameSplitter};

//! Chat completion data models
//!
//! Contains wire types for streamed chunks, messages, requests and the model catalog

pub mod catalog;
pub mod chunk;
pub mod message;
pub mod request;

pub use catalog::Model;
pub use message::{Message, Role};
pub use request::{ChatCompletionRequest, FunctionDefinition};

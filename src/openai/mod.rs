//! Chat completions client
//!
//! Streaming decoder, function call assembly, wire types and the HTTP provider

pub mod assembler;
pub mod errors;
pub mod model;
pub mod parser;
pub mod provider;

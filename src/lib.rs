//! Streaming chat client with function calling against a code execution server

pub mod conversation;
pub mod http_client;
pub mod model;
pub mod openai;
pub mod plugin;

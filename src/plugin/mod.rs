//! Tool server integration

pub mod client;
pub mod registry;

pub use client::{ToolServerClient, UploadedFile};
pub use registry::ToolRegistry;

//! Conversation driver
//!
//! Owns the message list, runs the stream → dispatch → stream tool loop and
//! exposes cooperative cancellation.

pub mod backend;
pub mod cancel;
pub mod driver;
pub mod error;
pub mod state;

pub use backend::{ChatBackend, ChunkStream, ToolBackend};
pub use cancel::CancelHandle;
pub use driver::{ConversationDriver, TurnOutcome};
pub use error::{ChatError, ChatResult};
pub use state::{ConversationEvent, ConversationState};

//! Transport seams of the conversation driver
//!
//! The driver only needs a byte stream for a chat request and a JSON answer
//! for a tool request. HTTP implementations live in
//! [`crate::openai::provider`] and [`crate::plugin::client`].

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::openai::model::ChatCompletionRequest;

use super::error::ChatResult;

/// Raw response body chunks of a streaming chat request
pub type ChunkStream = Pin<Box<dyn Stream<Item = ChatResult<Bytes>> + Send>>;

/// Opens streaming chat completion requests
pub trait ChatBackend {
    /// Send the request; dropping the returned stream aborts it
    fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> impl Future<Output = ChatResult<ChunkStream>> + Send;
}

/// Invokes tool endpoints
pub trait ToolBackend {
    /// POST `body` verbatim to `endpoint` and decode the JSON answer
    fn dispatch(
        &self,
        endpoint: &str,
        body: &str,
    ) -> impl Future<Output = ChatResult<serde_json::Value>> + Send;
}

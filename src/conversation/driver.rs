//! Conversation driver
//!
//! Runs one user turn: stream the assistant reply into the message list,
//! dispatch any function call it contains to the tool server, append the
//! result and stream again, until the model answers with plain text.
//!
//! ```text
//! Idle ─► Streaming ─┬─► plain reply (done)
//!                    └─► function call ─► Dispatching ─► Streaming ...
//! (any await) ─► Cancelled
//! ```

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::model::config::Config;
use crate::openai::assembler::{Emission, FunctionCall, TurnDecoder};
use crate::openai::model::{ChatCompletionRequest, Message, Model};
use crate::openai::parser::FrameSplitter;
use crate::plugin::{ToolRegistry, UploadedFile};

use super::backend::{ChatBackend, ToolBackend};
use super::cancel::CancelHandle;
use super::error::{ChatError, ChatResult};
use super::state::{ConversationEvent, ConversationState};

/// How a user turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Final plain-text assistant reply
    Reply(String),
    /// Stopped by the user; the conversation is left as it was at that point
    Cancelled,
}

/// Result of streaming one assistant message
enum RoundOutcome {
    Complete(String),
    Cancelled,
}

/// Request parameters taken from the config
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub model: Model,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_tool_rounds: usize,
    pub max_line_bytes: usize,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// State private to one streamed assistant message
struct StreamSession {
    round: usize,
    decoder: TurnDecoder,
    token: CancellationToken,
    cancel: CancelHandle,
}

impl StreamSession {
    fn new(round: usize, max_line_bytes: usize, token: CancellationToken, cancel: CancelHandle) -> Self {
        Self {
            round,
            decoder: TurnDecoder::with_splitter(FrameSplitter::with_max_line_bytes(max_line_bytes)),
            token,
            cancel,
        }
    }

    /// Acknowledge an observed cancellation
    fn acknowledge_cancel(&self) -> RoundOutcome {
        self.cancel.clear();
        tracing::info!(round = self.round, "Turn cancelled");
        RoundOutcome::Cancelled
    }
}

/// Text of the synthetic function message for a tool response
///
/// String results are inserted as-is, other JSON values serialized. The
/// fallback text is used only when the response has no `result` field.
pub fn function_result_content(response: &Value) -> String {
    match response.get("result") {
        None => "result: ok".to_string(),
        Some(Value::String(text)) => format!("result: {}", text),
        Some(other) => format!("result: {}", other),
    }
}

/// Assistant message appended when the model names an unknown function
pub fn unknown_function_apology(name: &str) -> String {
    format!("I'm sorry, I used the incorrect function name '{}'. Let me try again:\n", name)
}

/// Owns the message list of one chat session and drives its turns
pub struct ConversationDriver<C, T> {
    chat: C,
    tools: T,
    registry: ToolRegistry,
    settings: DriverSettings,
    system_prompt: String,
    state: ConversationState,
    cancel: CancelHandle,
}

impl<C: ChatBackend, T: ToolBackend> ConversationDriver<C, T> {
    pub fn new(chat: C, tools: T, registry: ToolRegistry, config: &Config) -> Self {
        let settings = DriverSettings::from_config(config);
        let system_prompt = config.system_prompt_for(settings.model);
        Self {
            chat,
            tools,
            registry,
            state: ConversationState::new(system_prompt.clone()),
            system_prompt,
            settings,
            cancel: CancelHandle::new(config.cancel_reset_window()),
        }
    }

    /// Publish every message mutation on `events`
    pub fn with_events(mut self, events: tokio::sync::mpsc::UnboundedSender<ConversationEvent>) -> Self {
        self.state = self.state.with_events(events);
        self
    }

    /// Handle for stopping the in-flight turn from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Append a user message (with an optional uploaded file note) and run the turn
    pub async fn send_user_message(
        &mut self,
        text: &str,
        upload: Option<&UploadedFile>,
    ) -> ChatResult<TurnOutcome> {
        let mut content = text.to_string();
        if let Some(file) = upload {
            content.push_str(&file.message_suffix());
        }
        self.state.push(Message::user(content));
        self.send_turn().await
    }

    /// Drop everything after the last user message and run the turn again
    ///
    /// Returns `Ok(None)` when there is no user message yet.
    pub async fn regenerate(&mut self) -> ChatResult<Option<TurnOutcome>> {
        if !self.state.truncate_after_last_user() {
            return Ok(None);
        }
        self.send_turn().await.map(Some)
    }

    /// Start a new conversation
    pub fn reset(&mut self) {
        self.cancel.clear();
        self.state.reset(self.system_prompt.clone());
    }

    /// Run the stream → dispatch → stream loop on the current message list
    pub async fn send_turn(&mut self) -> ChatResult<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", turn_id = %turn_id, model = self.settings.model.id());

        // a stop request from before this turn must not cancel it
        let token = self.cancel.begin_turn();
        self.state.set_streaming(true);
        let result = self.run_rounds(&token).instrument(span).await;
        self.state.set_streaming(false);

        match &result {
            Ok(TurnOutcome::Reply(content)) => {
                tracing::debug!(%turn_id, reply_len = content.len(), "Turn complete")
            }
            Ok(TurnOutcome::Cancelled) => {}
            Err(e) => tracing::warn!(%turn_id, "Turn failed: {}", e),
        }
        result
    }

    async fn run_rounds(&mut self, token: &CancellationToken) -> ChatResult<TurnOutcome> {
        let mut round = 0;
        loop {
            let content = match self.stream_round(round, token).await? {
                RoundOutcome::Complete(content) => content,
                RoundOutcome::Cancelled => return Ok(TurnOutcome::Cancelled),
            };

            let Some(call) = FunctionCall::extract(&content)? else {
                return Ok(TurnOutcome::Reply(content));
            };

            // nothing is appended or dispatched once the user pressed stop
            if token.is_cancelled() {
                self.cancel.clear();
                tracing::info!(function = %call.name, "Turn cancelled before dispatch");
                return Ok(TurnOutcome::Cancelled);
            }

            if round >= self.settings.max_tool_rounds {
                return Err(ChatError::ToolRoundLimit {
                    limit: self.settings.max_tool_rounds,
                });
            }
            round += 1;

            let Some(endpoint) = self.registry.resolve(&call.name).map(str::to_string) else {
                tracing::info!(function = %call.name, "Unknown function name, asking the model to retry");
                self.state
                    .push(Message::assistant(unknown_function_apology(&call.name)));
                continue;
            };

            tracing::info!(function = %call.name, endpoint = %endpoint, "Dispatching function call");
            let response = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.cancel.clear();
                    tracing::info!(function = %call.name, "Turn cancelled during dispatch");
                    return Ok(TurnOutcome::Cancelled);
                }
                response = self.tools.dispatch(&endpoint, &call.arguments) => response?,
            };

            self.state
                .push(Message::function(call.name, function_result_content(&response)));
        }
    }

    /// Stream one assistant message into the message list
    async fn stream_round(&mut self, round: usize, token: &CancellationToken) -> ChatResult<RoundOutcome> {
        let mut session = StreamSession::new(
            round,
            self.settings.max_line_bytes,
            token.clone(),
            self.cancel.clone(),
        );
        let request = ChatCompletionRequest::new(
            self.settings.model,
            self.state.messages().to_vec(),
            self.registry.functions(),
            self.settings.temperature,
            self.settings.max_tokens,
        );

        let mut stream = tokio::select! {
            biased;
            _ = session.token.cancelled() => return Ok(session.acknowledge_cancel()),
            stream = self.chat.open_stream(&request) => stream?,
        };

        loop {
            if session.token.is_cancelled() {
                drop(stream);
                return Ok(session.acknowledge_cancel());
            }

            let next = tokio::select! {
                biased;
                _ = session.token.cancelled() => return Ok(session.acknowledge_cancel()),
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let emission = session.decoder.feed(&chunk?)?;
            self.apply_emission(emission, &session.decoder);

            if session.decoder.is_done() {
                break;
            }
        }

        let emission = session.decoder.finish();
        self.apply_emission(emission, &session.decoder);

        if session.decoder.records_failed() > 0 {
            tracing::warn!(
                round,
                records_failed = session.decoder.records_failed(),
                "Skipped malformed stream records"
            );
        }
        Ok(RoundOutcome::Complete(session.decoder.into_content()))
    }

    fn apply_emission(&mut self, emission: Emission, decoder: &TurnDecoder) {
        match emission {
            Emission::Nothing => {}
            Emission::Started if decoder.is_function_call() => {
                self.state.push(Message::function_call(decoder.content()));
            }
            Emission::Started => {
                self.state.push(Message::assistant(decoder.content()));
            }
            Emission::Appended => self.state.update_last(decoder.content()),
        }
    }
}

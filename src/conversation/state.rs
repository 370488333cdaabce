//! Conversation message list and its change events

use tokio::sync::mpsc::UnboundedSender;

use crate::openai::model::{Message, Role};

/// Prompt for models without tool access
pub const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Prompt for code interpreter models, pointing at the tool server's static files
pub fn code_interpreter_prompt(tool_server_url: &str) -> String {
    let base = tool_server_url.trim_end_matches('/');
    format!(
        "`codesherpa` namespace:\n\
         A plugin for interactive code execution, file management, and shell command execution.\n\
         '/repl' endpoint\n\
         - Execute Python code interactively for general programming, tasks, data analysis, visualizations, and more.\n\
         - Pre-installed packages: matplotlib, seaborn, pandas, numpy, scipy, openpyxl.\n\
         '/command' endpoint\n\
         - Run terminal commands and interact with the filesystem, run scripts, and more.\n\
         - Embed media files created or uploaded using '{base}/static/images/' URL in responses.\n\
         - When a user uploads a dataset (.csv, .xlsx, etc.), immediately do basic data analysis and \
         visualization and embed the results in the response.\n\
         - Access user-uploaded files in 'static/uploads/' directory using '{base}/static/uploads/' URL.\n\
         File management\n\
         - Embed images and other media files in responses using '{base}/static/images/' URL.\n\
         - Access user-uploaded files in 'static/uploads/'\n"
    )
}

/// Observable change to the conversation, published in mutation order
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    MessageAdded { index: usize, message: Message },
    /// Content of the active (last) message replaced
    MessageUpdated { index: usize, content: String },
    StreamingChanged(bool),
    /// Every message from `len` on was removed
    MessagesTruncated { len: usize },
}

/// Message list plus streaming flag of one chat session
///
/// While a turn streams, messages are only appended and only the last one
/// may have its content replaced. Between turns the list can be cut back for
/// a regenerate or a new conversation. Applying the published events in
/// order to an empty list rebuilds it exactly.
#[derive(Debug)]
pub struct ConversationState {
    messages: Vec<Message>,
    is_streaming: bool,
    events: Option<UnboundedSender<ConversationEvent>>,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            is_streaming: false,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<ConversationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Whether the message at `index` is still being appended to
    pub fn is_message_active(&self, index: usize) -> bool {
        self.is_streaming && index + 1 == self.messages.len()
    }

    pub fn push(&mut self, message: Message) -> usize {
        let index = self.messages.len();
        self.messages.push(message.clone());
        self.publish(ConversationEvent::MessageAdded { index, message });
        index
    }

    /// Replace the content of the last message
    pub fn update_last(&mut self, content: &str) {
        let index = self.messages.len().saturating_sub(1);
        let Some(last) = self.messages.last_mut() else {
            return;
        };
        if last.content == content {
            return;
        }
        last.content.clear();
        last.content.push_str(content);
        self.publish(ConversationEvent::MessageUpdated {
            index,
            content: content.to_string(),
        });
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        if self.is_streaming != streaming {
            self.is_streaming = streaming;
            self.publish(ConversationEvent::StreamingChanged(streaming));
        }
    }

    /// Drop every message after the last user message
    ///
    /// Returns `false` when there is no user message to regenerate from.
    pub fn truncate_after_last_user(&mut self) -> bool {
        let Some(index) = self.messages.iter().rposition(|m| m.role == Role::User) else {
            return false;
        };
        self.truncate(index + 1);
        true
    }

    /// Start over with a single system message
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.set_streaming(false);
        self.truncate(0);
        self.push(Message::system(system_prompt));
    }

    fn truncate(&mut self, len: usize) {
        if len < self.messages.len() {
            self.messages.truncate(len);
            self.publish(ConversationEvent::MessagesTruncated { len });
        }
    }

    fn publish(&self, event: ConversationEvent) {
        if let Some(events) = &self.events {
            // receiver gone means nobody renders any more
            let _ = events.send(event);
        }
    }
}

//! Function call assembler
//!
//! Folds the ordered deltas of one assistant turn into a single growing
//! string: plain text, or the JSON literal
//! `{"function_call": {"name": "<N>", "arguments": "<ESCAPED>"}}`.
//!
//! ## State Machine Design
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │      Idle       │
//!                  └────────┬────────┘
//!          content          │          function_name
//!       ┌───────────────────┴───────────────────┐
//!       ↓                                       ↓
//! ┌───────────┐                          ┌─────────────┐
//! │   Text    │ ←── content (verbatim)   │    Name     │
//! └───────────┘                          └──────┬──────┘
//!                                               │ function_arguments
//!                                               ↓
//!                                        ┌─────────────┐
//!                   function_arguments → │    Args     │
//!                      (escaped)         └──────┬──────┘
//!                                               │ end(function_call)
//!                                               ↓
//!                                        ┌─────────────┐
//!                                        │    Done     │
//!                                        └─────────────┘
//! ```

use serde::Deserialize;

use crate::openai::parser::{Delta, DeltaParser, EventRecord, FrameSplitter, ParseError, ParseResult, escape};

/// Text that opens an assembled function call
pub const FUNCTION_CALL_MARKER: &str = "{\"function_call\":";

/// Closes the arguments string and both objects
const FUNCTION_CALL_SUFFIX: &str = "\"}}";

/// Assembler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Nothing appended yet
    Idle,
    /// Accumulating plain content
    Text,
    /// Function name written, arguments string open
    Name,
    /// Receiving argument fragments
    Args,
    /// Function call literal closed
    Done,
}

/// Assembly buffer for one assistant turn
#[derive(Debug)]
pub struct FunctionCallAssembler {
    buffer: String,
    state: AssemblerState,
    /// Next argument fragment is the first of its call and loses leading whitespace
    first_argument_chunk: bool,
}

impl Default for FunctionCallAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionCallAssembler {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            state: AssemblerState::Idle,
            first_argument_chunk: true,
        }
    }

    /// Apply one delta, returning the text it appended (if any)
    pub fn push(&mut self, delta: Delta) -> Option<&str> {
        let start = self.buffer.len();

        match delta {
            Delta::FunctionName(name) => {
                if self.state == AssemblerState::Text {
                    tracing::debug!(function = %name, "Function name after text content");
                }
                self.first_argument_chunk = true;
                self.buffer.push_str(&format!(
                    "{} {{\"name\": \"{}\", \"arguments\": \"",
                    FUNCTION_CALL_MARKER,
                    escape(&name)
                ));
                self.state = AssemblerState::Name;
            }
            Delta::FunctionArguments(args) => {
                let fragment = if self.first_argument_chunk { args.trim_start() } else { args.as_str() };
                self.first_argument_chunk = false;
                self.buffer.push_str(&escape(fragment));
                if self.state == AssemblerState::Name {
                    self.state = AssemblerState::Args;
                }
            }
            Delta::End { .. } if self.is_open_call() => {
                self.first_argument_chunk = true;
                self.buffer.push_str(FUNCTION_CALL_SUFFIX);
                self.state = AssemblerState::Done;
            }
            Delta::End { reason } => {
                tracing::trace!(reason = %reason, state = ?self.state, "End marker leaves buffer untouched");
            }
            Delta::Content(text) => {
                self.first_argument_chunk = true;
                self.buffer.push_str(&text);
                if self.state == AssemblerState::Idle {
                    self.state = AssemblerState::Text;
                }
            }
        }

        if self.buffer.len() > start {
            Some(&self.buffer[start..])
        } else {
            None
        }
    }

    /// Whether the arguments string of a call is still open
    fn is_open_call(&self) -> bool {
        matches!(self.state, AssemblerState::Name | AssemblerState::Args)
    }

    /// Whether this turn is shaped as a function call
    pub fn is_function_call(&self) -> bool {
        matches!(
            self.state,
            AssemblerState::Name | AssemblerState::Args | AssemblerState::Done
        )
    }

    /// Get current state
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Accumulated content
    pub fn content(&self) -> &str {
        &self.buffer
    }

    /// Consume the assembler, yielding the accumulated content
    pub fn into_content(self) -> String {
        self.buffer
    }
}

/// What a fed chunk did to the assembly buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Nothing appended
    Nothing,
    /// First text of the turn appended, a new message should be created
    Started,
    /// More text appended to an already started turn
    Appended,
}

impl Emission {
    fn merge(self, appended: bool, started_before: bool) -> Self {
        match (self, appended) {
            (Self::Started, _) => Self::Started,
            (_, false) => self,
            (_, true) if started_before => Self::Appended,
            (_, true) => Self::Started,
        }
    }
}

/// Byte chunks → records → deltas → assembly buffer, for one turn
pub struct TurnDecoder {
    splitter: FrameSplitter,
    parser: DeltaParser,
    assembler: FunctionCallAssembler,
    started: bool,
    done: bool,
}

impl Default for TurnDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnDecoder {
    pub fn new() -> Self {
        Self::with_splitter(FrameSplitter::new())
    }

    pub fn with_splitter(splitter: FrameSplitter) -> Self {
        Self {
            splitter,
            parser: DeltaParser::new(),
            assembler: FunctionCallAssembler::new(),
            started: false,
            done: false,
        }
    }

    /// Process one transport chunk completely
    pub fn feed(&mut self, chunk: &[u8]) -> ParseResult<Emission> {
        self.splitter.feed(chunk)?;
        let mut emission = Emission::Nothing;
        while let Some(record) = self.splitter.decode() {
            emission = self.apply(record, emission);
        }
        Ok(emission)
    }

    /// Flush the splitter once the transport is exhausted
    pub fn finish(&mut self) -> Emission {
        let mut emission = Emission::Nothing;
        while let Some(record) = self.splitter.finish() {
            emission = self.apply(record, emission);
        }
        emission
    }

    fn apply(&mut self, record: EventRecord, emission: Emission) -> Emission {
        if self.done {
            return emission;
        }
        let payload = match record {
            EventRecord::Done => {
                self.done = true;
                return emission;
            }
            EventRecord::Payload(payload) => payload,
        };
        let Some(delta) = self.parser.parse(&payload) else {
            return emission;
        };

        let started_before = self.started;
        let appended = self.assembler.push(delta).is_some();
        if appended {
            self.started = true;
        }
        emission.merge(appended, started_before)
    }

    /// Whether the `[DONE]` sentinel was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_function_call(&self) -> bool {
        self.assembler.is_function_call()
    }

    pub fn content(&self) -> &str {
        self.assembler.content()
    }

    pub fn into_content(self) -> String {
        self.assembler.into_content()
    }

    /// Get number of malformed records skipped
    pub fn records_failed(&self) -> usize {
        self.parser.records_failed()
    }
}

/// Function call decoded from assembled content
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON text, used as the tool request body as-is
    pub arguments: String,
}

#[derive(Deserialize)]
struct FunctionCallEnvelope {
    function_call: FunctionCall,
}

impl FunctionCall {
    /// Locate the function call marker and decode everything from it onwards
    ///
    /// # Returns
    /// - `Ok(None)` - No marker, the content is a plain reply
    /// - `Ok(Some(call))` - Decoded function call
    /// - `Err(FunctionCallDecode)` - Marker present but the literal is not valid JSON
    pub fn extract(content: &str) -> ParseResult<Option<Self>> {
        let Some(index) = content.find(FUNCTION_CALL_MARKER) else {
            return Ok(None);
        };
        let envelope: FunctionCallEnvelope =
            serde_json::from_str(&content[index..]).map_err(ParseError::FunctionCallDecode)?;
        Ok(Some(envelope.function_call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Delta {
        Delta::FunctionName(s.to_string())
    }

    fn args(s: &str) -> Delta {
        Delta::FunctionArguments(s.to_string())
    }

    fn content(s: &str) -> Delta {
        Delta::Content(s.to_string())
    }

    fn end(reason: &str) -> Delta {
        Delta::End {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_function_call_assembles_to_valid_json() {
        let mut assembler = FunctionCallAssembler::new();
        assembler.push(name("foo"));
        assembler.push(args(" {\"x\":1} "));
        assembler.push(end("function_call"));

        assert_eq!(assembler.state(), AssemblerState::Done);
        let value: serde_json::Value = serde_json::from_str(assembler.content()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"function_call": {"name": "foo", "arguments": "{\"x\":1} "}})
        );
    }

    #[test]
    fn test_arguments_with_control_characters_extract() {
        let code = "print('\u{1b}[31mred\u{1b}[0m')\u{0}";
        let mut assembler = FunctionCallAssembler::new();
        assembler.push(name("repl_repl_post"));
        assembler.push(args("{\"code\":\""));
        assembler.push(args(code));
        assembler.push(args("\"}"));
        assembler.push(end("function_call"));

        let call = FunctionCall::extract(assembler.content()).unwrap().unwrap();
        assert_eq!(call.name, "repl_repl_post");
        assert_eq!(call.arguments, format!("{{\"code\":\"{}\"}}", code));
    }

    #[test]
    fn test_only_first_argument_fragment_loses_leading_whitespace() {
        let mut assembler = FunctionCallAssembler::new();
        assembler.push(name("repl"));
        assembler.push(args("\n {\"code\": \""));
        assembler.push(args("def f():\n    return 1"));
        assembler.push(args("\"} "));
        assembler.push(end("function_call"));

        let call = FunctionCall::extract(assembler.content()).unwrap().unwrap();
        assert_eq!(call.name, "repl");
        assert_eq!(call.arguments, "{\"code\": \"def f():\n    return 1\"} ");
    }

    #[test]
    fn test_plain_text_is_appended_verbatim() {
        let mut assembler = FunctionCallAssembler::new();
        assert_eq!(assembler.push(content("Hel")), Some("Hel"));
        assert_eq!(assembler.push(content("lo")), Some("lo"));

        assert_eq!(assembler.state(), AssemblerState::Text);
        assert_eq!(assembler.content(), "Hello");
        assert!(!assembler.is_function_call());
    }

    #[test]
    fn test_non_function_end_leaves_state() {
        let mut assembler = FunctionCallAssembler::new();
        assembler.push(content("\"quoted\""));
        assert_eq!(assembler.push(end("stop")), None);
        assert_eq!(assembler.state(), AssemblerState::Text);
        assert_eq!(assembler.content(), "\"quoted\"");
    }

    #[test]
    fn test_name_prefix_emitted_on_first_name() {
        let mut assembler = FunctionCallAssembler::new();
        let appended = assembler.push(name("foo")).unwrap().to_string();
        assert_eq!(appended, "{\"function_call\": {\"name\": \"foo\", \"arguments\": \"");
        assert!(assembler.is_function_call());
    }

    #[test]
    fn test_empty_first_argument_after_trim_appends_nothing() {
        let mut assembler = FunctionCallAssembler::new();
        assembler.push(name("foo"));
        assert_eq!(assembler.push(args("  ")), None);
        assert_eq!(assembler.push(args(" x")), Some(" x"));
    }

    #[test]
    fn test_call_without_arguments_closes() {
        let mut assembler = FunctionCallAssembler::new();
        assembler.push(name("noop"));
        assembler.push(end("function_call"));
        let call = FunctionCall::extract(assembler.content()).unwrap().unwrap();
        assert_eq!(call.arguments, "");
    }

    #[test]
    fn test_extract_plain_text() {
        assert_eq!(FunctionCall::extract("just text").unwrap(), None);
    }

    #[test]
    fn test_extract_after_leading_text() {
        let text = "Let me run that. {\"function_call\": {\"name\": \"a\", \"arguments\": \"{}\"}}";
        let call = FunctionCall::extract(text).unwrap().unwrap();
        assert_eq!(call.name, "a");
        assert_eq!(call.arguments, "{}");
    }

    #[test]
    fn test_extract_truncated_call_fails() {
        let result = FunctionCall::extract("{\"function_call\": {\"name\": \"a\", \"arguments\": \"{");
        assert!(matches!(result, Err(ParseError::FunctionCallDecode(_))));
    }

    #[test]
    fn test_turn_decoder_reports_first_emission() {
        let mut decoder = TurnDecoder::new();
        assert_eq!(
            decoder.feed(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n").unwrap(),
            Emission::Nothing
        );
        assert_eq!(
            decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n").unwrap(),
            Emission::Started
        );
        assert_eq!(
            decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n").unwrap(),
            Emission::Appended
        );
        assert!(decoder.is_done());
        assert_eq!(decoder.into_content(), "Hello");
    }

    #[test]
    fn test_turn_decoder_survives_malformed_record() {
        let mut decoder = TurnDecoder::new();
        let chunk = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {not json}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        );
        assert_eq!(decoder.feed(chunk.as_bytes()).unwrap(), Emission::Started);
        assert_eq!(decoder.records_failed(), 1);
        assert_eq!(decoder.content(), "ab");
    }

    #[test]
    fn test_turn_decoder_function_call_split_across_chunks() {
        let stream = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":null,\"function_call\":{\"name\":\"command_endpoint_command_post\",\"arguments\":\"\"}}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"arguments\":\"{\\n\"}}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"arguments\":\"  \\\"command\\\": \\\"ls -la /tmp\\\"\\n\"}}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"arguments\":\"}\"}}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"function_call\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let mut decoder = TurnDecoder::new();
        for piece in stream.as_bytes().chunks(7) {
            decoder.feed(piece).unwrap();
        }
        decoder.finish();

        assert!(decoder.is_function_call());
        let content = decoder.into_content();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["function_call"]["name"], "command_endpoint_command_post");

        let call = FunctionCall::extract(&content).unwrap().unwrap();
        let body: serde_json::Value = serde_json::from_str(&call.arguments).unwrap();
        assert_eq!(body["command"], "ls -la /tmp");
    }

    #[test]
    fn test_turn_decoder_ignores_records_after_done() {
        let mut decoder = TurnDecoder::new();
        decoder
            .feed(b"data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n")
            .unwrap();
        assert_eq!(decoder.content(), "");
    }
}

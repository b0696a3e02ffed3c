//! crates/vista_core/src/accumulator.rs
//!
//! Rebuilds chat messages and tool calls from the Responses API event stream.
//!
//! The accumulator is a plain state machine: it is fed one upstream event at a
//! time and answers with the side effects the caller has to perform (run a local
//! function, persist a finished assistant message). It never does I/O itself.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::domain::MessageRole;
use crate::turn::FunctionOutput;

//=========================================================================================
// Accumulated Items
//=========================================================================================

/// Lifecycle of a tool call as seen through the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Created,
    StreamingArguments,
    ArgumentsComplete,
    Executed,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Function,
    WebSearch,
    FileSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageItem {
    pub item_id: String,
    pub role: MessageRole,
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub item_id: String,
    pub kind: ToolKind,
    pub call_id: Option<String>,
    pub name: Option<String>,
    /// The argument text exactly as streamed so far.
    pub raw_arguments: String,
    /// Best-effort parse of `raw_arguments`; `Value::Null` until something parses.
    pub arguments: Value,
    pub status: ToolCallStatus,
    pub output: Option<String>,
    #[serde(skip)]
    upstream_done: bool,
    #[serde(skip)]
    output_sent: bool,
}

impl ToolCallRecord {
    fn new(item_id: &str, kind: ToolKind) -> Self {
        Self {
            item_id: item_id.to_string(),
            kind,
            call_id: None,
            name: None,
            raw_arguments: String::new(),
            arguments: Value::Null,
            status: ToolCallStatus::Created,
            output: None,
            upstream_done: false,
            output_sent: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccumulatedItem {
    Message(MessageItem),
    ToolCall(ToolCallRecord),
}

impl AccumulatedItem {
    pub fn item_id(&self) -> &str {
        match self {
            AccumulatedItem::Message(m) => &m.item_id,
            AccumulatedItem::ToolCall(t) => &t.item_id,
        }
    }
}

/// Work the caller must carry out in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorEffect {
    ExecuteFunction {
        item_id: String,
        call_id: String,
        name: String,
        arguments: Value,
    },
    PersistMessage {
        item_id: String,
        content: String,
    },
}

//=========================================================================================
// The State Machine
//=========================================================================================

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    items: Vec<AccumulatedItem>,
    index: HashMap<String, usize>,
    persisted: HashSet<String>,
    response_id: Option<String>,
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[AccumulatedItem] {
        &self.items
    }

    /// The id of the upstream response, usable as a continuation token.
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    pub fn tool_call(&self, item_id: &str) -> Option<&ToolCallRecord> {
        match self.index.get(item_id).map(|&i| &self.items[i]) {
            Some(AccumulatedItem::ToolCall(call)) => Some(call),
            _ => None,
        }
    }

    pub fn message(&self, item_id: &str) -> Option<&MessageItem> {
        match self.index.get(item_id).map(|&i| &self.items[i]) {
            Some(AccumulatedItem::Message(message)) => Some(message),
            _ => None,
        }
    }

    /// Applies one upstream event and returns the effects it triggers.
    /// Unknown or malformed events are ignored.
    pub fn apply(&mut self, event: &Value) -> Vec<AccumulatorEffect> {
        let Some(kind) = str_field(event, "type") else {
            return Vec::new();
        };

        match kind {
            "response.created" | "response.completed" => {
                if let Some(id) = event.get("response").and_then(|r| str_field(r, "id")) {
                    self.response_id = Some(id.to_string());
                }
                Vec::new()
            }
            "response.output_item.added" => {
                if let Some(item) = event.get("item") {
                    self.item_added(item);
                }
                Vec::new()
            }
            "response.output_text.delta" => {
                if let (Some(item_id), Some(delta)) =
                    (str_field(event, "item_id"), str_field(event, "delta"))
                {
                    if let Some(message) = self.message_mut(item_id) {
                        message.text.push_str(delta);
                    }
                }
                Vec::new()
            }
            "response.output_text.done" => {
                if let (Some(item_id), Some(text)) =
                    (str_field(event, "item_id"), str_field(event, "text"))
                {
                    if let Some(message) = self.message_mut(item_id) {
                        message.text = text.to_string();
                    }
                }
                Vec::new()
            }
            "response.function_call_arguments.delta" => {
                if let (Some(item_id), Some(delta)) =
                    (str_field(event, "item_id"), str_field(event, "delta"))
                {
                    let Some(call) = self.tool_call_mut(item_id, ToolKind::Function) else {
                        return Vec::new();
                    };
                    call.raw_arguments.push_str(delta);
                    if call.status < ToolCallStatus::StreamingArguments {
                        call.status = ToolCallStatus::StreamingArguments;
                    }
                    if let Some(parsed) = parse_partial_json(&call.raw_arguments) {
                        call.arguments = parsed;
                    }
                }
                Vec::new()
            }
            "response.function_call_arguments.done" => {
                let Some(item_id) = str_field(event, "item_id") else {
                    return Vec::new();
                };
                let arguments = str_field(event, "arguments").map(str::to_string);
                self.arguments_done(item_id, arguments)
            }
            "response.web_search_call.completed" | "response.file_search_call.completed" => {
                if let Some(item_id) = str_field(event, "item_id") {
                    let kind = if kind.starts_with("response.web_search") {
                        ToolKind::WebSearch
                    } else {
                        ToolKind::FileSearch
                    };
                    if let Some(call) = self.tool_call_mut(item_id, kind) {
                        call.status = ToolCallStatus::Completed;
                        call.upstream_done = true;
                    }
                }
                Vec::new()
            }
            "response.output_item.done" => match event.get("item") {
                Some(item) => self.item_done(item),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Records the result of a local function handler for a tool call.
    pub fn record_function_output(&mut self, item_id: &str, output: String) {
        if let Some(&i) = self.index.get(item_id) {
            if let AccumulatedItem::ToolCall(call) = &mut self.items[i] {
                call.output = Some(output);
                call.status = if call.upstream_done {
                    ToolCallStatus::Completed
                } else {
                    ToolCallStatus::Executed
                };
            }
        }
    }

    /// Function outputs that have been recorded but not yet handed back upstream.
    pub fn take_function_outputs(&mut self) -> Vec<FunctionOutput> {
        let mut outputs = Vec::new();
        for item in &mut self.items {
            if let AccumulatedItem::ToolCall(call) = item {
                if call.output_sent {
                    continue;
                }
                if let (Some(call_id), Some(output)) = (&call.call_id, &call.output) {
                    outputs.push(FunctionOutput {
                        call_id: call_id.clone(),
                        output: output.clone(),
                    });
                    call.output_sent = true;
                }
            }
        }
        outputs
    }

    //-------------------------------------------------------------------------------------
    // Event helpers
    //-------------------------------------------------------------------------------------

    fn insert(&mut self, item: AccumulatedItem) -> usize {
        let i = self.items.len();
        self.index.insert(item.item_id().to_string(), i);
        self.items.push(item);
        i
    }

    /// The message record for `item_id`, created or converted from a tool call
    /// of the same id when needed.
    fn message_mut(&mut self, item_id: &str) -> Option<&mut MessageItem> {
        let fresh = || {
            AccumulatedItem::Message(MessageItem {
                item_id: item_id.to_string(),
                role: MessageRole::Assistant,
                text: String::new(),
                done: false,
            })
        };
        let i = match self.index.get(item_id) {
            Some(&i) => i,
            None => self.insert(fresh()),
        };
        if let AccumulatedItem::ToolCall(_) = self.items[i] {
            self.items[i] = fresh();
        }
        match &mut self.items[i] {
            AccumulatedItem::Message(message) => Some(message),
            AccumulatedItem::ToolCall(_) => None,
        }
    }

    /// Tool-call counterpart of `message_mut`.
    fn tool_call_mut(&mut self, item_id: &str, kind: ToolKind) -> Option<&mut ToolCallRecord> {
        let i = match self.index.get(item_id) {
            Some(&i) => i,
            None => self.insert(AccumulatedItem::ToolCall(ToolCallRecord::new(item_id, kind))),
        };
        if let AccumulatedItem::Message(_) = self.items[i] {
            self.items[i] = AccumulatedItem::ToolCall(ToolCallRecord::new(item_id, kind));
        }
        match &mut self.items[i] {
            AccumulatedItem::ToolCall(call) => Some(call),
            AccumulatedItem::Message(_) => None,
        }
    }

    fn item_added(&mut self, item: &Value) {
        let Some(item_id) = str_field(item, "id") else {
            return;
        };
        match str_field(item, "type") {
            Some("message") => {
                let role = str_field(item, "role")
                    .and_then(MessageRole::parse)
                    .unwrap_or(MessageRole::Assistant);
                if let Some(message) = self.message_mut(item_id) {
                    message.role = role;
                }
            }
            Some("function_call") => {
                if let Some(call) = self.tool_call_mut(item_id, ToolKind::Function) {
                    call.call_id = str_field(item, "call_id").map(str::to_string);
                    call.name = str_field(item, "name").map(str::to_string);
                }
            }
            Some("web_search_call") => {
                self.tool_call_mut(item_id, ToolKind::WebSearch);
            }
            Some("file_search_call") => {
                self.tool_call_mut(item_id, ToolKind::FileSearch);
            }
            _ => {}
        }
    }

    fn arguments_done(&mut self, item_id: &str, arguments: Option<String>) -> Vec<AccumulatorEffect> {
        let Some(call) = self.tool_call_mut(item_id, ToolKind::Function) else {
            return Vec::new();
        };
        if call.status >= ToolCallStatus::ArgumentsComplete {
            return Vec::new();
        }
        if let Some(arguments) = arguments {
            call.raw_arguments = arguments;
        }
        if let Some(parsed) = parse_partial_json(&call.raw_arguments) {
            call.arguments = parsed;
        }
        call.status = ToolCallStatus::ArgumentsComplete;

        match (&call.call_id, &call.name) {
            (Some(call_id), Some(name)) => vec![AccumulatorEffect::ExecuteFunction {
                item_id: item_id.to_string(),
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: call.arguments.clone(),
            }],
            _ => Vec::new(),
        }
    }

    fn item_done(&mut self, item: &Value) -> Vec<AccumulatorEffect> {
        let Some(item_id) = str_field(item, "id") else {
            return Vec::new();
        };
        match str_field(item, "type") {
            Some("message") => {
                let final_text = item
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|parts| {
                        parts
                            .iter()
                            .filter(|p| str_field(p, "type") == Some("output_text"))
                            .filter_map(|p| str_field(p, "text"))
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                let Some(message) = self.message_mut(item_id) else {
                    return Vec::new();
                };
                if !final_text.is_empty() {
                    message.text = final_text;
                }
                message.done = true;
                let (role, content) = (message.role, message.text.clone());

                if role != MessageRole::Assistant || content.is_empty() {
                    return Vec::new();
                }
                // At most one persist per item id, even if the upstream repeats itself.
                if !self.persisted.insert(item_id.to_string()) {
                    return Vec::new();
                }
                vec![AccumulatorEffect::PersistMessage {
                    item_id: item_id.to_string(),
                    content,
                }]
            }
            Some("function_call") => {
                let arguments = str_field(item, "arguments").map(str::to_string);
                let call_id = str_field(item, "call_id").map(str::to_string);
                let name = str_field(item, "name").map(str::to_string);
                if let Some(call) = self.tool_call_mut(item_id, ToolKind::Function) {
                    if call.call_id.is_none() {
                        call.call_id = call_id;
                    }
                    if call.name.is_none() {
                        call.name = name;
                    }
                }
                // Covers streams that skip the arguments.done event.
                let effects = self.arguments_done(item_id, arguments);
                if let Some(call) = self.tool_call_mut(item_id, ToolKind::Function) {
                    call.upstream_done = true;
                    if call.status == ToolCallStatus::Executed {
                        call.status = ToolCallStatus::Completed;
                    }
                }
                effects
            }
            Some("web_search_call") | Some("file_search_call") => {
                let kind = if str_field(item, "type") == Some("web_search_call") {
                    ToolKind::WebSearch
                } else {
                    ToolKind::FileSearch
                };
                if let Some(call) = self.tool_call_mut(item_id, kind) {
                    call.status = ToolCallStatus::Completed;
                    call.upstream_done = true;
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

//=========================================================================================
// Partial JSON
//=========================================================================================

/// Parses JSON that may have been cut off mid-stream by closing whatever is still open.
/// Returns `None` when even the repaired text does not parse.
pub fn parse_partial_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                closers.pop();
            }
            _ => {}
        }
    }

    let mut repaired = text.to_string();
    if in_string {
        if escaped {
            repaired.pop();
        }
        repaired.push('"');
    }
    let mut repaired = repaired.trim_end().trim_end_matches(',').to_string();
    if repaired.ends_with(':') {
        repaired.push_str("null");
    }
    while let Some(closer) = closers.pop() {
        repaired.push(closer);
    }
    serde_json::from_str(&repaired).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn function_call_added(item_id: &str, call_id: &str, name: &str) -> Value {
        json!({
            "type": "response.output_item.added",
            "item": {"id": item_id, "type": "function_call", "call_id": call_id, "name": name, "arguments": ""}
        })
    }

    #[test]
    fn text_deltas_accumulate_per_item() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "Hello"}));
        acc.apply(&json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": ", world"}));
        acc.apply(&json!({"type": "response.output_text.delta", "item_id": "msg_2", "delta": "Other"}));

        assert_eq!(acc.items().len(), 2);
        assert_eq!(acc.message("msg_1").unwrap().text, "Hello, world");
        assert_eq!(acc.message("msg_2").unwrap().text, "Other");
        assert_eq!(acc.message("msg_1").unwrap().role, MessageRole::Assistant);
    }

    #[test]
    fn finished_message_is_persisted_once() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&json!({"type": "response.output_item.added", "item": {"id": "msg_1", "type": "message", "role": "assistant"}}));
        acc.apply(&json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "Try data science."}));

        let done = json!({
            "type": "response.output_item.done",
            "item": {"id": "msg_1", "type": "message", "role": "assistant",
                     "content": [{"type": "output_text", "text": "Try data science."}]}
        });
        let effects = acc.apply(&done);
        assert_eq!(
            effects,
            vec![AccumulatorEffect::PersistMessage {
                item_id: "msg_1".to_string(),
                content: "Try data science.".to_string()
            }]
        );
        assert!(acc.message("msg_1").unwrap().done);

        // A repeated completion for the same item must not persist again.
        assert!(acc.apply(&done).is_empty());
    }

    #[test]
    fn function_call_walks_through_its_lifecycle() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&function_call_added("fc_1", "call_1", "toggle_favorite"));
        assert_eq!(acc.tool_call("fc_1").unwrap().status, ToolCallStatus::Created);

        acc.apply(&json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"recommendation_id\": \"ab"}));
        let call = acc.tool_call("fc_1").unwrap();
        assert_eq!(call.status, ToolCallStatus::StreamingArguments);
        assert_eq!(call.arguments, json!({"recommendation_id": "ab"}));

        let effects = acc.apply(&json!({
            "type": "response.function_call_arguments.done",
            "item_id": "fc_1",
            "arguments": "{\"recommendation_id\": \"abc\"}"
        }));
        assert_eq!(
            effects,
            vec![AccumulatorEffect::ExecuteFunction {
                item_id: "fc_1".to_string(),
                call_id: "call_1".to_string(),
                name: "toggle_favorite".to_string(),
                arguments: json!({"recommendation_id": "abc"}),
            }]
        );
        assert_eq!(acc.tool_call("fc_1").unwrap().status, ToolCallStatus::ArgumentsComplete);

        acc.record_function_output("fc_1", "{\"ok\":true}".to_string());
        assert_eq!(acc.tool_call("fc_1").unwrap().status, ToolCallStatus::Executed);

        let effects = acc.apply(&json!({
            "type": "response.output_item.done",
            "item": {"id": "fc_1", "type": "function_call", "call_id": "call_1",
                     "name": "toggle_favorite", "arguments": "{\"recommendation_id\": \"abc\"}"}
        }));
        assert!(effects.is_empty(), "arguments were already complete");
        assert_eq!(acc.tool_call("fc_1").unwrap().status, ToolCallStatus::Completed);

        let outputs = acc.take_function_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].call_id, "call_1");
        assert!(acc.take_function_outputs().is_empty());
    }

    #[test]
    fn reused_item_id_switches_kind() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&function_call_added("item_1", "call_1", "get_profile"));
        acc.apply(&json!({"type": "response.output_text.delta", "item_id": "item_1", "delta": "Hi"}));

        assert!(acc.tool_call("item_1").is_none());
        assert_eq!(acc.message("item_1").map(|m| m.text.as_str()), Some("Hi"));
        assert_eq!(acc.items().len(), 1);

        let effects = acc.apply(&json!({
            "type": "response.function_call_arguments.done",
            "item_id": "item_1",
            "arguments": "{}"
        }));
        assert!(effects.is_empty());
        assert!(acc.message("item_1").is_none());
        assert_eq!(acc.tool_call("item_1").map(|c| c.status), Some(ToolCallStatus::ArgumentsComplete));
    }

    #[test]
    fn malformed_argument_delta_is_swallowed() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&function_call_added("fc_1", "call_1", "get_profile"));
        acc.apply(&json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"a\": 1"}));
        assert_eq!(acc.tool_call("fc_1").unwrap().arguments, json!({"a": 1}));

        acc.apply(&json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "}}}"}));
        let call = acc.tool_call("fc_1").unwrap();
        assert_eq!(call.arguments, json!({"a": 1}), "previous parse is kept");
        assert_eq!(call.raw_arguments, "{\"a\": 1}}}");
    }

    #[test]
    fn search_calls_complete() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&json!({"type": "response.output_item.added", "item": {"id": "ws_1", "type": "web_search_call", "status": "in_progress"}}));
        acc.apply(&json!({"type": "response.web_search_call.completed", "item_id": "ws_1"}));
        let call = acc.tool_call("ws_1").unwrap();
        assert_eq!(call.kind, ToolKind::WebSearch);
        assert_eq!(call.status, ToolCallStatus::Completed);
    }

    #[test]
    fn response_id_is_tracked() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&json!({"type": "response.created", "response": {"id": "resp_1"}}));
        assert_eq!(acc.response_id(), Some("resp_1"));
        acc.apply(&json!({"type": "response.unknown_event"}));
        acc.apply(&json!({"no_type": true}));
        assert!(acc.items().is_empty());
    }

    #[test]
    fn partial_json_repairs() {
        assert_eq!(parse_partial_json("{\"a\": \"b"), Some(json!({"a": "b"})));
        assert_eq!(parse_partial_json("{\"a\": [1, 2,"), Some(json!({"a": [1, 2]})));
        assert_eq!(parse_partial_json("{\"a\":"), Some(json!({"a": null})));
        assert_eq!(parse_partial_json(""), None);
        assert_eq!(parse_partial_json("}"), None);
    }
}

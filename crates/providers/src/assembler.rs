//! Reassembles tool calls whose arguments arrive as JSON fragments.
//!
//! Streaming providers send a tool call piecewise: the id and name first,
//! then the argument text in arbitrary slices. Fragments are keyed by call id,
//! falling back to the positional index when a fragment carries no id.
//! A call is only released once its arguments parse; one that is still
//! malformed at a terminal signal waits for the next one.

use agentloop_core::tool::ToolCallRequest;
use serde_json::Value;
use tracing::warn;

/// One incremental piece of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug)]
struct PendingCall {
    ordinal: u32,
    index: Option<u32>,
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PendingCall {
    /// Parsed arguments, or `None` while the JSON is incomplete.
    fn parsed_arguments(&self) -> Option<Value> {
        if self.arguments.trim().is_empty() {
            return Some(Value::Object(Default::default()));
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Null) => Some(Value::Object(Default::default())),
            Ok(v @ Value::Object(_)) => Some(v),
            _ => None,
        }
    }
}

/// Keyed accumulator for streamed tool-call fragments.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    pending: Vec<PendingCall>,
    next_ordinal: u32,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment into its call, starting a new call if needed.
    pub fn push(&mut self, fragment: ToolCallFragment) {
        let slot = match self.find(fragment.id.as_deref(), fragment.index) {
            Some(pos) => &mut self.pending[pos],
            None => {
                self.pending.push(PendingCall {
                    ordinal: self.next_ordinal,
                    index: fragment.index,
                    id: None,
                    name: String::new(),
                    arguments: String::new(),
                });
                self.next_ordinal += 1;
                let last = self.pending.len() - 1;
                &mut self.pending[last]
            }
        };

        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            slot.id = Some(id);
        }
        if slot.index.is_none() {
            slot.index = fragment.index;
        }
        if let Some(name) = fragment.name.filter(|n| !n.is_empty()) {
            slot.name = name;
        }
        if let Some(args) = fragment.arguments {
            slot.arguments.push_str(&args);
        }
    }

    fn find(&self, id: Option<&str>, index: Option<u32>) -> Option<usize> {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            if let Some(pos) = self.pending.iter().position(|c| c.id.as_deref() == Some(id)) {
                return Some(pos);
            }
            // The id may arrive after index-only fragments opened the call.
            return index.and_then(|i| {
                self.pending
                    .iter()
                    .position(|c| c.index == Some(i) && c.id.is_none())
            });
        }
        match index {
            Some(i) => self.pending.iter().position(|c| c.index == Some(i)),
            None => self.pending.len().checked_sub(1),
        }
    }

    /// Terminal signal: release every call whose arguments are complete, in
    /// the order the calls started. Incomplete calls stay pending.
    pub fn flush(&mut self) -> Vec<ToolCallRequest> {
        let mut ready = Vec::new();
        let mut still_pending = Vec::new();

        for call in self.pending.drain(..) {
            match call.parsed_arguments() {
                Some(arguments) if !call.name.is_empty() => {
                    let id = call
                        .id
                        .unwrap_or_else(|| format!("call_{}", call.index.unwrap_or(call.ordinal)));
                    ready.push(ToolCallRequest::new(id, call.name, arguments));
                }
                _ => still_pending.push(call),
            }
        }

        self.pending = still_pending;
        ready
    }

    /// End of stream: flush, then drop whatever still cannot be parsed.
    pub fn finish(&mut self) -> Vec<ToolCallRequest> {
        let ready = self.flush();
        for call in self.pending.drain(..) {
            warn!(
                tool = %call.name,
                id = call.id.as_deref().unwrap_or(""),
                arguments = %call.arguments,
                "Dropping tool call with unparseable arguments"
            );
        }
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(index: Option<u32>, id: Option<&str>, name: Option<&str>, args: &str) -> ToolCallFragment {
        ToolCallFragment {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments: Some(args.to_string()),
        }
    }

    #[test]
    fn reassembles_fragments_keyed_by_index() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(Some(0), Some("call_abc"), Some("get_weather"), ""));
        asm.push(fragment(Some(0), None, None, "{\"loca"));
        asm.push(fragment(Some(0), None, None, "tion\": \"Tokyo\"}"));

        let calls = asm.flush();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, json!({"location": "Tokyo"}));
        assert!(asm.is_empty());
    }

    #[test]
    fn reassembles_interleaved_calls_keyed_by_id() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(None, Some("a"), Some("first"), "{\"x\":"));
        asm.push(fragment(None, Some("b"), Some("second"), "{\"y\":"));
        asm.push(fragment(None, Some("b"), None, "2}"));
        asm.push(fragment(None, Some("a"), None, "1}"));

        let calls = asm.flush();
        let ids: Vec<_> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(calls[0].arguments, json!({"x": 1}));
        assert_eq!(calls[1].arguments, json!({"y": 2}));
    }

    #[test]
    fn malformed_arguments_are_deferred_to_the_next_terminal_signal() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(Some(0), Some("c1"), Some("search_database"), "{\"query\": \"wea"));
        assert!(asm.flush().is_empty());
        assert!(!asm.is_empty());

        asm.push(fragment(Some(0), None, None, "ther\"}"));
        let calls = asm.flush();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, json!({"query": "weather"}));
    }

    #[test]
    fn finish_drops_calls_that_never_parse() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(Some(0), Some("ok"), Some("a"), "{}"));
        asm.push(fragment(Some(1), Some("bad"), Some("b"), "{not json"));
        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "ok");
        assert!(asm.is_empty());
    }

    #[test]
    fn empty_arguments_mean_an_empty_object() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(Some(0), Some("x1"), Some("get_tasks"), ""));
        let calls = asm.flush();
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn missing_ids_are_synthesised_from_position() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(None, None, Some("a"), "{}"));
        assert_eq!(asm.flush()[0].id, "call_0");

        asm.push(fragment(Some(3), None, Some("b"), "{}"));
        assert_eq!(asm.flush()[0].id, "call_3");
    }

    #[test]
    fn late_id_attaches_to_the_index_only_call() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(Some(0), None, Some("a"), "{\"k\""));
        asm.push(fragment(Some(0), Some("late"), None, ": true}"));
        let calls = asm.flush();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "late");
        assert_eq!(calls[0].arguments, json!({"k": true}));
    }

    #[test]
    fn each_call_is_released_once() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(Some(0), Some("once"), Some("a"), "{}"));
        assert_eq!(asm.flush().len(), 1);
        assert!(asm.flush().is_empty());
        assert!(asm.finish().is_empty());
    }
}

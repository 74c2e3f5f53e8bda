//! Sequential tool execution with name repair, result normalization and
//! history validation.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{Message, Role};
use crate::mcp::{ToolSpec, ToolTransport};
use crate::session::SessionStore;

use super::aggregate::QueuedCall;
use super::events::ToolStateFrame;
use super::{TurnAborted, TurnSender};

/// Tool whose successful result is carried across turns as opaque
/// reasoning state rather than surfaced to the user.
pub const REASONING_TOOL: &str = "sequentialthinking";

/// Resolve a model-emitted tool name against the session's catalog.
///
/// Models occasionally append stray characters to a valid name. An exact
/// catalog match wins; otherwise the longest catalog name that is a
/// strict prefix of the emitted name is taken; otherwise the name passes
/// through unchanged and fails at invocation time.
#[must_use]
pub fn repair_tool_name<'a>(name: &'a str, catalog: &'a [ToolSpec]) -> &'a str {
    if catalog.iter().any(|t| t.name == name) {
        return name;
    }
    catalog
        .iter()
        .filter(|t| name.len() > t.name.len() && name.starts_with(t.name.as_str()))
        .max_by_key(|t| t.name.len())
        .map(|t| t.name.as_str())
        .unwrap_or(name)
}

/// Flatten a structured tool result into a display string.
///
/// Providers wrap payloads in several shapes; extraction is tried in a
/// fixed order before falling back to compact JSON serialization.
#[must_use]
pub fn normalize_result(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    if value.is_null() {
        return String::new();
    }
    if let Some(s) = value.get("content").and_then(Value::as_str) {
        return s.to_string();
    }
    if let Some(items) = value.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect();
        if !texts.is_empty() {
            return texts.join("\n");
        }
    }
    if let Some(s) = value.get("text").and_then(Value::as_str) {
        return s.to_string();
    }
    if let Some(s) = value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    {
        return s.to_string();
    }
    if let Some(inner) = value.get("result") {
        return normalize_result(inner);
    }
    value.to_string()
}

/// Ensure the message history satisfies provider ordering constraints
/// before the follow-up call.
///
/// Assistant tool-call declarations without a matching tool result are
/// removed, as are tool results with no preceding declaration. An
/// assistant message left with neither content nor calls is dropped.
pub fn validate_history(messages: &mut Vec<Message>) {
    let answered: HashSet<String> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.clone())
        .collect();

    let mut declared: HashSet<String> = HashSet::new();
    messages.retain_mut(|msg| match msg.role {
        Role::Assistant => {
            if let Some(calls) = msg.tool_calls.take() {
                let kept: Vec<_> = calls
                    .into_iter()
                    .filter(|c| answered.contains(&c.id))
                    .collect();
                for call in &kept {
                    declared.insert(call.id.clone());
                }
                if kept.is_empty() {
                    msg.content.is_some()
                } else {
                    msg.tool_calls = Some(kept);
                    true
                }
            } else {
                true
            }
        }
        Role::Tool => msg
            .tool_call_id
            .as_ref()
            .is_some_and(|id| declared.contains(id)),
        _ => true,
    });
}

/// Execute a reconciled queue in order over one transport.
///
/// Each call emits a running frame before invocation and a terminal
/// frame after; a failing call records an error result and the queue
/// keeps going. Returns the tool result messages in execution order.
pub async fn run_queue(
    queue: &[QueuedCall],
    transport: &dyn ToolTransport,
    catalog: &[ToolSpec],
    events: &TurnSender,
    store: &Arc<dyn SessionStore>,
    session_id: &str,
) -> Result<Vec<Message>, TurnAborted> {
    let mut results = Vec::with_capacity(queue.len());

    for call in queue {
        let name = repair_tool_name(&call.name, catalog);
        if name != call.name {
            debug!(emitted = %call.name, repaired = %name, "repaired tool name");
        }

        let frame = ToolStateFrame::running(&call.id, name, call.arguments.clone());
        events.tool_state(vec![frame.clone()]).await?;

        match transport.invoke(name, &call.arguments).await {
            Ok(value) => {
                if name == REASONING_TOOL {
                    persist_reasoning(store, session_id, &value).await;
                }
                let display = normalize_result(&value);
                events.tool_state(vec![frame.finished(true, &display)]).await?;
                results.push(Message::tool_result(&call.id, name, display));
            }
            Err(err) => {
                warn!(tool = %name, error = %err, "tool invocation failed");
                let display = format!("tool invocation failed: {err}");
                events
                    .tool_state(vec![frame.finished(false, &display)])
                    .await?;
                results.push(Message::tool_result(&call.id, name, display));
            }
        }
    }

    Ok(results)
}

/// Store the reasoning tool's output on the session record so the next
/// turn can resume the chain. Store failures degrade to a warning.
async fn persist_reasoning(store: &Arc<dyn SessionStore>, session_id: &str, state: &Value) {
    match store.load(session_id).await {
        Ok(Some(mut record)) => {
            record.reasoning_state = Some(state.clone());
            if let Err(err) = store.save(&record).await {
                warn!(session_id, error = %err, "failed to persist reasoning state");
            }
        }
        Ok(None) => {
            debug!(session_id, "session record gone, reasoning state not persisted");
        }
        Err(err) => {
            warn!(session_id, error = %err, "failed to load session for reasoning state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use serde_json::json;

    fn catalog(names: &[&str]) -> Vec<ToolSpec> {
        names
            .iter()
            .map(|n| ToolSpec {
                name: (*n).to_string(),
                description: String::new(),
                input_schema: None,
            })
            .collect()
    }

    #[test]
    fn exact_name_passes_through() {
        let cat = catalog(&["search_web", "search"]);
        assert_eq!(repair_tool_name("search_web", &cat), "search_web");
    }

    #[test]
    fn longest_prefix_wins() {
        let cat = catalog(&["search", "search_web"]);
        assert_eq!(repair_tool_name("search_webXYZ", &cat), "search_web");
    }

    #[test]
    fn unknown_name_unchanged() {
        let cat = catalog(&["search_web"]);
        assert_eq!(repair_tool_name("fetch_page", &cat), "fetch_page");
    }

    #[test]
    fn normalize_plain_string() {
        assert_eq!(normalize_result(&json!("hello")), "hello");
    }

    #[test]
    fn normalize_null_is_empty() {
        assert_eq!(normalize_result(&Value::Null), "");
    }

    #[test]
    fn normalize_content_field() {
        assert_eq!(normalize_result(&json!({"content": "body"})), "body");
    }

    #[test]
    fn normalize_content_array_of_text_blocks() {
        let value = json!({"content": [
            {"type": "text", "text": "first"},
            {"type": "text", "text": "second"},
        ]});
        assert_eq!(normalize_result(&value), "first\nsecond");
    }

    #[test]
    fn normalize_nested_message_content() {
        let value = json!({"message": {"content": "inner"}});
        assert_eq!(normalize_result(&value), "inner");
    }

    #[test]
    fn normalize_result_field_recurses() {
        let value = json!({"result": {"content": "deep"}});
        assert_eq!(normalize_result(&value), "deep");
    }

    #[test]
    fn normalize_falls_back_to_serialization() {
        let value = json!({"rows": [1, 2, 3]});
        assert_eq!(normalize_result(&value), value.to_string());
    }

    #[test]
    fn validate_drops_unanswered_declarations() {
        let mut history = vec![
            Message::text(Role::User, "hi"),
            Message::assistant_tool_calls(vec![ToolCall::function("call_1", "search", "{}")]),
        ];
        validate_history(&mut history);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[test]
    fn validate_drops_orphan_tool_results() {
        let mut history = vec![
            Message::text(Role::User, "hi"),
            Message::tool_result("call_9", "search", "out"),
        ];
        validate_history(&mut history);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn validate_keeps_matched_pairs() {
        let mut history = vec![
            Message::text(Role::User, "hi"),
            Message::assistant_tool_calls(vec![ToolCall::function("call_1", "search", "{}")]),
            Message::tool_result("call_1", "search", "out"),
        ];
        validate_history(&mut history);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn validate_prunes_partial_declarations() {
        let mut history = vec![
            Message::assistant_tool_calls(vec![
                ToolCall::function("call_1", "search", "{}"),
                ToolCall::function("call_2", "fetch", "{}"),
            ]),
            Message::tool_result("call_1", "search", "out"),
        ];
        validate_history(&mut history);
        assert_eq!(history.len(), 2);
        let calls = history[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
    }
}

//! Client-side tool-state merging.
//!
//! Consumers keep a display list of tool invocations and fold each
//! incoming `tool_state` batch into it. Frames may repeat, arrive
//! batched, or describe a call the client has not seen yet; merging is
//! what keeps the display consistent.

use crate::turn::{ToolStateFrame, ToolRunStatus};

/// Fold a batch of incoming frames into an existing display list.
///
/// Matching precedence per frame: call id first, then name plus
/// arguments, then name alone. An unmatched frame is appended; a
/// matched entry keeps the id it was first seen under. Status is
/// monotonic: an entry already in a terminal state drops a late
/// running frame outright, result and all.
pub fn merge_tool_states(existing: &mut Vec<ToolStateFrame>, incoming: Vec<ToolStateFrame>) {
    for frame in incoming {
        match find_entry(existing, &frame) {
            Some(pos) => apply(&mut existing[pos], frame),
            None => existing.push(frame),
        }
    }
}

fn find_entry(existing: &[ToolStateFrame], frame: &ToolStateFrame) -> Option<usize> {
    if let Some(pos) = existing.iter().position(|e| e.id == frame.id) {
        return Some(pos);
    }
    if let Some(pos) = existing
        .iter()
        .position(|e| e.name == frame.name && e.arguments == frame.arguments)
    {
        return Some(pos);
    }
    existing.iter().position(|e| e.name == frame.name)
}

fn apply(entry: &mut ToolStateFrame, frame: ToolStateFrame) {
    if entry.status.is_terminal() && frame.status == ToolRunStatus::Running {
        // Late or duplicated running frame; the outcome stands.
        return;
    }
    // The entry keeps the id it was first seen under; only the payload
    // and status advance.
    entry.name = frame.name;
    entry.arguments = frame.arguments;
    entry.status = frame.status;
    if frame.result.is_some() {
        entry.result = frame.result;
    }
}

//! Consumer-side helpers for the turn event stream.

mod merge;

pub use merge::merge_tool_states;

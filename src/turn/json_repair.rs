//! Best-effort repair for almost-JSON tool arguments.
//!
//! Models occasionally emit argument objects with unquoted identifier
//! keys or values (`{query: weather}`). The repair pass quotes those so
//! a second strict parse can succeed. It never touches already-valid
//! JSON tokens: numbers, `true`, `false` and `null` pass through.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)\s*:"#).unwrap_or_else(|e| panic!("bare key pattern: {e}"))
});

static BARE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(:\s*)([A-Za-z_][A-Za-z0-9_\-]*)(\s*[,}\]]|\s*$)"#)
        .unwrap_or_else(|e| panic!("bare value pattern: {e}"))
});

fn is_json_keyword(ident: &str) -> bool {
    matches!(ident, "true" | "false" | "null")
}

/// Quote bare identifier-like keys and values in a nearly-JSON string.
///
/// The output is not guaranteed to parse; callers retry strict parsing
/// and fall back to a raw-preserving placeholder when it still fails.
#[must_use]
pub fn repair_json(raw: &str) -> String {
    let keyed = BARE_KEY.replace_all(raw, |caps: &Captures<'_>| {
        format!("{}\"{}\":", &caps[1], &caps[2])
    });
    let valued = BARE_VALUE.replace_all(&keyed, |caps: &Captures<'_>| {
        let ident = &caps[2];
        if is_json_keyword(ident) {
            caps[0].to_string()
        } else {
            format!("{}\"{}\"{}", &caps[1], ident, &caps[3])
        }
    });
    valued.into_owned()
}

//! Log-rendering helpers.

use crate::types::act::SessionId;

const BOX_WIDTH: usize = 76;

/// Render lines as a boxed warning for terminal visibility.
///
/// Used for authentication remediation messages, which users must not miss.
pub fn warning_box(lines: &[&str]) -> String {
    let border = "*".repeat(BOX_WIDTH);
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for line in lines {
        out.push_str("* ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&border);
    out
}

/// Short prefix identifying the session in trace output.
pub fn session_prefix(session_id: &SessionId) -> String {
    let short = session_id.0.get(..8).unwrap_or(&session_id.0);
    format!("{short}> ")
}

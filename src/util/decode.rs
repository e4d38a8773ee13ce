//! Decoding of escape-encoded plan bodies.
//!
//! The planning service transmits the plan document as a single line with
//! literal escape sequences (`\n`, `\uXXXX`, ...). These helpers turn it
//! back into readable text for trace logs.

/// Decode common escape sequences in a single line.
///
/// Lines without escape sequences pass through untouched; undecodable
/// sequences leave the line unchanged rather than failing.
pub fn decode_string(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    match unescape(value) {
        Some(decoded) => decoded,
        None => value.to_string(),
    }
}

/// Decode a multi-line plan body: split on literal `\n`, decode each line.
pub fn decode_plan_body(raw_plan: &str) -> String {
    raw_plan
        .split("\\n")
        .map(decode_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape(value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    code = code * 16 + chars.next()?.to_digit(16)?;
                }
                out.push(char::from_u32(code)?);
            }
            other => {
                // Unknown escape: keep it verbatim.
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(decode_string("click(\"box-3\");"), "click(\"box-3\");");
    }

    #[test]
    fn decodes_unicode_escapes() {
        assert_eq!(decode_string("caf\\u00e9"), "café");
        assert_eq!(decode_string("tab\\there"), "tab\there");
    }

    #[test]
    fn malformed_escape_leaves_line_unchanged() {
        assert_eq!(decode_string("bad\\u00g9"), "bad\\u00g9");
        assert_eq!(decode_string("trailing\\"), "trailing\\");
    }

    #[test]
    fn plan_body_splits_on_literal_newlines() {
        let raw = "observe();\\nclick(\\\"a\\\");\\nreturn \\\"done\\\";";
        let decoded = decode_plan_body(raw);
        assert_eq!(decoded.lines().count(), 3);
        assert!(decoded.contains("click(\"a\");"));
    }
}

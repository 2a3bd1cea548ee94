//! git's C-style path quoting.
//!
//! Even with `core.quotePath=false`, git wraps a path in double quotes when
//! it contains `"`, `\` or a control character, and escapes those bytes:
//!
//! ```text
//! src/we"ird.txt   ->  "src/we\"ird.txt"
//! tab<TAB>name     ->  "tab\tname"
//! ```

/// Whether git quotes `path` in diff headers.
pub fn needs_quoting(path: &str) -> bool {
    path.bytes()
        .any(|b| b == b'"' || b == b'\\' || b < 0x20 || b == 0x7f)
}

/// Quotes `path` the way git does, or returns it unchanged when no quoting
/// is needed.
pub fn quote_path(path: &str) -> String {
    if !needs_quoting(path) {
        return path.to_owned();
    }
    let mut out = String::with_capacity(path.len() + 2);
    out.push('"');
    for c in path.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decodes a quoted string at the start of `raw`, returning the value and
/// the number of bytes consumed. `None` when `raw` is not a complete quoted
/// string or decodes to invalid UTF-8.
pub fn unquote(raw: &str) -> Option<(String, usize)> {
    let bytes = raw.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut out = Vec::new();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return String::from_utf8(out).ok().map(|s| (s, i + 1)),
            b'\\' => {
                let escaped = *bytes.get(i + 1)?;
                match escaped {
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b't' => out.push(b'\t'),
                    b'n' => out.push(b'\n'),
                    b'v' => out.push(0x0b),
                    b'f' => out.push(0x0c),
                    b'r' => out.push(b'\r'),
                    b'0'..=b'7' => {
                        let digits = raw.get(i + 1..i + 4)?;
                        out.push(u8::from_str_radix(digits, 8).ok()?);
                        i += 2;
                    }
                    other => out.push(other),
                }
                i += 2;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    None
}

/// A path field of a diff header: quoted or bare.
pub fn decode_path(raw: &str) -> Option<String> {
    if raw.starts_with('"') {
        unquote(raw).map(|(path, _)| path)
    } else {
        Some(raw.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_left_alone() {
        assert_eq!(quote_path("src/my file.rs"), "src/my file.rs");
        assert_eq!(quote_path("a/café"), "a/café");
    }

    #[test]
    fn special_bytes_are_escaped() {
        assert_eq!(quote_path("a/we\"ird.txt"), "\"a/we\\\"ird.txt\"");
        assert_eq!(quote_path("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(quote_path("tab\there"), "\"tab\\there\"");
        assert_eq!(quote_path("bell\x01"), "\"bell\\001\"");
    }

    #[test]
    fn unquotes_c_style_paths() {
        assert_eq!(
            unquote("\"a/caf\\303\\251\" rest"),
            Some(("a/café".to_owned(), 15))
        );
        assert_eq!(unquote("\"tab\\there\""), Some(("tab\there".to_owned(), 11)));
        assert_eq!(unquote("\"unterminated"), None);
        assert_eq!(unquote("\"caf\\351\""), None);
    }

    #[test]
    fn quoting_round_trips() {
        for path in ["a/we\"ird.txt", "x\\y", "new\nline", "ctl\x01\x7f"] {
            let quoted = quote_path(path);
            assert_eq!(decode_path(&quoted).as_deref(), Some(path));
        }
        assert_eq!(decode_path("a/plain").as_deref(), Some("a/plain"));
    }
}

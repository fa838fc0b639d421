//! Token helpers shared by the text importers.

use std::fmt::Write;

/// Receives warnings and errors produced while importing text.
pub trait FOutputDevice {
    fn log(&mut self, message: &str);
}

/// Collects messages, one per line.
#[derive(Debug, Default, Clone)]
pub struct FStringOutputDevice {
    text: String,
}

impl FStringOutputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().filter(|line| !line.is_empty())
    }
}

impl FOutputDevice for FStringOutputDevice {
    fn log(&mut self, message: &str) {
        self.text.push_str(message);
        self.text.push('\n');
    }
}

/// Forwards messages to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct FLogOutputDevice;

impl FOutputDevice for FLogOutputDevice {
    fn log(&mut self, message: &str) {
        tracing::warn!("{message}");
    }
}

pub fn skip_whitespace(buffer: &str) -> &str {
    buffer.trim_start_matches([' ', '\t'])
}

fn is_identifier_char(c: char, dotted_names: bool) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '+' || (dotted_names && c == '.')
}

/// Reads a quoted string, an identifier or a single character.
///
/// A single character is returned without being consumed. Returns `None` for an
/// unterminated quoted string.
pub fn read_token(buffer: &str, dotted_names: bool) -> Option<(String, &str)> {
    let mut chars = buffer.char_indices();
    match chars.next() {
        Some((_, '"')) => {
            let mut token = String::new();
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => return Some((token, &buffer[i + 1..])),
                    '\n' | '\r' => break,
                    '\\' => match chars.next() {
                        Some((_, 'n')) => token.push('\n'),
                        Some((_, 't')) => token.push('\t'),
                        Some((_, 'r')) => token.push('\r'),
                        Some((_, escaped)) => token.push(escaped),
                        None => break,
                    },
                    c => token.push(c),
                }
            }
            tracing::warn!("ReadToken: Bad quoted string: {buffer}");
            None
        }
        Some((_, c)) if c.is_alphanumeric() => {
            let end = buffer
                .char_indices()
                .find(|(_, c)| !is_identifier_char(*c, dotted_names))
                .map(|(i, _)| i)
                .unwrap_or(buffer.len());
            Some((buffer[..end].to_string(), &buffer[end..]))
        }
        Some((_, c)) => Some((c.to_string(), buffer)),
        None => Some((String::new(), buffer)),
    }
}

/// Escapes a string for use between double quotes.
pub fn escape_string(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    escape_string(&mut out, value);
    out.push('"');
    out
}

/// Consumes `keyword` followed by a non identifier character, ignoring case.
pub fn parse_command<'a>(buffer: &'a str, keyword: &str) -> Option<&'a str> {
    let buffer = skip_whitespace(buffer);
    let head = buffer.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &buffer[keyword.len()..];
    match rest.chars().next() {
        Some(c) if is_identifier_char(c, false) => None,
        _ => Some(rest),
    }
}

/// Length of the numeric literal at the start of `buffer`, zero if there is none.
pub fn numeric_literal_len(buffer: &str) -> usize {
    let bytes = buffer.as_bytes();
    match bytes.first() {
        Some(b'+' | b'-' | b'.' | b'0'..=b'9') => {}
        _ => return 0,
    }
    let hex = bytes.len() > 2
        && (bytes[..2].eq_ignore_ascii_case(b"0x")
            || (bytes.len() > 3 && matches!(bytes[0], b'+' | b'-') && bytes[1..3].eq_ignore_ascii_case(b"0x")));
    let mut end = 1;
    while end < bytes.len() {
        let b = bytes[end];
        let accepted = b.is_ascii_digit()
            || b == b'.'
            || b == b'x'
            || b == b'X'
            || (hex && b.is_ascii_hexdigit())
            || (!hex && matches!(b, b'e' | b'E'))
            || (!hex && matches!(b, b'+' | b'-') && matches!(bytes[end - 1], b'e' | b'E'));
        if !accepted {
            break;
        }
        end += 1;
    }
    if !hex && end < bytes.len() && matches!(bytes[end], b'f' | b'F') {
        end += 1;
    }
    end
}

pub(crate) fn logf(out: &mut dyn FOutputDevice, args: std::fmt::Arguments) {
    let mut message = String::new();
    let _ = message.write_fmt(args);
    out.log(&message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_token() {
        assert_eq!(
            read_token("Level.Thing_0,", true),
            Some(("Level.Thing_0".to_string(), ","))
        );
        assert_eq!(read_token("Level.Thing", false), Some(("Level".to_string(), ".Thing")));
        assert_eq!(
            read_token(r#""a \"b\"\n",x"#, false),
            Some(("a \"b\"\n".to_string(), ",x"))
        );
        assert_eq!(read_token(")rest", false), Some((")".to_string(), ")rest")));
        assert_eq!(read_token("\"open", false), None);
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "say \"hi\"\\\tnow";
        let text = quoted(original);
        let (token, rest) = read_token(&text, false).unwrap();
        assert_eq!(token, original);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("Add(1)", "Add"), Some("(1)"));
        assert_eq!(parse_command("empty()", "Empty"), Some("()"));
        assert_eq!(parse_command("Remove(1)", "RemoveIndex"), None);
        assert_eq!(parse_command("RemoveIndex(1)", "Remove"), None);
    }

    #[test]
    fn test_numeric_literal_len() {
        assert_eq!(numeric_literal_len("12,3"), 2);
        assert_eq!(numeric_literal_len("-1.5e+3f)"), 8);
        assert_eq!(numeric_literal_len("0x1F)"), 4);
        assert_eq!(numeric_literal_len("abc"), 0);
    }

    #[test]
    fn test_string_output_device() {
        let mut out = FStringOutputDevice::new();
        assert!(out.is_empty());
        logf(&mut out, format_args!("first {}", 1));
        out.log("second");
        assert_eq!(out.lines().collect::<Vec<_>>(), ["first 1", "second"]);
    }
}

//! JSON string-content escaping for streamed function arguments
//!
//! Argument fragments are embedded into a JSON string literal that is built
//! one fragment at a time, so each fragment is escaped on its own instead of
//! serialising the (not yet known) whole value.

/// Characters with a two-character escape sequence
const ESCAPES: [(char, char); 7] = [
    ('\\', '\\'),
    ('/', '/'),
    ('"', '"'),
    ('\n', 'n'),
    ('\r', 'r'),
    ('\t', 't'),
    ('\u{0c}', 'f'),
];

/// Escape `\ / " \n \r \t \f`, and any other control character as `\u00XX`
///
/// Every other character is left untouched.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for ch in input.chars() {
        match ESCAPES.iter().find(|(raw, _)| *raw == ch) {
            Some((_, code)) => {
                out.push('\\');
                out.push(*code);
            }
            None if ch < ' ' => out.push_str(&format!("\\u{:04x}", ch as u32)),
            None => out.push(ch),
        }
    }
    out
}

/// Control character for the four hex digits of a `\u00XX` escape
fn control_char(hex: &str) -> Option<char> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16)
        .ok()
        .filter(|code| *code < 0x20)
        .and_then(char::from_u32)
}

/// Inverse of [`escape`]
///
/// `\uXXXX` is decoded for control characters only. Other unknown escape
/// sequences and a trailing lone backslash are kept verbatim.
pub fn descape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let rest = chars.as_str();
                match rest.get(..4).and_then(control_char) {
                    Some(control) => {
                        out.push(control);
                        chars = rest[4..].chars();
                    }
                    None => out.push_str("\\u"),
                }
            }
            Some(code) => match ESCAPES.iter().find(|(_, c)| *c == code) {
                Some((raw, _)) => out.push(*raw),
                None => {
                    out.push('\\');
                    out.push(code);
                }
            },
            None => out.push('\\'),
        }
    }
    out
}

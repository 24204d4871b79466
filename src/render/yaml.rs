//! YAML scalar quoting

use std::borrow::Cow;

const RESERVED: &[&str] = &[
    "true", "false", "yes", "no", "on", "off", "y", "n", "null", "~",
];

/// Double-quote `value`, escaping what YAML requires
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render `value` as a plain scalar when a YAML reader would keep it a
/// string, quoting it otherwise
pub fn scalar(value: &str) -> Cow<'_, str> {
    if needs_quotes(value) {
        Cow::Owned(quote(value))
    } else {
        Cow::Borrowed(value)
    }
}

fn needs_quotes(value: &str) -> bool {
    if value.is_empty() || value.trim() != value {
        return true;
    }
    if RESERVED.contains(&value.to_ascii_lowercase().as_str()) {
        return true;
    }
    // Numbers, octals and sexagesimals such as 8080:80
    if value.parse::<f64>().is_ok()
        || value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ':' | '_' | '+' | '-'))
    {
        return true;
    }
    let first = value.chars().next().unwrap_or(' ');
    if matches!(
        first,
        '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>'
            | '\'' | '"' | '%' | '@' | '`'
    ) {
        return true;
    }
    value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.chars().any(char::is_control)
}

/// Render a flow sequence of quoted strings: `["a", "b"]`
pub fn flow_list<S: AsRef<str>>(items: &[S]) -> String {
    let parts: Vec<String> = items.iter().map(|s| quote(s.as_ref())).collect();
    format!("[{}]", parts.join(", "))
}

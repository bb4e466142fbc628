//! Best-effort literal parsing for command-line override values
//!
//! Overrides arrive as plain strings. [`parse_literal`] restores the type a
//! config file would have given them, trying in order: integer, float,
//! boolean, null, quoted string, list, mapping. Anything else is kept as
//! the raw string.

use serde_json::{Map, Number, Value};

/// Parse a raw override value into a typed JSON value.
///
/// Never fails: unparseable input comes back as `Value::String(raw)`.
///
/// # Example
/// ```
/// use mjrun_core::value::parse_literal;
/// use serde_json::json;
///
/// assert_eq!(parse_literal("42"), json!(42));
/// assert_eq!(parse_literal("true"), json!(true));
/// assert_eq!(parse_literal("[1, 2]"), json!([1, 2]));
/// assert_eq!(parse_literal("serial"), json!("serial"));
/// ```
pub fn parse_literal(raw: &str) -> Value {
    parse_strict(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn parse_strict(s: &str) -> Option<Value> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    parse_int(s)
        .or_else(|| parse_float(s))
        .or_else(|| parse_bool(s))
        .or_else(|| parse_null(s))
        .or_else(|| parse_quoted(s).map(Value::String))
        .or_else(|| parse_sequence(s))
        .or_else(|| parse_mapping(s))
}

/// Split off a leading sign, returning `(negative, rest)`
fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s.strip_prefix('+').unwrap_or(s))
    }
}

/// Remove `_` digit separators, rejecting any that are not between two digits
fn strip_separators(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let prev_ok = i > 0 && bytes[i - 1].is_ascii_hexdigit();
            let next_ok = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit);
            if !prev_ok || !next_ok {
                return None;
            }
        } else {
            out.push(b as char);
        }
    }
    Some(out)
}

fn parse_int(s: &str) -> Option<Value> {
    let (negative, body) = split_sign(s);
    let body = strip_separators(body)?;
    if body.is_empty() {
        return None;
    }

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else {
        // Decimal literals with leading zeros are not valid integers
        if lower.len() > 1 && lower.starts_with('0') && lower.bytes().any(|b| b != b'0') {
            return None;
        }
        (10, lower.as_str())
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        let value = if magnitude == i64::MIN.unsigned_abs() {
            i64::MIN
        } else {
            -i64::try_from(magnitude).ok()?
        };
        Some(Value::Number(value.into()))
    } else {
        Some(Value::Number(magnitude.into()))
    }
}

fn parse_float(s: &str) -> Option<Value> {
    let (_, body) = split_sign(s);
    let is_float_form = body.contains('.') || body.contains('e') || body.contains('E');
    let valid_chars = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-' | '_'));
    if !is_float_form || !valid_chars || !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let cleaned = strip_separators(s)?;
    let parsed: f64 = cleaned.parse().ok()?;
    Number::from_f64(parsed).map(Value::Number)
}

fn parse_bool(s: &str) -> Option<Value> {
    match s {
        "true" | "True" => Some(Value::Bool(true)),
        "false" | "False" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn parse_null(s: &str) -> Option<Value> {
    matches!(s, "None" | "null").then_some(Value::Null)
}

fn parse_quoted(s: &str) -> Option<String> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    if s.len() < 2 || !s.ends_with(quote) {
        return None;
    }

    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                other => out.push(other),
            },
            c if c == quote => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

fn parse_sequence(s: &str) -> Option<Value> {
    let (open, close) = match s.chars().next()? {
        '[' => ('[', ']'),
        '(' => ('(', ')'),
        _ => return None,
    };
    let inner = s.strip_prefix(open)?.strip_suffix(close)?;
    let parts = split_top_level(inner, ',')?;

    // A parenthesised single value without a comma is just that value
    if open == '(' && parts.len() == 1 && !inner.trim_end().ends_with(',') {
        return parse_strict(parts[0]);
    }

    parts
        .into_iter()
        .map(parse_strict)
        .collect::<Option<Vec<_>>>()
        .map(Value::Array)
}

fn parse_mapping(s: &str) -> Option<Value> {
    let inner = s.strip_prefix('{')?.strip_suffix('}')?;
    let mut map = Map::new();
    for entry in split_top_level(inner, ',')? {
        let kv = split_top_level(entry, ':')?;
        let [key, value] = kv.as_slice() else {
            return None;
        };
        let key = match parse_strict(key)? {
            Value::String(k) => k,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        map.insert(key, parse_strict(value)?);
    }
    Some(Value::Object(map))
}

/// Split `s` on `sep` where it is not nested in brackets or quotes.
///
/// Empty input yields no parts; a single trailing separator is allowed.
/// Returns `None` for unbalanced brackets or unterminated quotes.
fn split_top_level(s: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.checked_sub(1)?,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return None;
    }

    let tail = &s[start..];
    if !tail.trim().is_empty() {
        parts.push(tail);
    } else if !parts.is_empty() && sep == ':' {
        return None;
    }

    if parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    Some(parts)
}

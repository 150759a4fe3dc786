//! Numeral, escape and symbol-offset parsing shared by the assembler
//! passes.

use std::collections::HashMap;

/// Decode a standard C escape character (the char after the backslash).
pub fn unescape_char(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0C',
        'v' => '\x0B',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        _ => return None,
    })
}

/// Decode the body of a string literal (everything between the quotes).
pub fn unescape_string(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(unescape_char(chars.next()?)?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Parse a user-supplied integer token.
///
/// Accepts a character literal (`'c'` with C escapes), or an optionally
/// signed decimal / `0x` hex / `0b` binary numeral, evaluated as a signed
/// 64-bit value and truncated to 32 bits. `None` for malformed input or
/// 64-bit overflow.
pub fn user_string_to_int(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Some(body) = s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        let c = match body.strip_prefix('\\') {
            Some(esc) => {
                let mut chars = esc.chars();
                let c = unescape_char(chars.next()?)?;
                if chars.next().is_some() {
                    return None;
                }
                c
            }
            None => {
                let mut chars = body.chars();
                let c = chars.next()?;
                if c == '\\' || c == '\'' || chars.next().is_some() {
                    return None;
                }
                c
            }
        };
        return Some(c as u32 as i32);
    }

    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, bin)
    } else {
        (10, rest)
    };
    // from_str_radix tolerates its own leading sign; ours is already
    // consumed
    if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some((sign * magnitude) as i32)
}

/// Split a label argument into its symbol part and its `±offset` tail.
///
/// `sym`, `sym+4`, `sym-4` and `sym±absSym` are accepted; the tail keeps
/// its sign and is resolved later via [`resolve_offset`].
pub fn split_symbol_offset(s: &str) -> (&str, &str) {
    match s.find(['+', '-']) {
        Some(i) if i > 0 => (&s[..i], &s[i..]),
        _ => (s, ""),
    }
}

/// Evaluate an offset tail (`""`, `+N`, `-N`, `+sym`, `-sym`) against a
/// symbol table of absolute values.
pub fn resolve_offset(expr: &str, labels: &HashMap<String, u32>) -> Option<i32> {
    if expr.is_empty() {
        return Some(0);
    }
    let (neg, rest) = match expr.as_bytes()[0] {
        b'+' => (false, &expr[1..]),
        b'-' => (true, &expr[1..]),
        _ => return None,
    };
    let value = match rest.chars().next() {
        Some(c) if c.is_ascii_digit() => rest.parse::<i64>().ok()?,
        _ => *labels.get(rest)? as i64,
    };
    Some(if neg { -value } else { value } as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_hex_binary() {
        assert_eq!(user_string_to_int("42"), Some(42));
        assert_eq!(user_string_to_int("-42"), Some(-42));
        assert_eq!(user_string_to_int("+7"), Some(7));
        assert_eq!(user_string_to_int("0x2A"), Some(42));
        assert_eq!(user_string_to_int("-0x10"), Some(-16));
        assert_eq!(user_string_to_int("0b1010"), Some(10));
        assert_eq!(user_string_to_int("0xFFFFFFFF"), Some(-1));
        assert_eq!(user_string_to_int("0x80000000"), Some(i32::MIN));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(user_string_to_int(""), None);
        assert_eq!(user_string_to_int("0x"), None);
        assert_eq!(user_string_to_int("12ab"), None);
        assert_eq!(user_string_to_int("--3"), None);
        assert_eq!(user_string_to_int("label"), None);
        // overflows the 64-bit intermediate
        assert_eq!(user_string_to_int("0x1FFFFFFFFFFFFFFFF"), None);
    }

    #[test]
    fn character_literals() {
        assert_eq!(user_string_to_int("'a'"), Some(97));
        assert_eq!(user_string_to_int("'\\n'"), Some(10));
        assert_eq!(user_string_to_int("'\\0'"), Some(0));
        assert_eq!(user_string_to_int("'\\''"), Some(39));
        assert_eq!(user_string_to_int("' '"), Some(32));
        assert_eq!(user_string_to_int("''"), None);
        assert_eq!(user_string_to_int("'ab'"), None);
    }

    #[test]
    fn symbol_offset_split() {
        assert_eq!(split_symbol_offset("foo"), ("foo", ""));
        assert_eq!(split_symbol_offset("foo+4"), ("foo", "+4"));
        assert_eq!(split_symbol_offset("foo-12"), ("foo", "-12"));
        assert_eq!(split_symbol_offset("foo+BASE"), ("foo", "+BASE"));
    }

    #[test]
    fn offset_resolution() {
        let mut labels = HashMap::new();
        labels.insert("BASE".to_string(), 16u32);
        assert_eq!(resolve_offset("", &labels), Some(0));
        assert_eq!(resolve_offset("+4", &labels), Some(4));
        assert_eq!(resolve_offset("-4", &labels), Some(-4));
        assert_eq!(resolve_offset("+BASE", &labels), Some(16));
        assert_eq!(resolve_offset("-BASE", &labels), Some(-16));
        assert_eq!(resolve_offset("+nope", &labels), None);
    }

    #[test]
    fn string_unescaping() {
        assert_eq!(unescape_string("hi"), Some("hi".to_string()));
        assert_eq!(unescape_string("a\\tb\\n"), Some("a\tb\n".to_string()));
        assert_eq!(unescape_string("q\\\""), Some("q\"".to_string()));
        assert_eq!(unescape_string("bad\\"), None);
        assert_eq!(unescape_string("\\q"), None);
    }
}

//! Header value parsing and formatting.

use crate::error::{Error, Result};

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
    /// FITS complex integer `(real, imaginary)`.
    ComplexInt(i64, i64),
    /// FITS complex float `(real, imaginary)`.
    ComplexFloat(f64, f64),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

// ── Parsing ──

/// Parse the value field of a card (everything after `= `).
///
/// Returns the value, if any, and the inline comment, if any. Text that is
/// neither a string, logical, number nor complex pair is kept verbatim as a
/// string so no header content is lost.
pub fn parse_value(field: &str) -> (Option<Value>, Option<String>) {
    let field = field.trim_start();
    if field.starts_with('\'') {
        let (value, rest) = parse_string(field);
        return (Some(Value::String(value)), find_comment(rest));
    }

    let (val_part, comment) = match field.find('/') {
        Some(idx) => (&field[..idx], comment_text(&field[idx + 1..])),
        None => (field, None),
    };
    let text = val_part.trim();
    if text.is_empty() {
        return (None, comment);
    }

    let value = match text {
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ if text.starts_with('(') => {
            parse_complex(text).unwrap_or_else(|| Value::String(text.to_string()))
        }
        _ => parse_number(text).unwrap_or_else(|| Value::String(text.to_string())),
    };
    (Some(value), comment)
}

/// Parse a quoted string starting at `field[0] == '\''`.
///
/// Returns the unescaped content (trailing spaces removed) and the remainder
/// of the field after the closing quote.
fn parse_string(field: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = field.char_indices().skip(1).peekable();
    let mut end = field.len();

    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                value.push('\'');
                chars.next();
            } else {
                end = i + 1;
                break;
            }
        } else {
            value.push(c);
        }
    }

    let trimmed = value.trim_end().to_string();
    (trimmed, &field[end..])
}

fn find_comment(rest: &str) -> Option<String> {
    rest.find('/').and_then(|idx| comment_text(&rest[idx + 1..]))
}

fn comment_text(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix(' ').unwrap_or(raw).trim_end();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let looks_integral = !text.contains(['.', 'E', 'e', 'D', 'd']);
    if looks_integral {
        if let Ok(n) = text.parse::<i64>() {
            return Some(Value::Integer(n));
        }
    }
    parse_float_str(text).map(Value::Float)
}

/// Parse a float string, handling FITS `D` exponent notation.
pub(crate) fn parse_float_str(s: &str) -> Option<f64> {
    let normalized = s.trim().replace(['D', 'd'], "E");
    normalized.parse::<f64>().ok()
}

fn parse_complex(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let (left, right) = inner.split_once(',')?;
    let (left, right) = (left.trim(), right.trim());

    if let (Some(Value::Integer(re)), Some(Value::Integer(im))) =
        (parse_number(left), parse_number(right))
    {
        return Some(Value::ComplexInt(re, im));
    }
    Some(Value::ComplexFloat(
        parse_float_str(left)?,
        parse_float_str(right)?,
    ))
}

// ── Formatting ──

/// Format a value as it appears after `= ` on a card.
///
/// Numbers and logicals are right-justified to column 30; strings start with
/// the opening quote and are padded to at least eight characters.
pub fn format_value(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        Value::Integer(n) => format!("{n:>20}"),
        Value::Float(f) => format!("{:>20}", format_float(*f)?),
        Value::String(s) => quote_string(s),
        Value::ComplexInt(re, im) => format!("{:>20}", format!("({re}, {im})")),
        Value::ComplexFloat(re, im) => format!(
            "{:>20}",
            format!("({}, {})", format_float(*re)?, format_float(*im)?)
        ),
    })
}

/// Format a float so that it parses back to the same `f64`.
pub fn format_float(f: f64) -> Result<String> {
    if !f.is_finite() {
        return Err(Error::InvalidValue("non-finite float in header"));
    }
    if f.fract() == 0.0 && f.abs() < 1e19 {
        return Ok(format!("{f:.1}"));
    }
    Ok(format!("{f:?}").replace('e', "E"))
}

/// Double embedded quotes.
pub(crate) fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Quote a string for a single card, padding the content to eight characters.
pub(crate) fn quote_string(s: &str) -> String {
    format!("'{:<8}'", escape_string(s))
}

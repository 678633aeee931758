//! FITS header card parsing and writing.
//!
//! Cards are read from 80-byte records and merged into logical cards: long
//! strings spread over `CONTINUE` records become one value, and `HIERARCH`
//! records yield their full keyword. Writing performs the reverse split.

use crate::block::{pad_to_block, BLOCK_SIZE, CARD_SIZE, HEADER_PAD_BYTE};
use crate::error::{Error, Result};
use crate::value::{escape_string, format_value, parse_value, quote_string, Value};

// ── Types ──

/// A logical FITS header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Keyword name without padding. May exceed eight characters for
    /// `HIERARCH` keywords.
    pub keyword: String,
    /// The parsed value, if this card has a value indicator.
    pub value: Option<Value>,
    /// Inline comment, or the free text of a commentary card.
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: impl Into<String>, value: Value) -> Self {
        Card {
            keyword: keyword.into(),
            value: Some(value),
            comment: None,
        }
    }

    /// A `HISTORY`, `COMMENT` or blank-keyword card carrying free text.
    pub fn commentary(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Card {
            keyword: keyword.into(),
            value: None,
            comment: Some(text.into()),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = if comment.is_empty() {
            None
        } else {
            Some(comment)
        };
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Returns `true` for COMMENT, HISTORY and blank-keyword cards.
    pub fn is_commentary(&self) -> bool {
        is_commentary_keyword(&self.keyword)
    }
}

pub(crate) fn is_commentary_keyword(keyword: &str) -> bool {
    matches!(keyword, "COMMENT" | "HISTORY" | "")
}

/// Returns `true` if `keyword` fits the fixed eight-byte keyword field.
pub fn is_standard_keyword(keyword: &str) -> bool {
    keyword.len() <= 8
        && keyword
            .bytes()
            .all(|b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_'))
}

// ── Lookup ──

pub fn find_card<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a Card> {
    cards.iter().find(|c| c.keyword == keyword)
}

pub fn card_integer(cards: &[Card], keyword: &str) -> Option<i64> {
    find_card(cards, keyword)?.value.as_ref()?.as_integer()
}

pub fn card_float(cards: &[Card], keyword: &str) -> Option<f64> {
    find_card(cards, keyword)?.value.as_ref()?.as_float()
}

pub fn card_logical(cards: &[Card], keyword: &str) -> Option<bool> {
    find_card(cards, keyword)?.value.as_ref()?.as_logical()
}

/// String value with surrounding whitespace removed.
pub fn card_string(cards: &[Card], keyword: &str) -> Option<String> {
    find_card(cards, keyword)?
        .value
        .as_ref()?
        .as_str()
        .map(|s| s.trim().to_string())
}

// ── Parsing ──

/// Parse a single 80-byte card image.
pub fn parse_card(card_bytes: &[u8]) -> Result<Card> {
    if card_bytes.len() != CARD_SIZE {
        return Err(Error::InvalidHeader("card is not 80 bytes"));
    }
    for &b in &card_bytes[..8] {
        match b {
            b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_' => {}
            _ => return Err(Error::InvalidKeyword),
        }
    }

    let text = String::from_utf8_lossy(card_bytes);
    let keyword = text[..8].trim_end().to_string();
    let rest = &text[8..];

    if keyword == "HIERARCH" {
        return Ok(match rest.split_once('=') {
            Some((name, field)) => {
                let (value, comment) = parse_value(field);
                Card {
                    keyword: name.trim().to_string(),
                    value,
                    comment,
                }
            }
            None => free_text_card(keyword, rest),
        });
    }

    if is_commentary_keyword(&keyword) {
        return Ok(free_text_card(keyword, rest));
    }

    if keyword == "CONTINUE" {
        let (value, comment) = parse_value(rest);
        return Ok(Card {
            keyword,
            value,
            comment,
        });
    }

    if let Some(field) = rest.strip_prefix("= ") {
        let (value, comment) = parse_value(field);
        return Ok(Card {
            keyword,
            value,
            comment,
        });
    }

    Ok(free_text_card(keyword, rest))
}

fn free_text_card(keyword: String, rest: &str) -> Card {
    let text = rest.trim_end();
    Card {
        keyword,
        value: None,
        comment: if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        },
    }
}

/// Parse header blocks until the END card.
///
/// Returns the logical cards (END excluded, CONTINUE records merged) and the
/// number of bytes the header occupies, always a multiple of [`BLOCK_SIZE`].
pub fn parse_header_blocks(data: &[u8]) -> Result<(Vec<Card>, usize)> {
    let mut raw = Vec::new();
    let complete = data.len() / BLOCK_SIZE * BLOCK_SIZE;

    for (idx, card_bytes) in data[..complete].chunks_exact(CARD_SIZE).enumerate() {
        if &card_bytes[..8] == b"END     " {
            let header_len = (idx * CARD_SIZE / BLOCK_SIZE + 1) * BLOCK_SIZE;
            return Ok((merge_continue(raw), header_len));
        }
        raw.push(parse_card(card_bytes)?);
    }

    Err(Error::UnexpectedEof)
}

/// Fold `CONTINUE` records into the string card they extend.
fn merge_continue(cards: Vec<Card>) -> Vec<Card> {
    let mut out: Vec<Card> = Vec::with_capacity(cards.len());

    for card in cards {
        let continues = card.keyword == "CONTINUE"
            && matches!(
                out.last(),
                Some(Card { value: Some(Value::String(s)), .. }) if s.ends_with('&')
            );
        if !continues {
            out.push(card);
            continue;
        }

        if let Some(prev) = out.last_mut() {
            if let Some(Value::String(s)) = &mut prev.value {
                s.pop();
                if let Some(Value::String(more)) = &card.value {
                    s.push_str(more);
                }
            }
            if let Some(extra) = card.comment {
                prev.comment = Some(match prev.comment.take() {
                    Some(first) => format!("{first} {extra}"),
                    None => extra,
                });
            }
        }
    }

    out
}

// ── Writing ──

/// Longest escaped chunk that fits `'...&'` in a 70-byte value field.
const CONTINUE_CHUNK: usize = 67;

/// Render a logical card as one or more 80-byte card images.
pub fn format_card(card: &Card) -> Result<Vec<[u8; CARD_SIZE]>> {
    let Some(value) = &card.value else {
        if !is_standard_keyword(&card.keyword) && !card.keyword.is_empty() {
            return Err(Error::InvalidKeyword);
        }
        let text = card.comment.as_deref().unwrap_or("");
        let line = format!("{:<8}{}", card.keyword, truncate(text, CARD_SIZE - 8));
        return Ok(vec![card_image(&line)?]);
    };

    if !is_standard_keyword(&card.keyword) {
        return format_hierarch(card, value).map(|image| vec![image]);
    }

    let prefix = format!("{:<8}= ", card.keyword);
    if let Value::String(s) = value {
        if escape_string(s).len() + 2 > 70 {
            return format_long_string(&prefix, s, card.comment.as_deref());
        }
    }

    let field = format_value(value)?;
    let line = append_comment(prefix + &field, card.comment.as_deref());
    Ok(vec![card_image(&line)?])
}

fn format_hierarch(card: &Card, value: &Value) -> Result<[u8; CARD_SIZE]> {
    let field = format_value(value)?;
    let line = format!("HIERARCH {} = {}", card.keyword, field.trim_start());
    if line.len() > CARD_SIZE {
        return Err(Error::InvalidValue("HIERARCH card exceeds 80 characters"));
    }
    card_image(&append_comment(line, card.comment.as_deref()))
}

/// Split a long string over a value card and CONTINUE records.
fn format_long_string(
    prefix: &str,
    s: &str,
    comment: Option<&str>,
) -> Result<Vec<[u8; CARD_SIZE]>> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        let width = if c == '\'' { 2 } else { c.len_utf8() };
        if current.len() + width > CONTINUE_CHUNK {
            chunks.push(std::mem::take(&mut current));
        }
        if c == '\'' {
            current.push_str("''");
        } else {
            current.push(c);
        }
    }
    chunks.push(current);

    let last = chunks.len() - 1;
    let mut images = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let lead = if i == 0 { prefix } else { "CONTINUE  " };
        let line = if i == last {
            append_comment(format!("{lead}'{chunk}'"), comment)
        } else {
            format!("{lead}'{chunk}&'")
        };
        images.push(card_image(&line)?);
    }
    Ok(images)
}

/// Append ` / comment`, truncating the comment to what fits on the card.
fn append_comment(line: String, comment: Option<&str>) -> String {
    match comment {
        Some(c) if !c.is_empty() && line.len() + 4 < CARD_SIZE => {
            let room = CARD_SIZE - line.len() - 3;
            format!("{line} / {}", truncate(c, room))
        }
        _ => line,
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn card_image(line: &str) -> Result<[u8; CARD_SIZE]> {
    if !line.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(Error::InvalidValue("header text must be printable ASCII"));
    }
    if line.len() > CARD_SIZE {
        return Err(Error::InvalidValue("card exceeds 80 characters"));
    }
    let mut buf = [HEADER_PAD_BYTE; CARD_SIZE];
    buf[..line.len()].copy_from_slice(line.as_bytes());
    Ok(buf)
}

/// Serialize cards into complete header blocks, including END and padding.
pub fn serialize_header(cards: &[Card]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((cards.len() + 1) * CARD_SIZE);
    for card in cards {
        for image in format_card(card)? {
            buf.extend_from_slice(&image);
        }
    }
    buf.extend_from_slice(&card_image("END")?);
    pad_to_block(&mut buf, HEADER_PAD_BYTE);
    Ok(buf)
}

//! The per-unit header model and its translation to and from FITS cards.

use fitsidi_codec::{Card, Value};
use log::trace;

use crate::config::ReservedKeywords;

/// Suffix of the companion key that carries an entry's comment in flat
/// attribute stores.
pub const COMMENT_SUFFIX: &str = "_COMMENT";

/// A header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Complex(f64, f64),
}

impl From<Value> for HeaderValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Logical(b) => HeaderValue::Bool(b),
            Value::Integer(n) => HeaderValue::Integer(n),
            Value::Float(f) => HeaderValue::Float(f),
            Value::String(s) => HeaderValue::String(s),
            Value::ComplexInt(re, im) => HeaderValue::Complex(re as f64, im as f64),
            Value::ComplexFloat(re, im) => HeaderValue::Complex(re, im),
        }
    }
}

impl From<HeaderValue> for Value {
    fn from(value: HeaderValue) -> Self {
        match value {
            HeaderValue::Bool(b) => Value::Logical(b),
            HeaderValue::Integer(n) => Value::Integer(n),
            HeaderValue::Float(f) => Value::Float(f),
            HeaderValue::String(s) => Value::String(s),
            HeaderValue::Complex(re, im) => Value::ComplexFloat(re, im),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::String(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::String(s)
    }
}

impl From<bool> for HeaderValue {
    fn from(b: bool) -> Self {
        HeaderValue::Bool(b)
    }
}

impl From<i64> for HeaderValue {
    fn from(n: i64) -> Self {
        HeaderValue::Integer(n)
    }
}

impl From<f64> for HeaderValue {
    fn from(f: f64) -> Self {
        HeaderValue::Float(f)
    }
}

/// A user keyword's value and inline comment (empty when absent).
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderEntry {
    pub value: HeaderValue,
    pub comment: String,
}

/// User keywords in first-appearance order, plus HISTORY and COMMENT text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdiHeader {
    entries: Vec<(String, HeaderEntry)>,
    pub history: Vec<String>,
    pub comment: Vec<String>,
}

impl IdiHeader {
    pub fn new() -> Self {
        IdiHeader::default()
    }

    pub fn get(&self, key: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn value(&self, key: &str) -> Option<&HeaderValue> {
        self.get(key).map(|e| &e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`. An existing key keeps its position and takes the new
    /// value and comment.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<HeaderValue>,
        comment: impl Into<String>,
    ) {
        let key = key.into();
        let entry = HeaderEntry {
            value: value.into(),
            comment: comment.into(),
        };
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = entry,
            None => self.entries.push((key, entry)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<HeaderEntry> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &HeaderEntry) -> bool) {
        self.entries.retain(|(k, e)| keep(k, e));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of keyword entries, not counting HISTORY and COMMENT lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.history.is_empty() && self.comment.is_empty()
    }

    /// Flatten into `KEY` / `KEY_COMMENT` attribute pairs, the layout used
    /// by attribute stores without per-attribute comments. Entries with an
    /// empty comment produce no companion.
    pub fn to_flat_attrs(&self) -> Vec<(String, HeaderValue)> {
        let mut attrs = Vec::with_capacity(self.entries.len() * 2);
        for (key, entry) in &self.entries {
            attrs.push((key.clone(), entry.value.clone()));
            if !entry.comment.is_empty() {
                attrs.push((
                    format!("{key}{COMMENT_SUFFIX}"),
                    HeaderValue::String(entry.comment.clone()),
                ));
            }
        }
        attrs
    }

    /// Rebuild entries from `KEY` / `KEY_COMMENT` pairs. A companion whose
    /// key is absent is kept as an ordinary entry.
    pub fn from_flat_attrs(attrs: impl IntoIterator<Item = (String, HeaderValue)>) -> IdiHeader {
        let attrs: Vec<(String, HeaderValue)> = attrs.into_iter().collect();
        let companion_of = |key: &str| -> Option<String> {
            let base = key.strip_suffix(COMMENT_SUFFIX)?;
            attrs
                .iter()
                .any(|(k, _)| k == base)
                .then(|| base.to_string())
        };

        let mut header = IdiHeader::new();
        let mut comments = Vec::new();
        for (key, value) in &attrs {
            match (companion_of(key), value) {
                (Some(base), HeaderValue::String(text)) => comments.push((base, text.clone())),
                _ => header.insert(key.clone(), value.clone(), ""),
            }
        }
        for (base, text) in comments {
            if let Some((_, entry)) = header.entries.iter_mut().find(|(k, _)| *k == base) {
                entry.comment = text;
            }
        }
        header
    }
}

// ── Translation ──

/// Build the header model of one HDU from its cards.
///
/// Blank keywords, orphan `CONTINUE` records and every keyword `profile`
/// reserves are dropped. HISTORY and COMMENT text is collected in file
/// order. A repeated keyword keeps its first position and its last value.
pub fn parse_header(cards: &[Card], profile: &ReservedKeywords) -> IdiHeader {
    let mut header = IdiHeader::new();
    for card in cards {
        let keyword = card.keyword.trim();
        match keyword {
            "" | "CONTINUE" | "END" => continue,
            "HISTORY" => header.history.push(card.comment.clone().unwrap_or_default()),
            "COMMENT" => header.comment.push(card.comment.clone().unwrap_or_default()),
            _ if profile.is_reserved(keyword) => {
                trace!("dropping reserved keyword {keyword}");
            }
            _ => {
                let value = card
                    .value
                    .clone()
                    .map_or_else(|| HeaderValue::String(String::new()), HeaderValue::from);
                header.insert(keyword, value, card.comment.clone().unwrap_or_default());
            }
        }
    }
    header
}

/// Cards for the user part of a header: entries first, then HISTORY, then
/// COMMENT. Reserved keywords and `*_COMMENT` companions are skipped.
pub fn write_header(header: &IdiHeader, profile: &ReservedKeywords) -> Vec<Card> {
    let mut cards = Vec::with_capacity(header.len() + header.history.len() + header.comment.len());
    for (key, entry) in header.iter() {
        if profile.is_reserved(key) || key.ends_with(COMMENT_SUFFIX) {
            trace!("not writing keyword {key}");
            continue;
        }
        cards.push(Card::new(key, Value::from(entry.value.clone())).with_comment(&*entry.comment));
    }
    cards.extend(header.history.iter().map(|line| Card::commentary("HISTORY", line.as_str())));
    cards.extend(header.comment.iter().map(|line| Card::commentary("COMMENT", line.as_str())));
    cards
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cards() -> Vec<Card> {
        vec![
            Card::new("SIMPLE", Value::Logical(true)),
            Card::new("BITPIX", Value::Integer(16)),
            Card::new("NAXIS", Value::Integer(2)),
            Card::new("NAXIS1", Value::Integer(10)),
            Card::new("TTYPE1", Value::String("FLUX".into())),
            Card::new("TDIM12", Value::String("(2,2)".into())),
            Card::new("CHECKSUM", Value::String("abc".into())),
            Card::new("OBSERVER", Value::String("E. Hubble".into())).with_comment("who"),
            Card::commentary("HISTORY", "first"),
            Card::commentary("", "blank keyword"),
            Card::commentary("COMMENT", "c1"),
            Card::new("EXPTIME", Value::Float(30.0)),
            Card::commentary("HISTORY", "second"),
            Card::new("OBSERVER", Value::String("M. Humason".into())).with_comment("who else"),
            Card {
                keyword: "EMPTY".into(),
                value: None,
                comment: None,
            },
        ]
    }

    #[test]
    fn reserved_keywords_are_dropped() {
        let header = parse_header(&sample_cards(), &ReservedKeywords::FITS);
        let keys: Vec<&str> = header.keys().collect();
        assert_eq!(keys, vec!["OBSERVER", "EXPTIME", "EMPTY"]);
    }

    #[test]
    fn last_value_wins_at_first_position() {
        let header = parse_header(&sample_cards(), &ReservedKeywords::FITS);
        let observer = header.get("OBSERVER").unwrap();
        assert_eq!(observer.value, HeaderValue::String("M. Humason".into()));
        assert_eq!(observer.comment, "who else");
        assert_eq!(header.value("EMPTY"), Some(&HeaderValue::String(String::new())));
        assert_eq!(header.get("EXPTIME").unwrap().comment, "");
    }

    #[test]
    fn history_and_comment_keep_file_order() {
        let header = parse_header(&sample_cards(), &ReservedKeywords::FITS);
        assert_eq!(header.history, vec!["first", "second"]);
        assert_eq!(header.comment, vec!["c1"]);
    }

    #[test]
    fn write_header_orders_entries_then_history_then_comment() {
        let mut header = IdiHeader::new();
        header.insert("OBJECT", "M31", "target");
        header.insert("NAXIS", 2i64, "");
        header.insert("OBJECT_COMMENT", "target", "");
        header.insert("GAIN", 1.5, "");
        header.history.push("h".into());
        header.comment.push("c".into());

        let cards = write_header(&header, &ReservedKeywords::FITS);
        let keywords: Vec<&str> = cards.iter().map(|c| c.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["OBJECT", "GAIN", "HISTORY", "COMMENT"]);
        assert_eq!(cards[0].comment.as_deref(), Some("target"));
        assert_eq!(cards[1].comment, None);
        assert_eq!(cards[2].comment.as_deref(), Some("h"));
    }

    #[test]
    fn complex_values_convert() {
        let v: HeaderValue = Value::ComplexInt(1, -2).into();
        assert_eq!(v, HeaderValue::Complex(1.0, -2.0));
        assert_eq!(Value::from(v), Value::ComplexFloat(1.0, -2.0));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut header = IdiHeader::new();
        header.insert("A", 1i64, "");
        header.insert("B", 2i64, "");
        header.insert("A", true, "now a flag");
        let keys: Vec<&str> = header.keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(header.value("A"), Some(&HeaderValue::Bool(true)));
        assert_eq!(header.remove("A").unwrap().comment, "now a flag");
        assert_eq!(header.len(), 1);
    }

    #[test]
    fn flat_attrs_pair_comments() {
        let mut header = IdiHeader::new();
        header.insert("TELESCOP", "JWST", "observatory");
        header.insert("EXPTIME", 12.5, "");
        let attrs = header.to_flat_attrs();
        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["TELESCOP", "TELESCOP_COMMENT", "EXPTIME"]);

        let rebuilt = IdiHeader::from_flat_attrs(attrs);
        assert_eq!(rebuilt, header);
    }

    #[test]
    fn orphan_companion_stays_an_entry() {
        let rebuilt = IdiHeader::from_flat_attrs(vec![(
            "LONELY_COMMENT".to_string(),
            HeaderValue::String("nobody".into()),
        )]);
        assert_eq!(
            rebuilt.value("LONELY_COMMENT"),
            Some(&HeaderValue::String("nobody".into()))
        );
    }

    #[test]
    fn custom_profile_keeps_structural_keys() {
        const NONE: ReservedKeywords = ReservedKeywords {
            structural: &[],
            table_prefixes: &[],
            literal_prefixes: &[],
            managed: &[],
        };
        let header = parse_header(&sample_cards(), &NONE);
        assert!(header.contains("BITPIX"));
        assert!(header.contains("CHECKSUM"));
    }
}

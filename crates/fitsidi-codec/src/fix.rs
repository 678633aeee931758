//! Card normalisation applied before writing.
//!
//! Turns cards that would be rejected by [`crate::header::format_card`] into
//! writable ones: keywords are upper-cased and stripped of illegal
//! characters, non-ASCII text is replaced, and long commentary text is split
//! across several cards.

use log::debug;

use crate::header::Card;
use crate::value::Value;

/// Free text available on a commentary card after the keyword field.
pub const COMMENTARY_WIDTH: usize = 72;

/// Normalise a card list so every card can be serialized.
pub fn fix_cards(cards: &[Card]) -> Vec<Card> {
    let mut fixed = Vec::with_capacity(cards.len());
    for card in cards {
        let keyword = fix_keyword(&card.keyword);
        if keyword != card.keyword {
            debug!("fixed keyword {:?} -> {:?}", card.keyword, keyword);
        }

        let value = card.value.as_ref().map(|v| match v {
            Value::String(s) => Value::String(printable(s)),
            other => other.clone(),
        });
        let comment = card.comment.as_deref().map(printable);

        if value.is_none() && crate::header::is_commentary_keyword(&keyword) {
            split_commentary(&keyword, comment.as_deref().unwrap_or(""), &mut fixed);
            continue;
        }

        fixed.push(Card {
            keyword,
            value,
            comment,
        });
    }
    fixed
}

fn fix_keyword(keyword: &str) -> String {
    let upper = keyword.trim().to_ascii_uppercase();
    if upper.len() <= 8 {
        upper
            .chars()
            .map(|c| match c {
                'A'..='Z' | '0'..='9' | '-' | '_' => c,
                _ => '_',
            })
            .collect()
    } else {
        upper
            .chars()
            .map(|c| match c {
                '=' => '_',
                ' '..='~' => c,
                _ => '_',
            })
            .collect()
    }
}

/// Replace anything outside printable ASCII with `?`.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

fn split_commentary(keyword: &str, text: &str, out: &mut Vec<Card>) {
    if text.len() <= COMMENTARY_WIDTH {
        out.push(Card::commentary(keyword, text));
        return;
    }
    // `text` is ASCII after `printable`, so byte chunks are char chunks.
    for chunk in text.as_bytes().chunks(COMMENTARY_WIDTH) {
        out.push(Card::commentary(
            keyword,
            String::from_utf8_lossy(chunk).into_owned(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{format_card, serialize_header};

    #[test]
    fn keywords_are_upper_cased() {
        let cards = fix_cards(&[Card::new("object", Value::String("M31".into()))]);
        assert_eq!(cards[0].keyword, "OBJECT");
    }

    #[test]
    fn illegal_keyword_chars_become_underscores() {
        let cards = fix_cards(&[Card::new("a.b c", Value::Integer(1))]);
        assert_eq!(cards[0].keyword, "A_B_C");
    }

    #[test]
    fn long_keywords_keep_spaces_for_hierarch() {
        let cards = fix_cards(&[Card::new("eso det=name", Value::Integer(1))]);
        assert_eq!(cards[0].keyword, "ESO DET_NAME");
        assert!(format_card(&cards[0]).is_ok());
    }

    #[test]
    fn non_ascii_replaced() {
        let cards = fix_cards(&[
            Card::new("OBSERVER", Value::String("Ångström".into())).with_comment("naïve")
        ]);
        assert_eq!(cards[0].value, Some(Value::String("?ngstr?m".into())));
        assert_eq!(cards[0].comment.as_deref(), Some("na?ve"));
        assert!(format_card(&cards[0]).is_ok());
    }

    #[test]
    fn long_history_split_across_cards() {
        let text = "h".repeat(150);
        let cards = fix_cards(&[Card::commentary("HISTORY", text)]);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].comment.as_ref().map(String::len), Some(72));
        assert_eq!(cards[2].comment.as_ref().map(String::len), Some(6));
        assert!(serialize_header(&cards).is_ok());
    }

    #[test]
    fn short_comment_card_untouched() {
        let cards = fix_cards(&[Card::commentary("COMMENT", "fine")]);
        assert_eq!(cards, vec![Card::commentary("COMMENT", "fine")]);
    }
}

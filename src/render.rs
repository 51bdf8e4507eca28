//! Compact JSON rendering of a card-list snapshot.
//!
//! Pure render: takes an already-captured snapshot and a caller
//! capacity bound, so it can run outside the registry lock. The shape
//! is the wire format the request layer sends as-is:
//! `{"cards":[{"id":"0x12345678","nm":"Admin Card","ts":0}]}`.

use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::record::CardRecord;

#[derive(Serialize)]
struct CardEntry<'a> {
    id: String,
    nm: &'a str,
    ts: u32,
}

#[derive(Serialize)]
struct CardListDoc<'a> {
    cards: Vec<CardEntry<'a>>,
}

/// Render `cards` as the compact JSON list.
///
/// Fails `BufferTooSmall` (with the required size) when the rendering
/// exceeds `capacity` bytes; no partial output is produced.
pub fn render_card_list(cards: &[CardRecord], capacity: usize) -> Result<String> {
    let doc = CardListDoc {
        cards: cards
            .iter()
            .map(|card| CardEntry {
                id: format!("0x{:X}", card.id),
                nm: card.name(),
                ts: card.last_access,
            })
            .collect(),
    };

    let json = serde_json::to_string(&doc)?;
    if json.len() > capacity {
        return Err(StoreError::BufferTooSmall {
            needed: json.len(),
            capacity,
        });
    }
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list() {
        let json = render_card_list(&[], 64).unwrap();
        assert_eq!(json, r#"{"cards":[]}"#);
    }

    #[test]
    fn test_entry_shape() {
        let cards = [CardRecord::new(0xABCD_EF00, "User Card 2", 1234)];
        let json = render_card_list(&cards, 1024).unwrap();
        assert_eq!(
            json,
            r#"{"cards":[{"id":"0xABCDEF00","nm":"User Card 2","ts":1234}]}"#
        );
    }

    #[test]
    fn test_multiple_entries_in_given_order() {
        let cards = [
            CardRecord::new(1, "First", 0),
            CardRecord::new(2, "Second", 0),
        ];
        let json = render_card_list(&cards, 1024).unwrap();
        let first = json.find("First").unwrap();
        let second = json.find("Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_capacity_enforced() {
        let cards = [CardRecord::new(1, "Some Card", 0)];
        let err = render_card_list(&cards, 10).unwrap_err();
        match err {
            StoreError::BufferTooSmall { needed, capacity } => {
                assert!(needed > 10);
                assert_eq!(capacity, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_fit_succeeds() {
        let cards = [CardRecord::new(7, "X", 9)];
        let json = render_card_list(&cards, usize::MAX).unwrap();
        let refit = render_card_list(&cards, json.len()).unwrap();
        assert_eq!(refit, json);
    }
}

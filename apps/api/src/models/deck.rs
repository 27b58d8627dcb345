//! Deck state: the card pool of a running game

use std::collections::HashSet;

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::Serialize;

use super::card::Card;

/// Cards of the active game partitioned into drawable, used and discarded
///
/// `used` and `discard` are always disjoint and a discarded card never
/// becomes drawable again.
#[derive(Debug, Clone, Default)]
pub struct DeckState {
    cards: Vec<Card>,
    used: HashSet<String>,
    discard: HashSet<String>,
}

/// Public counters for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckView {
    pub total: usize,
    pub remaining: usize,
    pub discarded: usize,
}

impl DeckState {
    pub fn new(cards: Vec<Card>) -> Self {
        Self {
            cards,
            used: HashSet::new(),
            discard: HashSet::new(),
        }
    }

    fn is_drawable(&self, card: &Card) -> bool {
        !self.used.contains(&card.track_id) && !self.discard.contains(&card.track_id)
    }

    pub fn remaining(&self) -> usize {
        self.cards.iter().filter(|c| self.is_drawable(c)).count()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn is_used(&self, track_id: &str) -> bool {
        self.used.contains(track_id)
    }

    pub fn is_discarded(&self, track_id: &str) -> bool {
        self.discard.contains(track_id)
    }

    /// Draw uniformly among the remaining cards, `None` once exhausted
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Card> {
        let card = self
            .cards
            .iter()
            .filter(|c| self.is_drawable(c))
            .choose(rng)?
            .clone();
        self.used.insert(card.track_id.clone());
        Some(card)
    }

    /// Take a card permanently out of circulation
    pub fn discard(&mut self, track_id: &str) {
        self.used.remove(track_id);
        self.discard.insert(track_id.to_string());
    }

    pub fn view(&self) -> DeckView {
        DeckView {
            total: self.cards.len(),
            remaining: self.remaining(),
            discarded: self.discard.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::card::{DatePrecision, ReleaseDate};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn card(id: &str, year: i32) -> Card {
        Card {
            track_id: id.to_string(),
            uri: format!("spotify:track:{}", id),
            name: id.to_string(),
            artist: "Artist".to_string(),
            album: None,
            cover_url: None,
            release: ReleaseDate {
                date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
                precision: DatePrecision::Year,
            },
        }
    }

    fn deck(n: usize) -> DeckState {
        DeckState::new((0..n).map(|i| card(&format!("t{}", i), 1960 + i as i32)).collect())
    }

    #[test]
    fn test_draw_never_repeats() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = deck(20);
        let mut seen = HashSet::new();
        while let Some(card) = deck.draw(&mut rng) {
            assert!(seen.insert(card.track_id));
        }
        assert_eq!(seen.len(), 20);
        assert_eq!(deck.remaining(), 0);
    }

    #[test]
    fn test_discarded_card_never_returns() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut deck = deck(10);
        let first = deck.draw(&mut rng).unwrap();
        deck.discard(&first.track_id);

        assert!(deck.is_discarded(&first.track_id));
        assert!(!deck.is_used(&first.track_id));
        while let Some(card) = deck.draw(&mut rng) {
            assert_ne!(card.track_id, first.track_id);
        }
    }

    #[test]
    fn test_discard_undrawn_card_removes_it_from_pool() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut deck = deck(3);
        deck.discard("t1");
        assert_eq!(deck.remaining(), 2);

        let drawn: Vec<_> = std::iter::from_fn(|| deck.draw(&mut rng))
            .map(|c| c.track_id)
            .collect();
        assert_eq!(drawn.len(), 2);
        assert!(!drawn.contains(&"t1".to_string()));
    }

    #[test]
    fn test_view_counts() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut deck = deck(5);
        let drawn = deck.draw(&mut rng).unwrap();
        deck.discard(&drawn.track_id);
        deck.draw(&mut rng).unwrap();

        assert_eq!(
            deck.view(),
            DeckView {
                total: 5,
                remaining: 3,
                discarded: 1
            }
        );
    }
}

//! The 44-card catalog and the rule deciding which three cards may be traded
//! in for armies.

use crate::board::{mask_bits, Territory, TERRITORY_COUNT};
use std::collections::BTreeSet;
use std::fmt;

pub const CARD_COUNT: usize = TERRITORY_COUNT + 2;
pub const ALL_CARDS_MASK: u64 = (1u64 << CARD_COUNT) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Infantry,
    Cavalry,
    Artillery,
    Wild,
}

/// A card id. Ids `0..42` carry the territory with the same id, `42` and
/// `43` are the two wild cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card(u8);

impl Card {
    pub const WILD_1: Card = Card(42);
    pub const WILD_2: Card = Card(43);

    pub fn from_id(id: u8) -> Option<Card> {
        if (id as usize) < CARD_COUNT {
            Some(Card(id))
        } else {
            None
        }
    }

    pub fn for_territory(territory: Territory) -> Card {
        Card(territory.id())
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn mask(self) -> u64 {
        1u64 << self.0
    }

    pub fn kind(self) -> CardKind {
        KINDS[self.0 as usize]
    }

    pub fn territory(self) -> Option<Territory> {
        Territory::from_id(self.0)
    }

    pub fn all() -> impl Iterator<Item = Card> {
        (0..CARD_COUNT as u8).map(Card)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.territory() {
            Some(territory) => write!(f, "{} ({:?})", territory, self.kind()),
            None => f.write_str("Wild"),
        }
    }
}

pub fn card_mask_to_set(mask: u64) -> BTreeSet<Card> {
    mask_bits(mask & ALL_CARDS_MASK).map(Card).collect()
}

pub fn card_set_to_mask<It>(cards: It) -> u64
where
    It: IntoIterator<Item = Card>,
{
    cards.into_iter().fold(0, |mask, card| mask | card.mask())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct KindCounts {
    infantry: u32,
    cavalry: u32,
    artillery: u32,
    wild: u32,
}

impl KindCounts {
    fn tally<It: IntoIterator<Item = Card>>(cards: It) -> Self {
        let mut counts = KindCounts::default();
        for card in cards {
            match card.kind() {
                CardKind::Infantry => counts.infantry += 1,
                CardKind::Cavalry => counts.cavalry += 1,
                CardKind::Artillery => counts.artillery += 1,
                CardKind::Wild => counts.wild += 1,
            }
        }
        counts
    }

    fn exchangeable(self) -> bool {
        // A run: at most one of the four kinds is missing, wilds fill the gap
        let zeros = [self.infantry, self.cavalry, self.artillery, self.wild]
            .iter()
            .filter(|&&count| count == 0)
            .count();
        if zeros <= 1 {
            return true;
        }

        // Three of a kind, wilds counting towards every kind
        [self.infantry, self.cavalry, self.artillery]
            .iter()
            .any(|&count| count + self.wild >= 3)
    }
}

/// Whether the given cards can be traded in.
/// Used both on an exact three-card selection and on a whole hand.
pub fn is_exchangeable<It>(cards: It) -> bool
where
    It: IntoIterator<Item = Card>,
{
    KindCounts::tally(cards).exchangeable()
}

/// Same rule as [`is_exchangeable`] applied to a card bit mask
pub fn mask_contains_exchangeable(mask: u64) -> bool {
    is_exchangeable(mask_bits(mask & ALL_CARDS_MASK).map(Card))
}

use CardKind::{Artillery as A, Cavalry as C, Infantry as I, Wild as W};

static KINDS: [CardKind; CARD_COUNT] = [
    // North America
    I, C, A, A, C, A, C, C, A,
    // South America
    I, A, I, I,
    // Africa
    I, I, I, C, C, A,
    // Europe
    A, I, A, C, A, C, A,
    // Asia
    C, I, C, C, A, I, I, I, I, C, C, C,
    // Australia
    A, A, I, A,
    // Wild
    W, W,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn card(territory: Territory) -> Card {
        Card::for_territory(territory)
    }

    #[test]
    fn test_catalog_shape() {
        assert_eq!(Card::all().count(), 44);
        assert!(Card::from_id(43).is_some());
        assert!(Card::from_id(44).is_none());
        assert_eq!(Card::WILD_1.kind(), CardKind::Wild);
        assert_eq!(Card::WILD_2.territory(), None);
        assert_eq!(card(Territory::ALASKA).kind(), CardKind::Infantry);
        assert_eq!(card(Territory::BRAZIL).kind(), CardKind::Artillery);
        assert_eq!(card(Territory::URAL).kind(), CardKind::Cavalry);
        assert_eq!(card(Territory::JAPAN).territory(), Some(Territory::JAPAN));
    }

    #[test]
    fn test_only_two_wild_cards() {
        let wilds = Card::all().filter(|c| c.kind() == CardKind::Wild).count();
        assert_eq!(wilds, 2);
    }

    #[test]
    fn test_one_of_each_is_exchangeable() {
        let cards = [
            card(Territory::ALASKA),         // infantry
            card(Territory::WESTERN_CANADA), // cavalry
            card(Territory::BRAZIL),         // artillery
        ];
        assert!(is_exchangeable(cards));
    }

    #[test]
    fn test_three_of_a_kind_is_exchangeable() {
        let cards = [
            card(Territory::ALASKA),
            card(Territory::PERU),
            card(Territory::VENEZUELA),
        ];
        assert!(is_exchangeable(cards));
    }

    #[test]
    fn test_two_kinds_not_exchangeable() {
        let cards = [
            card(Territory::ALASKA),
            card(Territory::PERU),
            card(Territory::WESTERN_CANADA),
        ];
        assert!(!is_exchangeable(cards));
    }

    #[test]
    fn test_wild_completes_a_set() {
        let pair_and_wild = [card(Territory::ALASKA), card(Territory::PERU), Card::WILD_1];
        assert!(is_exchangeable(pair_and_wild));

        let mixed_and_wild = [card(Territory::ALASKA), card(Territory::BRAZIL), Card::WILD_1];
        assert!(is_exchangeable(mixed_and_wild));

        let two_wilds = [card(Territory::URAL), Card::WILD_1, Card::WILD_2];
        assert!(is_exchangeable(two_wilds));
    }

    #[test]
    fn test_mask_form_matches_set_form() {
        let hand = card(Territory::ALASKA).mask()
            | card(Territory::PERU).mask()
            | card(Territory::WESTERN_CANADA).mask();
        assert!(!mask_contains_exchangeable(hand));

        let hand = hand | card(Territory::VENEZUELA).mask();
        assert!(mask_contains_exchangeable(hand));
        assert!(!mask_contains_exchangeable(0));
    }

    #[test]
    fn test_card_mask_round_trip() {
        let mask = Card::WILD_2.mask() | card(Territory::CHINA).mask();
        let set = card_mask_to_set(mask);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Card::WILD_2));
        assert_eq!(card_set_to_mask(set), mask);
    }
}

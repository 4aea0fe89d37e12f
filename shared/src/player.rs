//! Per-player record held inside a [`crate::game::GameData`].

use crate::board::{Continent, Territory, ALL_TERRITORIES_MASK};
use crate::cards::{card_mask_to_set, Card, ALL_CARDS_MASK, CARD_COUNT};
use crate::protocol::ProtocolError;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised when a player record is asked for something it cannot answer
/// or does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("exact cards of player {0} are not known to this observer")]
    CardsUnknown(u8),
    #[error("card mask {0:#x} names cards outside the catalog")]
    CardMaskOutOfRange(u64),
    #[error("card count {0} exceeds the catalog size")]
    CardCountOutOfRange(u8),
    #[error("player {player} does not hold the requested cards")]
    CardsNotHeld { player: u8 },
    #[error("a game needs 2 to 6 players, got {0}")]
    PlayerCount(usize),
    #[error("snapshot lists {snapshot} players but {known} are known")]
    PlayerListMismatch { snapshot: usize, known: usize },
    #[error("player {0} is not part of this game")]
    UnknownPlayer(u8),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What an observer knows about the cards a player holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeldCards {
    /// Exact cards, as a bit mask over card ids
    Known(u64),
    /// Only how many cards are held
    CountOnly(u8),
}

impl Default for HeldCards {
    fn default() -> Self {
        HeldCards::Known(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerData {
    id: u8,
    free_armies: u32,
    territories: u64,
    cards: HeldCards,
}

impl PlayerData {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            free_armies: 0,
            territories: 0,
            cards: HeldCards::default(),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    // Cards

    pub fn held_cards(&self) -> HeldCards {
        self.cards
    }

    pub fn are_cards_known(&self) -> bool {
        matches!(self.cards, HeldCards::Known(_))
    }

    /// Exact card mask, failing when only the count is known
    pub fn cards_mask(&self) -> Result<u64, StateError> {
        match self.cards {
            HeldCards::Known(mask) => Ok(mask),
            HeldCards::CountOnly(_) => Err(StateError::CardsUnknown(self.id)),
        }
    }

    pub fn cards(&self) -> Result<BTreeSet<Card>, StateError> {
        self.cards_mask().map(card_mask_to_set)
    }

    pub fn holds_cards(&self, mask: u64) -> Result<bool, StateError> {
        Ok(self.cards_mask()? & mask == mask)
    }

    pub fn card_count(&self) -> u8 {
        match self.cards {
            HeldCards::Known(mask) => mask.count_ones() as u8,
            HeldCards::CountOnly(count) => count,
        }
    }

    pub fn set_cards_mask(&mut self, mask: u64) -> Result<(), StateError> {
        if mask & !ALL_CARDS_MASK != 0 {
            return Err(StateError::CardMaskOutOfRange(mask));
        }
        self.cards = HeldCards::Known(mask);
        Ok(())
    }

    pub fn set_card_count(&mut self, count: u8) -> Result<(), StateError> {
        if count as usize > CARD_COUNT {
            return Err(StateError::CardCountOutOfRange(count));
        }
        self.cards = HeldCards::CountOnly(count);
        Ok(())
    }

    pub fn give_card(&mut self, card: Card) -> Result<(), StateError> {
        let mask = self.cards_mask()?;
        self.cards = HeldCards::Known(mask | card.mask());
        Ok(())
    }

    pub fn take_cards(&mut self, cards: u64) -> Result<(), StateError> {
        if !self.holds_cards(cards)? {
            return Err(StateError::CardsNotHeld { player: self.id });
        }
        let mask = self.cards_mask()?;
        self.cards = HeldCards::Known(mask & !cards);
        Ok(())
    }

    // Territories

    pub fn territories_mask(&self) -> u64 {
        self.territories
    }

    pub fn set_territories_mask(&mut self, mask: u64) {
        self.territories = mask & ALL_TERRITORIES_MASK;
    }

    pub fn holds_territory(&self, territory: Territory) -> bool {
        self.territories & territory.mask() != 0
    }

    pub fn holds_continent(&self, continent: Continent) -> bool {
        continent.is_held_by(self.territories)
    }

    pub fn give_territory(&mut self, territory: Territory) {
        self.territories |= territory.mask();
    }

    pub fn take_territory(&mut self, territory: Territory) {
        self.territories &= !territory.mask();
    }

    pub fn territory_count(&self) -> u32 {
        self.territories.count_ones()
    }

    // Armies

    pub fn free_armies(&self) -> u32 {
        self.free_armies
    }

    pub fn has_free_armies(&self) -> bool {
        self.free_armies != 0
    }

    pub fn set_free_armies(&mut self, armies: u32) {
        self.free_armies = armies;
    }

    pub fn give_free_armies(&mut self, armies: u32) {
        self.free_armies = self.free_armies.saturating_add(armies);
    }

    /// Removes `armies` from the free pool, refusing to go negative
    pub fn take_free_armies(&mut self, armies: u32) -> bool {
        match self.free_armies.checked_sub(armies) {
            Some(left) => {
                self.free_armies = left;
                true
            }
            None => false,
        }
    }

    /// Reinforcements at the start of a turn: a third of the territories held
    /// (never less than 3) plus the bonus of every continent held outright
    pub fn income(&self) -> u32 {
        let territory_income = (self.territory_count() / 3).max(3);
        let continent_income: u32 = Continent::all()
            .filter(|&continent| self.holds_continent(continent))
            .map(Continent::army_bonus)
            .sum();
        territory_income + continent_income
    }
}

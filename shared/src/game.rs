//! Authoritative game state and the rules that move it forward.
//!
//! The phase is never stored. It is derived from who owns what and who still
//! holds free armies, see [`GameData::phase`]. Every move entry point checks
//! the whole move before touching anything and returns `false` on rejection,
//! leaving the state as it was.

use crate::board::{Territory, ALL_TERRITORIES_MASK, TERRITORY_COUNT};
use crate::cards::{is_exchangeable, Card, CARD_COUNT};
use crate::player::{PlayerData, StateError};
use crate::protocol::{
    Attack, EndTurn, ExchangeCards, PlaceArmies, PlayerStats, Snapshot, TransferArmies,
    MAX_PLAYER_ID, UNOWNED,
};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

const EXCHANGE_BONUSES: [u32; 6] = [4, 6, 8, 10, 12, 15];
const EXCHANGE_BONUS_STEP: u32 = 5;
const MAX_DEFENDER_DICE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    Claiming,
    Placement,
    Attacking,
    Victory,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Claiming => "claiming",
            GamePhase::Placement => "placement",
            GamePhase::Attacking => "attacking",
            GamePhase::Victory => "victory",
        };
        f.write_str(name)
    }
}

/// Armies every player starts with
pub fn starting_armies(player_count: usize) -> u32 {
    40 - 5 * (player_count.saturating_sub(2) as u32)
}

/// Armies granted for the `exchange`-th card trade of the game, counting from 0
pub fn exchange_bonus(exchange: u32) -> u32 {
    match EXCHANGE_BONUSES.get(exchange as usize) {
        Some(&bonus) => bonus,
        None => {
            let last = EXCHANGE_BONUSES.len() as u32 - 1;
            EXCHANGE_BONUSES[last as usize] + EXCHANGE_BONUS_STEP * (exchange - last)
        }
    }
}

/// Compares two dice pools and returns `(attacker losses, defender losses)`.
///
/// Both pools are sorted highest first, then paired up over the defender's
/// pool. A pair only goes to the attacker when its die is strictly higher.
pub fn resolve_combat(attacker: &mut [u8], defender: &mut [u8]) -> (u32, u32) {
    attacker.sort_unstable_by(|a, b| b.cmp(a));
    defender.sort_unstable_by(|a, b| b.cmp(a));

    let mut attacker_losses = 0;
    let mut defender_losses = 0;
    for (a, d) in attacker.iter().zip(defender.iter()) {
        if a > d {
            defender_losses += 1;
        } else {
            attacker_losses += 1;
        }
    }
    (attacker_losses, defender_losses)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameData {
    players: BTreeMap<u8, PlayerData>,
    turn: u8,
    armies: [u32; TERRITORY_COUNT],
    deck: Vec<Card>,
    exchanges: u32,
    conquered_this_turn: bool,
    last_conquest: Option<(Territory, Territory)>,
}

impl GameData {
    /// Creates a game for the given players: shuffled deck, starting armies for
    /// everyone and a random first player.
    pub fn new<R, I>(ids: I, rng: &mut R) -> Result<Self, StateError>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = u8>,
    {
        let players = Self::player_table(ids)?;

        let mut deck: Vec<Card> = Card::all().collect();
        deck.shuffle(rng);

        let mut game = Self {
            players,
            turn: 0,
            armies: [0; TERRITORY_COUNT],
            deck,
            exchanges: 0,
            conquered_this_turn: false,
            last_conquest: None,
        };

        let armies = starting_armies(game.players.len());
        for player in game.players.values_mut() {
            player.give_free_armies(armies);
        }

        let first = rng.gen_range(0..game.players.len());
        game.turn = game.player_ids()[first];
        debug!(
            "New game for players {:?}, {} armies each, player {} starts",
            game.player_ids(),
            armies,
            game.turn
        );

        Ok(game)
    }

    fn player_table<I>(ids: I) -> Result<BTreeMap<u8, PlayerData>, StateError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut players = BTreeMap::new();
        for id in ids {
            if id > MAX_PLAYER_ID {
                return Err(StateError::UnknownPlayer(id));
            }
            players.insert(id, PlayerData::new(id));
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players.len()) {
            return Err(StateError::PlayerCount(players.len()));
        }
        Ok(players)
    }

    /// Rebuilds the state described by a snapshot, as seen by player `me`.
    /// Only `me`'s cards are known exactly; the deck and exchange count are
    /// not part of a snapshot and start empty.
    pub fn from_snapshot<I>(snapshot: &Snapshot, ids: I, me: u8) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut players = Self::player_table(ids)?;
        if players.len() != snapshot.players().len() {
            return Err(StateError::PlayerListMismatch {
                snapshot: snapshot.players().len(),
                known: players.len(),
            });
        }
        if !players.contains_key(&me) {
            return Err(StateError::UnknownPlayer(me));
        }
        if !players.contains_key(&snapshot.turn()) {
            return Err(StateError::UnknownPlayer(snapshot.turn()));
        }

        for (territory, &owner) in Territory::all().zip(snapshot.owners().iter()) {
            if owner == UNOWNED {
                continue;
            }
            players
                .get_mut(&owner)
                .ok_or(StateError::UnknownPlayer(owner))?
                .give_territory(territory);
        }

        for (player, stats) in players.values_mut().zip(snapshot.players()) {
            player.set_free_armies(u32::from(stats.free_armies));
            if player.id() == me {
                player.set_cards_mask(snapshot.cards())?;
            } else {
                player.set_card_count(stats.card_count)?;
            }
        }

        let mut armies = [0u32; TERRITORY_COUNT];
        for (slot, &count) in armies.iter_mut().zip(snapshot.armies().iter()) {
            *slot = u32::from(count);
        }

        Ok(Self {
            players,
            turn: snapshot.turn(),
            armies,
            deck: Vec::new(),
            exchanges: 0,
            conquered_this_turn: false,
            last_conquest: None,
        })
    }

    /// The state as sent to `recipient`, carrying only the recipient's own cards
    pub fn snapshot_for(&self, recipient: u8) -> Result<Snapshot, StateError> {
        let cards = self
            .players
            .get(&recipient)
            .ok_or(StateError::UnknownPlayer(recipient))?
            .cards_mask()?;

        let mut owners = [UNOWNED; TERRITORY_COUNT];
        for (slot, territory) in owners.iter_mut().zip(Territory::all()) {
            if let Some(owner) = self.territory_owner(territory) {
                *slot = owner;
            }
        }

        let mut armies = [0u16; TERRITORY_COUNT];
        for (slot, &count) in armies.iter_mut().zip(self.armies.iter()) {
            *slot = clamp_u16(count);
        }

        let stats = self
            .players
            .values()
            .map(|player| PlayerStats {
                free_armies: clamp_u16(player.free_armies()),
                card_count: player.card_count(),
            })
            .collect();

        Ok(Snapshot::new(self.turn, owners, armies, stats, cards)?)
    }

    // Queries

    pub fn players(&self) -> impl Iterator<Item = &PlayerData> {
        self.players.values()
    }

    pub fn player(&self, id: u8) -> Option<&PlayerData> {
        self.players.get(&id)
    }

    pub fn player_ids(&self) -> Vec<u8> {
        self.players.keys().copied().collect()
    }

    pub fn current_player(&self) -> u8 {
        self.turn
    }

    pub fn current_player_data(&self) -> Option<&PlayerData> {
        self.players.get(&self.turn)
    }

    pub fn is_current_player(&self, id: u8) -> bool {
        self.turn == id && self.players.contains_key(&id)
    }

    pub fn territory_armies(&self, territory: Territory) -> u32 {
        self.armies[territory.index()]
    }

    pub fn territory_owner(&self, territory: Territory) -> Option<u8> {
        self.players
            .values()
            .find(|player| player.holds_territory(territory))
            .map(PlayerData::id)
    }

    pub fn player_owns_territory(&self, id: u8, territory: Territory) -> bool {
        self.players
            .get(&id)
            .map_or(false, |player| player.holds_territory(territory))
    }

    pub fn all_territories_owned(&self) -> bool {
        self.owned_territories() == ALL_TERRITORIES_MASK
    }

    fn owned_territories(&self) -> u64 {
        self.players
            .values()
            .fold(0, |mask, player| mask | player.territories_mask())
    }

    /// The player holding the whole board, if any
    pub fn winner(&self) -> Option<u8> {
        self.players
            .values()
            .find(|player| player.territories_mask() == ALL_TERRITORIES_MASK)
            .map(PlayerData::id)
    }

    pub fn phase(&self) -> GamePhase {
        if self.winner().is_some() {
            return GamePhase::Victory;
        }

        let with_free_armies = self
            .players
            .values()
            .filter(|player| player.has_free_armies())
            .count();
        if !self.all_territories_owned() || with_free_armies > 1 {
            return GamePhase::Claiming;
        }

        match self.current_player_data() {
            Some(player) if player.has_free_armies() => GamePhase::Placement,
            _ => GamePhase::Attacking,
        }
    }

    /// Territory pair of the latest conquest, consumed by one transfer
    pub fn last_conquest(&self) -> Option<(Territory, Territory)> {
        self.last_conquest
    }

    pub fn conquered_this_turn(&self) -> bool {
        self.conquered_this_turn
    }

    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    /// Cards nobody holds, judged from card counts alone
    pub fn cards_in_deck_estimate(&self) -> usize {
        let held: usize = self.players.values().map(|p| p.card_count() as usize).sum();
        CARD_COUNT.saturating_sub(held)
    }

    // Moves

    pub fn place_armies(&mut self, player: u8, place: &PlaceArmies) -> bool {
        if !self.is_current_player(player) {
            return false;
        }

        let territory = place.territory();
        let armies = u32::from(place.armies());
        let free = self.players.get(&player).map_or(0, PlayerData::free_armies);
        if free < armies {
            return false;
        }

        let owner = self.territory_owner(territory);
        let phase = self.phase();
        let legal = match phase {
            GamePhase::Placement => owner == Some(player),
            GamePhase::Claiming => {
                let fortifying = owner == Some(player) && self.all_territories_owned();
                armies == 1 && (owner.is_none() || fortifying)
            }
            GamePhase::Attacking | GamePhase::Victory => false,
        };
        if !legal {
            return false;
        }

        let Some(current) = self.players.get_mut(&player) else {
            return false;
        };
        current.take_free_armies(armies);
        let previous = self.armies[territory.index()];
        self.armies[territory.index()] = previous + armies;
        if previous == 0 {
            current.give_territory(territory);
        }

        if phase == GamePhase::Claiming {
            self.next_turn();
        }
        self.last_conquest = None;
        true
    }

    pub fn attack<R: Rng + ?Sized>(&mut self, player: u8, attack: &Attack, rng: &mut R) -> bool {
        let roll = || rng.gen_range(1..=6);
        self.attack_with_rolls(player, attack, roll)
    }

    /// Attack with dice supplied by `roll`, attacker dice drawn first
    pub fn attack_with_rolls<F>(&mut self, player: u8, attack: &Attack, mut roll: F) -> bool
    where
        F: FnMut() -> u8,
    {
        if !self.is_current_player(player) || self.phase() != GamePhase::Attacking {
            return false;
        }

        let (from, to) = (attack.from(), attack.to());
        let dice = attack.dice();
        let from_armies = self.territory_armies(from);
        let to_armies = self.territory_armies(to);

        if self.territory_owner(from) != Some(player) || from_armies <= u32::from(dice) {
            return false;
        }
        let Some(defender) = self.territory_owner(to).filter(|&owner| owner != player) else {
            return false;
        };
        if !from.is_adjacent_to(to) {
            return false;
        }

        let defender_dice = (to_armies.min(u32::from(dice)) as u8).min(MAX_DEFENDER_DICE);
        let mut attacker_roll: Vec<u8> = (0..dice).map(|_| roll()).collect();
        let mut defender_roll: Vec<u8> = (0..defender_dice).map(|_| roll()).collect();
        let (attacker_losses, defender_losses) =
            resolve_combat(&mut attacker_roll, &mut defender_roll);

        debug!(
            "Player {} attacks {} from {}: {:?} vs {:?}, losses {}/{}",
            player, to, from, attacker_roll, defender_roll, attacker_losses, defender_losses
        );

        self.armies[from.index()] = from_armies.saturating_sub(attacker_losses);
        self.armies[to.index()] = to_armies.saturating_sub(defender_losses);

        if self.armies[to.index()] == 0 {
            if let Some(loser) = self.players.get_mut(&defender) {
                loser.take_territory(to);
            }
            if let Some(winner) = self.players.get_mut(&player) {
                winner.give_territory(to);
            }
            self.armies[from.index()] -= 1;
            self.armies[to.index()] += 1;
            self.conquered_this_turn = true;
            self.last_conquest = Some((from, to));
        } else {
            self.last_conquest = None;
        }

        true
    }

    pub fn transfer_armies(&mut self, player: u8, transfer: &TransferArmies) -> bool {
        if !self.is_current_player(player) {
            return false;
        }

        let (from, to) = (transfer.from(), transfer.to());
        let armies = u32::from(transfer.armies());
        if self.last_conquest != Some((from, to)) || self.phase() != GamePhase::Attacking {
            return false;
        }
        if !self.player_owns_territory(player, from) || !self.player_owns_territory(player, to) {
            return false;
        }
        if armies >= self.territory_armies(from) {
            return false;
        }

        self.armies[from.index()] -= armies;
        self.armies[to.index()] += armies;
        self.last_conquest = None;
        true
    }

    pub fn end_turn(&mut self, player: u8, end: &EndTurn) -> bool {
        if !self.is_current_player(player) || self.phase() != GamePhase::Attacking {
            return false;
        }

        if let Some(fortify) = end.fortify() {
            let armies = u32::from(fortify.armies);
            if !fortify.from.is_adjacent_to(fortify.to)
                || !self.player_owns_territory(player, fortify.from)
                || !self.player_owns_territory(player, fortify.to)
                || self.territory_armies(fortify.from) <= armies
            {
                return false;
            }
            self.armies[fortify.from.index()] -= armies;
            self.armies[fortify.to.index()] += armies;
        }

        self.next_turn();
        true
    }

    pub fn exchange_cards<R: Rng + ?Sized>(
        &mut self,
        player: u8,
        exchange: &ExchangeCards,
        rng: &mut R,
    ) -> bool {
        if !self.is_current_player(player) || self.phase() == GamePhase::Victory {
            return false;
        }

        let mask = exchange.mask();
        let holds = self
            .players
            .get(&player)
            .map_or(Ok(false), |current| current.holds_cards(mask));
        if holds != Ok(true) || !is_exchangeable(exchange.cards()) {
            return false;
        }

        let bonus = exchange_bonus(self.exchanges);
        let Some(current) = self.players.get_mut(&player) else {
            return false;
        };
        if current.take_cards(mask).is_err() {
            return false;
        }
        current.give_free_armies(bonus);

        self.deck.extend(exchange.cards());
        self.deck.shuffle(rng);
        self.exchanges += 1;
        self.last_conquest = None;
        debug!("Player {} traded cards for {} armies", player, bonus);
        true
    }

    /// Hands the turn to the next player in id order. Awards a card for a
    /// conquest made during the finished turn and income to the new player.
    pub fn next_turn(&mut self) {
        let phase = self.phase();
        if phase == GamePhase::Victory {
            return;
        }

        if self.conquered_this_turn {
            if let Some(card) = self.deck.pop() {
                if let Some(player) = self.players.get_mut(&self.turn) {
                    if let Err(e) = player.give_card(card) {
                        warn!("Could not award card {}: {}", card, e);
                    }
                }
            }
        }
        self.conquered_this_turn = false;

        let ids = self.player_ids();
        for _ in 0..ids.len() {
            let previous = self.turn;
            self.turn = ids
                .iter()
                .copied()
                .find(|&id| id > previous)
                .unwrap_or(ids[0]);

            let eliminated = self
                .players
                .get(&self.turn)
                .map_or(true, |player| player.territory_count() == 0);
            if phase == GamePhase::Claiming || !eliminated {
                break;
            }
        }

        if let Some(player) = self.players.get_mut(&self.turn) {
            if !player.has_free_armies() {
                let income = player.income();
                player.give_free_armies(income);
            }
        }

        self.last_conquest = None;
    }
}

fn clamp_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Continent;
    use crate::cards::card_set_to_mask;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn dice(rolls: &[u8]) -> impl FnMut() -> u8 + '_ {
        let mut rolls = rolls.iter().copied();
        move || rolls.next().unwrap_or(1)
    }

    /// Player 1 holds the Americas, player 2 everything else, three armies on
    /// every territory, nobody has free armies and it is player 1's turn.
    fn claimed_board() -> GameData {
        let mut game = GameData::new([1, 2], &mut rng()).unwrap();
        for territory in Territory::all() {
            let owner = if territory.id() < 13 { 1 } else { 2 };
            player_mut(&mut game, owner).give_territory(territory);
            game.armies[territory.index()] = 3;
        }
        for player in game.players.values_mut() {
            player.set_free_armies(0);
        }
        game.turn = 1;
        game
    }

    fn place(territory: Territory, armies: u16) -> PlaceArmies {
        PlaceArmies::new(territory, armies).unwrap()
    }

    fn attack(from: Territory, to: Territory, dice: u8) -> Attack {
        Attack::new(from, to, dice).unwrap()
    }

    fn transfer(from: Territory, to: Territory, armies: u16) -> TransferArmies {
        TransferArmies::new(from, to, armies).unwrap()
    }

    fn player_mut(game: &mut GameData, id: u8) -> &mut PlayerData {
        game.players.get_mut(&id).unwrap()
    }

    /// Brazil, raised to five armies, takes North Africa with three dice
    fn conquer_north_africa(game: &mut GameData) {
        game.armies[Territory::BRAZIL.index()] = 5;
        game.armies[Territory::NORTH_AFRICA.index()] = 1;
        let conquest = attack(Territory::BRAZIL, Territory::NORTH_AFRICA, 3);
        assert!(game.attack_with_rolls(1, &conquest, dice(&[6, 5, 4, 1])));
    }

    #[test]
    fn test_new_game_setup() {
        let game = GameData::new([4, 2, 9], &mut rng()).unwrap();

        assert_eq!(game.player_ids(), vec![2, 4, 9]);
        assert!(game.player_ids().contains(&game.current_player()));
        assert!(game.players().all(|p| p.free_armies() == 35));
        assert_eq!(game.deck_len(), 44);
        assert_eq!(game.phase(), GamePhase::Claiming);
        assert_eq!(game.last_conquest(), None);
    }

    #[test]
    fn test_player_count_limits() {
        assert_eq!(
            GameData::new([1], &mut rng()),
            Err(StateError::PlayerCount(1))
        );
        assert_eq!(
            GameData::new(1..=7, &mut rng()),
            Err(StateError::PlayerCount(7))
        );
        assert!(GameData::new(1..=6, &mut rng()).is_ok());
    }

    #[test]
    fn test_starting_armies() {
        assert_eq!(starting_armies(2), 40);
        assert_eq!(starting_armies(3), 35);
        assert_eq!(starting_armies(6), 20);
    }

    #[test]
    fn test_phase_derivation() {
        let mut game = claimed_board();
        assert_eq!(game.phase(), GamePhase::Attacking);

        player_mut(&mut game, 1).set_free_armies(3);
        assert_eq!(game.phase(), GamePhase::Placement);

        player_mut(&mut game, 2).set_free_armies(3);
        assert_eq!(game.phase(), GamePhase::Claiming);

        player_mut(&mut game, 2).set_free_armies(0);
        player_mut(&mut game, 2).take_territory(Territory::CHINA);
        assert_eq!(game.phase(), GamePhase::Claiming);

        let mut game = claimed_board();
        player_mut(&mut game, 1)
            .set_territories_mask(ALL_TERRITORIES_MASK);
        player_mut(&mut game, 2).set_territories_mask(0);
        assert_eq!(game.phase(), GamePhase::Victory);
        assert_eq!(game.winner(), Some(1));
    }

    #[test]
    fn test_combat_resolution() {
        assert_eq!(resolve_combat(&mut [6, 3], &mut [5, 2]), (0, 2));
        assert_eq!(resolve_combat(&mut [5, 6], &mut [4, 6]), (1, 1));
        // Ties go to the defender
        assert_eq!(resolve_combat(&mut [4, 4, 4], &mut [4]), (1, 0));
        assert_eq!(resolve_combat(&mut [1, 6, 2], &mut [5]), (0, 1));
    }

    #[test]
    fn test_claiming_places_one_army_and_passes_turn() {
        let mut game = GameData::new([1, 2], &mut rng()).unwrap();
        game.turn = 1;

        assert!(!game.place_armies(1, &place(Territory::ALASKA, 2)));
        assert!(!game.place_armies(2, &place(Territory::ALASKA, 1)));

        assert!(game.place_armies(1, &place(Territory::ALASKA, 1)));
        assert_eq!(game.territory_owner(Territory::ALASKA), Some(1));
        assert_eq!(game.territory_armies(Territory::ALASKA), 1);
        assert_eq!(game.player(1).unwrap().free_armies(), 39);
        assert_eq!(game.current_player(), 2);

        // Taken territory, and no reinforcing while unowned land remains
        assert!(!game.place_armies(2, &place(Territory::ALASKA, 1)));
        assert!(game.place_armies(2, &place(Territory::PERU, 1)));
        assert!(!game.place_armies(1, &place(Territory::ALASKA, 1)));
    }

    #[test]
    fn test_claiming_reinforces_once_board_is_full() {
        let mut game = claimed_board();
        game.players.get_mut(&1).unwrap().set_free_armies(2);
        game.players.get_mut(&2).unwrap().set_free_armies(2);
        assert_eq!(game.phase(), GamePhase::Claiming);

        assert!(!game.place_armies(1, &place(Territory::CHINA, 1)));
        assert!(game.place_armies(1, &place(Territory::ALASKA, 1)));
        assert_eq!(game.territory_armies(Territory::ALASKA), 4);
        assert_eq!(game.current_player(), 2);
    }

    #[test]
    fn test_placement_on_own_territory_only() {
        let mut game = claimed_board();
        game.players.get_mut(&1).unwrap().set_free_armies(5);
        assert_eq!(game.phase(), GamePhase::Placement);

        assert!(!game.place_armies(1, &place(Territory::CHINA, 2)));
        assert!(!game.place_armies(1, &place(Territory::BRAZIL, 6)));
        assert!(game.place_armies(1, &place(Territory::BRAZIL, 5)));
        assert_eq!(game.territory_armies(Territory::BRAZIL), 8);
        assert_eq!(game.current_player(), 1);
        assert_eq!(game.phase(), GamePhase::Attacking);
    }

    #[test]
    fn test_rejected_move_leaves_state_untouched() {
        let mut game = claimed_board();
        let before = game.clone();

        let out_of_turn = attack(Territory::NORTH_AFRICA, Territory::BRAZIL, 1);
        assert!(!game.attack_with_rolls(2, &out_of_turn, dice(&[6, 1])));
        let too_many_dice = attack(Territory::BRAZIL, Territory::NORTH_AFRICA, 3);
        let rolls = dice(&[6, 6, 6, 1]);
        assert!(!game.attack_with_rolls(1, &too_many_dice, rolls));
        let no_conquest = transfer(Territory::BRAZIL, Territory::NORTH_AFRICA, 1);
        assert!(!game.transfer_armies(1, &no_conquest));
        assert!(!game.place_armies(1, &place(Territory::BRAZIL, 1)));
        assert_eq!(game, before);
    }

    #[test]
    fn test_attack_rules() {
        let mut game = claimed_board();

        // Own territory, too few armies, wrong player
        let own = attack(Territory::BRAZIL, Territory::PERU, 1);
        assert!(!game.attack_with_rolls(1, &own, dice(&[6, 1])));
        let too_many_dice = attack(Territory::BRAZIL, Territory::NORTH_AFRICA, 3);
        let rolls = dice(&[6, 6, 6, 1, 1]);
        assert!(!game.attack_with_rolls(1, &too_many_dice, rolls));
        let out_of_turn = attack(Territory::NORTH_AFRICA, Territory::BRAZIL, 1);
        assert!(!game.attack_with_rolls(2, &out_of_turn, dice(&[6, 1])));

        let two_dice = attack(Territory::BRAZIL, Territory::NORTH_AFRICA, 2);
        assert!(game.attack_with_rolls(1, &two_dice, dice(&[6, 2, 5, 3])));
        // 6 > 5, 2 <= 3
        assert_eq!(game.territory_armies(Territory::BRAZIL), 2);
        assert_eq!(game.territory_armies(Territory::NORTH_AFRICA), 2);
        assert_eq!(game.last_conquest(), None);
    }

    #[test]
    fn test_defender_dice_bounded_by_attacker_dice() {
        let mut game = claimed_board();
        let mut rolls = 0;
        let roll = || {
            rolls += 1;
            6
        };
        let single = attack(Territory::BRAZIL, Territory::NORTH_AFRICA, 1);
        assert!(game.attack_with_rolls(1, &single, roll));
        // One attacker die, one defender die
        assert_eq!(rolls, 2);
    }

    #[test]
    fn test_conquest_and_single_transfer() {
        let mut game = claimed_board();
        game.armies[Territory::BRAZIL.index()] = 5;
        game.armies[Territory::NORTH_AFRICA.index()] = 1;

        let conquest = attack(Territory::BRAZIL, Territory::NORTH_AFRICA, 3);
        assert!(game.attack_with_rolls(1, &conquest, dice(&[6, 5, 4, 1])));

        assert_eq!(game.territory_owner(Territory::NORTH_AFRICA), Some(1));
        assert_eq!(game.territory_armies(Territory::BRAZIL), 4);
        assert_eq!(game.territory_armies(Territory::NORTH_AFRICA), 1);
        assert_eq!(
            game.last_conquest(),
            Some((Territory::BRAZIL, Territory::NORTH_AFRICA))
        );
        assert!(game.conquered_this_turn());

        let follow_up = transfer(Territory::BRAZIL, Territory::NORTH_AFRICA, 3);
        let everything = transfer(Territory::BRAZIL, Territory::NORTH_AFRICA, 4);
        assert!(!game.transfer_armies(1, &everything));
        assert!(game.transfer_armies(1, &follow_up));
        assert_eq!(game.territory_armies(Territory::BRAZIL), 1);
        assert_eq!(game.territory_armies(Territory::NORTH_AFRICA), 4);

        assert!(!game.transfer_armies(1, &follow_up));
        assert_eq!(game.last_conquest(), None);
    }

    #[test]
    fn test_transfer_rejected_after_intervening_move() {
        let mut game = claimed_board();
        conquer_north_africa(&mut game);

        // Failed attack elsewhere clears the pair
        let elsewhere = attack(Territory::GREENLAND, Territory::ICELAND, 1);
        assert!(game.attack_with_rolls(1, &elsewhere, dice(&[1, 6])));
        assert_eq!(game.territory_armies(Territory::GREENLAND), 2);

        let late = transfer(Territory::BRAZIL, Territory::NORTH_AFRICA, 1);
        assert!(!game.transfer_armies(1, &late));
    }

    #[test]
    fn test_end_turn_awards_card_and_income() {
        let mut game = claimed_board();
        conquer_north_africa(&mut game);

        assert!(!game.end_turn(2, &EndTurn::plain()));
        assert!(game.end_turn(1, &EndTurn::plain()));

        assert_eq!(game.player(1).unwrap().card_count(), 1);
        assert_eq!(game.deck_len(), 43);
        assert!(!game.conquered_this_turn());
        assert_eq!(game.current_player(), 2);

        // 28 territories -> 9, plus Europe, Asia and Australia
        let expected = 9
            + Continent::EUROPE.army_bonus()
            + Continent::ASIA.army_bonus()
            + Continent::AUSTRALIA.army_bonus();
        assert_eq!(game.player(2).unwrap().free_armies(), expected);
        assert_eq!(game.phase(), GamePhase::Placement);
    }

    #[test]
    fn test_end_turn_without_conquest_draws_nothing() {
        let mut game = claimed_board();
        assert!(game.end_turn(1, &EndTurn::plain()));
        assert_eq!(game.player(1).unwrap().card_count(), 0);
        assert_eq!(game.deck_len(), 44);
    }

    #[test]
    fn test_end_turn_fortify() {
        let mut game = claimed_board();
        let fortify = EndTurn::new(Territory::BRAZIL, Territory::PERU, 2).unwrap();
        assert!(game.end_turn(1, &fortify));
        assert_eq!(game.territory_armies(Territory::BRAZIL), 1);
        assert_eq!(game.territory_armies(Territory::PERU), 5);

        let mut game = claimed_board();
        let too_many = EndTurn::new(Territory::BRAZIL, Territory::PERU, 3).unwrap();
        assert!(!game.end_turn(1, &too_many));
        let enemy = EndTurn::new(Territory::BRAZIL, Territory::NORTH_AFRICA, 1).unwrap();
        assert!(!game.end_turn(1, &enemy));
        assert_eq!(game.current_player(), 1);
    }

    #[test]
    fn test_end_turn_requires_attacking_phase() {
        let mut game = claimed_board();
        player_mut(&mut game, 1).set_free_armies(1);
        assert!(!game.end_turn(1, &EndTurn::plain()));
    }

    #[test]
    fn test_next_turn_skips_eliminated_players() {
        let mut game = GameData::new([1, 2, 3], &mut rng()).unwrap();
        for territory in Territory::all() {
            let owner = if territory.id() < 13 { 1 } else { 3 };
            player_mut(&mut game, owner).give_territory(territory);
            game.armies[territory.index()] = 1;
        }
        for player in game.players.values_mut() {
            player.set_free_armies(0);
        }
        game.turn = 1;

        assert!(game.end_turn(1, &EndTurn::plain()));
        assert_eq!(game.current_player(), 3);
        player_mut(&mut game, 3).set_free_armies(0);

        assert!(game.end_turn(3, &EndTurn::plain()));
        assert_eq!(game.current_player(), 1);
    }

    #[test]
    fn test_next_turn_keeps_existing_free_armies() {
        let mut game = claimed_board();
        player_mut(&mut game, 2).set_free_armies(7);
        game.next_turn();
        assert_eq!(game.current_player(), 2);
        assert_eq!(game.player(2).unwrap().free_armies(), 7);
    }

    #[test]
    fn test_exchange_bonus_schedule() {
        let bonuses: Vec<u32> = (0..9).map(exchange_bonus).collect();
        assert_eq!(bonuses, vec![4, 6, 8, 10, 12, 15, 20, 25, 30]);
    }

    #[test]
    fn test_successive_exchanges() {
        let mut game = claimed_board();
        let mut rng = rng();
        let set = [
            Card::for_territory(Territory::ALASKA),         // infantry
            Card::for_territory(Territory::WESTERN_CANADA), // cavalry
            Card::for_territory(Territory::CENTRAL_AMERICA), // artillery
        ];
        let trade = ExchangeCards::new(set).unwrap();

        let mut granted = Vec::new();
        for _ in 0..8 {
            game.deck.retain(|card| !set.contains(card));
            player_mut(&mut game, 1)
                .set_cards_mask(card_set_to_mask(set))
                .unwrap();

            let before = game.player(1).unwrap().free_armies();
            assert!(game.exchange_cards(1, &trade, &mut rng));
            granted.push(game.player(1).unwrap().free_armies() - before);

            assert_eq!(game.deck_len(), 44);
            assert_eq!(game.player(1).unwrap().card_count(), 0);
        }

        assert_eq!(granted, vec![4, 6, 8, 10, 12, 15, 20, 25]);
        assert_eq!(game.exchanges(), 8);
    }

    #[test]
    fn test_exchange_rules() {
        let mut game = claimed_board();
        let mut rng = rng();
        let pair_of_kinds = [
            Card::for_territory(Territory::ALASKA),
            Card::for_territory(Territory::PERU),
            Card::for_territory(Territory::WESTERN_CANADA),
        ];
        game.deck.retain(|card| !pair_of_kinds.contains(card));
        let hand = card_set_to_mask(pair_of_kinds);
        player_mut(&mut game, 1).set_cards_mask(hand).unwrap();

        // Not a valid combination
        let trade = ExchangeCards::new(pair_of_kinds).unwrap();
        assert!(!game.exchange_cards(1, &trade, &mut rng));

        // Cards not held
        let wilds = [Card::WILD_1, Card::WILD_2, pair_of_kinds[0]];
        let wilds = ExchangeCards::new(wilds).unwrap();
        assert!(!game.exchange_cards(1, &wilds, &mut rng));

        // Not their turn
        player_mut(&mut game, 2).set_cards_mask(hand).unwrap();
        assert!(!game.exchange_cards(2, &trade, &mut rng));
        assert_eq!(game.exchanges(), 0);
    }

    #[test]
    fn test_exchange_clears_conquest_pair() {
        let mut game = claimed_board();
        let mut rng = rng();
        conquer_north_africa(&mut game);

        let set = [Card::WILD_1, Card::WILD_2, Card::for_territory(Territory::CHINA)];
        game.deck.retain(|card| !set.contains(card));
        player_mut(&mut game, 1)
            .set_cards_mask(card_set_to_mask(set))
            .unwrap();
        let trade = ExchangeCards::new(set).unwrap();
        assert!(game.exchange_cards(1, &trade, &mut rng));
        assert_eq!(game.last_conquest(), None);
    }

    #[test]
    fn test_no_moves_after_victory() {
        let mut game = claimed_board();
        let egypt = Territory::EGYPT.mask();
        player_mut(&mut game, 2).set_territories_mask(egypt);
        let rest = ALL_TERRITORIES_MASK & !egypt;
        player_mut(&mut game, 1).set_territories_mask(rest);
        game.armies[Territory::MIDDLE_EAST.index()] = 4;
        game.armies[Territory::EGYPT.index()] = 1;

        let last = attack(Territory::MIDDLE_EAST, Territory::EGYPT, 3);
        assert!(game.attack_with_rolls(1, &last, dice(&[6, 6, 6, 1])));
        assert_eq!(game.phase(), GamePhase::Victory);
        assert_eq!(game.winner(), Some(1));

        let follow_up = transfer(Territory::MIDDLE_EAST, Territory::EGYPT, 1);
        assert!(!game.transfer_armies(1, &follow_up));
        assert!(!game.end_turn(1, &EndTurn::plain()));
        let turn = game.current_player();
        game.next_turn();
        assert_eq!(game.current_player(), turn);
    }

    #[test]
    fn test_snapshot_round_trip_hides_other_hands() {
        let mut game = claimed_board();
        player_mut(&mut game, 1)
            .set_cards_mask(Card::WILD_1.mask())
            .unwrap();
        player_mut(&mut game, 2)
            .set_cards_mask(Card::WILD_2.mask() | 1)
            .unwrap();
        player_mut(&mut game, 2).set_free_armies(12);

        let snapshot = game.snapshot_for(1).unwrap();
        assert_eq!(snapshot.cards(), Card::WILD_1.mask());
        assert_eq!(snapshot.players()[1].card_count, 2);

        let view = GameData::from_snapshot(&snapshot, [1, 2], 1).unwrap();
        assert_eq!(view.current_player(), 1);
        assert_eq!(view.territory_owner(Territory::BRAZIL), Some(1));
        assert_eq!(view.territory_owner(Territory::CHINA), Some(2));
        assert_eq!(view.territory_armies(Territory::CHINA), 3);
        let (mine, theirs) = (view.player(1).unwrap(), view.player(2).unwrap());
        assert_eq!(mine.cards_mask(), Ok(Card::WILD_1.mask()));
        assert_eq!(theirs.cards_mask(), Err(StateError::CardsUnknown(2)));
        assert_eq!(view.player(2).unwrap().card_count(), 2);
        assert_eq!(view.cards_in_deck_estimate(), 41);
        assert_eq!(view.player(2).unwrap().free_armies(), 12);
        assert_eq!(view.phase(), game.phase());
    }

    #[test]
    fn test_snapshot_of_unclaimed_board() {
        let game = GameData::new([3, 5], &mut rng()).unwrap();
        let snapshot = game.snapshot_for(5).unwrap();
        assert!(snapshot.owners().iter().all(|&owner| owner == UNOWNED));
        assert!(game.snapshot_for(4).is_err());
    }

    #[test]
    fn test_from_snapshot_checks_players() {
        let game = claimed_board();
        let snapshot = game.snapshot_for(2).unwrap();

        assert_eq!(
            GameData::from_snapshot(&snapshot, [1, 2, 3], 2),
            Err(StateError::PlayerListMismatch {
                snapshot: 2,
                known: 3
            })
        );
        assert_eq!(
            GameData::from_snapshot(&snapshot, [1, 2], 7),
            Err(StateError::UnknownPlayer(7))
        );
        assert!(GameData::from_snapshot(&snapshot, [1, 3], 3).is_err());
    }
}

//! The game as one participant sees it, and the moves it may propose

use crate::network::ClientError;
use log::debug;
use shared::cards::{card_mask_to_set, mask_contains_exchangeable};
use shared::protocol::{
    Attack, Chat, EndTurn, ExchangeCards, PlaceArmies, ProtocolError, TransferArmies,
};
use shared::{Card, GameData, GamePhase, Message, PlayerData, Territory};
use std::collections::BTreeMap;
use thiserror::Error;

/// What a server message changed in the local view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server offered this id; the session answers with our hello
    Welcome(u8),
    PlayersChanged,
    StateUpdated,
    Chat {
        sender: u8,
        name: String,
        text: String,
    },
    /// The session is over, with the server's reason
    GameFailed(String),
}

/// Why a move was not proposed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("the game has not started")]
    NoGame,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("that is not possible during {0}")]
    WrongPhase(GamePhase),
    #[error("{0} is not yours")]
    NotOwned(Territory),
    #[error("{0} is already taken")]
    Taken(Territory),
    #[error("{0} is already yours")]
    AlreadyOwned(Territory),
    #[error("{0} and {1} are not adjacent")]
    NotAdjacent(Territory, Territory),
    #[error("{0} has only one army")]
    SingleArmy(Territory),
    #[error("army count must be between {min} and {max}")]
    ArmyCount { min: u32, max: u32 },
    #[error("there is no fresh conquest to move into")]
    NoConquest,
    #[error("your cards do not form a set")]
    NoExchange,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Local view fed by server messages
///
/// The game itself is rebuilt from every snapshot; only the participant list
/// and the last attack issued from here survive between snapshots.
#[derive(Debug, Default)]
pub struct ClientGameState {
    my_id: Option<u8>,
    players: BTreeMap<u8, String>,
    game: Option<GameData>,
    last_attack: Option<(Territory, Territory)>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server message into the view
    pub fn apply(&mut self, message: Message) -> Result<ClientEvent, ClientError> {
        let kind = message.message_type();
        let me = match (&message, self.my_id) {
            (Message::Hello(hello), None) => {
                self.my_id = Some(hello.id());
                debug!("Server assigned id {}", hello.id());
                return Ok(ClientEvent::Welcome(hello.id()));
            }
            (Message::Hello(_), Some(_)) => return Err(ClientError::Unexpected(kind)),
            (_, None) => return Err(ClientError::BeforeHello(kind)),
            (_, Some(me)) => me,
        };

        match message {
            Message::Players(players) => {
                self.players = players.players().clone();
                Ok(ClientEvent::PlayersChanged)
            }
            Message::GameState(snapshot) => {
                let game = GameData::from_snapshot(&snapshot, self.players.keys().copied(), me)?;
                if !game.is_current_player(me) {
                    self.last_attack = None;
                }
                self.game = Some(game);
                Ok(ClientEvent::StateUpdated)
            }
            Message::GameFail(fail) => Ok(ClientEvent::GameFailed(fail.reason().to_string())),
            Message::Chat(chat) => Ok(ClientEvent::Chat {
                sender: chat.sender(),
                name: self.player_name(chat.sender()),
                text: chat.text().to_string(),
            }),
            _ => Err(ClientError::Unexpected(kind)),
        }
    }

    pub fn my_id(&self) -> Option<u8> {
        self.my_id
    }

    pub fn players(&self) -> &BTreeMap<u8, String> {
        &self.players
    }

    pub fn player_name(&self, id: u8) -> String {
        self.players
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Player {}", id))
    }

    pub fn game(&self) -> Option<&GameData> {
        self.game.as_ref()
    }

    pub fn phase(&self) -> Option<GamePhase> {
        self.game.as_ref().map(GameData::phase)
    }

    pub fn is_my_turn(&self) -> bool {
        match (&self.game, self.my_id) {
            (Some(game), Some(me)) => game.is_current_player(me),
            _ => false,
        }
    }

    pub fn my_data(&self) -> Option<&PlayerData> {
        self.game.as_ref()?.player(self.my_id?)
    }

    /// One line telling the user what to do next
    pub fn status_line(&self) -> String {
        let (game, me) = match (&self.game, self.my_id) {
            (Some(game), Some(me)) => (game, me),
            _ => return "Waiting to start game...".to_string(),
        };

        let phase = game.phase();
        if let Some(winner) = game.winner() {
            return if winner == me {
                "You won!".to_string()
            } else {
                format!("{} won", self.player_name(winner))
            };
        }

        let current = game.current_player();
        if current != me {
            return format!("{}'s turn...", self.player_name(current));
        }

        match phase {
            GamePhase::Claiming if game.all_territories_owned() => {
                "Your turn, fortify a territory".to_string()
            }
            GamePhase::Claiming => "Your turn, claim an unowned territory".to_string(),
            GamePhase::Placement => {
                let free = game.player(me).map_or(0, PlayerData::free_armies);
                format!("Your turn, place {} armies", free)
            }
            _ => "Your turn, attack".to_string(),
        }
    }

    /// Whether the local hand holds a set worth trading
    pub fn can_exchange(&self) -> bool {
        self.is_my_turn()
            && self
                .my_data()
                .and_then(|me| me.cards_mask().ok())
                .map_or(false, mask_contains_exchangeable)
    }

    fn my_turn(&self) -> Result<(&GameData, u8), Refusal> {
        let game = self.game.as_ref().ok_or(Refusal::NoGame)?;
        let me = self.my_id.ok_or(Refusal::NoGame)?;
        if !game.is_current_player(me) {
            return Err(Refusal::NotYourTurn);
        }
        Ok((game, me))
    }

    /// Claim or reinforce during claiming, or place armies during placement
    pub fn place(&mut self, territory: Territory, armies: u16) -> Result<Message, Refusal> {
        let (game, me) = self.my_turn()?;

        match game.phase() {
            GamePhase::Claiming => {
                match game.territory_owner(territory) {
                    None => {}
                    Some(owner) if owner == me && game.all_territories_owned() => {}
                    Some(_) => return Err(Refusal::Taken(territory)),
                }
                if armies != 1 {
                    return Err(Refusal::ArmyCount { min: 1, max: 1 });
                }
            }
            GamePhase::Placement => {
                if !game.player_owns_territory(me, territory) {
                    return Err(Refusal::NotOwned(territory));
                }
                let free = game.player(me).map_or(0, PlayerData::free_armies);
                if armies == 0 || u32::from(armies) > free {
                    return Err(Refusal::ArmyCount { min: 1, max: free });
                }
            }
            phase => return Err(Refusal::WrongPhase(phase)),
        }

        self.last_attack = None;
        Ok(PlaceArmies::new(territory, armies)?.into())
    }

    /// Attacks with as many dice as the source allows, at most three
    pub fn attack(&mut self, from: Territory, to: Territory) -> Result<Message, Refusal> {
        let (game, me) = self.my_turn()?;
        let phase = game.phase();
        if phase != GamePhase::Attacking {
            return Err(Refusal::WrongPhase(phase));
        }
        if !game.player_owns_territory(me, from) {
            return Err(Refusal::NotOwned(from));
        }
        if game.player_owns_territory(me, to) {
            return Err(Refusal::AlreadyOwned(to));
        }
        if !from.is_adjacent_to(to) {
            return Err(Refusal::NotAdjacent(from, to));
        }
        let armies = game.territory_armies(from);
        if armies <= 1 {
            return Err(Refusal::SingleArmy(from));
        }

        let dice = (armies - 1).min(3) as u8;
        let attack = Attack::new(from, to, dice)?;
        self.last_attack = Some((from, to));
        Ok(attack.into())
    }

    /// Moves armies into the territory just conquered by our last attack
    pub fn transfer(&mut self, armies: u16) -> Result<Message, Refusal> {
        let (game, me) = self.my_turn()?;
        let (from, to) = self.last_attack.ok_or(Refusal::NoConquest)?;
        if !game.player_owns_territory(me, to) {
            return Err(Refusal::NoConquest);
        }
        let available = game.territory_armies(from).saturating_sub(1);
        if armies == 0 || u32::from(armies) > available {
            return Err(Refusal::ArmyCount {
                min: 1,
                max: available,
            });
        }

        let transfer = TransferArmies::new(from, to, armies)?;
        self.last_attack = None;
        Ok(transfer.into())
    }

    /// Ends the turn, optionally moving armies between two adjacent territories
    pub fn end_turn(
        &mut self,
        fortify: Option<(Territory, Territory, u16)>,
    ) -> Result<Message, Refusal> {
        let (game, me) = self.my_turn()?;
        let phase = game.phase();
        if phase != GamePhase::Attacking {
            return Err(Refusal::WrongPhase(phase));
        }

        let end = match fortify {
            None => EndTurn::plain(),
            Some((from, to, armies)) => {
                for territory in [from, to] {
                    if !game.player_owns_territory(me, territory) {
                        return Err(Refusal::NotOwned(territory));
                    }
                }
                if !from.is_adjacent_to(to) {
                    return Err(Refusal::NotAdjacent(from, to));
                }
                let available = game.territory_armies(from).saturating_sub(1);
                if armies == 0 || u32::from(armies) > available {
                    return Err(Refusal::ArmyCount {
                        min: 1,
                        max: available,
                    });
                }
                EndTurn::new(from, to, armies)?
            }
        };

        self.last_attack = None;
        Ok(end.into())
    }

    /// Trades in some set of three cards from the local hand
    pub fn exchange(&mut self) -> Result<Message, Refusal> {
        let (game, me) = self.my_turn()?;
        let phase = game.phase();
        if phase == GamePhase::Victory {
            return Err(Refusal::WrongPhase(phase));
        }
        let hand = game
            .player(me)
            .and_then(|player| player.cards_mask().ok())
            .unwrap_or(0);
        let cards = pick_exchange(hand).ok_or(Refusal::NoExchange)?;

        self.last_attack = None;
        Ok(ExchangeCards::new(cards)?.into())
    }

    pub fn chat(&self, text: &str) -> Result<Message, Refusal> {
        let me = self.my_id.ok_or(Refusal::NoGame)?;
        Ok(Chat::new(me, text)?.into())
    }
}

/// Drops cards from the hand one at a time while the rest still forms a set
pub fn pick_exchange(hand: u64) -> Option<[Card; 3]> {
    if !mask_contains_exchangeable(hand) {
        return None;
    }

    let mut remaining = hand;
    for card in card_mask_to_set(hand) {
        let without = remaining & !card.mask();
        if mask_contains_exchangeable(without) {
            remaining = without;
        }
    }

    let picked: Vec<Card> = card_mask_to_set(remaining).into_iter().collect();
    picked.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::board::TERRITORY_COUNT;
    use shared::protocol::{GameFail, Hello, PlayerStats, Players, Snapshot, UNOWNED};

    /// Player 1 holds territories below `split`, player 2 the rest
    fn snapshot(turn: u8, split: u8, free: [u16; 2], cards: u64) -> Message {
        let mut owners = [UNOWNED; TERRITORY_COUNT];
        for (id, owner) in owners.iter_mut().enumerate() {
            *owner = if (id as u8) < split { 1 } else { 2 };
        }
        let stats = free
            .iter()
            .map(|&free_armies| PlayerStats {
                free_armies,
                card_count: 0,
            })
            .collect();
        let armies = [3; TERRITORY_COUNT];
        let snapshot = Snapshot::new(turn, owners, armies, stats, cards).unwrap();
        Message::GameState(snapshot)
    }

    fn joined() -> ClientGameState {
        let mut state = ClientGameState::new();
        state
            .apply(Hello::new(1, "Player 1").unwrap().into())
            .unwrap();
        let names = [(1, "Ada".to_string()), (2, "Bob".to_string())]
            .into_iter()
            .collect();
        state.apply(Players::new(names).unwrap().into()).unwrap();
        state
    }

    #[test]
    fn test_hello_assigns_id() {
        let mut state = ClientGameState::new();
        let event = state.apply(Hello::new(4, "Player 4").unwrap().into()).unwrap();
        assert_eq!(event, ClientEvent::Welcome(4));
        assert_eq!(state.my_id(), Some(4));
        assert_eq!(state.status_line(), "Waiting to start game...");
    }

    #[test]
    fn test_messages_before_hello_are_errors() {
        let mut state = ClientGameState::new();
        let chat = Message::from(Chat::new(2, "hi").unwrap());
        assert!(matches!(
            state.apply(chat),
            Err(ClientError::BeforeHello(_))
        ));
    }

    #[test]
    fn test_client_only_messages_are_errors() {
        let mut state = joined();
        let end = Message::from(EndTurn::plain());
        assert!(matches!(state.apply(end), Err(ClientError::Unexpected(_))));
        let hi = Message::from(Hello::new(1, "Again").unwrap());
        assert!(matches!(state.apply(hi), Err(ClientError::Unexpected(_))));
    }

    #[test]
    fn test_snapshot_builds_local_view() {
        let mut state = joined();
        let event = state.apply(snapshot(1, 21, [0, 0], 0)).unwrap();
        assert_eq!(event, ClientEvent::StateUpdated);

        let game = state.game().unwrap();
        assert_eq!(game.territory_owner(Territory::ALASKA), Some(1));
        assert_eq!(game.territory_owner(Territory::JAPAN), Some(2));
        assert!(state.my_data().unwrap().are_cards_known());
        assert!(!game.player(2).unwrap().are_cards_known());
        assert_eq!(state.phase(), Some(GamePhase::Attacking));
        assert_eq!(state.status_line(), "Your turn, attack");
    }

    #[test]
    fn test_chat_and_fail_events() {
        let mut state = joined();
        let event = state.apply(Chat::new(2, "hello").unwrap().into()).unwrap();
        assert_eq!(
            event,
            ClientEvent::Chat {
                sender: 2,
                name: "Bob".to_string(),
                text: "hello".to_string(),
            }
        );

        let event = state.apply(GameFail::new("Player Bob was disconnected").unwrap().into());
        assert_eq!(
            event.unwrap(),
            ClientEvent::GameFailed("Player Bob was disconnected".to_string())
        );
    }

    #[test]
    fn test_status_for_waiting_player() {
        let mut state = joined();
        state.apply(snapshot(2, 21, [0, 0], 0)).unwrap();
        assert_eq!(state.status_line(), "Bob's turn...");
        assert_eq!(
            state.attack(Territory::ALASKA, Territory::KAMCHATKA),
            Err(Refusal::NotYourTurn)
        );
    }

    #[test]
    fn test_attack_uses_available_dice() {
        let mut state = joined();
        state.apply(snapshot(1, 21, [0, 0], 0)).unwrap();

        // Alaska (1) borders Kamchatka (2)
        let attack = state.attack(Territory::ALASKA, Territory::KAMCHATKA);
        match attack.unwrap() {
            Message::Attack(attack) => assert_eq!(attack.dice(), 2),
            _ => panic!("Unexpected message type"),
        }

        assert_eq!(
            state.attack(Territory::ALASKA, Territory::GREENLAND),
            Err(Refusal::AlreadyOwned(Territory::GREENLAND))
        );
        assert_eq!(
            state.attack(Territory::ALASKA, Territory::JAPAN),
            Err(Refusal::NotAdjacent(Territory::ALASKA, Territory::JAPAN))
        );
    }

    #[test]
    fn test_transfer_needs_a_conquest() {
        let mut state = joined();
        state.apply(snapshot(1, 21, [0, 0], 0)).unwrap();
        assert_eq!(state.transfer(1), Err(Refusal::NoConquest));

        let attack = state.attack(Territory::ICELAND, Territory::SCANDINAVIA);
        assert!(attack.is_ok());
        // Scandinavia (22) changes hands
        state.apply(snapshot(1, 23, [0, 0], 0)).unwrap();

        assert_eq!(
            state.transfer(5),
            Err(Refusal::ArmyCount { min: 1, max: 2 })
        );
        assert!(matches!(state.transfer(2), Ok(Message::TransferArmies(_))));
        assert_eq!(state.transfer(1), Err(Refusal::NoConquest));
    }

    #[test]
    fn test_claiming_and_placement() {
        let mut state = joined();
        state.apply(snapshot(1, 21, [2, 2], 0)).unwrap();
        assert_eq!(state.phase(), Some(GamePhase::Claiming));
        assert_eq!(state.status_line(), "Your turn, fortify a territory");

        assert!(matches!(
            state.place(Territory::ALASKA, 1),
            Ok(Message::PlaceArmies(_))
        ));
        assert_eq!(
            state.place(Territory::JAPAN, 1),
            Err(Refusal::Taken(Territory::JAPAN))
        );
        assert_eq!(
            state.place(Territory::ALASKA, 2),
            Err(Refusal::ArmyCount { min: 1, max: 1 })
        );

        state.apply(snapshot(1, 21, [5, 0], 0)).unwrap();
        assert_eq!(state.status_line(), "Your turn, place 5 armies");
        assert!(state.place(Territory::ALASKA, 5).is_ok());
        assert_eq!(
            state.place(Territory::ALASKA, 6),
            Err(Refusal::ArmyCount { min: 1, max: 5 })
        );
        assert_eq!(
            state.end_turn(None),
            Err(Refusal::WrongPhase(GamePhase::Placement))
        );
    }

    #[test]
    fn test_end_turn_with_fortify() {
        let mut state = joined();
        state.apply(snapshot(1, 21, [0, 0], 0)).unwrap();

        assert!(matches!(state.end_turn(None), Ok(Message::EndTurn(_))));
        match state
            .end_turn(Some((Territory::ALASKA, Territory::WESTERN_CANADA, 2)))
            .unwrap()
        {
            Message::EndTurn(end) => assert_eq!(end.fortify().unwrap().armies, 2),
            _ => panic!("Unexpected message type"),
        }
        let into_enemy = (Territory::ALASKA, Territory::KAMCHATKA, 1);
        assert_eq!(
            state.end_turn(Some(into_enemy)),
            Err(Refusal::NotOwned(Territory::KAMCHATKA))
        );
    }

    #[test]
    fn test_pick_exchange_finds_a_set() {
        let wild = Card::WILD_1;
        let hand = [0u8, 1, 2, 3]
            .iter()
            .map(|&id| Card::from_id(id).unwrap().mask())
            .fold(wild.mask(), |mask, card| mask | card);

        let picked = pick_exchange(hand).unwrap();
        assert!(shared::cards::is_exchangeable(picked));
        assert!(picked.iter().all(|card| hand & card.mask() != 0));

        assert_eq!(pick_exchange(0), None);
        let wilds = Card::WILD_1.mask() | Card::WILD_2.mask();
        assert_eq!(pick_exchange(wilds), None);
    }

    #[test]
    fn test_exchange_from_hand() {
        let mut state = joined();
        let hand = Card::WILD_1.mask() | Card::WILD_2.mask() | Card::from_id(5).unwrap().mask();
        state.apply(snapshot(1, 21, [0, 0], hand)).unwrap();

        assert!(state.can_exchange());
        match state.exchange().unwrap() {
            Message::ExchangeCards(exchange) => assert_eq!(exchange.mask(), hand),
            _ => panic!("Unexpected message type"),
        }
    }
}

use log::info;
use rand::rngs::StdRng;
use shared::game::{MAX_PLAYERS, MIN_PLAYERS};
use shared::{GameData, GamePhase, Message, MessageType, StateError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("player {0} is not part of the running game")]
    NotInGame(u8),
    #[error("{0:?} is not a game move")]
    NotAMove(MessageType),
    #[error("{kind:?} from player {player} rejected during {phase}")]
    Rejected {
        player: u8,
        kind: MessageType,
        phase: GamePhase,
    },
}

/// A running game: the authoritative state plus the dice and shuffle source
#[derive(Debug)]
pub struct GameSession {
    data: GameData,
    rng: StdRng,
}

impl GameSession {
    pub fn start(ids: &[u8], mut rng: StdRng) -> Result<Self, StateError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&ids.len()) {
            return Err(StateError::PlayerCount(ids.len()));
        }
        let data = GameData::new(ids.iter().copied(), &mut rng)?;
        info!(
            "Game started with players {:?}, player {} goes first",
            data.player_ids(),
            data.current_player()
        );
        Ok(Self { data, rng })
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn is_player(&self, id: u8) -> bool {
        self.data.player(id).is_some()
    }

    /// Validates and applies one move from `player`
    pub fn apply(&mut self, player: u8, message: &Message) -> Result<(), MoveError> {
        if !self.is_player(player) {
            return Err(MoveError::NotInGame(player));
        }

        let phase = self.data.phase();
        let accepted = match message {
            Message::PlaceArmies(m) => self.data.place_armies(player, m),
            Message::Attack(m) => self.data.attack(player, m, &mut self.rng),
            Message::TransferArmies(m) => self.data.transfer_armies(player, m),
            Message::EndTurn(m) => self.data.end_turn(player, m),
            Message::ExchangeCards(m) => self.data.exchange_cards(player, m, &mut self.rng),
            other => return Err(MoveError::NotAMove(other.message_type())),
        };

        if accepted {
            Ok(())
        } else {
            Err(MoveError::Rejected {
                player,
                kind: message.message_type(),
                phase,
            })
        }
    }

    /// Game state message for one participant
    pub fn snapshot_for(&self, id: u8) -> Result<Message, StateError> {
        Ok(Message::GameState(self.data.snapshot_for(id)?))
    }

    pub fn winner(&self) -> Option<u8> {
        self.data.winner()
    }
}

//! Length-prefixed binary protocol spoken between server and clients.
//!
//! A frame is `[type:1][payload length:1][payload:0..=255]`. [`Message`] is the
//! envelope over every payload type; [`framing::FrameBuffer`] cuts frames out
//! of a byte stream.

pub mod framing;
pub mod messages;

pub use framing::{FrameBuffer, HEADER_LENGTH, MAX_FRAME_LENGTH, MAX_PAYLOAD_LENGTH};
pub use messages::{
    Attack, Chat, EndTurn, ExchangeCards, Fortify, GameFail, Hello, PlaceArmies, PlayerStats,
    Players, Snapshot, TransferArmies, MAX_NAME_LENGTH, MAX_PLAYER_ID, UNOWNED,
};

use messages::Payload;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0x00,
    Players = 0x01,
    GameState = 0x02,
    PlaceArmies = 0x03,
    ExchangeCards = 0x04,
    Attack = 0x05,
    TransferArmies = 0x06,
    EndTurn = 0x07,
    GameFail = 0x08,
    Chat = 0x09,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<MessageType> {
        Some(match byte {
            0x00 => MessageType::Hello,
            0x01 => MessageType::Players,
            0x02 => MessageType::GameState,
            0x03 => MessageType::PlaceArmies,
            0x04 => MessageType::ExchangeCards,
            0x05 => MessageType::Attack,
            0x06 => MessageType::TransferArmies,
            0x07 => MessageType::EndTurn,
            0x08 => MessageType::GameFail,
            0x09 => MessageType::Chat,
            _ => return None,
        })
    }

    /// Types only the server is allowed to send
    pub fn is_server_only(self) -> bool {
        matches!(
            self,
            MessageType::Players | MessageType::GameState | MessageType::GameFail
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame of {0} bytes is shorter than its header")]
    Truncated(usize),
    #[error("header declares {declared} payload bytes but frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    #[error("{kind:?} payload cannot be {length} bytes long")]
    PayloadLength { kind: MessageType, length: usize },
    #[error("hello does not start with the protocol magic")]
    BadMagic,
    #[error("unsupported protocol version {0}")]
    Version(u8),
    #[error("territory id {0} is not on the board")]
    Territory(u8),
    #[error("card id {0} is not in the catalog")]
    Card(u8),
    #[error("card mask {0:#x} names cards outside the catalog")]
    CardMask(u64),
    #[error("card {0} listed twice")]
    DuplicateCard(u8),
    #[error("dice count {0} is outside 1..=3")]
    Dice(u8),
    #[error("player id {0} is out of range")]
    PlayerId(u8),
    #[error("player id {0} listed twice")]
    DuplicatePlayer(u8),
    #[error("{0} players do not fit in one players message")]
    TooManyPlayers(usize),
    #[error("a game snapshot needs 2 to 6 players, got {0}")]
    SnapshotPlayers(usize),
    #[error("invalid player name {0:?}")]
    Name(String),
    #[error("text of {0} bytes is out of range")]
    TextLength(usize),
    #[error("character {0:?} has no single-byte encoding")]
    NotLatin1(char),
    #[error("army count must be at least 1")]
    ZeroArmies,
    #[error("territories {0} and {1} are not adjacent")]
    NotAdjacent(u8, u8),
}

/// One decoded protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    Players(Players),
    GameState(Snapshot),
    PlaceArmies(PlaceArmies),
    ExchangeCards(ExchangeCards),
    Attack(Attack),
    TransferArmies(TransferArmies),
    EndTurn(EndTurn),
    GameFail(GameFail),
    Chat(Chat),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Hello(_) => MessageType::Hello,
            Message::Players(_) => MessageType::Players,
            Message::GameState(_) => MessageType::GameState,
            Message::PlaceArmies(_) => MessageType::PlaceArmies,
            Message::ExchangeCards(_) => MessageType::ExchangeCards,
            Message::Attack(_) => MessageType::Attack,
            Message::TransferArmies(_) => MessageType::TransferArmies,
            Message::EndTurn(_) => MessageType::EndTurn,
            Message::GameFail(_) => MessageType::GameFail,
            Message::Chat(_) => MessageType::Chat,
        }
    }

    /// Decodes one complete frame, header included
    pub fn decode(frame: &[u8]) -> Result<Message, ProtocolError> {
        if frame.len() < HEADER_LENGTH {
            return Err(ProtocolError::Truncated(frame.len()));
        }

        let declared = frame[1] as usize;
        let payload = &frame[HEADER_LENGTH..];
        if payload.len() != declared {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        let kind = MessageType::from_byte(frame[0])
            .ok_or(ProtocolError::UnknownType(frame[0]))?;
        Ok(match kind {
            MessageType::Hello => Message::Hello(Hello::decode_payload(payload)?),
            MessageType::Players => Message::Players(Players::decode_payload(payload)?),
            MessageType::GameState => Message::GameState(Snapshot::decode_payload(payload)?),
            MessageType::PlaceArmies => Message::PlaceArmies(PlaceArmies::decode_payload(payload)?),
            MessageType::ExchangeCards => {
                Message::ExchangeCards(ExchangeCards::decode_payload(payload)?)
            }
            MessageType::Attack => Message::Attack(Attack::decode_payload(payload)?),
            MessageType::TransferArmies => {
                Message::TransferArmies(TransferArmies::decode_payload(payload)?)
            }
            MessageType::EndTurn => Message::EndTurn(EndTurn::decode_payload(payload)?),
            MessageType::GameFail => Message::GameFail(GameFail::decode_payload(payload)?),
            MessageType::Chat => Message::Chat(Chat::decode_payload(payload)?),
        })
    }

    /// Encodes into a complete frame
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MAX_FRAME_LENGTH);
        frame.push(self.message_type() as u8);
        frame.push(0);

        match self {
            Message::Hello(m) => m.encode_payload(&mut frame),
            Message::Players(m) => m.encode_payload(&mut frame),
            Message::GameState(m) => m.encode_payload(&mut frame),
            Message::PlaceArmies(m) => m.encode_payload(&mut frame),
            Message::ExchangeCards(m) => m.encode_payload(&mut frame),
            Message::Attack(m) => m.encode_payload(&mut frame),
            Message::TransferArmies(m) => m.encode_payload(&mut frame),
            Message::EndTurn(m) => m.encode_payload(&mut frame),
            Message::GameFail(m) => m.encode_payload(&mut frame),
            Message::Chat(m) => m.encode_payload(&mut frame),
        }

        // Every constructor bounds its payload to a single length byte
        frame[1] = (frame.len() - HEADER_LENGTH) as u8;
        frame
    }
}

impl From<Hello> for Message {
    fn from(m: Hello) -> Self {
        Message::Hello(m)
    }
}

impl From<Players> for Message {
    fn from(m: Players) -> Self {
        Message::Players(m)
    }
}

impl From<Snapshot> for Message {
    fn from(m: Snapshot) -> Self {
        Message::GameState(m)
    }
}

impl From<PlaceArmies> for Message {
    fn from(m: PlaceArmies) -> Self {
        Message::PlaceArmies(m)
    }
}

impl From<ExchangeCards> for Message {
    fn from(m: ExchangeCards) -> Self {
        Message::ExchangeCards(m)
    }
}

impl From<Attack> for Message {
    fn from(m: Attack) -> Self {
        Message::Attack(m)
    }
}

impl From<TransferArmies> for Message {
    fn from(m: TransferArmies) -> Self {
        Message::TransferArmies(m)
    }
}

impl From<EndTurn> for Message {
    fn from(m: EndTurn) -> Self {
        Message::EndTurn(m)
    }
}

impl From<GameFail> for Message {
    fn from(m: GameFail) -> Self {
        Message::GameFail(m)
    }
}

impl From<Chat> for Message {
    fn from(m: Chat) -> Self {
        Message::Chat(m)
    }
}

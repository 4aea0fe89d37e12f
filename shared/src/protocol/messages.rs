//! Payload layouts for every message type.
//!
//! Each message is an immutable value checked when it is built, so anything
//! that exists can be encoded. Decoders check the exact payload size first
//! and then every id in it. Multi-byte integers are big-endian; text is one
//! byte per character (Latin-1).

use super::{MessageType, ProtocolError};
use crate::board::{Territory, TERRITORY_COUNT};
use crate::cards::{Card, ALL_CARDS_MASK};
use std::collections::BTreeMap;

pub const MAX_NAME_LENGTH: usize = 16;
/// Highest id a player may carry on the wire
pub const MAX_PLAYER_ID: u8 = 254;
pub const MAX_LISTED_PLAYERS: usize = 15;
pub const MIN_SNAPSHOT_PLAYERS: usize = 2;
pub const MAX_SNAPSHOT_PLAYERS: usize = 6;
pub const MAX_CHAT_LENGTH: usize = 254;
pub const MAX_REASON_LENGTH: usize = 255;
/// Owner byte of a territory nobody holds yet
pub const UNOWNED: u8 = 0xFF;

pub const PROTOCOL_MAGIC: &[u8; 8] = b"CONQUEST";
pub const PROTOCOL_VERSION: u8 = 1;

const HELLO_LENGTH: usize = 26;
const PLAYER_ENTRY_LENGTH: usize = 1 + MAX_NAME_LENGTH;
const SNAPSHOT_STATIC_LENGTH: usize = 1 + TERRITORY_COUNT + 2 * TERRITORY_COUNT + 6;
const SNAPSHOT_PLAYER_LENGTH: usize = 3;

/// Encoding and decoding of one message body, header excluded
pub(crate) trait Payload: Sized {
    const TYPE: MessageType;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError>;

    fn encode_payload(&self, out: &mut Vec<u8>);
}

fn expect_length(kind: MessageType, payload: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if payload.len() != expected {
        return Err(ProtocolError::PayloadLength {
            kind,
            length: payload.len(),
        });
    }
    Ok(())
}

fn territory(id: u8) -> Result<Territory, ProtocolError> {
    Territory::from_id(id).ok_or(ProtocolError::Territory(id))
}

fn player_id(id: u8) -> Result<u8, ProtocolError> {
    if id > MAX_PLAYER_ID {
        return Err(ProtocolError::PlayerId(id));
    }
    Ok(id)
}

fn positive_armies(armies: u16) -> Result<u16, ProtocolError> {
    if armies == 0 {
        return Err(ProtocolError::ZeroArmies);
    }
    Ok(armies)
}

fn adjacent(from: Territory, to: Territory) -> Result<(), ProtocolError> {
    if !from.is_adjacent_to(to) {
        return Err(ProtocolError::NotAdjacent(from.id(), to.id()));
    }
    Ok(())
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Text as raw bytes, rejecting characters that do not fit in one byte
fn latin1(text: &str) -> Result<Vec<u8>, ProtocolError> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| ProtocolError::NotLatin1(c)))
        .collect()
}

fn from_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Validates a name for a fixed 16-byte, zero-padded field
fn name_field(name: &str) -> Result<Vec<u8>, ProtocolError> {
    let bytes = latin1(name)?;
    if bytes.len() > MAX_NAME_LENGTH || bytes.contains(&0) {
        return Err(ProtocolError::Name(name.to_string()));
    }
    Ok(bytes)
}

fn read_name_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    from_latin1(&field[..end])
}

fn write_name_field(out: &mut Vec<u8>, name: &str) {
    let start = out.len();
    out.extend(name.chars().map(|c| c as u8));
    out.resize(start + MAX_NAME_LENGTH, 0);
}

// ---------------------------------------------------------------------------
// Hello
// ---------------------------------------------------------------------------

/// Handshake. The server offers an id, the client echoes it with its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    id: u8,
    name: String,
}

impl Hello {
    pub fn new(id: u8, name: &str) -> Result<Self, ProtocolError> {
        player_id(id)?;
        if name_field(name)?.is_empty() {
            return Err(ProtocolError::Name(name.to_string()));
        }
        Ok(Self {
            id,
            name: name.to_string(),
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Payload for Hello {
    const TYPE: MessageType = MessageType::Hello;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_length(Self::TYPE, payload, HELLO_LENGTH)?;

        if &payload[..8] != PROTOCOL_MAGIC {
            return Err(ProtocolError::BadMagic);
        }
        if payload[8] != PROTOCOL_VERSION {
            return Err(ProtocolError::Version(payload[8]));
        }

        let name = read_name_field(&payload[10..]);
        Hello::new(payload[9], &name)
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(PROTOCOL_MAGIC);
        out.push(PROTOCOL_VERSION);
        out.push(self.id);
        write_name_field(out, &self.name);
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Every connected participant, by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Players {
    players: BTreeMap<u8, String>,
}

impl Players {
    pub fn new(players: BTreeMap<u8, String>) -> Result<Self, ProtocolError> {
        if players.len() > MAX_LISTED_PLAYERS {
            return Err(ProtocolError::TooManyPlayers(players.len()));
        }
        for (&id, name) in &players {
            player_id(id)?;
            name_field(name)?;
        }
        Ok(Self { players })
    }

    pub fn players(&self) -> &BTreeMap<u8, String> {
        &self.players
    }

    pub fn name(&self, id: u8) -> Option<&str> {
        self.players.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Payload for Players {
    const TYPE: MessageType = MessageType::Players;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() % PLAYER_ENTRY_LENGTH != 0 {
            return Err(ProtocolError::PayloadLength {
                kind: Self::TYPE,
                length: payload.len(),
            });
        }

        let mut players = BTreeMap::new();
        for entry in payload.chunks_exact(PLAYER_ENTRY_LENGTH) {
            let id = player_id(entry[0])?;
            if players.insert(id, read_name_field(&entry[1..])).is_some() {
                return Err(ProtocolError::DuplicatePlayer(id));
            }
        }
        Players::new(players)
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        for (&id, name) in &self.players {
            out.push(id);
            write_name_field(out, name);
        }
    }
}

// ---------------------------------------------------------------------------
// Game state snapshot
// ---------------------------------------------------------------------------

/// Public per-player figures carried in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    pub free_armies: u16,
    pub card_count: u8,
}

/// Full game state as sent to one recipient. Player stats are listed in
/// ascending player id order; `cards` is the recipient's own hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    turn: u8,
    owners: [u8; TERRITORY_COUNT],
    armies: [u16; TERRITORY_COUNT],
    players: Vec<PlayerStats>,
    cards: u64,
}

impl Snapshot {
    pub fn new(
        turn: u8,
        owners: [u8; TERRITORY_COUNT],
        armies: [u16; TERRITORY_COUNT],
        players: Vec<PlayerStats>,
        cards: u64,
    ) -> Result<Self, ProtocolError> {
        player_id(turn)?;
        if !(MIN_SNAPSHOT_PLAYERS..=MAX_SNAPSHOT_PLAYERS).contains(&players.len()) {
            return Err(ProtocolError::SnapshotPlayers(players.len()));
        }
        if cards & !ALL_CARDS_MASK != 0 {
            return Err(ProtocolError::CardMask(cards));
        }
        Ok(Self {
            turn,
            owners,
            armies,
            players,
            cards,
        })
    }

    pub fn turn(&self) -> u8 {
        self.turn
    }

    /// Raw owner bytes, [`UNOWNED`] where nobody holds the territory
    pub fn owners(&self) -> &[u8; TERRITORY_COUNT] {
        &self.owners
    }

    pub fn owner(&self, territory: Territory) -> Option<u8> {
        match self.owners[territory.index()] {
            UNOWNED => None,
            id => Some(id),
        }
    }

    pub fn armies(&self) -> &[u16; TERRITORY_COUNT] {
        &self.armies
    }

    pub fn players(&self) -> &[PlayerStats] {
        &self.players
    }

    pub fn cards(&self) -> u64 {
        self.cards
    }
}

impl Payload for Snapshot {
    const TYPE: MessageType = MessageType::GameState;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let per_player = payload
            .len()
            .checked_sub(SNAPSHOT_STATIC_LENGTH)
            .filter(|rest| rest % SNAPSHOT_PLAYER_LENGTH == 0)
            .ok_or(ProtocolError::PayloadLength {
                kind: Self::TYPE,
                length: payload.len(),
            })?;
        let player_count = per_player / SNAPSHOT_PLAYER_LENGTH;

        let turn = payload[0];
        let mut owners = [UNOWNED; TERRITORY_COUNT];
        owners.copy_from_slice(&payload[1..1 + TERRITORY_COUNT]);
        for &owner in &owners {
            if owner != UNOWNED {
                player_id(owner)?;
            }
        }

        let mut rest = &payload[1 + TERRITORY_COUNT..];
        let mut armies = [0u16; TERRITORY_COUNT];
        for slot in armies.iter_mut() {
            *slot = read_u16(rest);
            rest = &rest[2..];
        }

        let mut players = Vec::with_capacity(player_count);
        for entry in rest[..per_player].chunks_exact(SNAPSHOT_PLAYER_LENGTH) {
            players.push(PlayerStats {
                free_armies: read_u16(entry),
                card_count: entry[2],
            });
        }
        rest = &rest[per_player..];

        let cards = rest
            .iter()
            .fold(0u64, |mask, &byte| (mask << 8) | u64::from(byte));

        Snapshot::new(turn, owners, armies, players, cards)
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.push(self.turn);
        out.extend_from_slice(&self.owners);
        for armies in &self.armies {
            out.extend_from_slice(&armies.to_be_bytes());
        }
        for stats in &self.players {
            out.extend_from_slice(&stats.free_armies.to_be_bytes());
            out.push(stats.card_count);
        }
        out.extend_from_slice(&self.cards.to_be_bytes()[2..]);
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceArmies {
    territory: Territory,
    armies: u16,
}

impl PlaceArmies {
    pub fn new(territory: Territory, armies: u16) -> Result<Self, ProtocolError> {
        positive_armies(armies)?;
        Ok(Self { territory, armies })
    }

    pub fn territory(&self) -> Territory {
        self.territory
    }

    pub fn armies(&self) -> u16 {
        self.armies
    }
}

impl Payload for PlaceArmies {
    const TYPE: MessageType = MessageType::PlaceArmies;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_length(Self::TYPE, payload, 3)?;
        PlaceArmies::new(territory(payload[0])?, read_u16(&payload[1..]))
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.push(self.territory.id());
        out.extend_from_slice(&self.armies.to_be_bytes());
    }
}

/// Three distinct cards traded in together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeCards {
    cards: [Card; 3],
}

impl ExchangeCards {
    pub fn new(cards: [Card; 3]) -> Result<Self, ProtocolError> {
        for (i, card) in cards.iter().enumerate() {
            if cards[..i].contains(card) {
                return Err(ProtocolError::DuplicateCard(card.id()));
            }
        }
        Ok(Self { cards })
    }

    pub fn cards(&self) -> [Card; 3] {
        self.cards
    }

    pub fn mask(&self) -> u64 {
        self.cards.iter().fold(0, |mask, card| mask | card.mask())
    }
}

impl Payload for ExchangeCards {
    const TYPE: MessageType = MessageType::ExchangeCards;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_length(Self::TYPE, payload, 3)?;
        let card = |id: u8| Card::from_id(id).ok_or(ProtocolError::Card(id));
        ExchangeCards::new([card(payload[0])?, card(payload[1])?, card(payload[2])?])
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend(self.cards.iter().map(|card| card.id()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attack {
    from: Territory,
    to: Territory,
    dice: u8,
}

impl Attack {
    pub const MAX_DICE: u8 = 3;

    pub fn new(from: Territory, to: Territory, dice: u8) -> Result<Self, ProtocolError> {
        if !(1..=Self::MAX_DICE).contains(&dice) {
            return Err(ProtocolError::Dice(dice));
        }
        adjacent(from, to)?;
        Ok(Self { from, to, dice })
    }

    pub fn from(&self) -> Territory {
        self.from
    }

    pub fn to(&self) -> Territory {
        self.to
    }

    pub fn dice(&self) -> u8 {
        self.dice
    }
}

impl Payload for Attack {
    const TYPE: MessageType = MessageType::Attack;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_length(Self::TYPE, payload, 3)?;
        Attack::new(territory(payload[0])?, territory(payload[1])?, payload[2])
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.from.id(), self.to.id()]);
        out.push(self.dice);
    }
}

/// Moves armies into the territory that was just conquered from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferArmies {
    from: Territory,
    to: Territory,
    armies: u16,
}

impl TransferArmies {
    pub fn new(from: Territory, to: Territory, armies: u16) -> Result<Self, ProtocolError> {
        positive_armies(armies)?;
        adjacent(from, to)?;
        Ok(Self { from, to, armies })
    }

    pub fn from(&self) -> Territory {
        self.from
    }

    pub fn to(&self) -> Territory {
        self.to
    }

    pub fn armies(&self) -> u16 {
        self.armies
    }
}

impl Payload for TransferArmies {
    const TYPE: MessageType = MessageType::TransferArmies;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_length(Self::TYPE, payload, 4)?;
        TransferArmies::new(
            territory(payload[0])?,
            territory(payload[1])?,
            read_u16(&payload[2..]),
        )
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.from.id(), self.to.id()]);
        out.extend_from_slice(&self.armies.to_be_bytes());
    }
}

/// Army movement between two adjacent territories that closes a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fortify {
    pub from: Territory,
    pub to: Territory,
    pub armies: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndTurn {
    fortify: Option<Fortify>,
}

impl EndTurn {
    /// Ends the turn without moving anything
    pub fn plain() -> Self {
        Self { fortify: None }
    }

    /// Ends the turn moving `armies` from `from` to `to`. Zero armies is the
    /// same as [`plain`](Self::plain) and ignores both territories.
    pub fn new(from: Territory, to: Territory, armies: u16) -> Result<Self, ProtocolError> {
        if armies == 0 {
            return Ok(Self::plain());
        }
        adjacent(from, to)?;
        Ok(Self {
            fortify: Some(Fortify { from, to, armies }),
        })
    }

    pub fn fortify(&self) -> Option<Fortify> {
        self.fortify
    }
}

impl Payload for EndTurn {
    const TYPE: MessageType = MessageType::EndTurn;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_length(Self::TYPE, payload, 4)?;
        let armies = read_u16(&payload[2..]);
        if armies == 0 {
            return Ok(EndTurn::plain());
        }
        EndTurn::new(territory(payload[0])?, territory(payload[1])?, armies)
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        match self.fortify {
            Some(Fortify { from, to, armies }) => {
                out.extend_from_slice(&[from.id(), to.id()]);
                out.extend_from_slice(&armies.to_be_bytes());
            }
            None => out.extend_from_slice(&[0; 4]),
        }
    }
}

// ---------------------------------------------------------------------------
// Text messages
// ---------------------------------------------------------------------------

/// Reason a session was torn down, server to client only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameFail {
    reason: String,
}

impl GameFail {
    pub fn new(reason: &str) -> Result<Self, ProtocolError> {
        let bytes = latin1(reason)?;
        if bytes.len() > MAX_REASON_LENGTH {
            return Err(ProtocolError::TextLength(bytes.len()));
        }
        Ok(Self {
            reason: reason.to_string(),
        })
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Payload for GameFail {
    const TYPE: MessageType = MessageType::GameFail;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        GameFail::new(&from_latin1(payload))
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend(self.reason.chars().map(|c| c as u8));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    sender: u8,
    text: String,
}

impl Chat {
    pub fn new(sender: u8, text: &str) -> Result<Self, ProtocolError> {
        player_id(sender)?;
        let bytes = latin1(text)?;
        if bytes.is_empty() || bytes.len() > MAX_CHAT_LENGTH {
            return Err(ProtocolError::TextLength(bytes.len()));
        }
        Ok(Self {
            sender,
            text: text.to_string(),
        })
    }

    pub fn sender(&self) -> u8 {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Payload for Chat {
    const TYPE: MessageType = MessageType::Chat;

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (&sender, text) = payload.split_last().ok_or(ProtocolError::PayloadLength {
            kind: Self::TYPE,
            length: 0,
        })?;
        Chat::new(sender, &from_latin1(text))
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend(self.text.chars().map(|c| c as u8));
        out.push(self.sender);
    }
}

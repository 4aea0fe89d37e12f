//! Static board data: the 42 territories, the adjacency graph between them
//! and the continent groupings that drive income.
//!
//! Everything here is a compile-time table indexed by a small integer id.
//! Sets of territories travel as `u64` bit masks where bit `i` stands for the
//! territory with id `i`.

use std::collections::BTreeSet;
use std::fmt;

pub const TERRITORY_COUNT: usize = 42;
pub const ALL_TERRITORIES_MASK: u64 = (1u64 << TERRITORY_COUNT) - 1;
pub const CONTINENT_COUNT: usize = 6;

/// One of the 42 fixed regions on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Territory(u8);

impl Territory {
    // North America
    pub const ALASKA: Territory = Territory(0);
    pub const WESTERN_CANADA: Territory = Territory(1);
    pub const CENTRAL_AMERICA: Territory = Territory(2);
    pub const EASTERN_US: Territory = Territory(3);
    pub const GREENLAND: Territory = Territory(4);
    pub const NORTHWEST_TERRITORY: Territory = Territory(5);
    pub const CENTRAL_CANADA: Territory = Territory(6);
    pub const EASTERN_CANADA: Territory = Territory(7);
    pub const WESTERN_US: Territory = Territory(8);

    // South America
    pub const ARGENTINA: Territory = Territory(9);
    pub const BRAZIL: Territory = Territory(10);
    pub const PERU: Territory = Territory(11);
    pub const VENEZUELA: Territory = Territory(12);

    // Africa
    pub const CENTRAL_AFRICA: Territory = Territory(13);
    pub const EAST_AFRICA: Territory = Territory(14);
    pub const EGYPT: Territory = Territory(15);
    pub const MADAGASCAR: Territory = Territory(16);
    pub const NORTH_AFRICA: Territory = Territory(17);
    pub const SOUTH_AFRICA: Territory = Territory(18);

    // Europe
    pub const GREAT_BRITAIN: Territory = Territory(19);
    pub const ICELAND: Territory = Territory(20);
    pub const NORTHERN_EUROPE: Territory = Territory(21);
    pub const SCANDINAVIA: Territory = Territory(22);
    pub const SOUTHERN_EUROPE: Territory = Territory(23);
    pub const EASTERN_EUROPE: Territory = Territory(24);
    pub const WESTERN_EUROPE: Territory = Territory(25);

    // Asia
    pub const AFGHANISTAN: Territory = Territory(26);
    pub const CHINA: Territory = Territory(27);
    pub const INDIA: Territory = Territory(28);
    pub const IRKUTSK: Territory = Territory(29);
    pub const JAPAN: Territory = Territory(30);
    pub const KAMCHATKA: Territory = Territory(31);
    pub const MIDDLE_EAST: Territory = Territory(32);
    pub const MONGOLIA: Territory = Territory(33);
    pub const SOUTHEAST_ASIA: Territory = Territory(34);
    pub const SIBERIA: Territory = Territory(35);
    pub const URAL: Territory = Territory(36);
    pub const YAKUTSK: Territory = Territory(37);

    // Australia
    pub const EASTERN_AUSTRALIA: Territory = Territory(38);
    pub const INDONESIA: Territory = Territory(39);
    pub const NEW_GUINEA: Territory = Territory(40);
    pub const WESTERN_AUSTRALIA: Territory = Territory(41);

    /// Looks up a territory by wire id, `None` when the id is off the board
    pub fn from_id(id: u8) -> Option<Territory> {
        if (id as usize) < TERRITORY_COUNT {
            Some(Territory(id))
        } else {
            None
        }
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn mask(self) -> u64 {
        1u64 << self.0
    }

    pub fn name(self) -> &'static str {
        NAMES[self.index()]
    }

    /// Mask of every territory sharing a border with this one
    pub fn adjacencies(self) -> u64 {
        ADJACENCY[self.index()]
    }

    pub fn is_adjacent_to(self, other: Territory) -> bool {
        self.adjacencies() & other.mask() != 0
    }

    pub fn all() -> impl Iterator<Item = Territory> {
        (0..TERRITORY_COUNT as u8).map(Territory)
    }
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expands a territory mask into the set of territories it names.
/// Bits beyond the board are ignored.
pub fn territory_mask_to_set(mask: u64) -> BTreeSet<Territory> {
    mask_bits(mask & ALL_TERRITORIES_MASK)
        .map(Territory)
        .collect()
}

pub fn territory_set_to_mask<I>(territories: I) -> u64
where
    I: IntoIterator<Item = Territory>,
{
    territories
        .into_iter()
        .fold(0, |mask, territory| mask | territory.mask())
}

/// Yields the index of every set bit, lowest first
pub(crate) fn mask_bits(mut mask: u64) -> impl Iterator<Item = u8> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let bit = mask.trailing_zeros() as u8;
        mask &= mask - 1;
        Some(bit)
    })
}

/// Named group of territories worth a fixed army bonus to whoever holds all of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Continent(u8);

struct ContinentInfo {
    name: &'static str,
    bonus: u32,
    mask: u64,
}

impl Continent {
    pub const NORTH_AMERICA: Continent = Continent(0);
    pub const SOUTH_AMERICA: Continent = Continent(1);
    pub const AFRICA: Continent = Continent(2);
    pub const EUROPE: Continent = Continent(3);
    pub const ASIA: Continent = Continent(4);
    pub const AUSTRALIA: Continent = Continent(5);

    pub fn all() -> impl Iterator<Item = Continent> {
        (0..CONTINENT_COUNT as u8).map(Continent)
    }

    pub fn name(self) -> &'static str {
        CONTINENTS[self.0 as usize].name
    }

    pub fn army_bonus(self) -> u32 {
        CONTINENTS[self.0 as usize].bonus
    }

    pub fn mask(self) -> u64 {
        CONTINENTS[self.0 as usize].mask
    }

    /// True when `owned` covers every territory of this continent
    pub fn is_held_by(self, owned: u64) -> bool {
        owned & self.mask() == self.mask()
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static NAMES: [&str; TERRITORY_COUNT] = [
    "Alaska",
    "Western Canada",
    "Central America",
    "Eastern United States",
    "Greenland",
    "Northwest Territory",
    "Central Canada",
    "Eastern Canada",
    "Western United States",
    "Argentina",
    "Brazil",
    "Peru",
    "Venezuela",
    "Central Africa",
    "East Africa",
    "Egypt",
    "Madagascar",
    "North Africa",
    "South Africa",
    "Great Britain",
    "Iceland",
    "Northern Europe",
    "Scandinavia",
    "Southern Europe",
    "Eastern Europe",
    "Western Europe",
    "Afghanistan",
    "China",
    "India",
    "Irkutsk",
    "Japan",
    "Kamchatka",
    "Middle East",
    "Mongolia",
    "Southeast Asia",
    "Siberia",
    "Ural",
    "Yakutsk",
    "Eastern Australia",
    "Indonesia",
    "New Guinea",
    "Western Australia",
];

type T = Territory;

const BORDERS: [(Territory, Territory); 83] = [
    // North America
    (T::ALASKA, T::KAMCHATKA),
    (T::ALASKA, T::NORTHWEST_TERRITORY),
    (T::ALASKA, T::WESTERN_CANADA),
    (T::NORTHWEST_TERRITORY, T::WESTERN_CANADA),
    (T::NORTHWEST_TERRITORY, T::CENTRAL_CANADA),
    (T::NORTHWEST_TERRITORY, T::GREENLAND),
    (T::GREENLAND, T::CENTRAL_CANADA),
    (T::GREENLAND, T::EASTERN_CANADA),
    (T::GREENLAND, T::ICELAND),
    (T::WESTERN_CANADA, T::CENTRAL_CANADA),
    (T::WESTERN_CANADA, T::WESTERN_US),
    (T::CENTRAL_CANADA, T::WESTERN_US),
    (T::CENTRAL_CANADA, T::EASTERN_US),
    (T::CENTRAL_CANADA, T::EASTERN_CANADA),
    (T::EASTERN_CANADA, T::EASTERN_US),
    (T::WESTERN_US, T::EASTERN_US),
    (T::WESTERN_US, T::CENTRAL_AMERICA),
    (T::EASTERN_US, T::CENTRAL_AMERICA),
    (T::CENTRAL_AMERICA, T::VENEZUELA),
    // South America
    (T::VENEZUELA, T::PERU),
    (T::VENEZUELA, T::BRAZIL),
    (T::PERU, T::BRAZIL),
    (T::PERU, T::ARGENTINA),
    (T::ARGENTINA, T::BRAZIL),
    (T::BRAZIL, T::NORTH_AFRICA),
    // Africa
    (T::NORTH_AFRICA, T::WESTERN_EUROPE),
    (T::NORTH_AFRICA, T::SOUTHERN_EUROPE),
    (T::NORTH_AFRICA, T::EGYPT),
    (T::NORTH_AFRICA, T::EAST_AFRICA),
    (T::NORTH_AFRICA, T::CENTRAL_AFRICA),
    (T::EGYPT, T::SOUTHERN_EUROPE),
    (T::EGYPT, T::MIDDLE_EAST),
    (T::EGYPT, T::EAST_AFRICA),
    (T::EAST_AFRICA, T::MIDDLE_EAST),
    (T::EAST_AFRICA, T::CENTRAL_AFRICA),
    (T::EAST_AFRICA, T::MADAGASCAR),
    (T::EAST_AFRICA, T::SOUTH_AFRICA),
    (T::MADAGASCAR, T::SOUTH_AFRICA),
    (T::SOUTH_AFRICA, T::CENTRAL_AFRICA),
    // Europe
    (T::WESTERN_EUROPE, T::GREAT_BRITAIN),
    (T::WESTERN_EUROPE, T::NORTHERN_EUROPE),
    (T::WESTERN_EUROPE, T::SOUTHERN_EUROPE),
    (T::GREAT_BRITAIN, T::ICELAND),
    (T::GREAT_BRITAIN, T::SCANDINAVIA),
    (T::GREAT_BRITAIN, T::NORTHERN_EUROPE),
    (T::ICELAND, T::SCANDINAVIA),
    (T::SCANDINAVIA, T::NORTHERN_EUROPE),
    (T::SCANDINAVIA, T::EASTERN_EUROPE),
    (T::NORTHERN_EUROPE, T::SOUTHERN_EUROPE),
    (T::NORTHERN_EUROPE, T::EASTERN_EUROPE),
    (T::EASTERN_EUROPE, T::SOUTHERN_EUROPE),
    (T::EASTERN_EUROPE, T::URAL),
    (T::EASTERN_EUROPE, T::AFGHANISTAN),
    (T::EASTERN_EUROPE, T::MIDDLE_EAST),
    (T::SOUTHERN_EUROPE, T::MIDDLE_EAST),
    // Asia
    (T::URAL, T::SIBERIA),
    (T::URAL, T::CHINA),
    (T::URAL, T::AFGHANISTAN),
    (T::AFGHANISTAN, T::CHINA),
    (T::AFGHANISTAN, T::INDIA),
    (T::AFGHANISTAN, T::MIDDLE_EAST),
    (T::MIDDLE_EAST, T::INDIA),
    (T::SIBERIA, T::YAKUTSK),
    (T::SIBERIA, T::IRKUTSK),
    (T::SIBERIA, T::MONGOLIA),
    (T::SIBERIA, T::CHINA),
    (T::CHINA, T::MONGOLIA),
    (T::CHINA, T::INDIA),
    (T::CHINA, T::SOUTHEAST_ASIA),
    (T::SOUTHEAST_ASIA, T::INDIA),
    (T::SOUTHEAST_ASIA, T::INDONESIA),
    (T::YAKUTSK, T::IRKUTSK),
    (T::YAKUTSK, T::KAMCHATKA),
    (T::IRKUTSK, T::KAMCHATKA),
    (T::IRKUTSK, T::MONGOLIA),
    (T::KAMCHATKA, T::JAPAN),
    (T::KAMCHATKA, T::MONGOLIA),
    (T::MONGOLIA, T::JAPAN),
    // Australia
    (T::INDONESIA, T::NEW_GUINEA),
    (T::INDONESIA, T::WESTERN_AUSTRALIA),
    (T::NEW_GUINEA, T::WESTERN_AUSTRALIA),
    (T::NEW_GUINEA, T::EASTERN_AUSTRALIA),
    (T::WESTERN_AUSTRALIA, T::EASTERN_AUSTRALIA),
];

const fn build_adjacency() -> [u64; TERRITORY_COUNT] {
    let mut table = [0u64; TERRITORY_COUNT];
    let mut i = 0;
    while i < BORDERS.len() {
        let (a, b) = BORDERS[i];
        table[a.0 as usize] |= 1u64 << b.0;
        table[b.0 as usize] |= 1u64 << a.0;
        i += 1;
    }
    table
}

static ADJACENCY: [u64; TERRITORY_COUNT] = build_adjacency();

const fn mask_of(territories: &[Territory]) -> u64 {
    let mut mask = 0u64;
    let mut i = 0;
    while i < territories.len() {
        mask |= 1u64 << territories[i].0;
        i += 1;
    }
    mask
}

static CONTINENTS: [ContinentInfo; CONTINENT_COUNT] = [
    ContinentInfo {
        name: "North America",
        bonus: 5,
        mask: mask_of(&[
            T::ALASKA,
            T::WESTERN_CANADA,
            T::CENTRAL_AMERICA,
            T::EASTERN_US,
            T::GREENLAND,
            T::NORTHWEST_TERRITORY,
            T::CENTRAL_CANADA,
            T::EASTERN_CANADA,
            T::WESTERN_US,
        ]),
    },
    ContinentInfo {
        name: "South America",
        bonus: 2,
        mask: mask_of(&[T::ARGENTINA, T::BRAZIL, T::PERU, T::VENEZUELA]),
    },
    ContinentInfo {
        name: "Africa",
        bonus: 3,
        mask: mask_of(&[
            T::CENTRAL_AFRICA,
            T::EAST_AFRICA,
            T::EGYPT,
            T::MADAGASCAR,
            T::NORTH_AFRICA,
            T::SOUTH_AFRICA,
        ]),
    },
    ContinentInfo {
        name: "Europe",
        bonus: 5,
        mask: mask_of(&[
            T::GREAT_BRITAIN,
            T::ICELAND,
            T::NORTHERN_EUROPE,
            T::SCANDINAVIA,
            T::SOUTHERN_EUROPE,
            T::EASTERN_EUROPE,
            T::WESTERN_EUROPE,
        ]),
    },
    ContinentInfo {
        name: "Asia",
        bonus: 7,
        mask: mask_of(&[
            T::AFGHANISTAN,
            T::CHINA,
            T::INDIA,
            T::IRKUTSK,
            T::JAPAN,
            T::KAMCHATKA,
            T::MIDDLE_EAST,
            T::MONGOLIA,
            T::SOUTHEAST_ASIA,
            T::SIBERIA,
            T::URAL,
            T::YAKUTSK,
        ]),
    },
    ContinentInfo {
        name: "Australia",
        bonus: 2,
        mask: mask_of(&[
            T::EASTERN_AUSTRALIA,
            T::INDONESIA,
            T::NEW_GUINEA,
            T::WESTERN_AUSTRALIA,
        ]),
    },
];

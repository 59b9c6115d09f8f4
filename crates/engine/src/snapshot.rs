use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::input::{TileCoord, MAP_HEIGHT_TILES, MAP_WIDTH_TILES};

pub const TRAP_MAX_CHARGES: i64 = 2;
const EAST_TRAP_SYMBOL: char = 'T';
const WEST_TRAP_SYMBOL: char = 't';

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("parse server message: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse server message at {path}: {source}")]
    DecodeAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown seat '{0}' (expected one of a, s, c, d, h, _)")]
pub struct SeatParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Attacker,
    SecondAttacker,
    Collector,
    Defender,
    Healer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Attacker,
        Role::SecondAttacker,
        Role::Collector,
        Role::Defender,
        Role::Healer,
    ];

    pub fn letter(self) -> char {
        match self {
            Self::Attacker => 'a',
            Self::SecondAttacker => 's',
            Self::Collector => 'c',
            Self::Defender => 'd',
            Self::Healer => 'h',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.letter() == letter)
    }

    pub fn is_attacker(self) -> bool {
        matches!(self, Self::Attacker | Self::SecondAttacker)
    }

    pub fn dispenser_symbol(self) -> Option<char> {
        match self {
            Self::Attacker => Some('q'),
            Self::Collector => Some('y'),
            Self::Defender => Some('w'),
            Self::Healer => Some('e'),
            Self::SecondAttacker => None,
        }
    }

    pub fn default_call_count(self) -> u32 {
        match self {
            Self::Attacker => 3,
            Self::Collector => 4,
            Self::Defender => 3,
            Self::Healer => 3,
            Self::SecondAttacker => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    Player(Role),
    Spectator,
}

impl Seat {
    pub const SPECTATOR_LETTER: char = '_';

    pub fn parse(raw: &str) -> Result<Self, SeatParseError> {
        let mut chars = raw.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(Self::SPECTATOR_LETTER), None) => Ok(Self::Spectator),
            (Some(letter), None) => Role::from_letter(letter)
                .map(Self::Player)
                .ok_or_else(|| SeatParseError(raw.to_string())),
            _ => Err(SeatParseError(raw.to_string())),
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Player(role) => role.letter(),
            Self::Spectator => Self::SPECTATOR_LETTER,
        }
    }

    pub fn role(self) -> Option<Role> {
        match self {
            Self::Player(role) => Some(role),
            Self::Spectator => None,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Runner,
    Healer,
    Fighter,
    Ranger,
}

impl Species {
    pub const RESOLUTION_ORDER: [Species; 4] = [
        Species::Runner,
        Species::Healer,
        Species::Fighter,
        Species::Ranger,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Runner => "d",
            Self::Healer => "h",
            Self::Fighter => "a",
            Self::Ranger => "s",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Eggs,
    Food,
    HammerLogs,
}

impl ItemKind {
    pub const RESOLUTION_ORDER: [ItemKind; 3] =
        [ItemKind::Eggs, ItemKind::Food, ItemKind::HammerLogs];

    pub fn key(self) -> &'static str {
        match self {
            Self::Eggs => "eggs",
            Self::Food => "food",
            Self::HammerLogs => "hnls",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "(i32, i32)")]
pub struct Location {
    pub col: i32,
    pub row: i32,
}

impl From<(i32, i32)> for Location {
    fn from((col, row): (i32, i32)) -> Self {
        Self { col, row }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PenanceState {
    pub uuid: String,
    pub location: Location,
    #[serde(rename = "_", default)]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DroppedItem {
    pub uuid: String,
    pub location: Location,
    #[serde(rename = "_", default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub which: Option<i64>,
}

impl DroppedItem {
    pub fn is_hammer(&self) -> bool {
        self.class_name
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case("hammer"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameObjectState {
    #[serde(default)]
    pub uuid: Option<String>,
    pub location: Location,
    #[serde(default)]
    pub charges: Option<i64>,
    #[serde(default)]
    pub which: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameObjects {
    pub trap: Option<GameObjectState>,
    pub west_trap: Option<GameObjectState>,
    pub cannon: Option<GameObjectState>,
    pub west_cannon: Option<GameObjectState>,
    pub hopper: Option<GameObjectState>,
    pub west_hopper: Option<GameObjectState>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub uuid: Option<String>,
    pub location: Option<Location>,
    #[serde(deserialize_with = "null_as_default")]
    pub inventory: Vec<String>,
    pub correct_call: Option<i64>,
    pub required_call: Option<i64>,
    pub received_call: Option<i64>,
    pub sent_call: Option<i64>,
    #[serde(rename = "CALL_COUNT")]
    pub call_count: Option<u32>,
    pub is_stalling: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Wave {
    pub number: Option<i64>,
    pub relative_tick: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub game_objects: GameObjects,
    #[serde(deserialize_with = "null_as_default")]
    pub dropped_food: Vec<DroppedItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub dropped_eggs: Vec<DroppedItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub dropped_hnls: Vec<DroppedItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub dispensers: BTreeMap<String, GameObjectState>,
    #[serde(deserialize_with = "null_as_default")]
    pub penance: BTreeMap<String, Vec<PenanceState>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub tick: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub text: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub players: BTreeMap<String, PlayerState>,
    #[serde(deserialize_with = "terrain_rows")]
    pub original_map: Vec<Vec<char>>,
    #[serde(deserialize_with = "null_as_default")]
    pub wave: Wave,
}

impl Snapshot {
    pub fn is_started(&self) -> bool {
        self.tick.is_some()
    }

    pub fn grid_size(&self) -> (i32, i32) {
        if self.original_map.is_empty() {
            return (MAP_WIDTH_TILES, MAP_HEIGHT_TILES);
        }
        let cols = self
            .original_map
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or_default();
        (
            i32::try_from(cols).unwrap_or(i32::MAX),
            i32::try_from(self.original_map.len()).unwrap_or(i32::MAX),
        )
    }

    pub fn terrain_at(&self, tile: TileCoord) -> Option<char> {
        if tile.col < 0 || tile.row < 0 {
            return None;
        }
        self.original_map
            .get(tile.row as usize)?
            .get(tile.col as usize)
            .copied()
    }

    pub fn player(&self, role: Role) -> Option<&PlayerState> {
        let mut buf = [0; 4];
        self.players.get(&*role.letter().encode_utf8(&mut buf))
    }

    pub fn penance(&self, species: Species) -> &[PenanceState] {
        self.wave
            .penance
            .get(species.key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn dropped(&self, kind: ItemKind) -> &[DroppedItem] {
        match kind {
            ItemKind::Eggs => &self.wave.dropped_eggs,
            ItemKind::Food => &self.wave.dropped_food,
            ItemKind::HammerLogs => &self.wave.dropped_hnls,
        }
    }

    pub fn trap_for_symbol(&self, symbol: char) -> Option<&GameObjectState> {
        match symbol {
            EAST_TRAP_SYMBOL => self.wave.game_objects.trap.as_ref(),
            WEST_TRAP_SYMBOL => self.wave.game_objects.west_trap.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerMessage {
    pub game: Option<Snapshot>,
    pub error: Option<serde_json::Value>,
}

pub fn decode_server_message(raw: &str) -> Result<ServerMessage, SnapshotError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ServerMessage>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            SnapshotError::Decode { source }
        } else {
            SnapshotError::DecodeAt { path, source }
        }
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn terrain_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<char>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(rows
        .unwrap_or_default()
        .iter()
        .map(|row| row.chars().collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_game_decodes_as_not_started() {
        let message = decode_server_message("{}").expect("decode");
        assert!(message.game.is_none());

        let message = decode_server_message(r#"{"game": {"tick": null}}"#).expect("decode");
        let snapshot = message.game.expect("game");
        assert!(!snapshot.is_started());
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.grid_size(), (MAP_WIDTH_TILES, MAP_HEIGHT_TILES));
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let raw = json!({
            "game": {
                "tick": 3,
                "text": null,
                "players": {"d": {"inventory": null, "location": [1, 2]}},
                "original_map": null,
                "wave": {"dropped_food": null, "penance": null, "game_objects": null}
            }
        })
        .to_string();
        let snapshot = decode_server_message(&raw)
            .expect("decode")
            .game
            .expect("game");
        let defender = snapshot.player(Role::Defender).expect("defender");
        assert!(defender.inventory.is_empty());
        assert_eq!(defender.location, Some(Location { col: 1, row: 2 }));
        assert!(snapshot.dropped(ItemKind::Food).is_empty());
        assert!(snapshot.penance(Species::Runner).is_empty());
    }

    #[test]
    fn decode_error_reports_json_path() {
        let raw = r#"{"game": {"wave": {"dropped_food": [{"uuid": "f", "location": "oops"}]}}}"#;
        let err = decode_server_message(raw).expect_err("bad location");
        let text = err.to_string();
        assert!(text.contains("game.wave.dropped_food[0].location"), "{text}");
    }

    #[test]
    fn terrain_is_indexed_by_row_then_column() {
        let raw = json!({"game": {"tick": 0, "original_map": ["ab", "cT"]}}).to_string();
        let snapshot = decode_server_message(&raw)
            .expect("decode")
            .game
            .expect("game");
        assert_eq!(snapshot.grid_size(), (2, 2));
        assert_eq!(snapshot.terrain_at(TileCoord { col: 1, row: 0 }), Some('b'));
        assert_eq!(snapshot.terrain_at(TileCoord { col: 1, row: 1 }), Some('T'));
        assert_eq!(snapshot.terrain_at(TileCoord { col: 2, row: 0 }), None);
        assert_eq!(snapshot.terrain_at(TileCoord { col: -1, row: 0 }), None);
    }

    #[test]
    fn seat_parses_role_letters_and_spectator() {
        assert_eq!(Seat::parse("d"), Ok(Seat::Player(Role::Defender)));
        assert_eq!(Seat::parse("s"), Ok(Seat::Player(Role::SecondAttacker)));
        assert_eq!(Seat::parse("_"), Ok(Seat::Spectator));
        assert!(Seat::parse("x").is_err());
        assert!(Seat::parse("dh").is_err());
        assert!(Seat::parse("").is_err());
    }

    #[test]
    fn trap_symbols_select_east_and_west_traps() {
        let raw = json!({"game": {"wave": {"game_objects": {
            "trap": {"location": [1, 1], "charges": 2, "which": 0},
            "west_trap": {"location": [5, 1], "charges": 0, "which": 1}
        }}}})
        .to_string();
        let snapshot = decode_server_message(&raw)
            .expect("decode")
            .game
            .expect("game");
        assert_eq!(snapshot.trap_for_symbol('T').and_then(|t| t.which), Some(0));
        assert_eq!(snapshot.trap_for_symbol('t').and_then(|t| t.which), Some(1));
        assert!(snapshot.trap_for_symbol('w').is_none());
    }
}

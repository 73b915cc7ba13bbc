use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Default board capacity (4x4 drop-token grid). A drawn game must fill it.
pub const DEFAULT_BOARD_CELLS: u32 = 16;

/// Sentinel used for winner/loser ids on drawn games.
pub const NO_PLAYER: i64 = -1;

/// One batch of records returned by a single fetch, tagged with the page
/// index used to request it. Records are kept as raw JSON; the ingestion
/// layer never looks inside them.
#[derive(Debug)]
pub struct Page {
    pub index: u32,
    pub records: Vec<Box<RawValue>>,
}

impl Page {
    pub fn new(index: u32, records: Vec<Box<RawValue>>) -> Self {
        Self { index, records }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Terminal outcome carried by the last move of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Draw,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Win => "win",
            GameResult::Draw => "draw",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "win" => Some(GameResult::Win),
            "draw" => Some(GameResult::Draw),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single move as recorded in the games dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub game_id: String,
    pub player_id: i64,
    pub move_number: u32,
    pub column: i64,
    pub result: Option<GameResult>,
}

impl MoveRecord {
    pub fn new(
        game_id: impl Into<String>,
        player_id: i64,
        move_number: u32,
        column: i64,
        result: Option<GameResult>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            player_id,
            move_number,
            column,
            result,
        }
    }
}

/// Derived per-game outcome row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFact {
    pub game_id: String,
    pub player_1: i64,
    pub player_2: i64,
    pub moves: Vec<i64>,
    pub game_result: GameResult,
    pub number_of_moves: u32,
    pub first_move_column: i64,
    /// 1 or 2, inferred from move-count parity
    pub last_mover: u8,
    pub player_id_win: i64,
    pub player_id_lose: i64,
    pub is_draw: bool,
}

impl GameFact {
    /// A draw flagged by the source that did not fill the board.
    /// These rows are kept (with `is_draw = false`) for downstream review.
    pub fn is_inconsistent_draw(&self) -> bool {
        self.game_result == GameResult::Draw && !self.is_draw
    }

    pub fn involves(&self, player_id: i64) -> bool {
        self.player_1 == player_id || self.player_2 == player_id
    }
}

/// Player attributes kept for analysis (id, nationality, email)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDim {
    pub player_id: i64,
    pub nationality: Option<String>,
    pub email: Option<String>,
}

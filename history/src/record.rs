use chess::{Position, PositionError};
use serde::{Deserialize, Serialize};

/// Id of the start record of every game.
pub const START_RECORD_ID: u32 = 1;

/// One snapshot of the game: the position after the ply named by `move_san`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub id: u32,
    pub position: Position,
    /// SAN of the move that produced this position; empty for the start record.
    pub move_san: String,
}

impl GameRecord {
    pub fn new(id: u32, position: Position, move_san: impl Into<String>) -> Self {
        Self {
            id,
            position,
            move_san: move_san.into(),
        }
    }

    /// Start record: the standard initial position with zero clocks.
    pub fn start() -> Self {
        Self::new(START_RECORD_ID, Position::standard(), "")
    }

    pub fn to_stored(&self) -> StoredGameRecord {
        StoredGameRecord {
            id: self.id,
            board_square_str: self.position.board_string(),
            game_state_str: self.position.state_string(),
            move_san_str: self.move_san.clone(),
        }
    }
}

/// Persisted form of a record, as kept in storage and archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGameRecord {
    pub id: u32,
    pub board_square_str: String,
    pub game_state_str: String,
    #[serde(default)]
    pub move_san_str: String,
}

impl TryFrom<StoredGameRecord> for GameRecord {
    type Error = PositionError;

    fn try_from(stored: StoredGameRecord) -> Result<Self, Self::Error> {
        let position = Position::decode(&stored.board_square_str, &stored.game_state_str)?;
        Ok(Self {
            id: stored.id,
            position,
            move_san: stored.move_san_str,
        })
    }
}

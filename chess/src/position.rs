//! Position snapshots: a 64-square spin array plus the game state fields.
//!
//! Snapshots are plain values. They round-trip through two strings, the
//! board square string (FEN piece placement) and the game state string
//! (eight `|`-separated integers), which is the form persisted by the
//! game history.

use crate::converters::{index_from_file_rank, SQUARE_COUNT};
use crate::types::{piece_from_spin, PieceColor, PieceKind, Spin};

/// Spin of every square, indexed a8 = 0 .. h1 = 63.
pub type BoardArray = [Spin; SQUARE_COUNT];

/// Number of integers in a serialized game state.
pub const STATE_FIELD_COUNT: usize = 8;

/// Standard starting placement.
pub const START_PLACEMENT: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

/// Game status carried in the state. Everything except `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameStatus {
    #[default]
    Ready,
    Checkmate,
    Stalemate,
    Resigned,
    TimeExpired,
}

impl GameStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Ready => 0,
            Self::Checkmate => 1,
            Self::Stalemate => 2,
            Self::Resigned => 3,
            Self::TimeExpired => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ready),
            1 => Some(Self::Checkmate),
            2 => Some(Self::Stalemate),
            3 => Some(Self::Resigned),
            4 => Some(Self::TimeExpired),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Ready
    }
}

/// Which rook a castling right refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    KingSide,
    QueenSide,
}

/// 4-bit castling availability mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_QUEEN_SIDE: u8 = 0b0001;
    pub const WHITE_KING_SIDE: u8 = 0b0010;
    pub const BLACK_QUEEN_SIDE: u8 = 0b0100;
    pub const BLACK_KING_SIDE: u8 = 0b1000;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits > 0b1111 {
            return None;
        }
        Some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    fn bit(color: PieceColor, side: CastleSide) -> u8 {
        match (color, side) {
            (PieceColor::White, CastleSide::KingSide) => Self::WHITE_KING_SIDE,
            (PieceColor::White, CastleSide::QueenSide) => Self::WHITE_QUEEN_SIDE,
            (PieceColor::Black, CastleSide::KingSide) => Self::BLACK_KING_SIDE,
            (PieceColor::Black, CastleSide::QueenSide) => Self::BLACK_QUEEN_SIDE,
        }
    }

    pub fn has(self, color: PieceColor, side: CastleSide) -> bool {
        self.0 & Self::bit(color, side) != 0
    }

    pub fn set(&mut self, color: PieceColor, side: CastleSide, available: bool) {
        if available {
            self.0 |= Self::bit(color, side);
        } else {
            self.0 &= !Self::bit(color, side);
        }
    }

    /// FEN castling field (`KQkq`, `-` when empty).
    pub fn to_fen(self) -> String {
        let mut s = String::new();
        if self.has(PieceColor::White, CastleSide::KingSide) {
            s.push('K');
        }
        if self.has(PieceColor::White, CastleSide::QueenSide) {
            s.push('Q');
        }
        if self.has(PieceColor::Black, CastleSide::KingSide) {
            s.push('k');
        }
        if self.has(PieceColor::Black, CastleSide::QueenSide) {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }
}

/// Side to move, castling, clocks and status of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState {
    pub active_color: PieceColor,
    pub castling: CastlingRights,
    /// Index of the pawn that may be captured en passant.
    pub en_passant_index: Option<usize>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub status: GameStatus,
    /// Elapsed milliseconds on white's clock when the snapshot was taken.
    pub white_clock_offset: i32,
    /// Elapsed milliseconds on black's clock when the snapshot was taken.
    pub black_clock_offset: i32,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            active_color: PieceColor::White,
            castling: CastlingRights::ALL,
            en_passant_index: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            status: GameStatus::Ready,
            white_clock_offset: 0,
            black_clock_offset: 0,
        }
    }
}

impl GameState {
    pub fn to_array(&self) -> [i32; STATE_FIELD_COUNT] {
        [
            i32::from(self.active_color.sign()),
            i32::from(self.castling.bits()),
            self.en_passant_index.map_or(-1, |i| i as i32),
            self.halfmove_clock as i32,
            self.fullmove_number as i32,
            self.status.code(),
            self.white_clock_offset,
            self.black_clock_offset,
        ]
    }

    pub fn from_array(values: &[i32; STATE_FIELD_COUNT]) -> Result<Self, PositionError> {
        let active_color = PieceColor::from_sign(values[0])
            .ok_or(PositionError::InvalidStateField("active colour", values[0]))?;
        let castling = u8::try_from(values[1])
            .ok()
            .and_then(CastlingRights::from_bits)
            .ok_or(PositionError::InvalidStateField("castling", values[1]))?;
        let en_passant_index = match values[2] {
            -1 => None,
            i @ 0..=63 => Some(i as usize),
            other => return Err(PositionError::InvalidStateField("en passant", other)),
        };
        let halfmove_clock = u32::try_from(values[3])
            .map_err(|_| PositionError::InvalidStateField("half-move clock", values[3]))?;
        let fullmove_number = u32::try_from(values[4])
            .map_err(|_| PositionError::InvalidStateField("full-move number", values[4]))?;
        let status = GameStatus::from_code(values[5])
            .ok_or(PositionError::InvalidStateField("game status", values[5]))?;

        Ok(Self {
            active_color,
            castling,
            en_passant_index,
            halfmove_clock,
            fullmove_number,
            status,
            white_clock_offset: values[6],
            black_clock_offset: values[7],
        })
    }

    /// Serialize as the persisted game state string.
    pub fn encode(&self) -> String {
        self.to_array()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Parse a persisted game state string.
    pub fn decode(s: &str) -> Result<Self, PositionError> {
        let parts: Vec<&str> = s.trim().split('|').collect();
        if parts.len() != STATE_FIELD_COUNT {
            return Err(PositionError::InvalidState(s.to_string()));
        }
        let mut values = [0i32; STATE_FIELD_COUNT];
        for (slot, part) in values.iter_mut().zip(parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| PositionError::InvalidState(s.to_string()))?;
        }
        Self::from_array(&values)
    }
}

/// A board snapshot: square spins plus state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub board: BoardArray,
    pub state: GameState,
}

impl Default for Position {
    fn default() -> Self {
        Self::standard()
    }
}

impl Position {
    /// The standard initial position, white to move, zero clocks.
    pub fn standard() -> Self {
        let mut board = [0; SQUARE_COUNT];
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in back_rank.into_iter().enumerate() {
            let file = file as u8;
            board[index_from_file_rank(file, 0)] = kind.spin(PieceColor::White);
            board[index_from_file_rank(file, 1)] = PieceKind::Pawn.spin(PieceColor::White);
            board[index_from_file_rank(file, 6)] = PieceKind::Pawn.spin(PieceColor::Black);
            board[index_from_file_rank(file, 7)] = kind.spin(PieceColor::Black);
        }
        Self {
            board,
            state: GameState::default(),
        }
    }

    pub fn spin(&self, index: usize) -> Spin {
        self.board.get(index).copied().unwrap_or(0)
    }

    /// Index of the given color's king, if one is on the board.
    pub fn king_index(&self, color: PieceColor) -> Option<usize> {
        let king = PieceKind::King.spin(color);
        self.board.iter().position(|&s| s == king)
    }

    /// Serialize the squares as the persisted board square string.
    pub fn board_string(&self) -> String {
        encode_placement(&self.board)
    }

    pub fn state_string(&self) -> String {
        self.state.encode()
    }

    /// Rebuild a snapshot from its two persisted strings.
    pub fn decode(board_str: &str, state_str: &str) -> Result<Self, PositionError> {
        Ok(Self {
            board: decode_placement(board_str)?,
            state: GameState::decode(state_str)?,
        })
    }
}

/// FEN piece placement for a board array.
pub fn encode_placement(board: &BoardArray) -> String {
    let mut out = String::with_capacity(72);
    for row in 0..8 {
        let mut empty = 0;
        for col in 0..8 {
            match piece_from_spin(board[row * 8 + col]) {
                Some((kind, color)) => {
                    if empty > 0 {
                        out.push_str(&empty.to_string());
                        empty = 0;
                    }
                    out.push(match color {
                        PieceColor::White => kind.to_char_upper(),
                        PieceColor::Black => kind.to_char_lower(),
                    });
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push_str(&empty.to_string());
        }
        if row < 7 {
            out.push('/');
        }
    }
    out
}

/// Parse a FEN piece placement into a board array.
pub fn decode_placement(placement: &str) -> Result<BoardArray, PositionError> {
    let placement = placement
        .split_whitespace()
        .next()
        .ok_or_else(|| PositionError::InvalidPlacement(placement.to_string()))?;

    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(PositionError::InvalidPlacement(placement.to_string()));
    }

    let mut board = [0; SQUARE_COUNT];
    for (row, rank_str) in ranks.iter().enumerate() {
        let mut col = 0usize;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                col += skip as usize;
            } else {
                if col > 7 {
                    return Err(PositionError::InvalidPlacement(placement.to_string()));
                }
                let kind = PieceKind::from_char(c).ok_or(PositionError::InvalidPiece(c))?;
                let color = if c.is_ascii_uppercase() {
                    PieceColor::White
                } else {
                    PieceColor::Black
                };
                board[row * 8 + col] = kind.spin(color);
                col += 1;
            }
        }
        if col != 8 {
            return Err(PositionError::InvalidPlacement(placement.to_string()));
        }
    }

    Ok(board)
}

/// Bit mask of squares whose spin differs between two snapshots.
///
/// Square 0 maps to the most significant bit. A missing snapshot on either
/// side yields an empty mask.
pub fn board_square_changes(a: Option<&Position>, b: Option<&Position>) -> u64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0;
    };

    let mut mask: u64 = 1 << 63;
    let mut changed = 0u64;
    for index in 0..SQUARE_COUNT {
        if a.board[index] != b.board[index] {
            changed |= mask;
        }
        mask >>= 1;
    }
    changed
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("Invalid board placement: {0}")]
    InvalidPlacement(String),
    #[error("Invalid piece character: {0}")]
    InvalidPiece(char),
    #[error("Invalid game state: {0}")]
    InvalidState(String),
    #[error("Invalid {0} value in game state: {1}")]
    InvalidStateField(&'static str, i32),
}

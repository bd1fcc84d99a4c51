//! The board engine boundary and its cozy-chess implementation.
//!
//! The SAN resolver and the PGN replay only talk to [`BoardEngine`]; rules,
//! move generation and legality live behind it.

use cozy_chess::{Board, Color, GameStatus as CozyStatus, Move, Piece, Rank};

use crate::converters::{format_index, index_from_file_rank, index_to_square, square_to_index};
use crate::fen::{parse_fen, position_to_fen};
use crate::position::{BoardArray, CastlingRights, GameState, GameStatus, Position};
use crate::types::{PieceColor, PieceKind, Spin};
use crate::uci::{convert_castling_to_cozy, format_uci_move};

/// Result of looking up the origin square for a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Found(usize),
    /// No piece of the requested spin can legally reach the destination.
    NotFound,
    /// More than one piece can.
    Ambiguous,
}

impl Origin {
    /// Legacy integer form: the index, `-1` for none, `-2` for ambiguous.
    pub fn as_code(self) -> i32 {
        match self {
            Self::Found(index) => index as i32,
            Self::NotFound => -1,
            Self::Ambiguous => -2,
        }
    }
}

/// A mutable chess position that can validate and play moves.
pub trait BoardEngine {
    /// Return to the standard initial position with ready status and zero clocks.
    fn reset(&mut self);

    /// Snapshot of the squares and state.
    fn position(&self) -> Position;

    /// Replace the whole position with a snapshot.
    fn set_position(&mut self, position: &Position) -> Result<(), EngineError>;

    fn active_color(&self) -> PieceColor;

    fn set_active_color(&mut self, color: PieceColor) -> Result<(), EngineError>;

    fn castling_availability(&self) -> CastlingRights;

    fn king_index(&self, color: PieceColor) -> Option<usize>;

    fn spin(&self, index: usize) -> Spin;

    fn status(&self) -> GameStatus;

    /// Stamp the elapsed clock times carried by the state.
    fn set_clock_offsets(&mut self, white_ms: i32, black_ms: i32);

    /// Find the single square holding `spin` that can legally move to `to`.
    /// A non-empty `valid_from` restricts the candidates to those squares.
    fn find_from_index(&self, to: usize, spin: Spin, valid_from: &[usize]) -> Origin;

    /// Validate a move and, when `commit` is set, play it.
    ///
    /// A king moving two files along its back rank is a castle. `promotion`
    /// only applies to pawns reaching the last rank.
    fn make_move(
        &mut self,
        from: usize,
        to: usize,
        promotion: PieceKind,
        commit: bool,
    ) -> Result<(), EngineError>;

    fn board_array(&self) -> BoardArray {
        self.position().board
    }

    fn state(&self) -> GameState {
        self.position().state
    }
}

/// [`BoardEngine`] backed by a cozy-chess board. cozy-chess has no notion of
/// game status or clocks, so those are tracked alongside.
#[derive(Debug, Clone)]
pub struct CozyBoard {
    board: Board,
    status: GameStatus,
    white_clock_offset: i32,
    black_clock_offset: i32,
}

impl Default for CozyBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl CozyBoard {
    pub fn new() -> Self {
        Self {
            board: Board::default(),
            status: GameStatus::Ready,
            white_clock_offset: 0,
            black_clock_offset: 0,
        }
    }

    pub fn from_position(position: &Position) -> Result<Self, EngineError> {
        let mut engine = Self::new();
        engine.set_position(position)?;
        Ok(engine)
    }

    /// The underlying cozy-chess board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Whether a legal cozy-chess move is a castle (king onto its own rook).
    fn is_castle(&self, mv: Move) -> bool {
        self.board.piece_on(mv.from) == Some(Piece::King)
            && self.board.piece_on(mv.to) == Some(Piece::Rook)
            && self.board.color_on(mv.to) == self.board.color_on(mv.from)
    }

    fn derive_status(&self) -> GameStatus {
        let bare_kings = self.board.occupied().len() == 2;
        match self.board.status() {
            CozyStatus::Won => GameStatus::Checkmate,
            CozyStatus::Drawn if self.legal_moves().is_empty() => GameStatus::Stalemate,
            _ if bare_kings => GameStatus::Stalemate,
            _ => GameStatus::Ready,
        }
    }

    fn castling_from_board(&self) -> CastlingRights {
        let mut bits = 0;
        let white = self.board.castle_rights(Color::White);
        let black = self.board.castle_rights(Color::Black);
        if white.short.is_some() {
            bits |= CastlingRights::WHITE_KING_SIDE;
        }
        if white.long.is_some() {
            bits |= CastlingRights::WHITE_QUEEN_SIDE;
        }
        if black.short.is_some() {
            bits |= CastlingRights::BLACK_KING_SIDE;
        }
        if black.long.is_some() {
            bits |= CastlingRights::BLACK_QUEEN_SIDE;
        }
        CastlingRights::from_bits(bits).unwrap_or_default()
    }

    fn en_passant_index(&self) -> Option<usize> {
        let file = self.board.en_passant()? as u8;
        // The capturable pawn stands on the fifth rank from the mover's view.
        Some(match self.board.side_to_move() {
            Color::White => index_from_file_rank(file, 4),
            Color::Black => index_from_file_rank(file, 3),
        })
    }
}

/// Drop castling bits whose king or rook is not on its home square, and
/// clamp counters into the range FEN parsers accept.
fn sanitize(position: &Position) -> Position {
    let mut sanitized = position.clone();
    let rights = &mut sanitized.state.castling;
    let homes = [
        (CastlingRights::WHITE_KING_SIDE, 60, 63, PieceColor::White),
        (CastlingRights::WHITE_QUEEN_SIDE, 60, 56, PieceColor::White),
        (CastlingRights::BLACK_KING_SIDE, 4, 7, PieceColor::Black),
        (CastlingRights::BLACK_QUEEN_SIDE, 4, 0, PieceColor::Black),
    ];
    let mut bits = rights.bits();
    for (bit, king, rook, color) in homes {
        let in_place = position.spin(king) == PieceKind::King.spin(color)
            && position.spin(rook) == PieceKind::Rook.spin(color);
        if !in_place {
            bits &= !bit;
        }
    }
    *rights = CastlingRights::from_bits(bits).unwrap_or_default();
    sanitized.state.halfmove_clock = sanitized.state.halfmove_clock.min(100);
    sanitized.state.fullmove_number = sanitized.state.fullmove_number.clamp(1, u16::MAX as u32);
    sanitized
}

impl BoardEngine for CozyBoard {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn position(&self) -> Position {
        let mut board = [0; 64];
        for (index, slot) in board.iter_mut().enumerate() {
            *slot = self.spin(index);
        }
        Position {
            board,
            state: GameState {
                active_color: self.board.side_to_move().into(),
                castling: self.castling_from_board(),
                en_passant_index: self.en_passant_index(),
                halfmove_clock: u32::from(self.board.halfmove_clock()),
                fullmove_number: u32::from(self.board.fullmove_number()),
                status: self.status,
                white_clock_offset: self.white_clock_offset,
                black_clock_offset: self.black_clock_offset,
            },
        }
    }

    fn set_position(&mut self, position: &Position) -> Result<(), EngineError> {
        let fen = position_to_fen(&sanitize(position));
        let board = parse_fen(&fen).map_err(|_| EngineError::InvalidPosition(fen))?;
        self.board = board;
        self.status = position.state.status;
        self.white_clock_offset = position.state.white_clock_offset;
        self.black_clock_offset = position.state.black_clock_offset;
        Ok(())
    }

    fn active_color(&self) -> PieceColor {
        self.board.side_to_move().into()
    }

    fn set_active_color(&mut self, color: PieceColor) -> Result<(), EngineError> {
        if self.active_color() == color {
            return Ok(());
        }
        let mut position = self.position();
        position.state.active_color = color;
        position.state.en_passant_index = None;
        self.set_position(&position)
    }

    fn castling_availability(&self) -> CastlingRights {
        self.castling_from_board()
    }

    fn king_index(&self, color: PieceColor) -> Option<usize> {
        let kings = self.board.colored_pieces(color.into(), Piece::King);
        kings.into_iter().next().map(square_to_index)
    }

    fn spin(&self, index: usize) -> Spin {
        let Some(sq) = index_to_square(index) else {
            return 0;
        };
        match (self.board.piece_on(sq), self.board.color_on(sq)) {
            (Some(piece), Some(color)) => PieceKind::from(piece).spin(color.into()),
            _ => 0,
        }
    }

    fn status(&self) -> GameStatus {
        self.status
    }

    fn set_clock_offsets(&mut self, white_ms: i32, black_ms: i32) {
        self.white_clock_offset = white_ms;
        self.black_clock_offset = black_ms;
    }

    fn find_from_index(&self, to: usize, spin: Spin, valid_from: &[usize]) -> Origin {
        let Some(to_sq) = index_to_square(to) else {
            return Origin::NotFound;
        };
        let Some((kind, color)) = crate::types::piece_from_spin(spin) else {
            return Origin::NotFound;
        };
        if color != self.active_color() {
            return Origin::NotFound;
        }
        let piece = Piece::from(kind);

        let mut candidates: Vec<usize> = Vec::new();
        self.board.generate_moves(|mvs| {
            if mvs.piece == piece {
                for mv in mvs {
                    if mv.to != to_sq || self.is_castle(mv) {
                        continue;
                    }
                    let from = square_to_index(mv.from);
                    if !candidates.contains(&from) {
                        candidates.push(from);
                    }
                }
            }
            false
        });

        if !valid_from.is_empty() {
            candidates.retain(|from| valid_from.contains(from));
        }

        match candidates.as_slice() {
            [] => Origin::NotFound,
            [from] => Origin::Found(*from),
            _ => Origin::Ambiguous,
        }
    }

    fn make_move(
        &mut self,
        from: usize,
        to: usize,
        promotion: PieceKind,
        commit: bool,
    ) -> Result<(), EngineError> {
        if self.status.is_terminal() {
            return Err(EngineError::GameOver(self.status));
        }
        let from_sq = index_to_square(from).ok_or(EngineError::InvalidSquare(from))?;
        let to_sq = index_to_square(to).ok_or(EngineError::InvalidSquare(to))?;

        let piece = self
            .board
            .piece_on(from_sq)
            .ok_or_else(|| EngineError::EmptySquare(format_index(from)))?;
        if self.board.color_on(from_sq) != Some(self.board.side_to_move()) {
            return Err(EngineError::IllegalMove(format!(
                "piece on {} does not belong to the side to move",
                format_index(from)
            )));
        }

        let last_rank = match self.board.side_to_move() {
            Color::White => Rank::Eighth,
            Color::Black => Rank::First,
        };
        let promotion = (piece == Piece::Pawn && to_sq.rank() == last_rank)
            .then(|| Piece::from(promotion));

        let legal = self.legal_moves();
        let mv = convert_castling_to_cozy(
            Move {
                from: from_sq,
                to: to_sq,
                promotion,
            },
            piece == Piece::King,
            &legal,
        );

        if !legal.contains(&mv) {
            return Err(EngineError::IllegalMove(format!(
                "{} is not a legal move",
                format_uci_move(Move {
                    from: from_sq,
                    to: to_sq,
                    promotion,
                })
            )));
        }

        if commit {
            self.board.play_unchecked(mv);
            self.status = self.derive_status();
            tracing::trace!(mv = %format_uci_move(mv), status = ?self.status, "Move played");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Square index out of range: {0}")]
    InvalidSquare(usize),
    #[error("No piece on {0}")]
    EmptySquare(String),
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Game is already over ({0:?})")]
    GameOver(GameStatus),
    #[error("Position cannot be loaded: {0}")]
    InvalidPosition(String),
}

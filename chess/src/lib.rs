pub mod board;
pub mod converters;
pub mod fen;
pub mod pgn;
pub mod position;
pub mod types;
pub mod uci;

pub use board::{BoardEngine, CozyBoard, EngineError, Origin};
pub use converters::*;
pub use position::{
    board_square_changes, BoardArray, CastleSide, CastlingRights, GameState, GameStatus, Position,
    PositionError,
};
pub use types::{PieceColor, PieceKind, Spin};
pub use uci::{convert_castling_to_cozy, format_uci_move};

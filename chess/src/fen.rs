use cozy_chess::Board;

use crate::converters::{format_index, parse_index};
use crate::position::{decode_placement, encode_placement, CastlingRights, GameState, Position};
use crate::types::{PieceColor, PieceKind};

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    if fen.split_whitespace().next().is_none() {
        return Err(FenError::InvalidFormat);
    }
    Board::from_fen(fen, false).map_err(|_| FenError::InvalidFormat)
}

/// Format a snapshot as a full FEN string. Clock offsets and status are not
/// part of FEN and are dropped.
pub fn position_to_fen(position: &Position) -> String {
    let state = &position.state;
    let side = match state.active_color {
        PieceColor::White => "w",
        PieceColor::Black => "b",
    };
    let en_passant = state
        .en_passant_index
        .and_then(|pawn| en_passant_target(position, pawn))
        .map(format_index)
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{} {} {} {} {} {}",
        encode_placement(&position.board),
        side,
        state.castling.to_fen(),
        en_passant,
        state.halfmove_clock,
        state.fullmove_number.max(1)
    )
}

/// Parse a full FEN string into a snapshot with a ready status and zero
/// clocks. The half-move and full-move fields may be omitted.
pub fn position_from_fen(fen: &str) -> Result<Position, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() < 4 || parts.len() > 6 {
        return Err(FenError::InvalidFormat);
    }

    let board = decode_placement(parts[0]).map_err(|_| FenError::InvalidBoardLayout)?;

    let active_color = match parts[1] {
        "w" => PieceColor::White,
        "b" => PieceColor::Black,
        _ => return Err(FenError::InvalidFormat),
    };

    let mut castling = CastlingRights::NONE;
    if parts[2] != "-" {
        let mut bits = 0u8;
        for c in parts[2].chars() {
            bits |= match c {
                'K' => CastlingRights::WHITE_KING_SIDE,
                'Q' => CastlingRights::WHITE_QUEEN_SIDE,
                'k' => CastlingRights::BLACK_KING_SIDE,
                'q' => CastlingRights::BLACK_QUEEN_SIDE,
                _ => return Err(FenError::InvalidFormat),
            };
        }
        castling = CastlingRights::from_bits(bits).ok_or(FenError::InvalidFormat)?;
    }

    // FEN names the square behind the pawn; the state stores the pawn itself.
    let en_passant_index = match parts[3] {
        "-" => None,
        target => {
            let target = parse_index(target).ok_or(FenError::InvalidFormat)?;
            match active_color {
                PieceColor::White => target.checked_add(8),
                PieceColor::Black => target.checked_sub(8),
            }
        }
    };

    let halfmove_clock = match parts.get(4) {
        Some(v) => v.parse().map_err(|_| FenError::InvalidFormat)?,
        None => 0,
    };
    let fullmove_number = match parts.get(5) {
        Some(v) => v.parse().map_err(|_| FenError::InvalidFormat)?,
        None => 1,
    };

    Ok(Position {
        board,
        state: GameState {
            active_color,
            castling,
            en_passant_index,
            halfmove_clock,
            fullmove_number,
            ..GameState::default()
        },
    })
}

fn en_passant_target(position: &Position, pawn: usize) -> Option<usize> {
    let spin = position.spin(pawn);
    if spin == PieceKind::Pawn.spin(PieceColor::White) {
        Some(pawn + 8)
    } else if spin == PieceKind::Pawn.spin(PieceColor::Black) {
        pawn.checked_sub(8)
    } else {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout")]
    InvalidBoardLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_standard_position_to_fen() {
        assert_eq!(position_to_fen(&Position::standard()), START_FEN);
    }

    #[test]
    fn test_fen_roundtrip_with_en_passant() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";
        let pos = position_from_fen(fen).unwrap();
        // The black pawn on e5 is the capturable one.
        assert_eq!(pos.state.en_passant_index, parse_index("e5"));
        assert_eq!(position_to_fen(&pos), fen);
    }

    #[test]
    fn test_fen_without_counters() {
        let pos = position_from_fen("8/8/8/8/8/8/8/K6k b - -").unwrap();
        assert_eq!(pos.state.active_color, PieceColor::Black);
        assert_eq!(pos.state.castling, CastlingRights::NONE);
        assert_eq!(pos.state.fullmove_number, 1);
    }

    #[test]
    fn test_invalid_fen() {
        assert!(position_from_fen("").is_err());
        assert!(position_from_fen("8/8/8 w - -").is_err());
        assert!(position_from_fen(&START_FEN.replace(" w ", " x ")).is_err());
        assert!(parse_fen("").is_err());
    }

    #[test]
    fn test_parse_fen_matches_cozy() {
        let board = parse_fen(START_FEN).unwrap();
        assert_eq!(board, Board::default());
    }
}

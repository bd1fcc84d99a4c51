//! Move notation helpers shared by the board engine.

use cozy_chess::{File, Move, Rank};

use crate::converters::{format_piece, format_square};

/// Convert a king two-file move into cozy_chess castling notation.
///
/// Callers name a castle by the king's destination (e1g1, e1c1, e8g8, e8c8);
/// cozy_chess encodes it as the king capturing its own rook (e1h1, e1a1, ...).
/// Returns the legal cozy_chess castle when `mv` is such a king move and the
/// matching castle is available, otherwise `mv` unchanged.
pub fn convert_castling_to_cozy(mv: Move, king: bool, legal_moves: &[Move]) -> Move {
    let on_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let same_rank = mv.from.rank() == mv.to.rank();
    let file_delta = mv.to.file() as i8 - mv.from.file() as i8;

    if !king || !on_back_rank || !same_rank || file_delta.abs() != 2 || mv.promotion.is_some() {
        return mv;
    }

    // The rook sits somewhere beyond the destination in the direction of travel.
    let king_side = file_delta > 0;
    legal_moves
        .iter()
        .copied()
        .find(|candidate| {
            candidate.from == mv.from
                && candidate.to.rank() == mv.from.rank()
                && (candidate.to.file() as i8 - mv.from.file() as i8).abs() > 1
                && is_castle_rook_file(mv.from.file(), candidate.to.file(), king_side)
                && candidate.promotion.is_none()
        })
        .unwrap_or(mv)
}

fn is_castle_rook_file(king_file: File, rook_file: File, king_side: bool) -> bool {
    if king_side {
        rook_file as u8 > king_file as u8
    } else {
        (rook_file as u8) < king_file as u8
    }
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}

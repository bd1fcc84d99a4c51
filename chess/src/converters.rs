//! Conversions between board indices, algebraic coordinates and cozy-chess
//! squares.
//!
//! Board indices run rank-major from the eighth rank: `0` is a8, `7` is h8,
//! `56` is a1 and `63` is h1. cozy-chess counts from a1, so the two orders
//! differ only by a vertical flip.

use cozy_chess::{File, Piece, Rank, Square};

/// Number of squares on the board.
pub const SQUARE_COUNT: usize = 64;

/// Convert a board index (a8 = 0) into a cozy-chess square.
pub fn index_to_square(index: usize) -> Option<Square> {
    if index >= SQUARE_COUNT {
        return None;
    }
    Some(Square::index(index ^ 56))
}

/// Convert a cozy-chess square into a board index (a8 = 0).
pub fn square_to_index(square: Square) -> usize {
    (square as usize) ^ 56
}

/// Zero-based file of a board index (a = 0).
pub fn index_file(index: usize) -> u8 {
    (index % 8) as u8
}

/// Zero-based rank of a board index (rank 1 = 0).
pub fn index_rank(index: usize) -> u8 {
    7 - (index / 8) as u8
}

/// Board index for a zero-based file and rank.
pub fn index_from_file_rank(file: u8, rank: u8) -> usize {
    (7 - rank as usize) * 8 + file as usize
}

/// All board indices on a file.
pub fn file_indices(file: u8) -> Vec<usize> {
    (0..8).map(|rank| index_from_file_rank(file, rank)).collect()
}

/// All board indices on a rank.
pub fn rank_indices(rank: u8) -> Vec<usize> {
    (0..8).map(|file| index_from_file_rank(file, rank)).collect()
}

pub fn parse_file(c: char) -> Option<File> {
    match c {
        'a'..='h' => Some(File::index(c as usize - 'a' as usize)),
        _ => None,
    }
}

pub fn parse_rank(c: char) -> Option<Rank> {
    match c {
        '1'..='8' => Some(Rank::index(c as usize - '1' as usize)),
        _ => None,
    }
}

pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = parse_file(chars.next()?)?;
    let rank = parse_rank(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some(Square::new(file, rank))
}

/// Parse an algebraic coordinate such as `e4` into a board index.
pub fn parse_index(s: &str) -> Option<usize> {
    parse_square(s).map(square_to_index)
}

pub fn format_square(sq: Square) -> String {
    let file = (b'a' + sq.file() as u8) as char;
    let rank = (b'1' + sq.rank() as u8) as char;
    format!("{}{}", file, rank)
}

/// Format a board index as an algebraic coordinate, `-` when out of range.
pub fn format_index(index: usize) -> String {
    index_to_square(index)
        .map(format_square)
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

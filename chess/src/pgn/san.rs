//! Standard Algebraic Notation: classify a half-move token and resolve it
//! against a board engine.

use std::sync::LazyLock;

use regex::Regex;

use crate::board::{BoardEngine, Origin};
use crate::converters::{file_indices, index_from_file_rank, rank_indices};
use crate::position::CastleSide;
use crate::types::{PieceColor, PieceKind};

static PAWN_PUSH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-h])([1-8])(?:=([QRBN]))?$").unwrap());
static PAWN_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-h])x([a-h])([1-8])(?:=([QRBN]))?$").unwrap());
static PIECE_MOVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([KQRBN])([a-h])?([1-8])?(x)?([a-h])([1-8])$").unwrap());

/// Board index of the king's castling destination.
pub fn castle_destination(color: PieceColor, side: CastleSide) -> usize {
    match (color, side) {
        (PieceColor::White, CastleSide::KingSide) => 62,
        (PieceColor::White, CastleSide::QueenSide) => 58,
        (PieceColor::Black, CastleSide::KingSide) => 6,
        (PieceColor::Black, CastleSide::QueenSide) => 2,
    }
}

/// One SAN token, classified but not yet resolved against a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedToken {
    PawnPush {
        to: usize,
        promotion: PieceKind,
    },
    PawnCapture {
        from_file: u8,
        to: usize,
        promotion: PieceKind,
    },
    PieceMove {
        piece: PieceKind,
        file: Option<u8>,
        rank: Option<u8>,
        capture: bool,
        to: usize,
    },
    CastleKingSide,
    CastleQueenSide,
}

/// A token resolved to concrete squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMove {
    pub from: usize,
    pub to: usize,
    pub promotion: PieceKind,
}

fn file_of(s: &str) -> u8 {
    s.as_bytes()[0] - b'a'
}

fn rank_of(s: &str) -> u8 {
    s.as_bytes()[0] - b'1'
}

fn promotion_of(m: Option<regex::Match<'_>>) -> PieceKind {
    m.and_then(|m| m.as_str().chars().next())
        .and_then(PieceKind::from_san_letter)
        .unwrap_or(PieceKind::Queen)
}

/// Drop check and mate markers, which carry no meaning for resolution.
pub fn strip_check_markers(token: &str) -> &str {
    token.trim().trim_end_matches(['+', '#'])
}

/// Classify a token into one of the five SAN shapes. The first matching
/// shape wins.
pub fn classify(token: &str) -> Result<ParsedToken, SanError> {
    let san = strip_check_markers(token);

    if let Some(caps) = PAWN_PUSH.captures(san) {
        return Ok(ParsedToken::PawnPush {
            to: index_from_file_rank(file_of(&caps[1]), rank_of(&caps[2])),
            promotion: promotion_of(caps.get(3)),
        });
    }

    if let Some(caps) = PAWN_CAPTURE.captures(san) {
        return Ok(ParsedToken::PawnCapture {
            from_file: file_of(&caps[1]),
            to: index_from_file_rank(file_of(&caps[2]), rank_of(&caps[3])),
            promotion: promotion_of(caps.get(4)),
        });
    }

    if let Some(caps) = PIECE_MOVE.captures(san) {
        let piece = caps[1]
            .chars()
            .next()
            .and_then(PieceKind::from_san_letter)
            .ok_or_else(|| SanError::MalformedToken(token.to_string()))?;
        return Ok(ParsedToken::PieceMove {
            piece,
            file: caps.get(2).map(|m| file_of(m.as_str())),
            rank: caps.get(3).map(|m| rank_of(m.as_str())),
            capture: caps.get(4).is_some(),
            to: index_from_file_rank(file_of(&caps[5]), rank_of(&caps[6])),
        });
    }

    match san {
        "O-O" => Ok(ParsedToken::CastleKingSide),
        "O-O-O" => Ok(ParsedToken::CastleQueenSide),
        _ => Err(SanError::MalformedToken(token.to_string())),
    }
}

fn lookup<B: BoardEngine + ?Sized>(
    board: &B,
    token: &str,
    to: usize,
    piece: PieceKind,
    valid_from: &[usize],
) -> Result<usize, SanError> {
    let spin = piece.spin(board.active_color());
    match board.find_from_index(to, spin, valid_from) {
        Origin::Found(from) => Ok(from),
        Origin::NotFound => Err(SanError::NoLegalOrigin(token.to_string())),
        Origin::Ambiguous => Err(SanError::AmbiguousMove(token.to_string())),
    }
}

/// Resolve a classified token to concrete squares without touching the board.
pub fn resolve<B: BoardEngine + ?Sized>(
    board: &B,
    token: &str,
    parsed: ParsedToken,
) -> Result<ResolvedMove, SanError> {
    let resolved = match parsed {
        ParsedToken::PawnPush { to, promotion } => {
            let from_file = crate::converters::index_file(to);
            let from = lookup(board, token, to, PieceKind::Pawn, &file_indices(from_file))?;
            ResolvedMove {
                from,
                to,
                promotion,
            }
        }
        ParsedToken::PawnCapture {
            from_file,
            to,
            promotion,
        } => {
            let from = lookup(board, token, to, PieceKind::Pawn, &file_indices(from_file))?;
            ResolvedMove {
                from,
                to,
                promotion,
            }
        }
        ParsedToken::PieceMove {
            piece,
            file,
            rank,
            to,
            ..
        } => {
            let valid_from = match (file, rank) {
                (Some(file), Some(rank)) => vec![index_from_file_rank(file, rank)],
                (Some(file), None) => file_indices(file),
                (None, Some(rank)) => rank_indices(rank),
                (None, None) => Vec::new(),
            };
            let from = lookup(board, token, to, piece, &valid_from)?;
            ResolvedMove {
                from,
                to,
                promotion: PieceKind::Queen,
            }
        }
        ParsedToken::CastleKingSide => resolve_castle(board, token, CastleSide::KingSide)?,
        ParsedToken::CastleQueenSide => resolve_castle(board, token, CastleSide::QueenSide)?,
    };
    Ok(resolved)
}

fn resolve_castle<B: BoardEngine + ?Sized>(
    board: &B,
    token: &str,
    side: CastleSide,
) -> Result<ResolvedMove, SanError> {
    let color = board.active_color();
    if !board.castling_availability().has(color, side) {
        return Err(SanError::CastlingUnavailable(token.to_string()));
    }
    let from = board
        .king_index(color)
        .ok_or_else(|| SanError::NoLegalOrigin(token.to_string()))?;
    Ok(ResolvedMove {
        from,
        to: castle_destination(color, side),
        promotion: PieceKind::Queen,
    })
}

/// Classify, resolve and validate a SAN token. With `commit` set the move
/// is also played on `board`; otherwise the board is left untouched.
pub fn play_san<B: BoardEngine + ?Sized>(
    board: &mut B,
    token: &str,
    commit: bool,
) -> Result<ResolvedMove, SanError> {
    let parsed = classify(token)?;
    let mv = resolve(board, token, parsed)?;
    board
        .make_move(mv.from, mv.to, mv.promotion, commit)
        .map_err(|e| SanError::IllegalMove {
            token: token.to_string(),
            reason: e.to_string(),
        })?;
    Ok(mv)
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SanError {
    #[error("Unrecognised move: {0}")]
    MalformedToken(String),
    #[error("No piece can legally play {0}")]
    NoLegalOrigin(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Castling not available: {0}")]
    CastlingUnavailable(String),
    #[error("Illegal move {token}: {reason}")]
    IllegalMove { token: String, reason: String },
}

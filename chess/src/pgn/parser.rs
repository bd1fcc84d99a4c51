//! PGN movetext: normalization, tokenization and replay into snapshots.

use std::sync::LazyLock;

use regex::Regex;

use crate::board::{BoardEngine, CozyBoard};
use crate::pgn::san::{play_san, SanError};
use crate::position::Position;
use crate::types::PieceColor;

static TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*?\]").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());
static NAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+").unwrap());
static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[!?]+").unwrap());
static TRAILING_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(?:1-0|0-1|1/2-1/2|\*)$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static MOVE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})(\.\.\.|\.)").unwrap());

/// Remove parenthesised variations, including nested ones. An unclosed
/// variation runs to the end of the text; a stray `)` is dropped.
fn strip_variations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                out.push(' ');
            }
            ')' => {
                depth = depth.saturating_sub(1);
                out.push(' ');
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn strip_line_comments(text: &str) -> String {
    text.split(['\n', '\r'])
        .map(|line| line.split_once(';').map_or(line, |(kept, _)| kept))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce raw PGN text to bare movetext: move-number markers and SAN tokens
/// separated by single spaces.
///
/// Tag pairs, brace comments, `;` comments, variations, `!`/`?`
/// annotations, NAGs and trailing results are removed, in that order.
/// Applying it to its own output changes nothing.
pub fn normalize(text: &str) -> String {
    let text = TAG_PAIR.replace_all(text, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = strip_line_comments(&text);
    let text = strip_variations(&text);
    // Suffixes sit inside a token (`Qh5!+`), so they leave nothing behind.
    let text = ANNOTATION.replace_all(&text, "");
    let text = NAG.replace_all(&text, "");
    let mut text = WHITESPACE.replace_all(&text, " ").trim().to_string();

    while let Some(m) = TRAILING_RESULT.find(&text) {
        text.truncate(m.start());
        text.truncate(text.trim_end().len());
    }
    text
}

/// One half-move token and the move number it was written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyToken {
    pub move_number: Option<u32>,
    pub token: String,
}

/// Tokenized movetext.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveText {
    /// The text opens with an `N...` marker, so black moves first.
    pub starts_with_black: bool,
    pub plies: Vec<PlyToken>,
}

fn push_segment(segment: &str, move_number: Option<u32>, out: &mut MoveText) {
    out.plies
        .extend(segment.split_whitespace().map(|token| PlyToken {
            move_number,
            token: token.to_string(),
        }));
}

/// Split normalized movetext into half-move tokens.
pub fn tokenize(normalized: &str) -> MoveText {
    let mut movetext = MoveText::default();
    let mut move_number = None;
    let mut last = 0;

    for caps in MOVE_NUMBER.captures_iter(normalized) {
        let Some(marker) = caps.get(0) else {
            continue;
        };
        push_segment(&normalized[last..marker.start()], move_number, &mut movetext);
        if movetext.plies.is_empty() && &caps[2] == "..." {
            movetext.starts_with_black = true;
        }
        move_number = caps[1].parse().ok();
        last = marker.end();
    }
    push_segment(&normalized[last..], move_number, &mut movetext);
    movetext
}

/// A successfully replayed half-move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPly {
    pub san: String,
    pub position: Position,
}

/// A replayed game: the start snapshot followed by one snapshot per ply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedGame {
    pub start: Position,
    pub plies: Vec<ImportedPly>,
}

/// Replay PGN text from the standard start position on a fresh engine.
pub fn replay(text: &str) -> Result<ImportedGame, PgnError> {
    replay_with(CozyBoard::new(), text)
}

/// Replay PGN text on `board`, which is reset first and owned for the
/// duration of the replay.
pub fn replay_with<B: BoardEngine>(mut board: B, text: &str) -> Result<ImportedGame, PgnError> {
    let movetext = tokenize(&normalize(text));
    if movetext.plies.is_empty() {
        return Err(PgnError::EmptyImport);
    }

    board.reset();
    if movetext.starts_with_black {
        board
            .set_active_color(PieceColor::Black)
            .map_err(|e| PgnError::InvalidStart(e.to_string()))?;
    }
    let start = board.position();

    let mut plies = Vec::with_capacity(movetext.plies.len());
    for (i, ply) in movetext.plies.iter().enumerate() {
        let move_number = ply
            .move_number
            .unwrap_or_else(|| board.state().fullmove_number);
        if let Err(source) = play_san(&mut board, &ply.token, true) {
            tracing::debug!(ply = i + 1, token = %ply.token, error = %source, "Replay stopped");
            return Err(PgnError::Move {
                move_number,
                ply: i + 1,
                token: ply.token.clone(),
                source,
            });
        }
        plies.push(ImportedPly {
            san: ply.token.clone(),
            position: board.position(),
        });
    }

    tracing::debug!(plies = plies.len(), "Replayed movetext");
    Ok(ImportedGame { start, plies })
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("Import failed. There is nothing to import")]
    EmptyImport,
    #[error("Import failed. Error occurred at move {move_number} with movetext {token}: {source}")]
    Move {
        move_number: u32,
        ply: usize,
        token: String,
        #[source]
        source: SanError,
    },
    #[error("Import failed. Start position rejected: {0}")]
    InvalidStart(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::parse_index;
    use crate::position::GameStatus;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_strips_everything_but_moves() {
        let pgn = r#"[Event "Casual"]
[Site "?"]

1. e4 {best by test} e5!? 2. Nf3 $1 (2. f4 exf4 (2... d5)) Nc6 ; the usual
3. Bb5 a6?! 1-0"#;
        assert_eq!(normalize(pgn), "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6");
    }

    #[test]
    fn test_line_comment_hides_parentheses() {
        let pgn = "1. e4 ; good (maybe\ne5 2. Nf3 Nc6";
        assert_eq!(normalize(pgn), "1. e4 e5 2. Nf3 Nc6");
        assert_eq!(replay(pgn).unwrap().plies.len(), 4);

        let pgn = "1. e4 e5 ; a stray ) here\n2. Nf3 (2. f4) Nc6";
        assert_eq!(normalize(pgn), "1. e4 e5 2. Nf3 Nc6");
    }

    #[test]
    fn test_annotations_stay_attached_to_check_marker() {
        assert_eq!(normalize("1. e4 e5 2. Qh5!+ Nc6"), "1. e4 e5 2. Qh5+ Nc6");
        assert_eq!(normalize("1. e4$1 e5 $2 2. Nf3?!"), "1. e4 e5 2. Nf3");
        let game = replay("1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6?? 4. Qxf7!!# 1-0").unwrap();
        let mate = game.plies.last().unwrap();
        assert_eq!(mate.san, "Qxf7#");
        assert_eq!(mate.position.state.status, GameStatus::Checkmate);
    }

    #[test]
    fn test_normalize_strips_repeated_results() {
        assert_eq!(normalize("1. d4 d5 1/2-1/2 *"), "1. d4 d5");
        assert_eq!(normalize("1. d4 *"), "1. d4");
        assert_eq!(normalize("1-0"), "");
    }

    #[test]
    fn test_tokenize_tracks_move_numbers() {
        let movetext = tokenize("1. e4 e5 2.Nf3");
        assert!(!movetext.starts_with_black);
        let tokens: Vec<_> = movetext.plies.iter().map(|p| p.token.as_str()).collect();
        assert_eq!(tokens, ["e4", "e5", "Nf3"]);
        assert_eq!(movetext.plies[1].move_number, Some(1));
        assert_eq!(movetext.plies[2].move_number, Some(2));
    }

    #[test]
    fn test_tokenize_black_first() {
        let movetext = tokenize("12... Nf6 13. c4");
        assert!(movetext.starts_with_black);
        assert_eq!(movetext.plies.len(), 2);
        assert_eq!(movetext.plies[0].move_number, Some(12));
    }

    #[test]
    fn test_replay_short_game() {
        let game = replay("1. e4 e5 2. Nf3 Nc6").unwrap();
        assert_eq!(game.start, Position::standard());
        assert_eq!(game.plies.len(), 4);
        assert_eq!(game.plies[1].san, "e5");
        let last = &game.plies[3].position;
        assert_eq!(last.state.active_color, PieceColor::White);
    }

    #[test]
    fn test_replay_capture_clears_square() {
        let game = replay("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Bxc6 dxc6").unwrap();
        let last = &game.plies.last().unwrap().position;
        // The bishop that took on c6 was itself taken by the d-pawn.
        assert_eq!(last.spin(parse_index("c6").unwrap()), -1);
        assert_eq!(last.spin(parse_index("b5").unwrap()), 0);
        assert_eq!(last.spin(parse_index("d7").unwrap()), 0);
    }

    #[test]
    fn test_replay_black_first() {
        let game = replay("1... e5 2. e4").unwrap();
        assert_eq!(game.start.state.active_color, PieceColor::Black);
        assert_eq!(game.plies.len(), 2);
    }

    #[test]
    fn test_replay_empty() {
        assert_eq!(replay(""), Err(PgnError::EmptyImport));
        assert_eq!(replay("[Event \"x\"] {nothing} 1-0"), Err(PgnError::EmptyImport));
    }

    #[test]
    fn test_replay_reports_failing_move() {
        let err = replay("1. e4 e5 2. Nf3 Nc6 3. Qxf7").unwrap_err();
        match &err {
            PgnError::Move {
                move_number,
                ply,
                token,
                source,
            } => {
                assert_eq!(*move_number, 3);
                assert_eq!(*ply, 5);
                assert_eq!(token, "Qxf7");
                assert_eq!(*source, SanError::NoLegalOrigin("Qxf7".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err
            .to_string()
            .starts_with("Import failed. Error occurred at move 3 with movetext Qxf7"));
    }

    #[test]
    fn test_replay_ambiguous_rooks() {
        let err = replay("1. a4 h5 2. h4 a5 3. Ra3 Ra6 4. Rhh3 Rhh6 5. Rd3").unwrap_err();
        assert!(matches!(
            err,
            PgnError::Move {
                source: SanError::AmbiguousMove(_),
                ..
            }
        ));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(text in r"[a-hKQRBNOx1-8=+#!?$ .\-/*{}\[\]();\n]{0,80}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}

//! Canonical piece and color types for the project.
//! cozy-chess types are internal implementation details.
//!
//! A square's contents are stored as a signed "spin": the magnitude selects
//! the piece kind and the sign selects the color (white positive).

/// Signed piece code stored per square. Zero means empty.
pub type Spin = i8;

/// Project-owned piece type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// Project-owned color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceColor {
    White,
    Black,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        Self::Pawn,
        Self::Knight,
        Self::Bishop,
        Self::Rook,
        Self::Queen,
        Self::King,
    ];

    /// Unsigned spin magnitude (pawn 1 .. king 6).
    pub fn magnitude(self) -> Spin {
        match self {
            Self::Pawn => 1,
            Self::Knight => 2,
            Self::Bishop => 3,
            Self::Rook => 4,
            Self::Queen => 5,
            Self::King => 6,
        }
    }

    pub fn from_magnitude(magnitude: Spin) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.magnitude() == magnitude)
    }

    /// Spin of this piece for the given color.
    pub fn spin(self, color: PieceColor) -> Spin {
        self.magnitude() * color.sign()
    }

    pub fn to_char_upper(self) -> char {
        match self {
            Self::Pawn => 'P',
            Self::Knight => 'N',
            Self::Bishop => 'B',
            Self::Rook => 'R',
            Self::Queen => 'Q',
            Self::King => 'K',
        }
    }

    pub fn to_char_lower(self) -> char {
        self.to_char_upper().to_ascii_lowercase()
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(Self::Pawn),
            'n' => Some(Self::Knight),
            'b' => Some(Self::Bishop),
            'r' => Some(Self::Rook),
            'q' => Some(Self::Queen),
            'k' => Some(Self::King),
            _ => None,
        }
    }

    /// SAN piece letters are uppercase only; pawns have no letter.
    pub fn from_san_letter(c: char) -> Option<Self> {
        match c {
            'N' => Some(Self::Knight),
            'B' => Some(Self::Bishop),
            'R' => Some(Self::Rook),
            'Q' => Some(Self::Queen),
            'K' => Some(Self::King),
            _ => None,
        }
    }
}

impl PieceColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }

    /// +1 for white, -1 for black.
    pub fn sign(self) -> Spin {
        match self {
            Self::White => 1,
            Self::Black => -1,
        }
    }

    pub fn from_sign(sign: i32) -> Option<Self> {
        match sign {
            1 => Some(Self::White),
            -1 => Some(Self::Black),
            _ => None,
        }
    }
}

/// Decode a square spin into its piece and color. Returns `None` for empty
/// squares and out-of-range magnitudes.
pub fn piece_from_spin(spin: Spin) -> Option<(PieceKind, PieceColor)> {
    let color = PieceColor::from_sign(i32::from(spin.signum()))?;
    let kind = PieceKind::from_magnitude(spin.abs())?;
    Some((kind, color))
}

impl From<cozy_chess::Piece> for PieceKind {
    fn from(p: cozy_chess::Piece) -> Self {
        match p {
            cozy_chess::Piece::Pawn => Self::Pawn,
            cozy_chess::Piece::Knight => Self::Knight,
            cozy_chess::Piece::Bishop => Self::Bishop,
            cozy_chess::Piece::Rook => Self::Rook,
            cozy_chess::Piece::Queen => Self::Queen,
            cozy_chess::Piece::King => Self::King,
        }
    }
}

impl From<PieceKind> for cozy_chess::Piece {
    fn from(p: PieceKind) -> Self {
        match p {
            PieceKind::Pawn => Self::Pawn,
            PieceKind::Knight => Self::Knight,
            PieceKind::Bishop => Self::Bishop,
            PieceKind::Rook => Self::Rook,
            PieceKind::Queen => Self::Queen,
            PieceKind::King => Self::King,
        }
    }
}

impl From<cozy_chess::Color> for PieceColor {
    fn from(c: cozy_chess::Color) -> Self {
        match c {
            cozy_chess::Color::White => Self::White,
            cozy_chess::Color::Black => Self::Black,
        }
    }
}

impl From<PieceColor> for cozy_chess::Color {
    fn from(c: PieceColor) -> Self {
        match c {
            PieceColor::White => Self::White,
            PieceColor::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for PieceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char_upper())
    }
}

impl std::fmt::Display for PieceColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

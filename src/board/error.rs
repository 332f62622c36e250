//! Error types for board operations.

use std::fmt;

/// FEN parsing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// Fewer than the four mandatory fields.
    TooFewFields { found: usize },
    /// Invalid piece character in the placement field.
    InvalidPiece { ch: char },
    /// Placement field does not describe exactly eight ranks.
    BadRankCount { found: usize },
    /// A rank describes more than eight files.
    RankOverflow { rank: usize },
    /// Side-to-move field is not `w` or `b`.
    InvalidSideToMove { found: String },
    /// Invalid castling character.
    InvalidCastling { ch: char },
    /// Invalid en-passant field.
    InvalidEnPassant { found: String },
    /// A side has no king or more than one.
    BadKingCount,
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::TooFewFields { found } => {
                write!(f, "FEN needs at least 4 fields, found {found}")
            }
            FenError::InvalidPiece { ch } => write!(f, "invalid piece character '{ch}' in FEN"),
            FenError::BadRankCount { found } => {
                write!(f, "FEN placement must have 8 ranks, found {found}")
            }
            FenError::RankOverflow { rank } => {
                write!(f, "rank {rank} in FEN describes more than 8 files")
            }
            FenError::InvalidSideToMove { found } => {
                write!(f, "invalid side to move '{found}', expected 'w' or 'b'")
            }
            FenError::InvalidCastling { ch } => write!(f, "invalid castling character '{ch}'"),
            FenError::InvalidEnPassant { found } => {
                write!(f, "invalid en passant square '{found}'")
            }
            FenError::BadKingCount => write!(f, "each side needs exactly one king"),
        }
    }
}

impl std::error::Error for FenError {}

/// UCI move-string parsing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    /// Move string must be 4 or 5 characters.
    InvalidLength { len: usize },
    /// A square did not parse.
    InvalidSquare { notation: String },
    /// Promotion letter outside `nbrq`.
    InvalidPromotion { ch: char },
    /// No legal move matches the string in the current position.
    IllegalMove { notation: String },
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveParseError::InvalidLength { len } => {
                write!(f, "move must be 4-5 characters, found {len}")
            }
            MoveParseError::InvalidSquare { notation } => {
                write!(f, "invalid square in move '{notation}'")
            }
            MoveParseError::InvalidPromotion { ch } => {
                write!(f, "invalid promotion piece '{ch}'")
            }
            MoveParseError::IllegalMove { notation } => write!(f, "illegal move '{notation}'"),
        }
    }
}

impl std::error::Error for MoveParseError {}

/// Square notation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareError {
    InvalidNotation { notation: String },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::InvalidNotation { notation } => {
                write!(f, "invalid square notation '{notation}'")
            }
        }
    }
}

impl std::error::Error for SquareError {}

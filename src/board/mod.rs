//! Board representation and rules: bitboards, position make/unmake with
//! incremental hashing and evaluation accumulators, move generation, SEE.

pub mod attack_tables;
mod error;
mod eval_acc;
mod fen;
mod make_unmake;
pub mod movegen;
mod position;
mod pst;
mod see;
mod state;
mod types;
pub(crate) mod zobrist;

pub use error::{FenError, MoveParseError, SquareError};
pub use eval_acc::EvalAcc;
pub use position::Position;
pub use state::{Board, GameState};
pub use types::{Bitboard, CastleSide, Color, Move, MoveList, Piece, ScoredMove, ScoredMoveList, Square};

pub(crate) use pst::{pst_index, MAX_PHASE, PST_MG};
pub(crate) use see::SEE_VALUES;
pub(crate) use types::{FILES, MAX_PLY, RANKS};

/// Parse a UCI move string against the current position's legal moves.
pub fn parse_uci_move(pos: &mut Position, s: &str) -> Result<Move, MoveParseError> {
    let len = s.len();
    if !s.is_ascii() || !(4..=5).contains(&len) {
        return Err(MoveParseError::InvalidLength { len });
    }
    let from: Square = s[0..2].parse().map_err(|_| MoveParseError::InvalidSquare {
        notation: s.to_string(),
    })?;
    let to: Square = s[2..4].parse().map_err(|_| MoveParseError::InvalidSquare {
        notation: s.to_string(),
    })?;
    let promo = match s.chars().nth(4) {
        None => None,
        Some(c) => match Piece::from_char(c) {
            Some(p) if matches!(p, Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen) => {
                Some(p)
            }
            _ => return Err(MoveParseError::InvalidPromotion { ch: c }),
        },
    };

    let mut list = MoveList::new();
    movegen::generate_legal(pos, &mut list);
    list.iter()
        .copied()
        .find(|m| m.from() == from && m.to() == to && m.promotion_piece() == promo)
        .ok_or(MoveParseError::IllegalMove {
            notation: s.to_string(),
        })
}

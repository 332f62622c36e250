//! Zobrist hashing keys.
//!
//! The en-passant component is special: it is mixed into the key only when a
//! pawn of the side to move can actually perform the capture. Without this
//! rule, two positions that differ only in an irrelevant ep square would hash
//! differently and repetition detection would miss them.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::{Color, Square};

const ZOBRIST_SEED: u64 = 0xB1A5_ED_C0FFEE_u64;

pub(crate) struct ZobristKeys {
    /// `piece[color][piece_type][square]`
    pub piece: [[[u64; 64]; 6]; 2],
    /// One key per 4-bit castling-rights mask.
    pub castling: [u64; 16],
    /// One key per en-passant file.
    pub ep_file: [u64; 8],
    /// Mixed in when Black is to move.
    pub side: u64,
    /// `ep_capture_mask[side_to_move][ep_square]`: squares holding a pawn of
    /// the side to move that could capture onto the ep square.
    pub ep_capture_mask: [[u64; 64]; 2],
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
        let mut piece = [[[0u64; 64]; 6]; 2];
        for color in &mut piece {
            for pt in color.iter_mut() {
                for key in pt.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let mut castling = [0u64; 16];
        for key in &mut castling {
            *key = rng.gen();
        }

        let mut ep_file = [0u64; 8];
        for key in &mut ep_file {
            *key = rng.gen();
        }

        let side = rng.gen();

        let mut ep_capture_mask = [[0u64; 64]; 2];
        for sq in 0..64 {
            let rank = sq / 8;
            let file = sq % 8;
            for df in [-1i32, 1] {
                let f = file as i32 + df;
                if !(0..8).contains(&f) {
                    continue;
                }
                // A white pawn capturing to `sq` stands one rank below it,
                // a black pawn one rank above.
                if rank >= 1 {
                    ep_capture_mask[Color::White.index()][sq] |=
                        1u64 << ((rank - 1) * 8 + f as usize);
                }
                if rank <= 6 {
                    ep_capture_mask[Color::Black.index()][sq] |=
                        1u64 << ((rank + 1) * 8 + f as usize);
                }
            }
        }

        ZobristKeys {
            piece,
            castling,
            ep_file,
            side,
            ep_capture_mask,
        }
    }
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

#[inline]
pub(crate) fn piece_key(color: Color, piece_idx: usize, sq: Square) -> u64 {
    ZOBRIST.piece[color.index()][piece_idx][sq.index()]
}

#[inline]
pub(crate) fn castling_key(rights: u8) -> u64 {
    ZOBRIST.castling[(rights & 0xF) as usize]
}

#[inline]
pub(crate) fn side_key() -> u64 {
    ZOBRIST.side
}

/// The ep hash contribution for `ep` with `stm` to move, given the side to
/// move's pawn set. Zero when no pawn can actually take.
#[inline]
pub(crate) fn ep_key(stm: Color, ep: Square, stm_pawns: u64) -> u64 {
    if ZOBRIST.ep_capture_mask[stm.index()][ep.index()] & stm_pawns != 0 {
        ZOBRIST.ep_file[ep.file()]
    } else {
        0
    }
}

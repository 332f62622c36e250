//! Static exchange evaluation.
//!
//! Plays out the capture sequence on one square in least-valuable-attacker
//! order, tracking gains in a swap list and minimaxing it back up. X-ray
//! attackers are folded in as pieces leave the board. The king may only
//! recapture when the opponent has no attacker left; batteries through the
//! king are treated conservatively by that same rule.

use super::attack_tables::{bishop_attacks, rook_attacks};
use super::position::Position;
use super::types::{Bitboard, Color, Move, Piece, Square};

/// Piece values used by the exchange simulation.
pub(crate) const SEE_VALUES: [i32; 6] = [100, 320, 330, 500, 950, 20000];

impl Position {
    /// Net material outcome of the capture sequence started by `m`, in
    /// centipawns from the mover's point of view. Non-captures score 0.
    #[must_use]
    pub fn see(&self, m: Move) -> i32 {
        let from = m.from();
        let to = m.to();

        let Some((_, attacker)) = self.board().piece_at(from) else {
            return 0;
        };
        let victim = if m.is_en_passant() {
            Piece::Pawn
        } else {
            match self.board().piece_on(to) {
                Some(p) => p,
                None => return 0,
            }
        };

        self.see_impl(from, to, attacker, victim)
    }

    /// `see(m) >= threshold` without computing the exact value elsewhere.
    #[inline]
    #[must_use]
    pub fn see_ge(&self, m: Move, threshold: i32) -> bool {
        self.see(m) >= threshold
    }

    fn see_impl(&self, from: Square, to: Square, attacker: Piece, victim: Piece) -> i32 {
        const MAX_SWAPS: usize = 32;

        let board = self.board();
        let mut gain = [0i32; MAX_SWAPS];
        let mut depth = 0usize;
        let mut side = self.side_to_move();
        let mut occ = board.occupied().0;
        let mut attackers = board.attackers_to(to, occ);
        let mut current = attacker;
        let mut from_bit = 1u64 << from.index();

        gain[0] = SEE_VALUES[victim.index()];

        loop {
            occ ^= from_bit;
            attackers = Bitboard(attackers.0 & !from_bit);

            // Removing a piece can expose an x-ray attacker behind it.
            if matches!(current, Piece::Pawn | Piece::Bishop | Piece::Queen) {
                let diag = board.pieces_of_type(Piece::Bishop).0
                    | board.pieces_of_type(Piece::Queen).0;
                attackers.0 |= bishop_attacks(to.index(), occ) & diag & occ;
            }
            if matches!(current, Piece::Rook | Piece::Queen) {
                let straight =
                    board.pieces_of_type(Piece::Rook).0 | board.pieces_of_type(Piece::Queen).0;
                attackers.0 |= rook_attacks(to.index(), occ) & straight & occ;
            }

            side = !side;
            let side_attackers = Bitboard(attackers.0 & board.occupied_by(side).0);
            if side_attackers.is_empty() {
                break;
            }

            depth += 1;
            if depth >= MAX_SWAPS {
                break;
            }

            let (lva, lva_bit) = least_valuable(board, side_attackers, side);

            gain[depth] = SEE_VALUES[current.index()] - gain[depth - 1];

            // Neither side continues a sequence that is already lost.
            if (-gain[depth - 1]).max(gain[depth]) < 0 {
                break;
            }

            // The king never walks into a still-defended square.
            if lva == Piece::King
                && attackers.0 & board.occupied_by(!side).0 & occ != 0
            {
                break;
            }

            current = lva;
            from_bit = lva_bit;
        }

        while depth > 0 {
            depth -= 1;
            gain[depth] = -((-gain[depth]).max(gain[depth + 1]));
        }
        gain[0]
    }
}

fn least_valuable(
    board: &super::state::Board,
    attackers: Bitboard,
    color: Color,
) -> (Piece, u64) {
    for piece in Piece::ALL {
        let candidates = attackers.0 & board.pieces(color, piece).0;
        if candidates != 0 {
            return (piece, candidates & candidates.wrapping_neg());
        }
    }
    unreachable!("least_valuable on empty attacker set")
}

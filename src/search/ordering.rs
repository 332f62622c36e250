//! Staged move ordering.
//!
//! Buckets, best to worst: TT move, good captures (MVV/LVA inside), quiet
//! promotions and killers and the counter move, ordinary quiets by combined
//! history, losing captures last. Quiet moves that give check, hit a heavy
//! piece, or push an advanced passer get lifted within their bucket.

use crate::board::attack_tables::{bishop_attacks, knight_attacks, rook_attacks};
use crate::board::{Move, MoveList, Piece, Position, ScoredMoveList, SEE_VALUES};

use super::constants::{
    ORDER_BAD_CAPTURE, ORDER_COUNTER, ORDER_GOOD_CAPTURE, ORDER_KILLER1, ORDER_KILLER2,
    ORDER_QUIET_PROMO, ORDER_QUIET_THREAT, ORDER_TT,
};
use super::{is_advanced_passer_push, is_direct_check, Search};

/// MVV/LVA: victim value dominates, attacker value breaks ties.
#[inline]
fn mvv_lva(attacker: Piece, victim: Piece) -> i32 {
    SEE_VALUES[victim.index()] * 16 - SEE_VALUES[attacker.index()] / 16
}

impl Search {
    /// Score `moves` for the node at `ply`. `tt_move` may be null.
    pub(crate) fn order_moves(
        &self,
        pos: &Position,
        moves: &MoveList,
        tt_move: Move,
        ply: usize,
    ) -> ScoredMoveList {
        let board = pos.board();
        let us = pos.side_to_move();
        let them = !us;
        let heavy = board.pieces(them, Piece::Queen).0
            | board.pieces(them, Piece::Rook).0
            | board.pieces(them, Piece::Bishop).0
            | board.pieces(them, Piece::Knight).0;

        let killers = if ply < super::constants::MAX_PLY {
            self.tables.killers[ply]
        } else {
            [Move::NULL; 2]
        };
        let counter = self.step_before(ply, 1).map(|(prev, _)| {
            self.tables.counter_move[prev.from().index()][prev.to().index()]
        });

        let prev1 = self.step_before(ply, 1);
        let prev2 = self.step_before(ply, 2);

        let mut scored = ScoredMoveList::new();
        for &m in moves {
            scored.push(m, self.score_move(pos, m, tt_move, &killers, counter, prev1, prev2, heavy));
        }
        scored
    }

    #[allow(clippy::too_many_arguments)]
    fn score_move(
        &self,
        pos: &Position,
        m: Move,
        tt_move: Move,
        killers: &[Move; 2],
        counter: Option<Move>,
        prev1: Option<(Move, usize)>,
        prev2: Option<(Move, usize)>,
        heavy: u64,
    ) -> i32 {
        if !tt_move.is_null() && m == tt_move {
            return ORDER_TT;
        }

        let board = pos.board();
        let mover = board.piece_on(m.from()).unwrap_or(Piece::Pawn);

        if m.is_capture() {
            let victim = if m.is_en_passant() {
                Piece::Pawn
            } else {
                board.piece_on(m.to()).unwrap_or(Piece::Pawn)
            };
            let base = mvv_lva(mover, victim);
            let hist = self.tables.capture_score(mover, m, victim) / 16;

            // A capture is "good" when it wins by SEE, recaptures on the last
            // move's square, grabs a big victim, or promotes.
            let recapture = prev1.is_some_and(|(prev, _)| prev.to() == m.to());
            let big_victim = SEE_VALUES[victim.index()] >= SEE_VALUES[mover.index()];
            let good = m.is_promotion()
                || recapture
                || big_victim
                || pos.see_ge(m, 0);
            return if good {
                ORDER_GOOD_CAPTURE + base + hist
            } else {
                ORDER_BAD_CAPTURE + base + hist
            };
        }

        if m.is_promotion() {
            return ORDER_QUIET_PROMO + SEE_VALUES[m.promotion_piece().map_or(0, Piece::index)];
        }
        if m == killers[0] {
            return ORDER_KILLER1;
        }
        if m == killers[1] {
            return ORDER_KILLER2;
        }
        if counter.is_some_and(|c| !c.is_null() && c == m) {
            return ORDER_COUNTER;
        }

        // Quiet moves: combined history signals plus the PST delta as a
        // positional tiebreak when history is silent.
        let us = pos.side_to_move();
        let from_idx = crate::board::pst_index(m.from().index(), us.is_white());
        let to_idx = crate::board::pst_index(m.to().index(), us.is_white());
        let pst_delta = crate::board::PST_MG[mover.index()][to_idx]
            - crate::board::PST_MG[mover.index()][from_idx];
        let mut score =
            self.tables.history_score(m) + self.tables.quiet_score(mover, m) + pst_delta;
        if let Some((prev, prev_piece)) = prev1 {
            score += i32::from(self.tables.cont_hist.get(
                0,
                prev_piece,
                prev.to().index(),
                mover.index(),
                m.to().index(),
            ));
            score += i32::from(
                self.tables.counter_hist[prev.from().index()][prev.to().index()],
            ) / 2;
        }
        if let Some((prev, prev_piece)) = prev2 {
            score += i32::from(self.tables.cont_hist.get(
                1,
                prev_piece,
                prev.to().index(),
                mover.index(),
                m.to().index(),
            ));
        }

        // Shuffling heavy pieces back and forth reads as aimless.
        if matches!(mover, Piece::Queen | Piece::Rook) && score < 0 {
            score -= 64;
        }

        // Threat signals lift a quiet move near the top of its bucket.
        if is_direct_check(pos, m) {
            score += ORDER_QUIET_THREAT;
        } else {
            let to = m.to().index();
            let occ = board.occupied().0;
            let attacks_after = match mover {
                Piece::Knight => knight_attacks(to),
                Piece::Bishop => bishop_attacks(to, occ),
                Piece::Rook => rook_attacks(to, occ),
                Piece::Queen => bishop_attacks(to, occ) | rook_attacks(to, occ),
                _ => 0,
            };
            if attacks_after & heavy != 0 {
                score += ORDER_QUIET_THREAT / 2;
            } else if is_advanced_passer_push(pos, m) {
                score += ORDER_QUIET_THREAT / 2;
            }
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::movegen;
    use crate::config::EngineConfig;
    use crate::tt::TranspositionTable;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn make_search() -> Search {
        Search::new(
            Arc::new(TranspositionTable::new(1)),
            EngineConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn ordered(fen: &str, tt_move: Move) -> Vec<Move> {
        let mut pos = Position::from_fen(fen).unwrap();
        let mut list = MoveList::new();
        movegen::generate_legal(&mut pos, &mut list);
        let search = make_search();
        let mut scored = search.order_moves(&pos, &list, tt_move, 0);
        scored.sort_desc();
        scored.as_slice().iter().map(|s| s.mv).collect()
    }

    #[test]
    fn tt_move_comes_first() {
        let tt_move = Move::quiet(
            crate::board::Square::new(1, 7),
            crate::board::Square::new(2, 7),
        );
        let order = ordered(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            tt_move,
        );
        assert_eq!(order[0], tt_move);
    }

    #[test]
    fn winning_capture_before_quiets() {
        // Pawn can take the undefended knight.
        let order = ordered("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1", Move::NULL);
        assert_eq!(order[0].to_string(), "e4d5");
    }

    #[test]
    fn losing_capture_goes_last() {
        // Queen takes a pawn defended by a pawn: dead last.
        let order = ordered("4k3/8/2p5/3p4/4Q3/8/8/4K3 w - - 0 1", Move::NULL);
        let qxd5 = order
            .iter()
            .position(|m| m.to_string() == "e4d5")
            .expect("capture present");
        assert_eq!(qxd5, order.len() - 1);
    }

    #[test]
    fn killer_ranks_above_plain_quiets() {
        let mut pos = Position::from_fen("4k3/8/8/8/8/8/8/RN2K3 w - - 0 1").unwrap();
        let mut list = MoveList::new();
        movegen::generate_legal(&mut pos, &mut list);
        let killer = *list
            .iter()
            .find(|m| m.to_string() == "a1a4")
            .expect("rook lift available");

        let mut search = make_search();
        search.tables.killer_insert(0, killer);
        let mut scored = search.order_moves(&pos, &list, Move::NULL, 0);
        scored.sort_desc();
        assert_eq!(scored.as_slice()[0].mv, killer);
    }
}

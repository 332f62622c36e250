//! Quiescence search: captures, promotions, and a limited dose of quiet
//! checks, to settle the horizon before the static evaluation is trusted.

use crate::board::{movegen, Move, MoveList, Piece, Position, ScoredMoveList, SEE_VALUES};
use crate::tt::Bound;

use super::constants::{mated_in, DELTA_MARGIN, INF, MAX_PLY};
use super::{is_direct_check, Search, SearchOutcome};

/// Most quiet checking moves tried per quiescence node.
const QUIET_CHECK_LIMIT: usize = 3;
/// Quiet checks only while both sides keep real material.
const QUIET_CHECK_MIN_PIECES: u32 = 2;

impl Search {
    pub(crate) fn quiescence(
        &mut self,
        pos: &mut Position,
        mut alpha: i32,
        beta: i32,
        ply: i32,
    ) -> SearchOutcome<i32> {
        self.tick_node()?;

        if pos.is_fifty_move_draw() || pos.has_repeated() || pos.is_insufficient_material() {
            return Ok(0);
        }
        if ply as usize >= MAX_PLY - 2 {
            return Ok(self.eval.evaluate(pos));
        }

        let in_check = pos.in_check();
        let original_alpha = alpha;

        // Depth-0 TT probe: same-depth entries give bounds and ordering.
        let tt_entry = self.tt.probe(pos.hash(), ply);
        let mut tt_move = Move::NULL;
        if let Some(entry) = tt_entry {
            tt_move = entry.mv;
            if entry.depth >= 0 {
                match entry.bound {
                    Bound::Exact => return Ok(entry.score),
                    Bound::Lower if entry.score >= beta => return Ok(entry.score),
                    Bound::Upper if entry.score <= alpha => return Ok(entry.score),
                    _ => {}
                }
            }
        }

        let mut best = -INF;
        let mut best_move = Move::NULL;
        let stand_pat;

        if in_check {
            stand_pat = -INF;
            let mut evasions = MoveList::new();
            movegen::generate_evasions(pos, &mut evasions);

            let mut scored = self.order_moves(pos, &evasions, tt_move, ply as usize);
            let mut searched = 0;
            let mut i = 0;
            while let Some(pick) = scored.pick_best(i) {
                i += 1;
                let m = pick.mv;
                let mover = pos.board().piece_on(m.from()).map_or(6, Piece::index);
                if !pos.do_move(m) {
                    continue;
                }
                searched += 1;
                self.record_step(ply as usize, m, mover);
                self.tt.prefetch(pos.hash());
                let score = -self.quiescence(pos, -beta, -alpha, ply + 1).map_err(|e| {
                    pos.undo_move();
                    e
                })?;
                pos.undo_move();

                if score > best {
                    best = score;
                    best_move = m;
                }
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            }

            if searched == 0 {
                return Ok(mated_in(ply));
            }
        } else {
            stand_pat = self.eval.evaluate(pos);
            if stand_pat >= beta {
                return Ok(stand_pat);
            }
            if stand_pat > alpha {
                alpha = stand_pat;
            }
            best = stand_pat;

            let mut captures = MoveList::new();
            movegen::generate_captures(pos, &mut captures);
            let mut scored = self.order_moves(pos, &captures, tt_move, ply as usize);

            let mut i = 0;
            while let Some(pick) = scored.pick_best(i) {
                i += 1;
                let m = pick.mv;

                // SEE pruning: clearly losing captures of small victims are
                // hopeless here, unless they recapture or hit the center.
                if self.cfg.use_see_pruning && m.is_capture() && !m.is_promotion() {
                    let victim_value = if m.is_en_passant() {
                        SEE_VALUES[0]
                    } else {
                        pos.board()
                            .piece_on(m.to())
                            .map_or(0, |p| SEE_VALUES[p.index()])
                    };
                    let recapture = pos.last_move().is_some_and(|prev| prev.to() == m.to());
                    let central = matches!(m.to().file(), 3 | 4);
                    if victim_value < SEE_VALUES[3]
                        && !recapture
                        && !central
                        && !pos.see_ge(m, 0)
                    {
                        continue;
                    }
                }

                // Delta pruning with the checking-move exception: the check
                // verdict needs the move made anyway, so make it first and
                // apply the margin test afterwards.
                let victim_value = if m.is_en_passant() {
                    SEE_VALUES[0]
                } else {
                    pos.board()
                        .piece_on(m.to())
                        .map_or(0, |p| SEE_VALUES[p.index()])
                };
                let promo_gain = m
                    .promotion_piece()
                    .map_or(0, |p| SEE_VALUES[p.index()] - SEE_VALUES[0]);
                let delta_hopeless =
                    stand_pat + victim_value + promo_gain + DELTA_MARGIN <= alpha;

                let mover = pos.board().piece_on(m.from()).map_or(6, Piece::index);
                if !pos.do_move(m) {
                    continue;
                }
                if delta_hopeless && !pos.last_move_gave_check() {
                    pos.undo_move();
                    continue;
                }
                self.record_step(ply as usize, m, mover);
                self.tt.prefetch(pos.hash());
                let score = -self.quiescence(pos, -beta, -alpha, ply + 1).map_err(|e| {
                    pos.undo_move();
                    e
                })?;
                pos.undo_move();

                if score > best {
                    best = score;
                    best_move = m;
                }
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            }

            // A limited look at quiet checks keeps forcing lines honest while
            // material is still on the board.
            if self.cfg.qsearch_quiet_checks
                && alpha < beta
                && stand_pat + 100 > alpha
                && both_sides_have_pieces(pos)
            {
                best = self.try_quiet_checks(pos, &mut alpha, beta, ply, best, &mut best_move)?;
            }
        }

        if !self.stopped() {
            let bound = if best >= beta {
                Bound::Lower
            } else if best > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            let eval_for_tt = if in_check { None } else { Some(stand_pat) };
            self.tt
                .store(pos.hash(), best, 0, bound, best_move, eval_for_tt, ply);
        }

        Ok(best)
    }

    fn try_quiet_checks(
        &mut self,
        pos: &mut Position,
        alpha: &mut i32,
        beta: i32,
        ply: i32,
        mut best: i32,
        best_move: &mut Move,
    ) -> SearchOutcome<i32> {
        let mut all = MoveList::new();
        movegen::generate_pseudo_legal(pos, &mut all);

        let killers = self.tables.killers[(ply as usize).min(MAX_PLY - 1)];
        let mut checks = ScoredMoveList::new();
        for &m in &all {
            if !m.is_quiet() || !is_direct_check(pos, m) {
                continue;
            }
            let mut score = self.tables.history_score(m);
            if m == killers[0] || m == killers[1] {
                score += 4_000;
            }
            checks.push(m, score);
        }

        let mut tried = 0;
        let mut i = 0;
        while let Some(pick) = checks.pick_best(i) {
            i += 1;
            if tried >= QUIET_CHECK_LIMIT {
                break;
            }
            let m = pick.mv;
            let mover = pos.board().piece_on(m.from()).map_or(6, Piece::index);
            if !pos.do_move(m) {
                continue;
            }
            tried += 1;
            self.record_step(ply as usize, m, mover);
            let score = -self.quiescence(pos, -beta, -*alpha, ply + 1).map_err(|e| {
                pos.undo_move();
                e
            })?;
            pos.undo_move();

            if score > best {
                best = score;
                *best_move = m;
            }
            if score > *alpha {
                *alpha = score;
                if *alpha >= beta {
                    break;
                }
            }
        }
        Ok(best)
    }
}

fn both_sides_have_pieces(pos: &Position) -> bool {
    use crate::board::Color;
    let acc = pos.acc();
    acc.non_pawn_count(Color::White) >= QUIET_CHECK_MIN_PIECES
        && acc.non_pawn_count(Color::Black) >= QUIET_CHECK_MIN_PIECES
}

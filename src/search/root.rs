//! Root search: iterative deepening with aspiration windows, root move
//! ordering, exact re-scoring for reporting, and PV extraction.

use crate::board::{movegen, Move, MoveList, Position};
use crate::tt::Bound;

use super::constants::{is_mate_score, mated_in, INF, MATE, MATE_THR};
use super::{Search, SearchOutcome, SearchStopped};

/// Longest principal variation chased through the TT.
const PV_MAX_LEN: usize = 16;
/// Aspiration gives up and opens the window fully past this delta.
const ASPIRATION_MAX_DELTA: i32 = 800;

/// Reported after each completed iteration.
#[derive(Debug, Clone)]
pub struct IterationInfo {
    pub depth: u32,
    pub score: i32,
    /// Moves until mate, signed, when the score is a mate score.
    pub mate_in: Option<i32>,
    pub nodes: u64,
    pub nps: u64,
    pub time_ms: u64,
    pub pv: Vec<Move>,
    pub hashfull: u32,
}

struct RootMove {
    mv: Move,
    score: i32,
    order: i32,
}

impl Search {
    /// Single-threaded entry: iterative deepening to `max_depth`, stopping on
    /// the shared flag or after `max_nodes` nodes. The best move found so far
    /// is always preserved in the stats.
    pub fn search_root_single(&mut self, pos: &mut Position, max_depth: i32, max_nodes: u64) {
        self.tt.new_generation();
        self.begin_search(max_nodes);
        self.iterate(pos, max_depth);
    }

    /// The iterative-deepening loop proper; shared by the single-threaded
    /// entry and the SMP workers.
    pub(crate) fn iterate(&mut self, pos: &mut Position, max_depth: i32) {
        let mut roots = self.legal_root_moves(pos);
        if roots.is_empty() {
            self.stats.best_move = None;
            self.stats.best_score = if pos.in_check() { mated_in(0) } else { 0 };
            self.finish_stats();
            return;
        }

        let mut last_score = 0i32;
        for depth in 1..=max_depth.max(1) {
            match self.search_root_depth(pos, &mut roots, depth, last_score) {
                Ok(score) => {
                    last_score = score;
                    // Exact re-scores replace the window-bounded values for
                    // reporting; the chosen move stays pinned in front.
                    self.rescore_top_moves(pos, &mut roots, depth);
                    self.stats.depth = depth as u32;
                    self.stats.best_score = roots[0].score;
                    self.stats.best_move = Some(roots[0].mv);
                    self.stats.pv = self.build_pv(pos, roots[0].mv);
                    self.stats.top_moves = roots
                        .iter()
                        .take(self.cfg.full_rescore_top_k.max(1))
                        .map(|r| (r.mv, r.score))
                        .collect();

                    self.report_iteration(depth as u32);
                    self.tables.decay();

                    if is_mate_score(score) && depth >= 2 {
                        // A forced mate needs no deeper confirmation.
                        break;
                    }
                }
                Err(SearchStopped) => break,
            }
        }

        // A cancel during the very first iteration must still produce a
        // move: fall back to the best-ordered legal root move.
        if self.stats.best_move.is_none() {
            self.order_root_moves(pos, &mut roots);
            self.stats.best_move = roots.first().map(|r| r.mv);
        }
        self.finish_stats();
    }

    fn finish_stats(&mut self) {
        self.flush_ticks();
        let elapsed = self.start_time.elapsed();
        self.stats.elapsed_ms = elapsed.as_millis() as u64;
        self.stats.nps = if self.stats.elapsed_ms > 0 {
            self.stats.nodes * 1000 / self.stats.elapsed_ms
        } else {
            self.stats.nodes
        };
    }

    /// Trial make/unmake legalisation of the root moves.
    fn legal_root_moves(&self, pos: &mut Position) -> Vec<RootMove> {
        let mut list = MoveList::new();
        movegen::generate_legal(pos, &mut list);
        list.iter()
            .map(|&mv| RootMove {
                mv,
                score: -INF,
                order: 0,
            })
            .collect()
    }

    /// One aspiration-windowed depth. On success the winning move is at the
    /// front of `roots` and its score is returned.
    fn search_root_depth(
        &mut self,
        pos: &mut Position,
        roots: &mut Vec<RootMove>,
        depth: i32,
        previous_score: i32,
    ) -> SearchOutcome<i32> {
        self.order_root_moves(pos, roots);

        let aspiration_on =
            self.cfg.use_aspiration && depth > 2 && !is_mate_score(previous_score);
        let mut delta = self.cfg.aspiration_window.max(12);
        // The open window uses INF, not VALUE_INF: a mate-in-one scores
        // exactly VALUE_INF and must not read as a fail-high.
        let (mut alpha, mut beta) = if aspiration_on {
            (
                previous_score.saturating_sub(delta).max(-INF),
                previous_score.saturating_add(delta).min(INF),
            )
        } else {
            (-INF, INF)
        };

        loop {
            let score = self.search_root_window(pos, roots, depth, alpha, beta)?;

            if score <= alpha && alpha > -INF {
                // Fail low: widen down, keep the ceiling.
                delta = delta.saturating_mul(2);
                alpha = score.saturating_sub(delta).max(-INF);
            } else if score >= beta && beta < INF {
                delta = delta.saturating_mul(2);
                beta = score.saturating_add(delta).min(INF);
            } else {
                return Ok(score);
            }

            if delta > ASPIRATION_MAX_DELTA {
                alpha = -INF;
                beta = INF;
            }
        }
    }

    /// PVS over the root moves inside one window. Moves the best move to the
    /// front on success.
    fn search_root_window(
        &mut self,
        pos: &mut Position,
        roots: &mut [RootMove],
        depth: i32,
        mut alpha: i32,
        beta: i32,
    ) -> SearchOutcome<i32> {
        let mut best_score = -INF;
        let mut best_idx = 0usize;

        for i in 0..roots.len() {
            let m = roots[i].mv;
            let mover = pos
                .board()
                .piece_on(m.from())
                .map_or(6, crate::board::Piece::index);
            let gives_check = super::is_direct_check(pos, m);
            if !pos.do_move(m) {
                continue;
            }
            self.record_step(0, m, mover);
            self.tt.prefetch(pos.hash());

            // Light reductions for late quiet root moves; never for captures,
            // promotions, or checking quiets.
            let mut reduction = 0;
            if i >= 6 && depth >= 4 && m.is_quiet() && !gives_check {
                reduction = 1;
                if i >= 16 && depth >= 7 && roots[i].order < 0 {
                    reduction = 2;
                }
            }

            let score = if i == 0 {
                -self.root_child(pos, depth - 1, -beta, -alpha)?
            } else {
                let mut s = -self.root_child(pos, depth - 1 - reduction, -alpha - 1, -alpha)?;
                if s > alpha && reduction > 0 {
                    s = -self.root_child(pos, depth - 1, -alpha - 1, -alpha)?;
                }
                if s > alpha && s < beta {
                    s = -self.root_child(pos, depth - 1, -beta, -alpha)?;
                }
                s
            };
            pos.undo_move();

            roots[i].score = score;
            if score > best_score {
                best_score = score;
                best_idx = i;
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        roots.swap(0, best_idx);
        Ok(best_score)
    }

    #[inline]
    fn root_child(
        &mut self,
        pos: &mut Position,
        depth: i32,
        alpha: i32,
        beta: i32,
    ) -> SearchOutcome<i32> {
        match self.negamax(pos, depth, alpha, beta, 1, Move::NULL) {
            Ok(score) => Ok(score),
            Err(stop) => {
                pos.undo_move();
                Err(stop)
            }
        }
    }

    /// TT best first, captures by MVV/LVA, quiets by history with threat
    /// bonuses; the previous iteration's winner stays in front.
    fn order_root_moves(&mut self, pos: &mut Position, roots: &mut Vec<RootMove>) {
        let previous_best = roots.first().map(|r| r.mv);
        let tt_move = self
            .tt
            .probe(pos.hash(), 0)
            .map_or(Move::NULL, |entry| entry.mv);

        let mut list = MoveList::new();
        for root in roots.iter() {
            list.push(root.mv);
        }
        let scored = self.order_moves(pos, &list, tt_move, 0);
        let order: std::collections::HashMap<Move, i32> = scored
            .as_slice()
            .iter()
            .map(|s| (s.mv, s.score))
            .collect();

        for root in roots.iter_mut() {
            root.order = order.get(&root.mv).copied().unwrap_or(0);
            if Some(root.mv) == previous_best {
                root.order = i32::MAX;
            }
        }
        roots.sort_by_key(|r| std::cmp::Reverse(r.order));
    }

    /// Re-score the winner (and optionally the next K-1 moves) with a full
    /// window so the reported scores are exact. The winner keeps its spot;
    /// only the runners-up are re-ranked.
    fn rescore_top_moves(&mut self, pos: &mut Position, roots: &mut [RootMove], depth: i32) {
        let k = self.cfg.full_rescore_top_k;
        if k == 0 || depth < 2 {
            return;
        }
        for i in 0..roots.len().min(k) {
            let m = roots[i].mv;
            if !pos.do_move(m) {
                continue;
            }
            let result = self.negamax(pos, depth - 1, -INF, INF, 1, Move::NULL);
            pos.undo_move();
            match result {
                Ok(score) => roots[i].score = -score,
                Err(SearchStopped) => return,
            }
        }
        if roots.len() > 2 {
            roots[1..].sort_by_key(|r| std::cmp::Reverse(r.score));
        }
    }

    /// Chase best moves through the TT, bounded and loop-protected.
    fn build_pv(&mut self, pos: &mut Position, first: Move) -> Vec<Move> {
        let mut pv = Vec::with_capacity(PV_MAX_LEN);
        let mut seen = [0u64; PV_MAX_LEN];
        let mut made = 0usize;

        if !movegen::is_legal(pos, first) || !pos.do_move(first) {
            return pv;
        }
        pv.push(first);
        made += 1;
        seen[0] = pos.hash();

        while pv.len() < PV_MAX_LEN {
            let Some(entry) = self.tt.probe(pos.hash(), 0) else {
                break;
            };
            let mv = entry.mv;
            if mv.is_null() || !movegen::is_legal(pos, mv) {
                break;
            }
            if !pos.do_move(mv) {
                break;
            }
            // A repeated key means the line cycles; stop before looping.
            if seen[..made].contains(&pos.hash()) {
                pos.undo_move();
                break;
            }
            seen[made] = pos.hash();
            made += 1;
            pv.push(mv);
        }

        for _ in 0..made {
            pos.undo_move();
        }
        pv
    }

    fn report_iteration(&mut self, depth: u32) {
        let Some(cb) = self.info_callback.clone() else {
            return;
        };
        let elapsed = self.start_time.elapsed().as_millis() as u64;
        let score = self.stats.best_score;
        let mate_in = if is_mate_score(score) {
            Some(if score > 0 {
                (MATE - score + 1) / 2
            } else {
                -((MATE + score + 1) / 2)
            })
        } else {
            None
        };
        let info = IterationInfo {
            depth,
            score,
            mate_in,
            nodes: self.stats.nodes,
            nps: if elapsed > 0 {
                self.stats.nodes * 1000 / elapsed
            } else {
                self.stats.nodes
            },
            time_ms: elapsed,
            pv: self.stats.pv.clone(),
            hashfull: self.tt.hashfull(),
        };
        cb(&info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::tt::TranspositionTable;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn run(fen: &str, depth: i32) -> Search {
        let mut pos = Position::from_fen(fen).unwrap();
        let mut search = Search::new(
            Arc::new(TranspositionTable::new(8)),
            EngineConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        search.search_root_single(&mut pos, depth, 0);
        search
    }

    #[test]
    fn finds_mate_in_one() {
        // King-and-rook ladder: Ra8 mates on the back rank.
        let fen = "4k3/8/4K3/8/8/8/8/R7 w - - 0 1";
        let search = run(fen, 2);
        let stats = search.stats();
        assert!(stats.best_score >= MATE_THR, "score {}", stats.best_score);
        let best = stats.best_move.expect("a move");
        let mut pos = Position::from_fen(fen).unwrap();
        assert!(pos.do_move(best));
        let mut replies = MoveList::new();
        movegen::generate_legal(&mut pos, &mut replies);
        assert!(pos.in_check() && replies.is_empty(), "not mate: {best}");
    }

    #[test]
    fn knight_picks_the_checking_hop() {
        // Bare knight ending: the f6 check is the standout move at depth 2.
        let search = run("4k3/8/8/8/4N3/8/8/4K3 w - - 0 1", 2);
        let best = search.stats().best_move.expect("a move").to_string();
        assert_eq!(best, "e4f6");
    }

    #[test]
    fn stalemate_position_reports_no_move() {
        // Black to move, classic stalemate corner.
        let search = run("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3);
        assert!(search.stats().best_move.is_none());
        assert_eq!(search.stats().best_score, 0);
    }

    #[test]
    fn mated_position_reports_mated_score() {
        // Back-rank mate already delivered.
        let search = run("R3k3/8/4K3/8/8/8/8/8 b - - 0 1", 2);
        assert!(search.stats().best_move.is_none());
        assert!(search.stats().best_score <= -MATE_THR);
    }

    #[test]
    fn pv_starts_with_best_move() {
        let search = run("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 4);
        let stats = search.stats();
        let best = stats.best_move.expect("a move");
        assert!(!stats.pv.is_empty());
        assert_eq!(stats.pv[0], best);
        assert!(stats.pv.len() <= 16);
        assert!(!stats.top_moves.is_empty());
        assert_eq!(stats.top_moves[0].0, best);
    }
}

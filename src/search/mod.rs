//! Alpha-beta search: iterative deepening, negamax with the pruning and
//! reduction suite, quiescence, and the Lazy-SMP driver.

pub mod constants;
mod negamax;
mod ordering;
mod quiescence;
mod root;
mod smp;
mod tables;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::board::{Move, Position};
use crate::config::EngineConfig;
use crate::eval::Evaluator;
use crate::tt::TranspositionTable;

use constants::MAX_PLY;
use tables::HeuristicTables;

pub use root::IterationInfo;
pub use smp::search_root_lazy_smp;

/// The cooperative stop signal, propagated from the innermost node back to
/// the root through `Result`.
#[derive(Debug, Clone, Copy)]
pub struct SearchStopped;

pub(crate) type SearchOutcome<T> = Result<T, SearchStopped>;

/// Nodes between stop-flag checks and shared-counter flushes.
const TICK_STEP: u64 = 1024;

/// What one finished search reports.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub elapsed_ms: u64,
    pub nps: u64,
    pub depth: u32,
    pub best_score: i32,
    pub best_move: Option<Move>,
    /// Principal variation, at most 16 moves.
    pub pv: Vec<Move>,
    /// Exact-scored root moves, best first.
    pub top_moves: Vec<(Move, i32)>,
}

/// Callback invoked after every completed iteration (for `info` output).
pub type InfoCallback = Arc<dyn Fn(&IterationInfo) + Send + Sync>;

/// One search instance per thread: owns the evaluator, the heuristic tables
/// and the per-path scratch state; shares only the transposition table, the
/// stop flag and the node counter.
pub struct Search {
    pub(crate) tt: Arc<TranspositionTable>,
    pub(crate) cfg: EngineConfig,
    pub(crate) eval: Evaluator,
    pub(crate) tables: HeuristicTables,
    pub(crate) stats: SearchStats,

    stop: Arc<AtomicBool>,
    shared_nodes: Arc<AtomicU64>,
    node_limit: u64,
    tick: u64,
    thread_id: usize,

    /// Moves played on the current path, by ply. Null entries mark null moves.
    pub(crate) prev_move: [Move; MAX_PLY],
    /// Mover piece index per ply; 6 = none.
    pub(crate) prev_piece: [u8; MAX_PLY],
    /// Static evaluations along the path, for the "improving" signal.
    pub(crate) static_stack: [i32; MAX_PLY],

    pub(crate) start_time: Instant,
    pub(crate) info_callback: Option<InfoCallback>,
}

impl Search {
    #[must_use]
    pub fn new(tt: Arc<TranspositionTable>, cfg: EngineConfig, stop: Arc<AtomicBool>) -> Self {
        Search {
            tt,
            cfg,
            eval: Evaluator::new(),
            tables: HeuristicTables::new(),
            stats: SearchStats::default(),
            stop,
            shared_nodes: Arc::new(AtomicU64::new(0)),
            node_limit: 0,
            tick: 0,
            thread_id: 0,
            prev_move: [Move::NULL; MAX_PLY],
            prev_piece: [6; MAX_PLY],
            static_stack: [0; MAX_PLY],
            start_time: Instant::now(),
            info_callback: None,
        }
    }

    /// Helper-thread constructor: shares the node counter and copies the main
    /// thread's statistical tables.
    #[must_use]
    pub(crate) fn new_helper(
        tt: Arc<TranspositionTable>,
        cfg: EngineConfig,
        stop: Arc<AtomicBool>,
        shared_nodes: Arc<AtomicU64>,
        thread_id: usize,
        main_tables: &HeuristicTables,
    ) -> Self {
        let mut search = Search::new(tt, cfg, stop);
        search.shared_nodes = shared_nodes;
        search.thread_id = thread_id;
        search.tables.copy_stats_from(main_tables);
        search
    }

    pub fn set_info_callback(&mut self, cb: Option<InfoCallback>) {
        self.info_callback = cb;
    }

    /// Swap in a freshly sized transposition table.
    pub fn set_tt(&mut self, tt: Arc<TranspositionTable>) {
        self.tt = tt;
    }

    /// Adopt updated engine settings for the next search.
    pub fn set_config(&mut self, cfg: EngineConfig) {
        self.cfg = cfg;
    }

    #[must_use]
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub(crate) fn shared_nodes_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.shared_nodes)
    }

    pub(crate) fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Reset per-search state. The heuristic tables persist between searches
    /// (they decay instead), the evaluator re-reads the parameter table.
    pub(crate) fn begin_search(&mut self, node_limit: u64) {
        self.stats = SearchStats::default();
        self.node_limit = node_limit;
        self.tick = 0;
        // Only the main thread owns the shared counter's lifecycle; helpers
        // join an already-running count.
        if self.thread_id == 0 {
            self.shared_nodes.store(0, Ordering::Relaxed);
        }
        self.prev_move = [Move::NULL; MAX_PLY];
        self.prev_piece = [6; MAX_PLY];
        self.static_stack = [0; MAX_PLY];
        self.start_time = Instant::now();
        self.eval.refresh_params();
    }

    /// Clear every learned table; used by `ucinewgame`.
    pub fn clear_state(&mut self) {
        self.tables.clear();
        self.eval.clear_caches();
    }

    /// Count a node and, every `TICK_STEP` nodes, flush the batch to the
    /// shared counter and observe the stop flag and node budget.
    #[inline]
    pub(crate) fn tick_node(&mut self) -> SearchOutcome<()> {
        self.stats.nodes += 1;
        self.tick += 1;
        if self.tick & (TICK_STEP - 1) != 0 {
            return Ok(());
        }

        let total = self
            .shared_nodes
            .fetch_add(TICK_STEP, Ordering::Relaxed)
            .wrapping_add(TICK_STEP);
        if self.node_limit > 0 && total >= self.node_limit {
            self.stop.store(true, Ordering::Relaxed);
            return Err(SearchStopped);
        }
        if self.stop.load(Ordering::Relaxed) {
            return Err(SearchStopped);
        }
        Ok(())
    }

    /// Push the unflushed node remainder to the shared counter; called on
    /// every exit path from the root so cancelled searches still count.
    pub(crate) fn flush_ticks(&mut self) {
        let rem = self.tick & (TICK_STEP - 1);
        if rem != 0 {
            self.shared_nodes.fetch_add(rem, Ordering::Relaxed);
            self.tick = 0;
        }
    }

    #[inline]
    pub(crate) fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Record the path step taken at `ply`.
    #[inline]
    pub(crate) fn record_step(&mut self, ply: usize, m: Move, piece_idx: usize) {
        if ply < MAX_PLY {
            self.prev_move[ply] = m;
            self.prev_piece[ply] = piece_idx as u8;
        }
    }

    /// The (move, piece index) pair played `back` plies above, when any.
    #[inline]
    pub(crate) fn step_before(&self, ply: usize, back: usize) -> Option<(Move, usize)> {
        if back == 0 || ply < back {
            return None;
        }
        let m = self.prev_move[ply - back];
        if m.is_null() {
            return None;
        }
        Some((m, self.prev_piece[ply - back] as usize))
    }
}

/// Does `m` deliver a direct check? Discovered checks are not detected; the
/// caller treats this as an ordering and pruning hint, the authoritative
/// answer comes from `do_move`.
pub(crate) fn is_direct_check(pos: &Position, m: Move) -> bool {
    use crate::board::attack_tables::{bishop_attacks, knight_attacks, pawn_attacks, rook_attacks};
    use crate::board::Piece;

    let board = pos.board();
    let us = pos.side_to_move();
    let Some((_, piece)) = board.piece_at(m.from()) else {
        return false;
    };
    let king = board.king_square(!us).index();
    let to = m.to().index();
    let occ_after =
        (board.occupied().0 ^ (1u64 << m.from().index())) | (1u64 << to);

    let piece = m.promotion_piece().unwrap_or(piece);
    match piece {
        Piece::Pawn => pawn_attacks(us.index(), to) & (1u64 << king) != 0,
        Piece::Knight => knight_attacks(to) & (1u64 << king) != 0,
        Piece::Bishop => bishop_attacks(to, occ_after) & (1u64 << king) != 0,
        Piece::Rook => rook_attacks(to, occ_after) & (1u64 << king) != 0,
        Piece::Queen => {
            (bishop_attacks(to, occ_after) | rook_attacks(to, occ_after)) & (1u64 << king) != 0
        }
        Piece::King => false,
    }
}

/// Quiet push of a passed pawn beyond the midline; used for ordering bonuses
/// and the passed-pawn extension.
pub(crate) fn is_advanced_passer_push(pos: &Position, m: Move) -> bool {
    use crate::board::{Piece, FILES};

    if m.is_capture() || m.is_promotion() {
        return false;
    }
    let board = pos.board();
    let us = pos.side_to_move();
    if board.piece_on(m.from()) != Some(Piece::Pawn) {
        return false;
    }
    let to = m.to();
    let white = us.is_white();
    let rel_rank = if white { to.rank() } else { 7 - to.rank() };
    if rel_rank < 4 {
        return false;
    }

    // Passed: no enemy pawn ahead on this or an adjacent file.
    let their_pawns = board.pieces(!us, Piece::Pawn).0;
    let file = to.file();
    let mut files = FILES[file];
    if file > 0 {
        files |= FILES[file - 1];
    }
    if file < 7 {
        files |= FILES[file + 1];
    }
    let ahead = if white {
        if to.rank() >= 7 {
            0
        } else {
            !0u64 << ((to.rank() + 1) * 8)
        }
    } else if to.rank() == 0 {
        0
    } else {
        (1u64 << (to.rank() * 8)) - 1
    };
    their_pawns & files & ahead == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_check_detection() {
        let pos = Position::from_fen("4k3/8/8/8/4N3/8/8/4K3 w - - 0 1").unwrap();
        let fork = Move::quiet(
            crate::board::Square::new(3, 4),
            crate::board::Square::new(5, 5),
        );
        assert!(is_direct_check(&pos, fork));
        let quiet = Move::quiet(
            crate::board::Square::new(3, 4),
            crate::board::Square::new(2, 2),
        );
        assert!(!is_direct_check(&pos, quiet));
    }

    #[test]
    fn advanced_passer_push_detection() {
        let pos = Position::from_fen("4k3/8/8/3P4/8/8/6P1/4K3 w - - 0 1").unwrap();
        let push = Move::quiet(
            crate::board::Square::new(4, 3),
            crate::board::Square::new(5, 3),
        );
        assert!(is_advanced_passer_push(&pos, push));
        let early = Move::quiet(
            crate::board::Square::new(1, 6),
            crate::board::Square::new(2, 6),
        );
        assert!(!is_advanced_passer_push(&pos, early));
    }
}

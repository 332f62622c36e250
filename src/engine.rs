//! Engine facade: the thin surface the UCI front end (or any other
//! collaborator) talks to. Set a position, start a search with a derived
//! think budget, cancel it, query game results.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::board::{movegen, parse_uci_move, FenError, Move, MoveList, MoveParseError, Position};
use crate::config::EngineConfig;
use crate::search::{search_root_lazy_smp, InfoCallback, Search, SearchStats};
use crate::tt::TranspositionTable;

/// Budget used for `go infinite` / `go ponder`: cancellation is the only
/// terminator.
const UNBOUNDED_BUDGET_MS: u64 = 1_000_000_000;

/// Limits parsed from a `go` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoLimits {
    pub depth: Option<i32>,
    pub movetime_ms: Option<u64>,
    pub wtime_ms: Option<u64>,
    pub btime_ms: Option<u64>,
    pub winc_ms: Option<u64>,
    pub binc_ms: Option<u64>,
    pub movestogo: Option<u32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
}

/// Outcome of a finished search.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub best_move: Option<Move>,
    pub ponder_move: Option<Move>,
    pub stats: SearchStats,
}

/// How the game stands in the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Ongoing,
    Checkmate,
    Stalemate,
    DrawFiftyMove,
    DrawRepetition,
    DrawInsufficientMaterial,
}

pub struct Engine {
    position: Position,
    cfg: EngineConfig,
    tt: Arc<TranspositionTable>,
    search: Search,
    stop: Arc<AtomicBool>,
    /// Monotonic search id; stale budget timers check it before firing.
    search_serial: Arc<AtomicU64>,
}

impl Engine {
    #[must_use]
    pub fn new(cfg: EngineConfig) -> Self {
        crate::board::attack_tables::init();
        let tt = Arc::new(TranspositionTable::new(cfg.tt_size_mb));
        let stop = Arc::new(AtomicBool::new(false));
        let search = Search::new(Arc::clone(&tt), cfg.clone(), Arc::clone(&stop));
        Engine {
            position: Position::startpos(),
            cfg,
            tt,
            search,
            stop,
            search_serial: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// The flag that cancels a running search; safe to clone out and set
    /// from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn set_info_callback(&mut self, cb: Option<InfoCallback>) {
        self.search.set_info_callback(cb);
    }

    /// Apply new settings. Resizes the transposition table when the hash
    /// size changed; not legal while a search is running.
    pub fn apply_config(&mut self, cfg: EngineConfig) {
        if cfg.tt_size_mb != self.cfg.tt_size_mb {
            self.tt = Arc::new(TranspositionTable::new(cfg.tt_size_mb));
            self.search.set_tt(Arc::clone(&self.tt));
        }
        self.cfg = cfg.clone();
        self.search.set_config(cfg);
    }

    /// Reset the game state for a new game; engine settings stay.
    pub fn new_game(&mut self) {
        self.position = Position::startpos();
        self.tt.clear();
        self.search.clear_state();
    }

    /// Load a FEN (or the start position when `None`).
    pub fn set_position(&mut self, fen: Option<&str>) -> Result<(), FenError> {
        self.position = match fen {
            Some(fen) => Position::from_fen(fen)?,
            None => Position::startpos(),
        };
        Ok(())
    }

    /// Play one UCI move on the internal position.
    pub fn apply_move(&mut self, uci: &str) -> Result<(), MoveParseError> {
        let m = parse_uci_move(&mut self.position, uci)?;
        if !self.position.do_move(m) {
            return Err(MoveParseError::IllegalMove {
                notation: uci.to_string(),
            });
        }
        Ok(())
    }

    /// Cancel a running search.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Derive the think budget in milliseconds; `None` means no time limit.
    #[must_use]
    pub fn think_budget_ms(&self, limits: &GoLimits) -> Option<u64> {
        if let Some(movetime) = limits.movetime_ms {
            return Some(movetime);
        }
        if limits.infinite || limits.ponder {
            return Some(UNBOUNDED_BUDGET_MS);
        }
        let (time, inc) = if self.position.side_to_move().is_white() {
            (limits.wtime_ms, limits.winc_ms.unwrap_or(0))
        } else {
            (limits.btime_ms, limits.binc_ms.unwrap_or(0))
        };
        let remaining = time?;
        let moves_to_go = u64::from(limits.movestogo.unwrap_or(30).max(1));
        let budget = remaining / moves_to_go + inc;
        Some(budget.saturating_sub(self.cfg.move_overhead_ms).max(1))
    }

    /// Run a search under `limits` and return the result. Blocks until the
    /// search finishes; cancellation comes through the stop flag.
    pub fn find_best_move(&mut self, limits: &GoLimits) -> SearchReport {
        let serial = self.search_serial.fetch_add(1, Ordering::Relaxed) + 1;
        self.stop.store(false, Ordering::Relaxed);

        // The budget timer shares the cancel path: timeout and `stop` are the
        // same mechanism. A stale timer from an earlier search is ignored by
        // the serial check. Unbounded budgets need no timer at all.
        match self.think_budget_ms(limits) {
            Some(budget) if budget < UNBOUNDED_BUDGET_MS => {
                let stop = Arc::clone(&self.stop);
                let serial_ref = Arc::clone(&self.search_serial);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(budget));
                    if serial_ref.load(Ordering::Relaxed) == serial {
                        stop.store(true, Ordering::Relaxed);
                    }
                });
            }
            _ => {}
        }

        let max_depth = limits.depth.unwrap_or(self.cfg.max_depth).max(1);
        let max_nodes = limits.nodes.unwrap_or(self.cfg.max_nodes);
        let threads = self.cfg.effective_threads();

        #[cfg(feature = "logging")]
        log::debug!(
            "search start: depth {max_depth}, threads {threads}, nodes {max_nodes}, fen {}",
            self.position.to_fen()
        );

        let stats = search_root_lazy_smp(
            &mut self.search,
            &self.position,
            max_depth,
            threads,
            max_nodes,
        );

        #[cfg(feature = "logging")]
        log::debug!(
            "search done: depth {}, score {}, {} nodes in {} ms",
            stats.depth,
            stats.best_score,
            stats.nodes,
            stats.elapsed_ms
        );

        // Invalidate the timer and leave the flag clean for the next search.
        self.search_serial.fetch_add(1, Ordering::Relaxed);

        let ponder_move = stats.best_move.and_then(|best| self.ponder_from_tt(best));
        SearchReport {
            best_move: stats.best_move,
            ponder_move,
            stats,
        }
    }

    /// Best-effort ponder move: the TT's reply to our chosen move.
    fn ponder_from_tt(&mut self, best: Move) -> Option<Move> {
        if !self.position.do_move(best) {
            return None;
        }
        let reply = self
            .tt
            .probe(self.position.hash(), 0)
            .map(|entry| entry.mv)
            .filter(|mv| !mv.is_null() && movegen::is_legal(&mut self.position, *mv));
        self.position.undo_move();
        reply
    }

    /// Game status of the current position.
    #[must_use]
    pub fn game_result(&mut self) -> GameResult {
        let mut moves = MoveList::new();
        movegen::generate_legal(&mut self.position, &mut moves);
        if moves.is_empty() {
            return if self.position.in_check() {
                GameResult::Checkmate
            } else {
                GameResult::Stalemate
            };
        }
        if self.position.is_fifty_move_draw() {
            GameResult::DrawFiftyMove
        } else if self.position.is_repetition_draw() {
            GameResult::DrawRepetition
        } else if self.position.is_insufficient_material() {
            GameResult::DrawInsufficientMaterial
        } else {
            GameResult::Ongoing
        }
    }
}

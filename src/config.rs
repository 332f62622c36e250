//! Engine configuration: every heuristic toggle and tunable threshold the
//! UCI option table exposes.

/// Search and engine settings. The UCI handler mutates a copy and hands it to
/// the facade; the search reads it immutably for the whole search.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Iterative-deepening ceiling.
    pub max_depth: i32,
    /// Node cap per search; 0 disables.
    pub max_nodes: u64,
    /// Transposition table size in MiB.
    pub tt_size_mb: usize,
    /// Worker threads; 0 means hardware threads minus one.
    pub threads: usize,

    pub use_null_move: bool,
    pub use_lmr: bool,
    pub use_aspiration: bool,
    pub aspiration_window: i32,
    pub use_lmp: bool,
    pub use_iid: bool,
    pub use_singular_ext: bool,
    pub lmp_depth_max: i32,
    pub lmp_base: i32,
    pub use_futility: bool,
    pub futility_margin: i32,
    pub use_reverse_futility: bool,
    pub use_see_pruning: bool,
    pub use_prob_cut: bool,
    pub qsearch_quiet_checks: bool,

    pub lmr_base: i32,
    pub lmr_max: i32,
    pub lmr_use_history: bool,
    /// After the winning iteration, re-score this many root moves with a full
    /// window for exact reporting. 0 = none, 1 = winner only.
    pub full_rescore_top_k: usize,

    /// Milliseconds subtracted from every allocated think budget.
    pub move_overhead_ms: u64,
    /// Accept `go ponder` without a dedicated ponder search.
    pub ponder: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: 64,
            max_nodes: 0,
            tt_size_mb: 64,
            threads: 1,
            use_null_move: true,
            use_lmr: true,
            use_aspiration: true,
            aspiration_window: 20,
            use_lmp: true,
            use_iid: true,
            use_singular_ext: true,
            lmp_depth_max: 3,
            lmp_base: 2,
            use_futility: true,
            futility_margin: 125,
            use_reverse_futility: true,
            use_see_pruning: true,
            use_prob_cut: true,
            qsearch_quiet_checks: true,
            lmr_base: 1,
            lmr_max: 3,
            lmr_use_history: true,
            full_rescore_top_k: 4,
            move_overhead_ms: 30,
            ponder: false,
        }
    }
}

impl EngineConfig {
    /// Resolve the worker count: 0 means all hardware threads but one.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        }
    }
}

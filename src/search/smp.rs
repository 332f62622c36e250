//! Lazy-SMP driver.
//!
//! Helpers run the same iterative deepening on their own position copies and
//! heuristic tables; coordination happens only through the shared
//! transposition table, the stop flag and the relaxed node counter. When the
//! main thread finishes it raises the stop flag, joins the helpers, and folds
//! their history tables back into its own.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::board::Position;
use crate::thread_pool;

use super::{Search, SearchStats};

/// Run a parallel search on `search` (the main thread's instance) with
/// `threads` workers in total. Returns the main thread's stats; helper
/// heuristics are EMA-merged into `search` before returning. The stop flag
/// is the one `search` was constructed with.
pub fn search_root_lazy_smp(
    search: &mut Search,
    pos: &Position,
    max_depth: i32,
    threads: usize,
    max_nodes: u64,
) -> SearchStats {
    let threads = threads.max(1);
    let stop = search.stop_handle();

    search.tt.new_generation();
    search.begin_search(max_nodes);

    if threads == 1 {
        let mut root = pos.clone();
        search.iterate(&mut root, max_depth);
        return search.stats.clone();
    }

    // Helpers share the TT, the stop flag and the node counter; each gets a
    // copy of the main thread's statistical tables and its own Position.
    let mut handles = Vec::with_capacity(threads - 1);
    for helper_id in 1..threads {
        let tt = Arc::clone(&search.tt);
        let cfg = search.cfg.clone();
        let stop_flag = Arc::clone(&stop);
        let nodes = search.shared_nodes_handle();
        let mut helper = Search::new_helper(tt, cfg, stop_flag, nodes, helper_id, &search.tables);
        // Helper node accounting flows through the shared counter; the limit
        // is enforced there for every thread alike.
        let mut helper_pos = pos.clone();

        handles.push(thread_pool::global().execute(move || {
            helper.begin_search(max_nodes);
            // Keep the shared counter: begin_search must not detach it.
            helper.iterate(&mut helper_pos, max_depth);
            helper
        }));
    }

    let mut root = pos.clone();
    search.iterate(&mut root, max_depth);

    // The main thread is done: release the helpers promptly.
    stop.store(true, Ordering::Relaxed);

    for handle in handles {
        if let Some(helper) = handle.join() {
            search.tables.merge_from(&helper.tables);
        }
    }

    // Report the aggregate node count; per-thread counts are best-effort.
    search.stats.nodes = search
        .shared_nodes_handle()
        .load(Ordering::Relaxed)
        .max(search.stats.nodes);

    search.stats.clone()
}

//! End-to-end search behavior: mates, tactics, node limits, determinism,
//! and shared-table coherence under threads.

use std::sync::atomic::Ordering;

use sable::board::movegen;
use sable::search::constants::MATE_THR;
use sable::{Engine, EngineConfig, GoLimits, MoveList, Position};

fn engine() -> Engine {
    Engine::new(EngineConfig {
        tt_size_mb: 8,
        ..EngineConfig::default()
    })
}

fn depth_limits(depth: i32) -> GoLimits {
    GoLimits {
        depth: Some(depth),
        ..GoLimits::default()
    }
}

#[test]
fn mate_in_one_is_found_and_scored_as_mate() {
    let mut engine = engine();
    engine
        .set_position(Some("4k3/8/4K3/8/8/8/8/R7 w - - 0 1"))
        .unwrap();
    let report = engine.find_best_move(&depth_limits(2));

    assert!(
        report.stats.best_score >= MATE_THR,
        "score {} is not a mate score",
        report.stats.best_score
    );
    let best = report.best_move.expect("a best move");

    // The chosen move must actually deliver mate.
    let mut pos = Position::from_fen("4k3/8/4K3/8/8/8/8/R7 w - - 0 1").unwrap();
    assert!(pos.do_move(best));
    let mut replies = MoveList::new();
    movegen::generate_legal(&mut pos, &mut replies);
    assert!(pos.in_check());
    assert!(replies.is_empty(), "{best} is not mate");
}

#[test]
fn knight_check_is_preferred_in_bare_fork_position() {
    // The knight hop to f6 with check is the standout move.
    let mut engine = engine();
    engine
        .set_position(Some("4k3/8/8/8/4N3/8/8/4K3 w - - 0 1"))
        .unwrap();
    let report = engine.find_best_move(&depth_limits(2));
    assert_eq!(report.best_move.expect("a move").to_string(), "e4f6");
}

#[test]
fn node_limited_search_is_deterministic() {
    let fen = "4k3/8/8/8/8/8/8/4K3 w - - 0 1";
    let run = || {
        let mut engine = engine();
        engine.set_position(Some(fen)).unwrap();
        let report = engine.find_best_move(&GoLimits {
            nodes: Some(128),
            depth: Some(30),
            ..GoLimits::default()
        });
        report.stats.nodes
    };
    assert_eq!(run(), run(), "node counts differ between identical runs");
}

#[test]
fn finishing_under_the_node_limit_leaves_stop_unset() {
    let mut engine = engine();
    engine
        .set_position(Some("4k3/8/8/8/8/8/8/4K3 w - - 0 1"))
        .unwrap();
    let stop = engine.stop_handle();
    let report = engine.find_best_move(&GoLimits {
        nodes: Some(100_000_000),
        depth: Some(2),
        ..GoLimits::default()
    });
    assert!(report.best_move.is_some());
    assert!(
        !stop.load(Ordering::Relaxed),
        "stop flag raised although the budget was never exhausted"
    );
}

#[test]
fn search_scores_stay_in_the_mate_range() {
    let mut engine = engine();
    engine
        .set_position(Some("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4"))
        .unwrap();
    let report = engine.find_best_move(&depth_limits(4));
    let score = report.stats.best_score;
    assert!(score.abs() < MATE_THR, "non-mate position scored {score}");
    assert!(report.best_move.is_some());
}

#[test]
fn repetition_shuffle_scores_as_draw() {
    // A rook shuffle repeated twice: the search must see the draw coming.
    let mut engine = engine();
    engine
        .set_position(Some("4k3/8/8/8/8/8/8/R3K3 w - - 0 1"))
        .unwrap();
    for mv in ["a1b1", "e8d8", "b1a1", "d8e8", "a1b1", "e8d8", "b1a1"] {
        engine.apply_move(mv).unwrap();
    }
    // Black to move; returning the king repeats the position a third time.
    let report = engine.find_best_move(&depth_limits(4));
    assert!(report.best_move.is_some());
    assert_eq!(report.stats.best_score, 0, "draw not recognised");
}

#[test]
fn captures_win_material_at_shallow_depth() {
    // White wins a clean rook with a pawn capture.
    let mut engine = engine();
    engine
        .set_position(Some("4k3/8/8/3r4/4P3/8/8/R3K3 w - - 0 1"))
        .unwrap();
    let report = engine.find_best_move(&depth_limits(4));
    assert_eq!(report.best_move.expect("a move").to_string(), "e4d5");
    assert!(report.stats.best_score > 300);
}

#[test]
fn four_threads_share_the_table_coherently() {
    // Repeated SMP searches must stay legal and self-consistent; torn TT
    // pairs would surface as illegal best moves.
    let mut cfg = EngineConfig::default();
    cfg.threads = 4;
    cfg.tt_size_mb = 8;
    let mut engine = Engine::new(cfg);
    engine.set_position(None).unwrap();

    for _ in 0..3 {
        let report = engine.find_best_move(&depth_limits(6));
        let best = report.best_move.expect("a move");
        let mut pos = Position::startpos();
        let mut list = MoveList::new();
        movegen::generate_legal(&mut pos, &mut list);
        assert!(list.contains(best), "illegal best move {best}");
        assert!(report.stats.best_score.abs() < MATE_THR);
    }
}

#[test]
fn cancelled_search_still_reports_a_move() {
    let mut engine = engine();
    engine.set_position(None).unwrap();
    let stop = engine.stop_handle();

    // Let the timer thread cancel us almost immediately.
    let report = engine.find_best_move(&GoLimits {
        movetime_ms: Some(30),
        depth: Some(64),
        ..GoLimits::default()
    });
    assert!(stop.load(Ordering::Relaxed));
    assert!(report.best_move.is_some(), "best-so-far lost on cancel");
}

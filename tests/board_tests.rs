//! Position-level invariants: make/unmake restoration, hashing, castling,
//! and the draw rules.

use sable::board::movegen;
use sable::{Move, MoveList, Position};

fn legal(pos: &mut Position) -> Vec<Move> {
    let mut list = MoveList::new();
    movegen::generate_legal(pos, &mut list);
    list.iter().copied().collect()
}

fn find(pos: &mut Position, uci: &str) -> Move {
    *legal(pos)
        .iter()
        .find(|m| m.to_string() == uci)
        .unwrap_or_else(|| panic!("{uci} not legal"))
}

#[test]
fn do_undo_restores_everything_along_a_game() {
    let mut pos = Position::startpos();
    let line = [
        "e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4", "f3d4", "g8f6", "b1c3", "a7a6",
        "c1e3", "e7e6", "f2f3", "b7b5", "d1d2", "f8e7", "e1c1",
    ];

    let mut fens = vec![pos.to_fen()];
    let mut hashes = vec![pos.hash()];
    for uci in line {
        let m = find(&mut pos, uci);
        assert!(pos.do_move(m));
        assert_eq!(pos.hash(), pos.compute_hash(), "incremental hash after {uci}");
        assert_eq!(
            pos.pawn_hash(),
            pos.compute_pawn_hash(),
            "pawn hash after {uci}"
        );
        fens.push(pos.to_fen());
        hashes.push(pos.hash());
    }

    for i in (0..line.len()).rev() {
        pos.undo_move();
        assert_eq!(pos.to_fen(), fens[i], "fen restored at ply {i}");
        assert_eq!(pos.hash(), hashes[i], "hash restored at ply {i}");
    }
    assert_eq!(pos.ply_count(), 0);
}

#[test]
fn all_four_castles_available_and_reversible() {
    let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
    let mut pos = Position::from_fen(fen).unwrap();
    let moves = legal(&mut pos);
    let castles: Vec<String> = moves
        .iter()
        .filter(|m| m.is_castle())
        .map(ToString::to_string)
        .collect();
    assert!(castles.contains(&"e1g1".to_string()));
    assert!(castles.contains(&"e1c1".to_string()));

    let mut black = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
    let black_castles: Vec<String> = legal(&mut black)
        .iter()
        .filter(|m| m.is_castle())
        .map(ToString::to_string)
        .collect();
    assert!(black_castles.contains(&"e8g8".to_string()));
    assert!(black_castles.contains(&"e8c8".to_string()));

    // O-O round trip restores the position bit-identically.
    let before_fen = pos.to_fen();
    let before_hash = pos.hash();
    let oo = find(&mut pos, "e1g1");
    assert!(pos.do_move(oo));
    assert_eq!(pos.castling_rights() & 0b0011, 0, "white rights spent");
    pos.undo_move();
    assert_eq!(pos.to_fen(), before_fen);
    assert_eq!(pos.hash(), before_hash);
}

#[test]
fn mover_is_never_in_check_after_do_move() {
    let mut pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    let us = pos.side_to_move();
    for m in legal(&mut pos) {
        assert!(pos.do_move(m));
        let king = pos.board().king_square(us);
        assert!(
            !pos.board().is_square_attacked(king, pos.side_to_move()),
            "king hangs after {m}"
        );
        pos.undo_move();
    }
}

#[test]
fn fifty_move_rule() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/4KR2 w - - 99 80").unwrap();
    assert!(!pos.is_fifty_move_draw());
    let mut pos = pos;
    let m = find(&mut pos, "f1f2");
    assert!(pos.do_move(m));
    assert!(pos.is_fifty_move_draw());
}

#[test]
fn threefold_repetition() {
    let mut pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
    // Shuffle the rook and the black king twice around the same square.
    for uci in [
        "a1b1", "e8d8", "b1a1", "d8e8", // first return
        "a1b1", "e8d8", "b1a1", "d8e8", // second return
    ] {
        assert!(!pos.is_repetition_draw(), "premature draw before {uci}");
        let m = find(&mut pos, uci);
        assert!(pos.do_move(m));
    }
    assert!(pos.is_repetition_draw());
    assert!(pos.has_repeated());
}

#[test]
fn insufficient_material_cases() {
    let draw_fens = [
        "4k3/8/8/8/8/8/8/4K3 w - - 0 1",        // KK
        "4k3/8/8/8/8/8/8/4KB2 w - - 0 1",       // KBK
        "4k3/8/8/8/8/8/8/4KN2 w - - 0 1",       // KNK
        "3bk3/8/8/8/8/8/8/2B1K3 w - - 0 1",     // same-colored bishops
        "4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1",     // KNN vs K
    ];
    for fen in draw_fens {
        let pos = Position::from_fen(fen).unwrap();
        assert!(pos.is_insufficient_material(), "{fen}");
    }

    let live_fens = [
        "4k3/8/8/8/8/8/8/3QK3 w - - 0 1",
        "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        "2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1", // opposite-colored bishops
    ];
    for fen in live_fens {
        let pos = Position::from_fen(fen).unwrap();
        assert!(!pos.is_insufficient_material(), "{fen}");
    }
}

#[test]
fn capture_moves_point_at_enemies() {
    let mut pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 0 1")
            .unwrap();
    let ep = pos.en_passant();
    for m in legal(&mut pos) {
        if !m.is_capture() {
            continue;
        }
        if m.is_en_passant() {
            assert_eq!(Some(m.to()), ep);
        } else {
            let victim = pos.board().piece_at(m.to());
            assert!(victim.is_some(), "capture {m} targets empty square");
        }
    }
}

#[test]
fn fen_round_trips_through_moves() {
    let mut pos = Position::startpos();
    for uci in ["d2d4", "g8f6", "c2c4", "e7e6", "g2g3", "d7d5"] {
        let m = find(&mut pos, uci);
        assert!(pos.do_move(m));
        let reloaded = Position::from_fen(&pos.to_fen()).unwrap();
        assert_eq!(reloaded.hash(), pos.hash());
        assert_eq!(reloaded.to_fen(), pos.to_fen());
    }
}

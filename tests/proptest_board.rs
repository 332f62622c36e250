//! Property tests: random legal walks preserve every incremental invariant.

use proptest::prelude::*;

use sable::board::movegen;
use sable::{MoveList, Position};

/// Play up to `plies` random legal moves, checking the incremental state
/// against the from-scratch computation after every step.
fn random_walk(seed_moves: &[u8], start_fen: &str) {
    let mut pos = Position::from_fen(start_fen).unwrap();
    let mut fens = vec![pos.to_fen()];

    for &choice in seed_moves {
        let mut list = MoveList::new();
        movegen::generate_legal(&mut pos, &mut list);
        if list.is_empty() {
            break;
        }
        let m = list.as_slice()[choice as usize % list.len()];
        assert!(pos.do_move(m), "legal move {m} rejected");

        assert_eq!(pos.hash(), pos.compute_hash(), "hash drift after {m}");
        assert_eq!(
            pos.pawn_hash(),
            pos.compute_pawn_hash(),
            "pawn hash drift after {m}"
        );
        fens.push(pos.to_fen());
    }

    // Unwind completely; every stored FEN must come back in reverse order.
    while pos.ply_count() > 0 {
        pos.undo_move();
        fens.pop();
        assert_eq!(pos.to_fen(), *fens.last().unwrap());
    }
    assert_eq!(pos.to_fen(), start_fen);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_walk_from_startpos(moves in prop::collection::vec(any::<u8>(), 0..60)) {
        random_walk(&moves, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
    }

    #[test]
    fn random_walk_from_kiwipete(moves in prop::collection::vec(any::<u8>(), 0..40)) {
        random_walk(
            &moves,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        );
    }

    #[test]
    fn random_walk_from_endgame(moves in prop::collection::vec(any::<u8>(), 0..60)) {
        random_walk(&moves, "8/5k2/5p2/pp6/2pB4/P1P3K1/1n1r1P2/1R6 b - - 8 49");
    }
}

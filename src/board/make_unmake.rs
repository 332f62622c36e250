//! Transactional move make/unmake with incremental hash and accumulator
//! maintenance.
//!
//! `do_move` either applies the move completely or (for malformed input and
//! moves that leave the own king in check) unwinds every change and returns
//! false. The search relies on this: pseudo-legal moves go straight in and
//! the return value is the legality check.

use super::position::{NullInfo, Position, StateInfo};
use super::types::{CastleSide, Color, Move, Piece, Square, CASTLE_KEEP, RANK_1, RANK_8};
use super::zobrist::{castling_key, ep_key, piece_key, side_key};

impl Position {
    /// Apply `m`. Returns false and leaves the position untouched when the
    /// move is malformed or exposes the mover's king.
    #[must_use]
    pub fn do_move(&mut self, m: Move) -> bool {
        let us = self.state.side_to_move;
        let them = !us;
        let from = m.from();
        let to = m.to();

        if m.is_null() {
            return false;
        }
        let Some((mover_color, piece)) = self.board.piece_at(from) else {
            return false;
        };
        if mover_color != us {
            return false;
        }
        if m.is_promotion() {
            let promo_rank = if us.is_white() { RANK_8 } else { RANK_1 };
            if piece != Piece::Pawn || (1u64 << to.index()) & promo_rank == 0 {
                return false;
            }
        }
        if m.is_en_passant() && (piece != Piece::Pawn || self.state.en_passant != Some(to)) {
            return false;
        }
        if m.is_castle() && piece != Piece::King {
            return false;
        }
        // Own piece on the target square: malformed (castling targets an
        // empty square in the standard layout, so this covers it too).
        if let Some((occupant, _)) = self.board.piece_at(to) {
            if occupant == us {
                return false;
            }
            if m.is_castle() {
                return false;
            }
        }

        let mut frame = StateInfo {
            hash: self.hash,
            pawn_hash: self.state.pawn_hash,
            castling_rights: self.state.castling_rights,
            en_passant: self.state.en_passant,
            halfmove_clock: self.state.halfmove_clock,
            mv: m,
            captured: None,
            gave_check: false,
            acc: self.acc,
        };

        let mut hash = self.hash;
        hash ^= side_key();
        if let Some(ep) = self.state.en_passant {
            hash ^= ep_key(us, ep, self.board.pieces(us, Piece::Pawn).0);
        }

        let pawn_key = |color: Color, sq: Square| piece_key(color, Piece::Pawn.index(), sq);

        // --- apply the move, fast paths first ---
        if m.is_en_passant() {
            let cap_sq = Square::new(from.rank(), to.file());
            self.board
                .move_with_capture(us, Piece::Pawn, from, cap_sq, to, Piece::Pawn);
            self.acc.remove_piece(them, Piece::Pawn, cap_sq);
            self.acc.move_piece(us, Piece::Pawn, from, to);
            hash ^= piece_key(them, Piece::Pawn.index(), cap_sq);
            hash ^= pawn_key(us, from) ^ pawn_key(us, to);
            self.state.pawn_hash ^=
                pawn_key(them, cap_sq) ^ pawn_key(us, from) ^ pawn_key(us, to);
            frame.captured = Some(Piece::Pawn);
        } else if let Some(side) = m.castle_side() {
            let rank = from.rank();
            let (rook_from, rook_to) = match side {
                CastleSide::King => (Square::new(rank, 7), Square::new(rank, 5)),
                CastleSide::Queen => (Square::new(rank, 0), Square::new(rank, 3)),
            };
            if self.board.piece_at(rook_from) != Some((us, Piece::Rook)) {
                return false;
            }
            self.board.move_no_capture(us, Piece::King, from, to);
            self.board.move_no_capture(us, Piece::Rook, rook_from, rook_to);
            self.acc.move_piece(us, Piece::King, from, to);
            self.acc.move_piece(us, Piece::Rook, rook_from, rook_to);
            hash ^= piece_key(us, Piece::King.index(), from) ^ piece_key(us, Piece::King.index(), to);
            hash ^= piece_key(us, Piece::Rook.index(), rook_from)
                ^ piece_key(us, Piece::Rook.index(), rook_to);
        } else {
            let captured = self.board.piece_on(to);
            if let Some(cap) = captured {
                self.board.move_with_capture(us, piece, from, to, to, cap);
                self.acc.remove_piece(them, cap, to);
                hash ^= piece_key(them, cap.index(), to);
                if cap == Piece::Pawn {
                    self.state.pawn_hash ^= pawn_key(them, to);
                }
                frame.captured = Some(cap);
            } else {
                self.board.move_no_capture(us, piece, from, to);
            }

            if let Some(promo) = m.promotion_piece() {
                // Swap the pawn on the target square for the promoted piece.
                self.board.remove_piece(to, us, Piece::Pawn);
                self.board.set_piece(to, us, promo);
                self.acc.remove_piece(us, Piece::Pawn, from);
                self.acc.add_piece(us, promo, to);
                hash ^= piece_key(us, Piece::Pawn.index(), from)
                    ^ piece_key(us, promo.index(), to);
                self.state.pawn_hash ^= pawn_key(us, from);
            } else {
                self.acc.move_piece(us, piece, from, to);
                hash ^= piece_key(us, piece.index(), from) ^ piece_key(us, piece.index(), to);
                if piece == Piece::Pawn {
                    self.state.pawn_hash ^= pawn_key(us, from) ^ pawn_key(us, to);
                }
            }
        }

        // --- en passant target ---
        self.state.en_passant = None;
        if piece == Piece::Pawn && from.rank().abs_diff(to.rank()) == 2 {
            let ep = Square::new(usize::midpoint(from.rank(), to.rank()), from.file());
            self.state.en_passant = Some(ep);
            hash ^= ep_key(them, ep, self.board.pieces(them, Piece::Pawn).0);
        }

        // --- castling rights ---
        let old_rights = self.state.castling_rights;
        self.state.castling_rights &= CASTLE_KEEP[from.index()] & CASTLE_KEEP[to.index()];
        hash ^= castling_key(old_rights) ^ castling_key(self.state.castling_rights);

        // --- clocks ---
        if piece == Piece::Pawn || frame.captured.is_some() {
            self.state.halfmove_clock = 0;
        } else {
            self.state.halfmove_clock += 1;
        }
        if us == Color::Black {
            self.state.fullmove_number += 1;
        }

        self.state.side_to_move = them;
        self.hash = hash;

        frame.gave_check = self
            .board
            .is_square_attacked(self.board.king_square(them), us);
        self.history.push(frame);

        if self
            .board
            .is_square_attacked(self.board.king_square(us), them)
        {
            self.undo_move();
            return false;
        }

        debug_assert!(self.board.check_consistency());
        debug_assert_eq!(self.hash, self.compute_hash());
        debug_assert_eq!(self.state.pawn_hash, self.compute_pawn_hash());
        true
    }

    /// Take back the last move. Panics (debug) when there is none.
    pub fn undo_move(&mut self) {
        let frame = self
            .history
            .pop()
            .expect("undo_move without a prior do_move");
        let m = frame.mv;
        let from = m.from();
        let to = m.to();

        let them = self.state.side_to_move;
        let us = !them;

        self.state.side_to_move = us;
        self.state.castling_rights = frame.castling_rights;
        self.state.en_passant = frame.en_passant;
        self.state.halfmove_clock = frame.halfmove_clock;
        self.state.pawn_hash = frame.pawn_hash;
        self.hash = frame.hash;
        self.acc = frame.acc;
        if us == Color::Black {
            self.state.fullmove_number -= 1;
        }

        if m.is_en_passant() {
            let cap_sq = Square::new(from.rank(), to.file());
            self.board.move_no_capture(us, Piece::Pawn, to, from);
            self.board.set_piece(cap_sq, them, Piece::Pawn);
        } else if let Some(side) = m.castle_side() {
            let rank = from.rank();
            let (rook_from, rook_to) = match side {
                CastleSide::King => (Square::new(rank, 7), Square::new(rank, 5)),
                CastleSide::Queen => (Square::new(rank, 0), Square::new(rank, 3)),
            };
            self.board.move_no_capture(us, Piece::King, to, from);
            self.board.move_no_capture(us, Piece::Rook, rook_to, rook_from);
        } else {
            if let Some(promo) = m.promotion_piece() {
                self.board.remove_piece(to, us, promo);
                self.board.set_piece(from, us, Piece::Pawn);
            } else {
                let piece = self
                    .board
                    .piece_on(to)
                    .expect("undo_move: moved piece missing");
                self.board.move_no_capture(us, piece, to, from);
            }
            if let Some(cap) = frame.captured {
                self.board.set_piece(to, them, cap);
            }
        }

        debug_assert!(self.board.check_consistency());
    }

    /// Switch sides without moving a piece. Only used by null-move pruning;
    /// never legal while in check.
    pub fn do_null_move(&mut self) {
        debug_assert!(!self.in_check());
        let us = self.state.side_to_move;
        self.null_history.push(NullInfo {
            hash: self.hash,
            en_passant: self.state.en_passant,
            halfmove_clock: self.state.halfmove_clock,
        });

        self.hash ^= side_key();
        if let Some(ep) = self.state.en_passant {
            self.hash ^= ep_key(us, ep, self.board.pieces(us, Piece::Pawn).0);
        }
        self.state.en_passant = None;
        self.state.halfmove_clock += 1;
        self.state.side_to_move = !us;
    }

    /// Inverse of `do_null_move`.
    pub fn undo_null_move(&mut self) {
        let info = self
            .null_history
            .pop()
            .expect("undo_null_move without a prior do_null_move");
        self.state.side_to_move = !self.state.side_to_move;
        self.state.en_passant = info.en_passant;
        self.state.halfmove_clock = info.halfmove_clock;
        self.hash = info.hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::movegen;
    use crate::board::types::MoveList;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn mv(pos: &mut Position, uci: &str) -> Move {
        let mut list = MoveList::new();
        movegen::generate_legal(pos, &mut list);
        *list
            .iter()
            .find(|m| m.to_string() == uci)
            .unwrap_or_else(|| panic!("move {uci} not legal here"))
    }

    #[test]
    fn quiet_move_round_trip() {
        let mut p = Position::startpos();
        let before_fen = p.to_fen();
        let before_hash = p.hash();
        let m = mv(&mut p, "e2e4");
        assert!(p.do_move(m));
        assert_ne!(p.hash(), before_hash);
        p.undo_move();
        assert_eq!(p.to_fen(), before_fen);
        assert_eq!(p.hash(), before_hash);
        assert_eq!(p.ply_count(), 0);
    }

    #[test]
    fn capture_and_promotion_round_trip() {
        let mut p = pos("rnbq1bnr/ppppkPpp/8/8/8/8/PPPP2PP/RNBQKBNR w - - 0 5");
        let before = p.to_fen();
        let m = mv(&mut p, "f7g8q");
        assert!(p.do_move(m));
        assert_eq!(p.board().piece_on(Square::new(7, 6)), Some(Piece::Queen));
        p.undo_move();
        assert_eq!(p.to_fen(), before);
        assert_eq!(p.hash(), p.compute_hash());
    }

    #[test]
    fn en_passant_round_trip() {
        let mut p = pos("4k3/8/8/3Pp3/8/8/8/4K3 w - e6 0 1");
        let before = p.to_fen();
        let m = mv(&mut p, "d5e6");
        assert!(m.is_en_passant());
        assert!(p.do_move(m));
        // The black pawn on e5 is gone.
        assert!(p.board().is_empty_square(Square::new(4, 4)));
        p.undo_move();
        assert_eq!(p.to_fen(), before);
    }

    #[test]
    fn do_move_rejects_self_check() {
        // The white rook on e2 is pinned against the king by the black rook.
        let mut p = pos("4r2k/8/8/8/8/8/4R3/4K3 w - - 0 1");
        let before = p.to_fen();
        let pinned = Move::quiet(Square::new(1, 4), Square::new(1, 0));
        assert!(!p.do_move(pinned));
        assert_eq!(p.to_fen(), before);
        assert_eq!(p.ply_count(), 0);
    }

    #[test]
    fn do_move_rejects_malformed() {
        let mut p = Position::startpos();
        // Empty origin.
        assert!(!p.do_move(Move::quiet(Square::new(3, 3), Square::new(4, 3))));
        // Wrong color.
        assert!(!p.do_move(Move::quiet(Square::new(6, 4), Square::new(5, 4))));
        // Promotion by a knight.
        assert!(!p.do_move(Move::promotion(
            Square::new(0, 1),
            Square::new(2, 2),
            Piece::Queen,
            false
        )));
        // Null move through the regular door.
        assert!(!p.do_move(Move::NULL));
        assert_eq!(p.to_fen(), Position::startpos().to_fen());
    }

    #[test]
    fn null_move_round_trip() {
        let mut p = pos("4k3/8/8/3Pp3/8/8/8/4K3 w - e6 0 1");
        let before_hash = p.hash();
        let before_fen = p.to_fen();
        p.do_null_move();
        assert_ne!(p.hash(), before_hash);
        assert_eq!(p.side_to_move(), Color::Black);
        assert_eq!(p.en_passant(), None);
        p.undo_null_move();
        assert_eq!(p.hash(), before_hash);
        assert_eq!(p.to_fen(), before_fen);
    }

    #[test]
    fn irrelevant_ep_square_does_not_change_hash() {
        // Same layout; one FEN carries an ep square no black pawn can use.
        let with_ep = pos("4k3/8/8/8/3P4/8/8/4K3 b - d3 0 1");
        let without = pos("4k3/8/8/8/3P4/8/8/4K3 b - - 0 1");
        assert_eq!(with_ep.hash(), without.hash());

        // With a capturing pawn present the keys must differ.
        let live_ep = pos("4k3/8/8/8/3Pp3/8/8/4K3 b - d3 0 1");
        let dead_ep = pos("4k3/8/8/8/3Pp3/8/8/4K3 b - - 0 1");
        assert_ne!(live_ep.hash(), dead_ep.hash());
    }

    #[test]
    fn gave_check_is_recorded() {
        let mut p = pos("4k3/8/8/8/8/8/4R3/4K3 w - - 0 1");
        let m = mv(&mut p, "e2e7");
        assert!(p.do_move(m));
        assert!(p.last_move_gave_check());
        assert!(p.in_check());
    }

    #[test]
    fn accumulator_matches_rebuild_after_moves() {
        let mut p = Position::startpos();
        for uci in ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "g8f6", "e1g1"] {
            let m = mv(&mut p, uci);
            assert!(p.do_move(m));
            assert_eq!(*p.acc(), crate::board::eval_acc::EvalAcc::rebuild(p.board()));
        }
        for _ in 0..7 {
            p.undo_move();
        }
        assert_eq!(p.to_fen(), Position::startpos().to_fen());
    }
}

//! Position: the board plus everything needed to play and take back moves.

use super::eval_acc::EvalAcc;
use super::state::{Board, GameState};
use super::types::{Bitboard, Color, Move, Piece, Square, DARK_SQUARES, LIGHT_SQUARES};
use super::zobrist::{castling_key, ep_key, piece_key, side_key};

/// Everything needed to reverse one move.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StateInfo {
    /// Full hash before the move.
    pub hash: u64,
    pub pawn_hash: u64,
    pub castling_rights: u8,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub mv: Move,
    pub captured: Option<Piece>,
    pub gave_check: bool,
    pub acc: EvalAcc,
}

/// Everything needed to reverse one null move.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NullInfo {
    pub hash: u64,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
}

/// A playable position. Mutated only through `do_move` / `undo_move` /
/// `do_null_move` / `undo_null_move`; copied by value to fork sibling
/// searches.
#[derive(Clone, Debug)]
pub struct Position {
    pub(crate) board: Board,
    pub(crate) state: GameState,
    pub(crate) history: Vec<StateInfo>,
    pub(crate) null_history: Vec<NullInfo>,
    pub(crate) hash: u64,
    pub(crate) acc: EvalAcc,
}

impl Position {
    /// An empty board, White to move, no rights. Mostly useful as the target
    /// of a FEN load.
    #[must_use]
    pub fn empty() -> Self {
        Position {
            board: Board::empty(),
            state: GameState {
                castling_rights: 0,
                ..GameState::default()
            },
            history: Vec::with_capacity(256),
            null_history: Vec::with_capacity(64),
            hash: 0,
            acc: EvalAcc::default(),
        }
    }

    /// The standard starting position.
    #[must_use]
    pub fn startpos() -> Self {
        // The unwrap is safe: the literal is well-formed.
        Self::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .expect("startpos FEN")
    }

    #[inline]
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.state.side_to_move
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn pawn_hash(&self) -> u64 {
        self.state.pawn_hash
    }

    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.state.halfmove_clock
    }

    #[inline]
    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.state.fullmove_number
    }

    #[inline]
    #[must_use]
    pub fn en_passant(&self) -> Option<Square> {
        self.state.en_passant
    }

    #[inline]
    #[must_use]
    pub fn castling_rights(&self) -> u8 {
        self.state.castling_rights
    }

    #[inline]
    #[must_use]
    pub(crate) fn acc(&self) -> &EvalAcc {
        &self.acc
    }

    /// Number of plies played since the position was set up.
    #[inline]
    #[must_use]
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    /// Is the side to move in check?
    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        let us = self.state.side_to_move;
        self.board
            .is_square_attacked(self.board.king_square(us), !us)
    }

    /// Did the last `do_move` give check? False when no move has been played.
    #[inline]
    #[must_use]
    pub fn last_move_gave_check(&self) -> bool {
        self.history.last().is_some_and(|info| info.gave_check)
    }

    /// The last move played, if any.
    #[inline]
    #[must_use]
    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|info| info.mv)
    }

    /// The piece captured by the last move, if it captured one.
    #[inline]
    #[must_use]
    pub fn last_captured_piece(&self) -> Option<Piece> {
        self.history.last().and_then(|info| info.captured)
    }

    // ------------------------------------------------------------------
    // Hashing
    // ------------------------------------------------------------------

    /// The full hash recomputed from scratch. Reference for the incremental
    /// one; also used after FEN loads.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0u64;
        for color in [Color::White, Color::Black] {
            for piece in Piece::ALL {
                for sq in self.board.pieces(color, piece) {
                    hash ^= piece_key(color, piece.index(), sq);
                }
            }
        }
        if self.state.side_to_move == Color::Black {
            hash ^= side_key();
        }
        hash ^= castling_key(self.state.castling_rights);
        if let Some(ep) = self.state.en_passant {
            let us = self.state.side_to_move;
            hash ^= ep_key(us, ep, self.board.pieces(us, Piece::Pawn).0);
        }
        hash
    }

    /// The pawn hash recomputed from scratch.
    #[must_use]
    pub fn compute_pawn_hash(&self) -> u64 {
        let mut hash = 0u64;
        for color in [Color::White, Color::Black] {
            for sq in self.board.pieces(color, Piece::Pawn) {
                hash ^= piece_key(color, Piece::Pawn.index(), sq);
            }
        }
        hash
    }

    // ------------------------------------------------------------------
    // Draw rules
    // ------------------------------------------------------------------

    /// Fifty-move rule: one hundred plies without pawn move or capture.
    #[inline]
    #[must_use]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.state.halfmove_clock >= 100
    }

    /// Threefold repetition: the current position occurred at least twice
    /// before. Walks the history backwards at most `halfmove_clock` plies in
    /// 2-ply steps; frames past an irreversible move cannot match.
    #[must_use]
    pub fn is_repetition_draw(&self) -> bool {
        self.repetitions() >= 2
    }

    /// Has the current position occurred before at all? Used by the search,
    /// where a single repetition already scores as a draw.
    #[must_use]
    pub fn has_repeated(&self) -> bool {
        self.repetitions() >= 1
    }

    fn repetitions(&self) -> u32 {
        let n = self.history.len();
        let max_back = self.state.halfmove_clock as usize;
        let mut count = 0;
        let mut back = 2;
        while back <= max_back && back <= n {
            if self.history[n - back].hash == self.hash {
                count += 1;
            }
            back += 2;
        }
        count
    }

    /// KK, KNK/KBK, KB vs KB with same-colored bishops, and KNN vs K.
    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        let board = &self.board;
        let majors = board.pieces_of_type(Piece::Rook).0
            | board.pieces_of_type(Piece::Queen).0
            | board.pieces_of_type(Piece::Pawn).0;
        if majors != 0 {
            return false;
        }

        let knights = board.pieces_of_type(Piece::Knight);
        let bishops = board.pieces_of_type(Piece::Bishop);
        let minors = knights.count() + bishops.count();

        match minors {
            0 | 1 => true,
            2 => {
                if bishops.count() == 2 {
                    let wb = board.pieces(Color::White, Piece::Bishop);
                    let bb = board.pieces(Color::Black, Piece::Bishop);
                    // Two bishops draw only when on different sides and the
                    // same square color.
                    !wb.is_empty()
                        && !bb.is_empty()
                        && same_square_color(Bitboard(wb.0 | bb.0))
                } else if knights.count() == 2 {
                    // Two knights on the same side cannot force mate.
                    board.pieces(Color::White, Piece::Knight).count() != 1
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Any rule-based draw.
    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.is_fifty_move_draw() || self.is_repetition_draw() || self.is_insufficient_material()
    }

    /// Rebuild hash, pawn hash and accumulator after bulk setup.
    pub(crate) fn refresh_derived_state(&mut self) {
        self.state.pawn_hash = self.compute_pawn_hash();
        self.hash = self.compute_hash();
        self.acc = EvalAcc::rebuild(&self.board);
        self.history.clear();
        self.null_history.clear();
    }
}

fn same_square_color(bishops: Bitboard) -> bool {
    bishops.0 & LIGHT_SQUARES == 0 || bishops.0 & DARK_SQUARES == 0
}

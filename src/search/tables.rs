//! Per-thread heuristic tables for move ordering.
//!
//! Each search thread owns one instance; nothing here is synchronised. After
//! a parallel search the helpers' tables are folded into the main thread's
//! with an exponential moving average so learned signals survive between
//! searches. Killers and counter-move slots are positional, not statistical,
//! and are never merged.

use crate::board::{Move, Piece};

use super::constants::MAX_PLY;

/// Continuation-history layer count. Layers 0..=2 carry the signal; the rest
/// exist so deeper-layer experiments need no table reshape.
pub(crate) const CONT_LAYERS: usize = 6;

/// EMA divisor for the post-search merge.
const MERGE_K: i32 = 4;

#[inline]
fn hist_bonus(depth: i32) -> i32 {
    let x = (depth * depth + 1) as u32;
    16 + 8 * (31 - x.leading_zeros()) as i32
}

/// Saturating gravity update: pulls toward ±32768 with self-decay.
#[inline]
fn hist_update(slot: &mut i16, bonus: i32) {
    let mut x = i32::from(*slot);
    x += bonus - (x * bonus.abs()) / 32_768;
    *slot = x.clamp(-32_768, 32_767) as i16;
}

#[inline]
fn ema(global: i16, local: i16) -> i16 {
    let g = i32::from(global);
    let l = i32::from(local);
    (g + (l - g) / MERGE_K).clamp(-32_768, 32_767) as i16
}

/// `[layer][prev_piece][prev_to][piece][to]`, flattened.
pub(crate) struct ContHist {
    data: Vec<i16>,
}

impl ContHist {
    fn new() -> Self {
        ContHist {
            data: vec![0; CONT_LAYERS * 6 * 64 * 6 * 64],
        }
    }

    #[inline]
    fn index(layer: usize, prev_piece: usize, prev_to: usize, piece: usize, to: usize) -> usize {
        (((layer * 6 + prev_piece) * 64 + prev_to) * 6 + piece) * 64 + to
    }

    #[inline]
    pub fn get(&self, layer: usize, prev_piece: usize, prev_to: usize, piece: usize, to: usize) -> i16 {
        self.data[Self::index(layer, prev_piece, prev_to, piece, to)]
    }

    #[inline]
    pub fn update(
        &mut self,
        layer: usize,
        prev_piece: usize,
        prev_to: usize,
        piece: usize,
        to: usize,
        bonus: i32,
    ) {
        hist_update(
            &mut self.data[Self::index(layer, prev_piece, prev_to, piece, to)],
            bonus,
        );
    }
}

pub(crate) struct HeuristicTables {
    /// Two killer slots per ply.
    pub killers: [[Move; 2]; MAX_PLY],
    /// Main butterfly history, from-to.
    pub history: Box<[[i16; 64]; 64]>,
    /// Quiet history by (mover piece, to).
    pub quiet_hist: [[i16; 64]; 6],
    /// Capture history by (mover piece, to, captured piece).
    pub capture_hist: Box<[[[i16; 6]; 64]; 6]>,
    /// The usual reply to an opponent (from, to).
    pub counter_move: Box<[[Move; 64]; 64]>,
    /// Bonus history for that exact reply.
    pub counter_hist: Box<[[i16; 64]; 64]>,
    pub cont_hist: ContHist,
}

impl HeuristicTables {
    #[must_use]
    pub fn new() -> Self {
        HeuristicTables {
            killers: [[Move::NULL; 2]; MAX_PLY],
            history: Box::new([[0; 64]; 64]),
            quiet_hist: [[0; 64]; 6],
            capture_hist: Box::new([[[0; 6]; 64]; 6]),
            counter_move: Box::new([[Move::NULL; 64]; 64]),
            counter_hist: Box::new([[0; 64]; 64]),
            cont_hist: ContHist::new(),
        }
    }

    pub fn clear(&mut self) {
        self.killers = [[Move::NULL; 2]; MAX_PLY];
        for row in self.history.iter_mut() {
            row.fill(0);
        }
        for row in self.quiet_hist.iter_mut() {
            row.fill(0);
        }
        for plane in self.capture_hist.iter_mut() {
            for row in plane.iter_mut() {
                row.fill(0);
            }
        }
        for row in self.counter_move.iter_mut() {
            row.fill(Move::NULL);
        }
        for row in self.counter_hist.iter_mut() {
            row.fill(0);
        }
        self.cont_hist.data.fill(0);
    }

    #[inline]
    pub fn killer_insert(&mut self, ply: usize, m: Move) {
        if ply < MAX_PLY && self.killers[ply][0] != m {
            self.killers[ply][1] = self.killers[ply][0];
            self.killers[ply][0] = m;
        }
    }

    #[inline]
    pub fn history_score(&self, m: Move) -> i32 {
        i32::from(self.history[m.from().index()][m.to().index()])
    }

    #[inline]
    pub fn quiet_score(&self, piece: Piece, m: Move) -> i32 {
        i32::from(self.quiet_hist[piece.index()][m.to().index()])
    }

    pub fn reward_quiet(&mut self, piece: Piece, m: Move, depth: i32) {
        let bonus = hist_bonus(depth);
        hist_update(&mut self.history[m.from().index()][m.to().index()], bonus);
        hist_update(&mut self.quiet_hist[piece.index()][m.to().index()], bonus);
    }

    pub fn penalize_quiet(&mut self, piece: Piece, m: Move, depth: i32) {
        let bonus = -hist_bonus(depth);
        hist_update(&mut self.history[m.from().index()][m.to().index()], bonus);
        hist_update(&mut self.quiet_hist[piece.index()][m.to().index()], bonus);
    }

    pub fn reward_capture(&mut self, mover: Piece, m: Move, captured: Piece, depth: i32) {
        hist_update(
            &mut self.capture_hist[mover.index()][m.to().index()][captured.index()],
            hist_bonus(depth),
        );
    }

    #[inline]
    pub fn capture_score(&self, mover: Piece, m: Move, captured: Piece) -> i32 {
        i32::from(self.capture_hist[mover.index()][m.to().index()][captured.index()])
    }

    /// Fade every statistical table toward zero between iterations:
    /// `h -= h >> 6`, roughly 1.6% decay.
    pub fn decay(&mut self) {
        #[inline]
        fn fade(slot: &mut i16) {
            *slot -= *slot >> 6;
        }
        for row in self.history.iter_mut() {
            row.iter_mut().for_each(fade);
        }
        for row in self.quiet_hist.iter_mut() {
            row.iter_mut().for_each(fade);
        }
        for plane in self.capture_hist.iter_mut() {
            for row in plane.iter_mut() {
                row.iter_mut().for_each(fade);
            }
        }
        for row in self.counter_hist.iter_mut() {
            row.iter_mut().for_each(fade);
        }
        self.cont_hist.data.iter_mut().for_each(fade);
    }

    /// Copy another thread's statistical tables wholesale; killers stay
    /// cleared so each worker finds its own refutations.
    pub fn copy_stats_from(&mut self, src: &HeuristicTables) {
        *self.history = *src.history;
        self.quiet_hist = src.quiet_hist;
        *self.capture_hist = *src.capture_hist;
        *self.counter_move = *src.counter_move;
        *self.counter_hist = *src.counter_hist;
        self.cont_hist.data.copy_from_slice(&src.cont_hist.data);
        self.killers = [[Move::NULL; 2]; MAX_PLY];
    }

    /// EMA-merge a helper's tables into this one; killers and counter-move
    /// slots are skipped.
    pub fn merge_from(&mut self, other: &HeuristicTables) {
        for (g_row, l_row) in self.history.iter_mut().zip(other.history.iter()) {
            for (g, l) in g_row.iter_mut().zip(l_row.iter()) {
                *g = ema(*g, *l);
            }
        }
        for (g_row, l_row) in self.quiet_hist.iter_mut().zip(other.quiet_hist.iter()) {
            for (g, l) in g_row.iter_mut().zip(l_row.iter()) {
                *g = ema(*g, *l);
            }
        }
        for (g_plane, l_plane) in self.capture_hist.iter_mut().zip(other.capture_hist.iter()) {
            for (g_row, l_row) in g_plane.iter_mut().zip(l_plane.iter()) {
                for (g, l) in g_row.iter_mut().zip(l_row.iter()) {
                    *g = ema(*g, *l);
                }
            }
        }
        for (g_row, l_row) in self.counter_hist.iter_mut().zip(other.counter_hist.iter()) {
            for (g, l) in g_row.iter_mut().zip(l_row.iter()) {
                *g = ema(*g, *l);
            }
        }
        for (g, l) in self
            .cont_hist
            .data
            .iter_mut()
            .zip(other.cont_hist.data.iter())
        {
            *g = ema(*g, *l);
        }
    }
}

impl Default for HeuristicTables {
    fn default() -> Self {
        HeuristicTables::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Square;

    fn mv(a: usize, b: usize) -> Move {
        Move::quiet(Square::from_index(a), Square::from_index(b))
    }

    #[test]
    fn history_saturates() {
        let mut t = HeuristicTables::new();
        let m = mv(12, 28);
        for _ in 0..10_000 {
            t.reward_quiet(Piece::Pawn, m, 12);
        }
        assert!(t.history_score(m) <= 32_767);
        assert!(t.history_score(m) > 20_000);
        for _ in 0..10_000 {
            t.penalize_quiet(Piece::Pawn, m, 12);
        }
        assert!(t.history_score(m) >= -32_768);
        assert!(t.history_score(m) < -20_000);
    }

    #[test]
    fn decay_moves_toward_zero() {
        let mut t = HeuristicTables::new();
        let m = mv(0, 8);
        t.reward_quiet(Piece::Knight, m, 8);
        let before = t.history_score(m);
        t.decay();
        let after = t.history_score(m);
        assert!(after < before);
        assert!(after > 0);

        t.penalize_quiet(Piece::Knight, m, 12);
        t.penalize_quiet(Piece::Knight, m, 12);
        let before = t.history_score(m);
        assert!(before < 0);
        t.decay();
        assert!(t.history_score(m) >= before);
    }

    #[test]
    fn killers_rotate_without_duplicates() {
        let mut t = HeuristicTables::new();
        let a = mv(1, 2);
        let b = mv(3, 4);
        t.killer_insert(5, a);
        t.killer_insert(5, a);
        assert_eq!(t.killers[5], [a, Move::NULL]);
        t.killer_insert(5, b);
        assert_eq!(t.killers[5], [b, a]);
    }

    #[test]
    fn merge_pulls_toward_helper_values() {
        let mut main = HeuristicTables::new();
        let mut helper = HeuristicTables::new();
        let m = mv(10, 20);
        for _ in 0..50 {
            helper.reward_quiet(Piece::Rook, m, 10);
        }
        let helper_score = helper.history_score(m);
        main.merge_from(&helper);
        let merged = main.history_score(m);
        assert!(merged > 0);
        assert!(merged < helper_score);
        // Killers are not merged.
        helper.killer_insert(0, m);
        main.merge_from(&helper);
        assert_eq!(main.killers[0], [Move::NULL; 2]);
    }

    #[test]
    fn cont_hist_indexing_is_disjoint() {
        let mut t = HeuristicTables::new();
        t.cont_hist.update(0, 1, 10, 2, 20, 100);
        assert_ne!(t.cont_hist.get(0, 1, 10, 2, 20), 0);
        assert_eq!(t.cont_hist.get(1, 1, 10, 2, 20), 0);
        assert_eq!(t.cont_hist.get(0, 2, 10, 2, 20), 0);
        assert_eq!(t.cont_hist.get(0, 1, 11, 2, 20), 0);
    }
}

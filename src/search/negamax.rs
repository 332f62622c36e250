//! The recursive alpha-beta node.

use once_cell::sync::Lazy;

use crate::board::{movegen, Move, MoveList, Piece, Position};
use crate::tt::Bound;

use super::constants::{
    is_mate_score, mate_in, mated_in, FUT_MARGIN, HISTORY_PRUNE_THRESHOLD, INF, LMP_LIMIT,
    MATE_THR, MAX_PLY, PROBCUT_MARGIN, RAZOR_MARGIN_BASE, RFP_MARGIN_BASE, SNMP_MARGINS,
};
use super::{is_advanced_passer_push, is_direct_check, Search, SearchOutcome};

/// `LMR_TABLE[depth][move_index]`, the log-log base reduction.
static LMR_TABLE: Lazy<[[i32; 64]; 64]> = Lazy::new(|| {
    let mut table = [[0i32; 64]; 64];
    for (depth, row) in table.iter_mut().enumerate().skip(1) {
        for (idx, cell) in row.iter_mut().enumerate().skip(1) {
            let value = ((depth as f64).ln() * (idx as f64).ln()) / 2.0;
            *cell = value as i32;
        }
    }
    table
});

/// Per-node bookkeeping shared by the pruning helpers.
struct NodeState {
    is_pv: bool,
    in_check: bool,
    improving: bool,
    static_eval: i32,
    tt_move: Move,
    tt_score: i32,
    tt_bound: Bound,
    tt_depth: i32,
}

impl Search {
    /// Negamax with the full heuristic suite. Returns a score in
    /// `[-MATE + 1, MATE - 1]`, or `Err(SearchStopped)` while unwinding a
    /// cancelled search.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn negamax(
        &mut self,
        pos: &mut Position,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        ply: i32,
        excluded: Move,
    ) -> SearchOutcome<i32> {
        self.tick_node()?;

        let uply = ply as usize;
        if uply >= MAX_PLY - 2 {
            return Ok(self.eval.evaluate(pos));
        }

        // Rule draws. A single prior occurrence already scores zero here:
        // the opponent can force the repetition.
        if pos.is_fifty_move_draw() || pos.has_repeated() || pos.is_insufficient_material() {
            return Ok(0);
        }

        if depth <= 0 {
            return self.quiescence(pos, alpha, beta, ply);
        }

        // Mate-distance pruning.
        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply + 1));
        if alpha >= beta {
            return Ok(alpha);
        }

        let is_pv = beta > alpha + 1;
        let in_check = pos.in_check();
        let excluded_active = !excluded.is_null();

        let mut node = NodeState {
            is_pv,
            in_check,
            improving: false,
            static_eval: -INF,
            tt_move: Move::NULL,
            tt_score: 0,
            tt_bound: Bound::Exact,
            tt_depth: -1,
        };

        // --- transposition table ---
        if let Some(entry) = self.tt.probe(pos.hash(), ply) {
            node.tt_move = entry.mv;
            node.tt_score = entry.score;
            node.tt_bound = entry.bound;
            node.tt_depth = entry.depth;

            if !excluded_active && !is_pv && entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => return Ok(entry.score),
                    Bound::Lower => {
                        if entry.score >= beta {
                            return Ok(entry.score);
                        }
                        alpha = alpha.max(entry.score);
                    }
                    Bound::Upper => {
                        if entry.score <= alpha {
                            return Ok(entry.score);
                        }
                        beta = beta.min(entry.score);
                    }
                }
                if alpha >= beta {
                    return Ok(alpha);
                }
            }

            if !in_check {
                node.static_eval = entry.static_eval.unwrap_or_else(|| self.eval.evaluate(pos));
            }
        } else if !in_check {
            node.static_eval = self.eval.evaluate(pos);
        }

        self.static_stack[uply] = node.static_eval;
        node.improving = !in_check
            && uply >= 2
            && node.static_eval + 16 >= self.static_stack[uply - 2];

        // --- forward pruning, non-PV and not in check only ---
        if !is_pv && !in_check && !excluded_active {
            if let Some(score) = self.prune_before_moves(pos, depth, alpha, beta, ply, &node)? {
                return Ok(score);
            }
        }

        // --- internal iterative deepening ---
        if self.cfg.use_iid
            && node.tt_move.is_null()
            && depth >= 5
            && !excluded_active
            && (is_pv || node.static_eval + 100 >= beta)
        {
            let _ = self.negamax(pos, depth - 2, alpha, beta, ply, Move::NULL)?;
            if let Some(entry) = self.tt.probe(pos.hash(), ply) {
                node.tt_move = entry.mv;
                node.tt_score = entry.score;
                node.tt_bound = entry.bound;
                node.tt_depth = entry.depth;
            }
        }

        // --- singular extension probe ---
        let mut singular_ext = 0;
        if self.cfg.use_singular_ext
            && !excluded_active
            && ply > 0
            && depth >= 6
            && !node.tt_move.is_null()
            && node.tt_depth >= depth - 3
            && !is_mate_score(node.tt_score)
            && matches!(node.tt_bound, Bound::Lower | Bound::Exact)
        {
            let singular_beta = node.tt_score - 3 * depth;
            let score = self.negamax(
                pos,
                (depth - 1) / 2,
                singular_beta - 1,
                singular_beta,
                ply,
                node.tt_move,
            )?;
            if score < singular_beta {
                singular_ext = 1;
            }
        }

        // --- move loop ---
        let mut moves = MoveList::new();
        if in_check {
            movegen::generate_evasions(pos, &mut moves);
        } else {
            movegen::generate_pseudo_legal(pos, &mut moves);
        }

        let mut scored = self.order_moves(pos, &moves, node.tt_move, uply);

        let original_alpha = alpha;
        let mut best_score = -INF;
        let mut best_move = Move::NULL;
        let mut legal_moves = 0u32;
        let mut quiets_tried: [Move; 64] = [Move::NULL; 64];
        let mut quiet_movers: [u8; 64] = [6; 64];
        let mut quiets_count = 0usize;

        let mut i = 0;
        while let Some(pick) = scored.pick_best(i) {
            i += 1;
            let m = pick.mv;
            if excluded_active && m == excluded {
                continue;
            }

            let quiet = m.is_quiet();
            let mover = pos.board().piece_on(m.from()).map_or(6, Piece::index);

            // Cheap quiet signals computed before making the move.
            let check_hint = is_direct_check(pos, m);
            let passer_push = quiet && is_advanced_passer_push(pos, m);
            let tactical_quiet = check_hint || passer_push;

            // Late-move pruning: shallow nodes skip late, unpromising quiets.
            if self.cfg.use_lmp
                && !is_pv
                && !in_check
                && quiet
                && !tactical_quiet
                && depth <= self.cfg.lmp_depth_max
                && legal_moves > 0
            {
                let mut limit = self.cfg.lmp_base + LMP_LIMIT[depth.clamp(0, 3) as usize];
                if !node.improving {
                    limit -= limit / 3;
                }
                if pick.score > 4_000 {
                    limit += 2;
                }
                if quiets_count as i32 >= limit {
                    continue;
                }
            }

            // Futility: at shallow depth a quiet move cannot lift a hopeless
            // static eval past alpha.
            if self.cfg.use_futility
                && !is_pv
                && !in_check
                && quiet
                && !tactical_quiet
                && depth <= 3
                && legal_moves > 0
                && !is_mate_score(alpha)
                && node.static_eval + self.cfg.futility_margin.max(FUT_MARGIN[depth as usize])
                    <= alpha
            {
                continue;
            }

            // History pruning: repeated offenders go unsearched near the
            // leaves.
            if !is_pv
                && !in_check
                && quiet
                && !tactical_quiet
                && depth <= 2
                && legal_moves > 0
                && pick.score < HISTORY_PRUNE_THRESHOLD
            {
                continue;
            }

            // Capture SEE values feed the extension decisions below.
            let capture_see = if m.is_capture() { pos.see(m) } else { 0 };

            if !pos.do_move(m) {
                continue;
            }
            legal_moves += 1;
            let gives_check = pos.last_move_gave_check();
            self.record_step(uply, m, mover);
            self.tt.prefetch(pos.hash());

            if quiet && quiets_count < quiets_tried.len() {
                quiets_tried[quiets_count] = m;
                quiet_movers[quiets_count] = mover as u8;
                quiets_count += 1;
            }

            // --- extensions (at most one ply total) ---
            let mut extension = 0;
            if m == node.tt_move && singular_ext > 0 {
                extension = singular_ext;
            }
            if extension == 0 && gives_check && m.is_capture() {
                // Checking captures extend only when not clearly losing.
                let recapture = self
                    .step_before(uply, 1)
                    .is_some_and(|(prev, _)| prev.to() == m.to());
                let big_victim = pos
                    .last_captured_piece()
                    .is_some_and(|p| matches!(p, Piece::Rook | Piece::Queen));
                if capture_see >= 0 || recapture || big_victim {
                    extension = 1;
                }
            }
            if extension == 0
                && gives_check
                && quiet
                && is_pv
                && mover != Piece::Queen.index()
                && pick.score > 0
            {
                extension = 1;
            }
            if extension == 0 && passer_push {
                extension = 1;
            }

            let new_depth = depth - 1 + extension;

            // --- late move reductions ---
            let mut reduction = 0;
            if self.cfg.use_lmr
                && quiet
                && !in_check
                && !gives_check
                && depth >= 3
                && legal_moves > 3
            {
                let d = (depth as usize).min(63);
                let idx = (i - 1).min(63);
                reduction = LMR_TABLE[d][idx] + self.cfg.lmr_base - 1;
                if self.cfg.lmr_use_history && pick.score > 6_000 {
                    reduction -= 1;
                }
                if pick.score < -6_000 {
                    reduction += 1;
                }
                if !node.improving {
                    reduction += 1;
                }
                if is_pv || ply < 2 || tactical_quiet {
                    reduction -= 1;
                }
                reduction = reduction.clamp(0, self.cfg.lmr_max.min(new_depth - 1).max(0));
            }

            // --- principal variation search ---
            let score = if legal_moves == 1 {
                -self.child_search(pos, new_depth, -beta, -alpha, ply)?
            } else {
                let mut s =
                    -self.child_search(pos, new_depth - reduction, -alpha - 1, -alpha, ply)?;
                if s > alpha && reduction > 0 {
                    s = -self.child_search(pos, new_depth, -alpha - 1, -alpha, ply)?;
                }
                if s > alpha && s < beta {
                    s = -self.child_search(pos, new_depth, -beta, -alpha, ply)?;
                }
                s
            };
            pos.undo_move();

            if score > best_score {
                best_score = score;
                best_move = m;
            }
            if score > alpha {
                alpha = score;
                if alpha >= beta {
                    self.on_beta_cutoff(
                        pos,
                        m,
                        mover,
                        depth,
                        uply,
                        &quiets_tried[..quiets_count],
                        &quiet_movers[..quiets_count],
                    );
                    break;
                }
            }
        }

        if legal_moves == 0 {
            if excluded_active {
                // Everything else was excluded: tell the singular caller the
                // TT move is the only move.
                return Ok(-INF + 1);
            }
            return Ok(if in_check { mated_in(ply) } else { 0 });
        }

        if !self.stopped() && !excluded_active {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if best_score > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            let static_eval = (!in_check).then_some(node.static_eval);
            self.tt
                .store(pos.hash(), best_score, depth, bound, best_move, static_eval, ply);
        }

        Ok(best_score)
    }

    /// One child call, unwinding the move on a stop so the position is intact
    /// at every unwind level.
    #[inline]
    fn child_search(
        &mut self,
        pos: &mut Position,
        depth: i32,
        alpha: i32,
        beta: i32,
        ply: i32,
    ) -> SearchOutcome<i32> {
        match self.negamax(pos, depth, alpha, beta, ply + 1, Move::NULL) {
            Ok(score) => Ok(score),
            Err(stop) => {
                pos.undo_move();
                Err(stop)
            }
        }
    }

    /// Razoring, reverse futility, static null move, null move, ProbCut.
    fn prune_before_moves(
        &mut self,
        pos: &mut Position,
        depth: i32,
        alpha: i32,
        beta: i32,
        ply: i32,
        node: &NodeState,
    ) -> SearchOutcome<Option<i32>> {
        let eval = node.static_eval;

        if is_mate_score(beta) {
            return Ok(None);
        }

        // Razoring: hopeless static eval at the lowest depths drops straight
        // into quiescence.
        if self.cfg.use_futility
            && depth <= 2
            && eval + RAZOR_MARGIN_BASE * depth <= alpha
        {
            let score = self.quiescence(pos, alpha, alpha + 1, ply)?;
            if score <= alpha {
                return Ok(Some(score));
            }
        }

        // Reverse futility at depth 1.
        if self.cfg.use_reverse_futility && depth == 1 && eval - RFP_MARGIN_BASE >= beta {
            return Ok(Some(eval));
        }

        // Static null move up to depth 3.
        if self.cfg.use_reverse_futility && depth <= 3 {
            let mut margin = SNMP_MARGINS[depth as usize];
            if !node.improving {
                margin += 40;
            }
            if eval - margin >= beta {
                return Ok(Some(eval));
            }
        }

        // Null move: hand over the turn; a reduced search that still fails
        // high means the position is too good for the opponent to fix.
        let prev_was_null = ply > 0 && self.prev_move[(ply as usize) - 1].is_null();
        if self.cfg.use_null_move
            && depth >= 3
            && !prev_was_null
            && eval >= beta + 20
            && pos.acc().non_pawn_count(pos.side_to_move()) > 0
            && !self.opponent_has_quick_quiet_check(pos)
        {
            let reduction = 2 + (depth + 1) / 3;
            pos.do_null_move();
            self.record_step(ply as usize, Move::NULL, 6);
            let result = self.negamax(
                pos,
                depth - 1 - reduction,
                -beta,
                -beta + 1,
                ply + 1,
                Move::NULL,
            );
            pos.undo_null_move();
            let score = -result?;

            if score >= beta {
                // Verify at deeper depths before trusting zugzwang-prone
                // positions.
                if depth >= 8 && eval - beta < 200 {
                    let verify =
                        self.negamax(pos, depth - 1 - reduction, beta - 1, beta, ply, Move::NULL)?;
                    if verify < beta {
                        return Ok(None);
                    }
                }
                return Ok(Some(score.min(MATE_THR - 1)));
            }
        }

        // ProbCut: a good capture that beats a raised beta at reduced depth
        // almost certainly beats it at full depth.
        if self.cfg.use_prob_cut && depth >= 4 {
            let probcut_beta = beta + PROBCUT_MARGIN;
            let mut captures = MoveList::new();
            movegen::generate_captures(pos, &mut captures);
            for &m in &captures {
                if !m.is_capture() || !pos.see_ge(m, 0) {
                    continue;
                }
                let mover = pos.board().piece_on(m.from()).map_or(6, Piece::index);
                if !pos.do_move(m) {
                    continue;
                }
                self.record_step(ply as usize, m, mover);
                let score =
                    -self.child_search(pos, depth - 4, -probcut_beta, -probcut_beta + 1, ply)?;
                pos.undo_move();
                if score >= probcut_beta {
                    return Ok(Some(score));
                }
            }
        }

        Ok(None)
    }

    /// Can the opponent answer a pass with an immediate quiet check? Cheap
    /// superset test over direct checks only.
    fn opponent_has_quick_quiet_check(&self, pos: &Position) -> bool {
        use crate::board::attack_tables::{bishop_attacks, knight_attacks, rook_attacks};

        let board = pos.board();
        let us = pos.side_to_move();
        let them = !us;
        let king = board.king_square(us).index();
        let occ = board.occupied().0;
        let empty = !occ;

        let knight_checks = knight_attacks(king) & empty;
        for sq in board.pieces(them, Piece::Knight) {
            if knight_attacks(sq.index()) & knight_checks != 0 {
                return true;
            }
        }
        let diag_checks = bishop_attacks(king, occ) & empty;
        for piece in [Piece::Bishop, Piece::Queen] {
            for sq in board.pieces(them, piece) {
                if bishop_attacks(sq.index(), occ) & diag_checks != 0 {
                    return true;
                }
            }
        }
        let straight_checks = rook_attacks(king, occ) & empty;
        for piece in [Piece::Rook, Piece::Queen] {
            for sq in board.pieces(them, piece) {
                if rook_attacks(sq.index(), occ) & straight_checks != 0 {
                    return true;
                }
            }
        }
        false
    }

    /// Reward the cutoff move, punish the quiets searched before it, and
    /// refresh killers, counter and continuation history.
    #[allow(clippy::too_many_arguments)]
    fn on_beta_cutoff(
        &mut self,
        pos: &Position,
        m: Move,
        mover: usize,
        depth: i32,
        ply: usize,
        quiets_tried: &[Move],
        quiet_movers: &[u8],
    ) {
        if m.is_quiet() {
            let mover_piece = Piece::from_index(mover.min(5));
            self.tables.reward_quiet(mover_piece, m, depth);
            self.tables.killer_insert(ply, m);

            // The cutoff move is a refutation of the opponent's last move.
            if let Some((prev, _)) = self.step_before(ply, 1) {
                let pf = prev.from().index();
                let pt = prev.to().index();
                self.tables.counter_move[pf][pt] = m;
                let bonus = 16 + 8 * (31 - ((depth * depth + 1) as u32).leading_zeros()) as i32;
                let ch = &mut self.tables.counter_hist[pf][pt];
                let mut x = i32::from(*ch);
                x += bonus - (x * bonus.abs()) / 32_768;
                *ch = x.clamp(-32_768, 32_767) as i16;

                for (layer, weight) in [(0usize, 1), (1usize, 2), (2usize, 4)] {
                    if let Some((lprev, lpiece)) = self.step_before(ply, layer + 1) {
                        self.tables.cont_hist.update(
                            layer,
                            lpiece,
                            lprev.to().index(),
                            mover.min(5),
                            m.to().index(),
                            bonus / weight,
                        );
                    }
                }
            }

            for (idx, &q) in quiets_tried.iter().enumerate() {
                if q != m {
                    let piece = Piece::from_index(usize::from(quiet_movers[idx]).min(5));
                    self.tables.penalize_quiet(piece, q, depth);
                }
            }
        } else if m.is_capture() {
            let victim = if m.is_en_passant() {
                Piece::Pawn
            } else {
                pos.board().piece_on(m.to()).unwrap_or(Piece::Pawn)
            };
            let mover_piece = Piece::from_index(mover.min(5));
            self.tables.reward_capture(mover_piece, m, victim, depth);
        }
    }
}

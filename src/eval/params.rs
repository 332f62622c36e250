//! Tunable evaluation parameters.
//!
//! Every scalar the evaluator reads lives in one process-wide table with an
//! indexed getter/setter, so an external tuner can perturb a single value
//! between searches. The evaluator snapshots the table at search start and
//! never reads the global copy on the hot path.

use once_cell::sync::Lazy;
use parking_lot::RwLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameter indices. Passed-pawn bonuses occupy eight consecutive slots per
/// phase, indexed by rank from the pawn's own side.
pub mod idx {
    pub const TEMPO: usize = 0;
    pub const BISHOP_PAIR_MG: usize = 1;
    pub const BISHOP_PAIR_EG: usize = 2;
    pub const ROOK_OPEN_FILE_MG: usize = 3;
    pub const ROOK_OPEN_FILE_EG: usize = 4;
    pub const ROOK_HALF_OPEN_FILE_MG: usize = 5;
    pub const ROOK_HALF_OPEN_FILE_EG: usize = 6;
    pub const ROOK_BEHIND_PASSER_MG: usize = 7;
    pub const ROOK_BEHIND_PASSER_EG: usize = 8;
    pub const KNIGHT_OUTPOST_MG: usize = 9;
    pub const KNIGHT_OUTPOST_EG: usize = 10;
    pub const MOBILITY_KNIGHT_MG: usize = 11;
    pub const MOBILITY_KNIGHT_EG: usize = 12;
    pub const MOBILITY_BISHOP_MG: usize = 13;
    pub const MOBILITY_BISHOP_EG: usize = 14;
    pub const MOBILITY_ROOK_MG: usize = 15;
    pub const MOBILITY_ROOK_EG: usize = 16;
    pub const MOBILITY_QUEEN_MG: usize = 17;
    pub const MOBILITY_QUEEN_EG: usize = 18;
    pub const KING_SHIELD_MG: usize = 19;
    pub const KING_RING_ATTACK_MG: usize = 20;
    pub const KING_OPEN_FILE_MG: usize = 21;
    pub const FIANCHETTO_MG: usize = 22;
    pub const ISOLATED_MG: usize = 23;
    pub const ISOLATED_EG: usize = 24;
    pub const DOUBLED_MG: usize = 25;
    pub const DOUBLED_EG: usize = 26;
    pub const BACKWARD_MG: usize = 27;
    pub const BACKWARD_EG: usize = 28;
    pub const THREAT_MINOR_ON_MAJOR_MG: usize = 29;
    pub const THREAT_MINOR_ON_MAJOR_EG: usize = 30;
    pub const THREAT_PAWN_ON_PIECE_MG: usize = 31;
    pub const THREAT_PAWN_ON_PIECE_EG: usize = 32;
    pub const PASSED_MG: usize = 33; // ..=40, by relative rank
    pub const PASSED_EG: usize = 41; // ..=48, by relative rank
    pub const PASSED_RACE_EG: usize = 49;
}

pub const PARAM_COUNT: usize = 50;

const DEFAULTS: [i32; PARAM_COUNT] = [
    14, // TEMPO
    28, 45, // BISHOP_PAIR
    22, 9, // ROOK_OPEN_FILE
    11, 5, // ROOK_HALF_OPEN_FILE
    12, 24, // ROOK_BEHIND_PASSER
    24, 12, // KNIGHT_OUTPOST
    4, 3, // MOBILITY_KNIGHT
    4, 3, // MOBILITY_BISHOP
    2, 4, // MOBILITY_ROOK
    1, 2, // MOBILITY_QUEEN
    8, // KING_SHIELD
    7, // KING_RING_ATTACK
    16, // KING_OPEN_FILE
    10, // FIANCHETTO
    10, 14, // ISOLATED
    8, 16, // DOUBLED
    7, 11, // BACKWARD
    18, 12, // THREAT_MINOR_ON_MAJOR
    24, 18, // THREAT_PAWN_ON_PIECE
    0, 4, 8, 14, 28, 52, 90, 0, // PASSED_MG by rank
    0, 8, 14, 24, 44, 80, 130, 0, // PASSED_EG by rank
    60, // PASSED_RACE_EG
];

const NAMES: [&str; PARAM_COUNT] = [
    "tempo",
    "bishop_pair_mg",
    "bishop_pair_eg",
    "rook_open_file_mg",
    "rook_open_file_eg",
    "rook_half_open_file_mg",
    "rook_half_open_file_eg",
    "rook_behind_passer_mg",
    "rook_behind_passer_eg",
    "knight_outpost_mg",
    "knight_outpost_eg",
    "mobility_knight_mg",
    "mobility_knight_eg",
    "mobility_bishop_mg",
    "mobility_bishop_eg",
    "mobility_rook_mg",
    "mobility_rook_eg",
    "mobility_queen_mg",
    "mobility_queen_eg",
    "king_shield_mg",
    "king_ring_attack_mg",
    "king_open_file_mg",
    "fianchetto_mg",
    "isolated_mg",
    "isolated_eg",
    "doubled_mg",
    "doubled_eg",
    "backward_mg",
    "backward_eg",
    "threat_minor_on_major_mg",
    "threat_minor_on_major_eg",
    "threat_pawn_on_piece_mg",
    "threat_pawn_on_piece_eg",
    "passed_mg_r1",
    "passed_mg_r2",
    "passed_mg_r3",
    "passed_mg_r4",
    "passed_mg_r5",
    "passed_mg_r6",
    "passed_mg_r7",
    "passed_mg_r8",
    "passed_eg_r1",
    "passed_eg_r2",
    "passed_eg_r3",
    "passed_eg_r4",
    "passed_eg_r5",
    "passed_eg_r6",
    "passed_eg_r7",
    "passed_eg_r8",
    "passed_race_eg",
];

/// One evaluation-parameter vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvalParams {
    values: [i32; PARAM_COUNT],
}

impl Default for EvalParams {
    fn default() -> Self {
        EvalParams { values: DEFAULTS }
    }
}

impl EvalParams {
    #[inline]
    #[must_use]
    pub fn v(&self, index: usize) -> i32 {
        self.values[index]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<i32> {
        self.values.get(index).copied()
    }

    /// Returns false when the index is out of range.
    pub fn set(&mut self, index: usize, value: i32) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn name(index: usize) -> Option<&'static str> {
        NAMES.get(index).copied()
    }
}

static GLOBAL: Lazy<RwLock<EvalParams>> = Lazy::new(|| RwLock::new(EvalParams::default()));

/// Number of tunable parameters.
#[must_use]
pub fn param_count() -> usize {
    PARAM_COUNT
}

/// Read one parameter from the process-wide table.
#[must_use]
pub fn get_param(index: usize) -> Option<i32> {
    GLOBAL.read().get(index)
}

/// Write one parameter in the process-wide table. Call only between
/// searches; running evaluators keep their snapshot.
pub fn set_param(index: usize, value: i32) -> bool {
    GLOBAL.write().set(index, value)
}

/// Snapshot the current table.
#[must_use]
pub fn snapshot() -> EvalParams {
    *GLOBAL.read()
}

/// Reset the process-wide table to the defaults.
pub fn reset_params() {
    *GLOBAL.write() = EvalParams::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_access_round_trip() {
        let mut p = EvalParams::default();
        assert_eq!(p.get(idx::TEMPO), Some(14));
        assert!(p.set(idx::TEMPO, 20));
        assert_eq!(p.v(idx::TEMPO), 20);
        assert!(!p.set(PARAM_COUNT, 1));
        assert_eq!(p.get(PARAM_COUNT), None);
    }

    #[test]
    fn names_align_with_indices() {
        assert_eq!(EvalParams::name(idx::TEMPO), Some("tempo"));
        assert_eq!(EvalParams::name(idx::PASSED_RACE_EG), Some("passed_race_eg"));
        assert_eq!(EvalParams::name(idx::PASSED_MG + 6), Some("passed_mg_r7"));
        assert_eq!(EvalParams::name(PARAM_COUNT), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip_for_tuners() {
        let mut p = EvalParams::default();
        p.set(idx::TEMPO, 21);
        let json = serde_json::to_string(&p).unwrap();
        let back: EvalParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn global_table_mutation() {
        reset_params();
        let before = get_param(idx::BISHOP_PAIR_MG).unwrap();
        assert!(set_param(idx::BISHOP_PAIR_MG, before + 1));
        assert_eq!(get_param(idx::BISHOP_PAIR_MG), Some(before + 1));
        reset_params();
        assert_eq!(get_param(idx::BISHOP_PAIR_MG), Some(before));
    }
}

//! Lock-free transposition table.
//!
//! Slots are 64-byte clusters of four entries; each entry is a pair of atomic
//! 64-bit words. The high 16 key bits are stored redundantly in both words so
//! a probe can detect a torn pair and discard it instead of taking a lock.
//! Under store contention a failed compare-and-swap drops the update rather
//! than looping.
//!
//! Word layouts (low to high):
//!
//! `info`: key_low:16 | age:8 | depth:8 | bound:2 | key_high:16 | reserved | valid:1
//! `data`: move16:16 | score:16 | static_eval:16 | key_high:16

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::board::Move;
use crate::search::constants::MATE_THR;

/// Score bound stored with an entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Bound {
    Exact = 0,
    Lower = 1,
    Upper = 2,
}

impl Bound {
    #[inline]
    fn from_bits(bits: u64) -> Bound {
        match bits & 0x3 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            _ => Bound::Exact,
        }
    }

    /// Exact beats Lower beats Upper in the replacement order.
    #[inline]
    const fn strength(self) -> u32 {
        match self {
            Bound::Exact => 2,
            Bound::Lower => 1,
            Bound::Upper => 0,
        }
    }
}

/// Decoded entry handed to the search.
#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
    pub depth: i32,
    pub bound: Bound,
    /// Mate scores already corrected back to be relative to the probing node.
    pub score: i32,
    pub static_eval: Option<i32>,
    pub mv: Move,
    pub age: u8,
}

/// Sentinel in the static-eval field meaning "not stored".
const EVAL_UNSET: i16 = i16::MIN;

const INFO_KEYLO_MASK: u64 = 0xFFFF;
const INFO_AGE_SHIFT: u32 = 16;
const INFO_DEPTH_SHIFT: u32 = 24;
const INFO_BOUND_SHIFT: u32 = 32;
const INFO_KEYHI_SHIFT: u32 = 34;
const INFO_VALID: u64 = 1 << 63;

/// Refresh the age of entries this many generations stale on probe.
const AGE_REFRESH_THRESHOLD: u8 = 8;

#[derive(Default)]
struct PackedEntry {
    info: AtomicU64,
    data: AtomicU64,
}

#[repr(align(64))]
#[derive(Default)]
struct Cluster {
    entries: [PackedEntry; 4],
}

pub struct TranspositionTable {
    clusters: Box<[Cluster]>,
    mask: usize,
    generation: AtomicU8,
}

#[inline]
fn mix(key: u64) -> u64 {
    // SplitMix64 finalizer spreads low-entropy keys over the index space.
    let mut x = key.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[inline]
fn encode_score(score: i32, ply: i32) -> i32 {
    // Mate scores become distance-from-this-node so they stay comparable
    // wherever the entry is probed.
    if score >= MATE_THR {
        score + ply
    } else if score <= -MATE_THR {
        score - ply
    } else {
        score
    }
}

#[inline]
fn decode_score(score: i32, ply: i32) -> i32 {
    if score >= MATE_THR {
        score - ply
    } else if score <= -MATE_THR {
        score + ply
    } else {
        score
    }
}

impl TranspositionTable {
    /// Allocate with `mb` mebibytes, rounded down to a power-of-two cluster
    /// count.
    #[must_use]
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let want = bytes / std::mem::size_of::<Cluster>();
        let slots = if want == 0 {
            1
        } else {
            1usize << (usize::BITS - 1 - want.leading_zeros())
        };
        let mut clusters = Vec::with_capacity(slots);
        clusters.resize_with(slots, Cluster::default);
        TranspositionTable {
            clusters: clusters.into_boxed_slice(),
            mask: slots - 1,
            generation: AtomicU8::new(1),
        }
    }

    /// Drop all entries. Not safe to call while a search is running.
    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            for entry in &cluster.entries {
                entry.info.store(0, Ordering::Relaxed);
                entry.data.store(0, Ordering::Relaxed);
            }
        }
        self.generation.store(1, Ordering::Relaxed);
    }

    /// Advance the age counter; called once per root search.
    pub fn new_generation(&self) {
        let g = self.generation.load(Ordering::Relaxed).wrapping_add(1);
        // Zero is reserved so a cleared table never matches an age.
        self.generation
            .store(if g == 0 { 1 } else { g }, Ordering::Relaxed);
    }

    #[inline]
    fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    fn index(&self, key: u64) -> usize {
        (mix(key) as usize) & self.mask
    }

    /// Issue a read prefetch of the cluster for `key`.
    #[inline]
    pub fn prefetch(&self, key: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            let cluster = &self.clusters[self.index(key)];
            _mm_prefetch::<_MM_HINT_T0>(std::ptr::from_ref(cluster).cast());
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = key;
        }
    }

    /// Look up `key`. `ply` is the probing node's distance from root, used to
    /// re-anchor mate scores.
    #[must_use]
    pub fn probe(&self, key: u64, ply: i32) -> Option<TTEntry> {
        let cluster = &self.clusters[self.index(key)];
        let key_lo = key & 0xFFFF;
        let key_hi = (key >> 48) & 0xFFFF;

        for entry in &cluster.entries {
            let info = entry.info.load(Ordering::Acquire);
            if info & INFO_VALID == 0 {
                continue;
            }
            if info & INFO_KEYLO_MASK != key_lo {
                continue;
            }
            if (info >> INFO_KEYHI_SHIFT) & 0xFFFF != key_hi {
                continue;
            }

            let data = entry.data.load(Ordering::Relaxed);
            // Torn-pair / ABA protection: both words must agree on the key.
            if (data >> 48) & 0xFFFF != key_hi {
                continue;
            }

            let age = ((info >> INFO_AGE_SHIFT) & 0xFF) as u8;
            let stored_score = (data >> 16) as u16 as i16;
            let stored_eval = (data >> 32) as u16 as i16;

            let decoded = TTEntry {
                depth: ((info >> INFO_DEPTH_SHIFT) & 0xFF) as i32,
                bound: Bound::from_bits(info >> INFO_BOUND_SHIFT),
                score: decode_score(i32::from(stored_score), ply),
                static_eval: (stored_eval != EVAL_UNSET).then_some(i32::from(stored_eval)),
                mv: Move::unpack16(data as u16),
                age,
            };

            // Keep long-lived useful entries alive: best-effort age refresh.
            let current = self.generation();
            if current.wrapping_sub(age) > AGE_REFRESH_THRESHOLD {
                let refreshed = (info & !(0xFFu64 << INFO_AGE_SHIFT))
                    | (u64::from(current) << INFO_AGE_SHIFT);
                let _ = entry.info.compare_exchange(
                    info,
                    refreshed,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }

            return Some(decoded);
        }
        None
    }

    /// Store an entry. `static_eval` of `None` keeps the "unset" sentinel.
    pub fn store(
        &self,
        key: u64,
        score: i32,
        depth: i32,
        bound: Bound,
        mv: Move,
        static_eval: Option<i32>,
        ply: i32,
    ) {
        let cluster = &self.clusters[self.index(key)];
        let key_lo = key & 0xFFFF;
        let key_hi = (key >> 48) & 0xFFFF;
        let age = self.generation();

        let depth8 = depth.clamp(0, 255) as u64;
        let score16 = encode_score(score, ply)
            .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        let eval16 = match static_eval {
            Some(e) => e.clamp(i32::from(i16::MIN) + 1, i32::from(i16::MAX)) as i16,
            None => EVAL_UNSET,
        };
        let mv16 = mv.pack16();

        let new_data = u64::from(mv16)
            | (u64::from(score16 as u16) << 16)
            | (u64::from(eval16 as u16) << 32)
            | (key_hi << 48);
        let new_info = INFO_VALID
            | key_lo
            | (u64::from(age) << INFO_AGE_SHIFT)
            | (depth8 << INFO_DEPTH_SHIFT)
            | (u64::from(bound as u8) << INFO_BOUND_SHIFT)
            | (key_hi << INFO_KEYHI_SHIFT);

        // One total order on (depth, bound strength, freshness, key parity),
        // shared by the same-key update and the victim guard.
        let quality = |info: u64| -> u64 {
            if info & INFO_VALID == 0 {
                return 0;
            }
            let d = (info >> INFO_DEPTH_SHIFT) & 0xFF;
            let b = Bound::from_bits(info >> INFO_BOUND_SHIFT).strength() as u64;
            let entry_age = ((info >> INFO_AGE_SHIFT) & 0xFF) as u8;
            let fresh = 255 - u64::from(age.wrapping_sub(entry_age));
            let parity = (info >> INFO_KEYHI_SHIFT) & 1;
            (d << 16) | (b << 12) | (fresh << 4) | parity
        };
        let new_quality =
            (depth8 << 16) | (u64::from(bound.strength()) << 12) | (255 << 4) | (key_hi & 1);

        // 1) Same-key update.
        for entry in &cluster.entries {
            let old_info = entry.info.load(Ordering::Acquire);
            if old_info & INFO_VALID == 0 {
                continue;
            }
            if old_info & INFO_KEYLO_MASK != key_lo
                || (old_info >> INFO_KEYHI_SHIFT) & 0xFFFF != key_hi
            {
                continue;
            }

            if quality(old_info) > new_quality {
                // The stored entry is stronger; at most patch a missing move
                // so ordering still benefits.
                let old_data = entry.data.load(Ordering::Relaxed);
                if old_data as u16 == 0 && mv16 != 0 {
                    let patched = (old_data & !0xFFFF) | u64::from(mv16);
                    let _ = entry.data.compare_exchange(
                        old_data,
                        patched,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                }
                return;
            }

            entry.data.store(new_data, Ordering::Relaxed);
            let _ = entry.info.compare_exchange(
                old_info,
                new_info,
                Ordering::Release,
                Ordering::Relaxed,
            );
            // Contended or not, never loop.
            return;
        }

        // 2) Claim an empty slot.
        for entry in &cluster.entries {
            if entry.info.load(Ordering::Relaxed) & INFO_VALID != 0 {
                continue;
            }
            entry.data.store(new_data, Ordering::Relaxed);
            if entry
                .info
                .compare_exchange(0, new_info, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }

        // 3) Replace the weakest victim, guarded by the same total order.
        let mut victim = &cluster.entries[0];
        let mut victim_score = i64::MAX;
        for entry in &cluster.entries {
            let info = entry.info.load(Ordering::Relaxed);
            let score = if info & INFO_VALID == 0 {
                i64::MIN
            } else {
                let d = ((info >> INFO_DEPTH_SHIFT) & 0xFF) as i64;
                let b = Bound::from_bits(info >> INFO_BOUND_SHIFT);
                let bias = match b {
                    Bound::Exact => 12,
                    Bound::Lower => 4,
                    Bound::Upper => 0,
                };
                let entry_age = ((info >> INFO_AGE_SHIFT) & 0xFF) as u8;
                let staleness = i64::from(age.wrapping_sub(entry_age));
                d * 512 + bias - staleness * 2
            };
            if score < victim_score {
                victim_score = score;
                victim = entry;
            }
        }

        let old_info = victim.info.load(Ordering::Acquire);
        if quality(old_info) > new_quality {
            return;
        }
        victim.data.store(new_data, Ordering::Relaxed);
        let _ = victim
            .info
            .compare_exchange(old_info, new_info, Ordering::Release, Ordering::Relaxed);
        // A failed CAS here means another thread won the slot; drop ours.
    }

    /// Permille of sampled slots holding an entry from the current
    /// generation. For `info hashfull` reporting.
    #[must_use]
    pub fn hashfull(&self) -> u32 {
        let sample = self.clusters.len().min(250);
        let age = self.generation();
        let mut used = 0;
        for cluster in self.clusters.iter().take(sample) {
            for entry in &cluster.entries {
                let info = entry.info.load(Ordering::Relaxed);
                if info & INFO_VALID != 0 && ((info >> INFO_AGE_SHIFT) & 0xFF) as u8 == age {
                    used += 1;
                }
            }
        }
        if sample == 0 {
            0
        } else {
            (used * 1000 / (sample as u32 * 4)).min(1000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Piece, Square};
    use crate::search::constants::MATE;

    fn test_move() -> Move {
        Move::quiet(Square::new(1, 4), Square::new(3, 4))
    }

    #[test]
    fn store_and_probe_round_trip() {
        let tt = TranspositionTable::new(1);
        let key = 0xDEAD_BEEF_CAFE_F00D;
        tt.store(key, 42, 7, Bound::Exact, test_move(), Some(17), 0);

        let entry = tt.probe(key, 0).expect("entry present");
        assert_eq!(entry.score, 42);
        assert_eq!(entry.depth, 7);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.static_eval, Some(17));
        assert_eq!(entry.mv, test_move());
    }

    #[test]
    fn missing_key_misses() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(0x1234_5678_9ABC_DEF0, 0).is_none());
    }

    #[test]
    fn unset_static_eval_survives() {
        let tt = TranspositionTable::new(1);
        tt.store(99, -5, 3, Bound::Upper, Move::NULL, None, 2);
        let entry = tt.probe(99, 2).unwrap();
        assert_eq!(entry.static_eval, None);
        assert!(entry.mv.is_null());
    }

    #[test]
    fn mate_scores_travel_by_distance() {
        let tt = TranspositionTable::new(1);
        let key = 0xABCD_EF01_2345_6789;
        // Mate found 5 plies below a node at ply 3.
        let score_at_node = MATE - 8;
        tt.store(key, score_at_node, 9, Bound::Exact, test_move(), None, 3);
        // Probing the same position at ply 1 sees the mate two plies closer
        // to the root, so two plies further from this node.
        let entry = tt.probe(key, 1).unwrap();
        assert_eq!(entry.score, MATE - 6);

        let mated = -(MATE - 8);
        tt.store(key ^ 1, mated, 9, Bound::Exact, test_move(), None, 3);
        let entry = tt.probe(key ^ 1, 1).unwrap();
        assert_eq!(entry.score, -(MATE - 6));
    }

    #[test]
    fn deeper_entry_wins_same_key() {
        let tt = TranspositionTable::new(1);
        let key = 0x1111_2222_3333_4444;
        tt.store(key, 10, 8, Bound::Exact, test_move(), None, 0);
        tt.store(key, 99, 2, Bound::Upper, Move::NULL, None, 0);
        let entry = tt.probe(key, 0).unwrap();
        assert_eq!(entry.depth, 8);
        assert_eq!(entry.score, 10);
    }

    #[test]
    fn shallow_store_patches_missing_move() {
        let tt = TranspositionTable::new(1);
        let key = 0x5555_6666_7777_8888;
        tt.store(key, 10, 8, Bound::Exact, Move::NULL, None, 0);
        tt.store(key, 5, 1, Bound::Upper, test_move(), None, 0);
        let entry = tt.probe(key, 0).unwrap();
        assert_eq!(entry.depth, 8, "strong entry kept");
        assert_eq!(entry.mv, test_move(), "move patched in");
    }

    #[test]
    fn promotion_moves_survive_packing() {
        let tt = TranspositionTable::new(1);
        let mv = Move::promotion(Square::new(6, 0), Square::new(7, 0), Piece::Knight, true);
        tt.store(7, 0, 1, Bound::Lower, mv, None, 0);
        let entry = tt.probe(7, 0).unwrap();
        assert_eq!(entry.mv, mv);
        assert_eq!(entry.mv.promotion_piece(), Some(Piece::Knight));
    }

    #[test]
    fn generation_survives_wraparound() {
        let tt = TranspositionTable::new(1);
        for _ in 0..300 {
            tt.new_generation();
        }
        tt.store(123, 1, 1, Bound::Exact, Move::NULL, None, 0);
        assert!(tt.probe(123, 0).is_some());
    }

    #[test]
    fn clear_empties_the_table() {
        let tt = TranspositionTable::new(1);
        tt.store(42, 1, 1, Bound::Exact, test_move(), None, 0);
        tt.clear();
        assert!(tt.probe(42, 0).is_none());
    }
}

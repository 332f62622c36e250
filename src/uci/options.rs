//! The UCI option table and `setoption` handling.

use crate::config::EngineConfig;

const ENGINE_NAME: &str = "Sable 0.9";
const ENGINE_AUTHOR: &str = "the Sable authors";

fn print_spin(name: &str, default: impl std::fmt::Display, min: i64, max: i64) {
    println!("option name {name} type spin default {default} min {min} max {max}");
}

fn print_check(name: &str, default: bool) {
    println!("option name {name} type check default {default}");
}

/// The `uci` handshake: identity plus the option block, ending in `uciok`.
pub fn print_uci_identity(cfg: &EngineConfig) {
    println!("id name {ENGINE_NAME}");
    println!("id author {ENGINE_AUTHOR}");

    print_spin("Hash", cfg.tt_size_mb, 1, 131_072);
    print_spin("Threads", cfg.threads, 0, 64);
    print_spin("Max Depth", cfg.max_depth, 1, 128);
    print_spin("Max Nodes", cfg.max_nodes, 0, i64::MAX);
    print_spin("Move Overhead", cfg.move_overhead_ms, 0, 5_000);
    print_check("Ponder", cfg.ponder);

    print_check("Use Null Move", cfg.use_null_move);
    print_check("Use LMR", cfg.use_lmr);
    print_check("Use Aspiration", cfg.use_aspiration);
    print_check("Use LMP", cfg.use_lmp);
    print_check("Use IID", cfg.use_iid);
    print_check("Use Singular Extension", cfg.use_singular_ext);
    print_check("Use Futility", cfg.use_futility);
    print_check("Use Reverse Futility", cfg.use_reverse_futility);
    print_check("Use SEE Pruning", cfg.use_see_pruning);
    print_check("Use Prob Cut", cfg.use_prob_cut);
    print_check("Qsearch Quiet Checks", cfg.qsearch_quiet_checks);
    print_check("LMR Use History", cfg.lmr_use_history);

    print_spin("Aspiration Window", cfg.aspiration_window, 5, 200);
    print_spin("Futility Margin", cfg.futility_margin, 50, 500);
    print_spin("LMP Depth Max", cfg.lmp_depth_max, 1, 8);
    print_spin("LMP Base", cfg.lmp_base, 0, 16);
    print_spin("LMR Base", cfg.lmr_base, 0, 3);
    print_spin("LMR Max", cfg.lmr_max, 1, 6);

    println!("uciok");
}

fn parse_bool(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Apply one `setoption`. Unknown names and bad values are ignored, as the
/// protocol requires.
pub fn apply_setoption(cfg: &mut EngineConfig, name: &str, value: Option<&str>) {
    let normalized = name.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "hash" => {
            if let Some(mb) = value.and_then(|v| v.parse::<usize>().ok()) {
                cfg.tt_size_mb = mb.clamp(1, 131_072);
            }
        }
        "threads" => {
            if let Some(n) = value.and_then(|v| v.parse::<usize>().ok()) {
                cfg.threads = n.min(64);
            }
        }
        "max depth" => {
            if let Some(d) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.max_depth = d.clamp(1, 128);
            }
        }
        "max nodes" => {
            if let Some(n) = value.and_then(|v| v.parse::<u64>().ok()) {
                cfg.max_nodes = n;
            }
        }
        "move overhead" => {
            if let Some(ms) = value.and_then(|v| v.parse::<u64>().ok()) {
                cfg.move_overhead_ms = ms.min(5_000);
            }
        }
        "ponder" => {
            if let Some(b) = parse_bool(value) {
                cfg.ponder = b;
            }
        }
        "use null move" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_null_move = b;
            }
        }
        "use lmr" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_lmr = b;
            }
        }
        "use aspiration" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_aspiration = b;
            }
        }
        "use lmp" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_lmp = b;
            }
        }
        "use iid" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_iid = b;
            }
        }
        "use singular extension" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_singular_ext = b;
            }
        }
        "use futility" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_futility = b;
            }
        }
        "use reverse futility" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_reverse_futility = b;
            }
        }
        "use see pruning" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_see_pruning = b;
            }
        }
        "use prob cut" => {
            if let Some(b) = parse_bool(value) {
                cfg.use_prob_cut = b;
            }
        }
        "qsearch quiet checks" => {
            if let Some(b) = parse_bool(value) {
                cfg.qsearch_quiet_checks = b;
            }
        }
        "lmr use history" => {
            if let Some(b) = parse_bool(value) {
                cfg.lmr_use_history = b;
            }
        }
        "aspiration window" => {
            if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.aspiration_window = v.clamp(5, 200);
            }
        }
        "futility margin" => {
            if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.futility_margin = v.clamp(50, 500);
            }
        }
        "lmp depth max" => {
            if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.lmp_depth_max = v.clamp(1, 8);
            }
        }
        "lmp base" => {
            if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.lmp_base = v.clamp(0, 16);
            }
        }
        "lmr base" => {
            if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.lmr_base = v.clamp(0, 3);
            }
        }
        "lmr max" => {
            if let Some(v) = value.and_then(|v| v.parse::<i32>().ok()) {
                cfg.lmr_max = v.clamp(1, 6);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_options_update_config() {
        let mut cfg = EngineConfig::default();
        apply_setoption(&mut cfg, "Hash", Some("256"));
        assert_eq!(cfg.tt_size_mb, 256);
        apply_setoption(&mut cfg, "threads", Some("4"));
        assert_eq!(cfg.threads, 4);
        apply_setoption(&mut cfg, "Use Null Move", Some("false"));
        assert!(!cfg.use_null_move);
        apply_setoption(&mut cfg, "Aspiration Window", Some("40"));
        assert_eq!(cfg.aspiration_window, 40);
    }

    #[test]
    fn unknown_or_bad_values_are_ignored() {
        let mut cfg = EngineConfig::default();
        let before_mb = cfg.tt_size_mb;
        apply_setoption(&mut cfg, "NoSuchOption", Some("7"));
        apply_setoption(&mut cfg, "Hash", Some("banana"));
        apply_setoption(&mut cfg, "Hash", None);
        assert_eq!(cfg.tt_size_mb, before_mb);
    }

    #[test]
    fn values_are_clamped() {
        let mut cfg = EngineConfig::default();
        apply_setoption(&mut cfg, "Hash", Some("999999999"));
        assert_eq!(cfg.tt_size_mb, 131_072);
        apply_setoption(&mut cfg, "LMR Max", Some("99"));
        assert_eq!(cfg.lmr_max, 6);
    }
}

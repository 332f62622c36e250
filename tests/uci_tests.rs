//! UCI plumbing: the command loop drives the engine without panicking and
//! observes protocol-level state rules.

use sable::uci::{parse_line, UciCommand};

#[test]
fn full_session_of_commands_is_accepted() {
    let mut uci = sable::uci::Uci::new();
    for line in [
        "uci",
        "isready",
        "setoption name Hash value 16",
        "setoption name Threads value 1",
        "setoption name Use Null Move value false",
        "ucinewgame",
        "position startpos moves e2e4 e7e5",
        "go depth 2",
        "stop",
        "isready",
        "position fen 4k3/8/8/8/8/8/8/4K3 w - - 0 1",
        "go depth 1",
        "stop",
        "nonsense in the middle",
    ] {
        assert!(uci.handle_line(line), "{line} ended the session");
    }
    assert!(!uci.handle_line("quit"));
}

#[test]
fn illegal_moves_stop_processing_but_keep_state() {
    let mut uci = sable::uci::Uci::new();
    // The second move is illegal; the first must stick.
    assert!(uci.handle_line("position startpos moves e2e4 e2e4 e7e5"));
    // A follow-up command still works.
    assert!(uci.handle_line("isready"));
}

#[test]
fn go_tokens_parse_into_limits() {
    let UciCommand::Go(go) = parse_line("go depth 9 movetime 250 ponder") else {
        panic!("go did not parse");
    };
    assert_eq!(go.depth, Some(9));
    assert_eq!(go.movetime_ms, Some(250));
    assert!(go.ponder);
}

#[test]
fn malformed_lines_are_ignored() {
    assert_eq!(parse_line("setoption value 3"), UciCommand::Unknown);
    assert_eq!(parse_line("banana"), UciCommand::Unknown);
    // Missing numbers leave the field unset instead of failing.
    let UciCommand::Go(go) = parse_line("go depth") else {
        panic!("go did not parse");
    };
    assert_eq!(go.depth, None);
}

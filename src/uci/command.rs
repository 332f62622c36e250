//! UCI command parsing.

use crate::engine::GoLimits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    SetOption { name: String, value: Option<String> },
    Position { fen: Option<String>, moves: Vec<String> },
    Go(ParsedGo),
    Stop,
    PonderHit,
    Quit,
    /// Anything unrecognised; ignored per protocol.
    Unknown,
}

/// `GoLimits` plus nothing: a named wrapper keeps `PartialEq` derivable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedGo {
    pub depth: Option<i32>,
    pub movetime_ms: Option<u64>,
    pub wtime_ms: Option<u64>,
    pub btime_ms: Option<u64>,
    pub winc_ms: Option<u64>,
    pub binc_ms: Option<u64>,
    pub movestogo: Option<u32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
}

impl From<ParsedGo> for GoLimits {
    fn from(p: ParsedGo) -> GoLimits {
        GoLimits {
            depth: p.depth,
            movetime_ms: p.movetime_ms,
            wtime_ms: p.wtime_ms,
            btime_ms: p.btime_ms,
            winc_ms: p.winc_ms,
            binc_ms: p.binc_ms,
            movestogo: p.movestogo,
            nodes: p.nodes,
            infinite: p.infinite,
            ponder: p.ponder,
        }
    }
}

/// Parse one line. Unknown lines map to `Unknown`, never to an error.
#[must_use]
pub fn parse_line(line: &str) -> UciCommand {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = tokens.first() else {
        return UciCommand::Unknown;
    };

    match head {
        "uci" => UciCommand::Uci,
        "isready" => UciCommand::IsReady,
        "ucinewgame" => UciCommand::NewGame,
        "setoption" => parse_setoption(&tokens),
        "position" => parse_position(&tokens),
        "go" => UciCommand::Go(parse_go(&tokens)),
        "stop" => UciCommand::Stop,
        "ponderhit" => UciCommand::PonderHit,
        "quit" => UciCommand::Quit,
        _ => UciCommand::Unknown,
    }
}

fn parse_setoption(tokens: &[&str]) -> UciCommand {
    let mut name_parts: Vec<&str> = Vec::new();
    let mut value_parts: Vec<&str> = Vec::new();
    let mut mode = "";
    for &token in &tokens[1..] {
        match token {
            "name" => mode = "name",
            "value" => mode = "value",
            _ => match mode {
                "name" => name_parts.push(token),
                "value" => value_parts.push(token),
                _ => {}
            },
        }
    }
    if name_parts.is_empty() {
        return UciCommand::Unknown;
    }
    UciCommand::SetOption {
        name: name_parts.join(" "),
        value: if value_parts.is_empty() {
            None
        } else {
            Some(value_parts.join(" "))
        },
    }
}

fn parse_position(tokens: &[&str]) -> UciCommand {
    let mut fen = None;
    let mut moves = Vec::new();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "startpos" => i += 1,
            "fen" => {
                // A FEN is the next up-to-six fields, ending at `moves`.
                let start = i + 1;
                let mut end = start;
                while end < tokens.len() && tokens[end] != "moves" && end - start < 6 {
                    end += 1;
                }
                fen = Some(tokens[start..end].join(" "));
                i = end;
            }
            "moves" => {
                moves = tokens[i + 1..].iter().map(ToString::to_string).collect();
                break;
            }
            _ => i += 1,
        }
    }
    UciCommand::Position { fen, moves }
}

fn parse_go(tokens: &[&str]) -> ParsedGo {
    let mut go = ParsedGo::default();
    let mut i = 1;
    while i < tokens.len() {
        let value = tokens.get(i + 1);
        let parse_u64 = || value.and_then(|v| v.parse::<u64>().ok());
        match tokens[i] {
            "depth" => {
                go.depth = value.and_then(|v| v.parse::<i32>().ok());
                i += 2;
            }
            "movetime" => {
                go.movetime_ms = parse_u64();
                i += 2;
            }
            "wtime" => {
                go.wtime_ms = parse_u64();
                i += 2;
            }
            "btime" => {
                go.btime_ms = parse_u64();
                i += 2;
            }
            "winc" => {
                go.winc_ms = parse_u64();
                i += 2;
            }
            "binc" => {
                go.binc_ms = parse_u64();
                i += 2;
            }
            "movestogo" => {
                go.movestogo = value.and_then(|v| v.parse::<u32>().ok());
                i += 2;
            }
            "nodes" => {
                go.nodes = parse_u64();
                i += 2;
            }
            "infinite" => {
                go.infinite = true;
                i += 1;
            }
            "ponder" => {
                go.ponder = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    go
}

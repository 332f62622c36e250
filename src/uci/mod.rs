//! UCI front end: the stdin loop, search-thread management, and output.

mod command;
mod options;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::engine::{Engine, GoLimits};
use crate::search::IterationInfo;

pub use command::{parse_line, ParsedGo, UciCommand};

pub struct Uci {
    engine: Arc<Mutex<Engine>>,
    /// Option state; pushed into the engine before each search.
    cfg: EngineConfig,
    stop: Arc<AtomicBool>,
    search_thread: Option<JoinHandle<()>>,
}

impl Uci {
    #[must_use]
    pub fn new() -> Self {
        let cfg = EngineConfig::default();
        let engine = Engine::new(cfg.clone());
        let stop = engine.stop_handle();
        let engine = Arc::new(Mutex::new(engine));

        {
            let mut guard = engine.lock();
            guard.set_info_callback(Some(Arc::new(print_info)));
        }

        Uci {
            engine,
            cfg,
            stop,
            search_thread: None,
        }
    }

    /// Read stdin until `quit` or EOF.
    pub fn run(&mut self) {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.handle_line(&line) {
                break;
            }
        }
        self.abort_search();
    }

    /// Handle one line; false means quit.
    pub fn handle_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            UciCommand::Uci => options::print_uci_identity(&self.cfg),
            UciCommand::IsReady => println!("readyok"),
            UciCommand::SetOption { name, value } => {
                self.abort_search();
                options::apply_setoption(&mut self.cfg, &name, value.as_deref());
                self.engine.lock().apply_config(self.cfg.clone());
            }
            UciCommand::NewGame => {
                self.abort_search();
                self.engine.lock().new_game();
            }
            UciCommand::Position { fen, moves } => {
                self.abort_search();
                let mut engine = self.engine.lock();
                if let Err(err) = engine.set_position(fen.as_deref()) {
                    eprintln!("info string bad fen, using start position: {err}");
                    let _ = engine.set_position(None);
                }
                for mv in &moves {
                    if let Err(err) = engine.apply_move(mv) {
                        eprintln!("info string stopping at illegal move: {err}");
                        #[cfg(feature = "logging")]
                        log::warn!("position command rejected move {mv}: {err}");
                        break;
                    }
                }
            }
            UciCommand::Go(parsed) => {
                self.abort_search();
                self.start_search(parsed.into());
            }
            UciCommand::Stop => self.abort_search(),
            UciCommand::PonderHit => {}
            UciCommand::Quit => return false,
            UciCommand::Unknown => {}
        }
        true
    }

    /// Kick off a search on a worker thread; it prints `bestmove` when done.
    fn start_search(&mut self, limits: GoLimits) {
        let engine = Arc::clone(&self.engine);
        let cfg = self.cfg.clone();
        let handle = std::thread::Builder::new()
            .name("search-main".to_string())
            .stack_size(32 * 1024 * 1024)
            .spawn(move || {
                let mut engine = engine.lock();
                engine.apply_config(cfg);
                let report = engine.find_best_move(&limits);
                match report.best_move {
                    Some(best) => match report.ponder_move {
                        Some(ponder) => println!("bestmove {best} ponder {ponder}"),
                        None => println!("bestmove {best}"),
                    },
                    None => println!("bestmove 0000"),
                }
            })
            .expect("failed to spawn search thread");
        self.search_thread = Some(handle);
    }

    /// Raise the stop flag and wait for the worker so its `bestmove` line is
    /// on the wire before the next command is processed.
    fn abort_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            self.stop.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

impl Default for Uci {
    fn default() -> Self {
        Uci::new()
    }
}

/// One `info` line per completed iteration.
fn print_info(info: &IterationInfo) {
    let score = match info.mate_in {
        Some(mate) => format!("mate {mate}"),
        None => format!("cp {}", info.score),
    };
    let pv = info
        .pv
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "info depth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
        info.depth, score, info.nodes, info.nps, info.hashfull, info.time_ms, pv
    );
}

/// Run the blocking UCI loop; the binary's whole job.
pub fn run_loop() {
    let mut uci = Uci::new();
    uci.run();
}

//! Throughput benchmarks: move generation, evaluation, and fixed-depth
//! searches over a small tactical position set.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sable::board::movegen::{self, perft};
use sable::eval::Evaluator;
use sable::{Engine, EngineConfig, GoLimits, MoveList, Position};

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
/// Exchange-sacrifice ending: the d2 rook gives itself up to free the passer.
const EXCHANGE_SAC: &str = "8/5k2/5p2/pp6/2pB4/P1P3K1/1n1r1P2/1R6 b - - 8 49";

fn bench_movegen(c: &mut Criterion) {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    c.bench_function("movegen_kiwipete", |b| {
        b.iter(|| {
            let mut list = MoveList::new();
            movegen::generate_pseudo_legal(black_box(&pos), &mut list);
            black_box(list.len())
        });
    });
    c.bench_function("perft4_startpos", |b| {
        let mut start = Position::from_fen(STARTPOS).unwrap();
        b.iter(|| black_box(perft(&mut start, 4)));
    });
}

fn bench_eval(c: &mut Criterion) {
    let positions: Vec<Position> = [STARTPOS, KIWIPETE, EXCHANGE_SAC]
        .iter()
        .map(|fen| Position::from_fen(fen).unwrap())
        .collect();
    let mut evaluator = Evaluator::new();
    c.bench_function("evaluate_three_positions", |b| {
        b.iter(|| {
            let mut total = 0;
            for pos in &positions {
                total += evaluator.evaluate(black_box(pos));
            }
            black_box(total)
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for (name, fen, depth) in [
        ("startpos_d5", STARTPOS, 5),
        ("kiwipete_d4", KIWIPETE, 4),
        ("exchange_sac_d6", EXCHANGE_SAC, 6),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut engine = Engine::new(EngineConfig {
                    tt_size_mb: 16,
                    ..EngineConfig::default()
                });
                engine.set_position(Some(fen)).unwrap();
                let report = engine.find_best_move(&GoLimits {
                    depth: Some(depth),
                    ..GoLimits::default()
                });
                black_box(report.stats.nodes)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_movegen, bench_eval, bench_search);
criterion_main!(benches);

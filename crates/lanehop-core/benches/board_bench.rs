use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use lanehop_core::{Board, BoardConfig};
use std::hint::black_box;

fn full_board() -> Board {
    Board::new(BoardConfig {
        level: 17,
        rng_seed: Some(0xBEEF),
        ..BoardConfig::default()
    })
    .expect("board")
}

fn bench_board(c: &mut Criterion) {
    let mut group = c.benchmark_group("board");

    group.bench_function("tick_64_level17", |b| {
        b.iter_batched(
            full_board,
            |mut board| {
                for _ in 0..64 {
                    board.tick();
                }
                board
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("extract_features_level17", |b| {
        let mut board = full_board();
        for _ in 0..8 {
            board.tick();
        }
        b.iter(|| black_box(board.extract_features()));
    });

    group.finish();
}

criterion_group!(benches, bench_board);
criterion_main!(benches);

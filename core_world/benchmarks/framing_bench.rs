use core_world::LineFramer;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

const MAX_LINE_BYTES: usize = 64 * 1024;

fn payload(lines: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for idx in 0..lines {
        let value = (idx % 100) as f32 / 100.0;
        data.extend_from_slice(
            format!("{{\"type\":\"SET_TRAIT\",\"trait\":\"openness\",\"value\":{value}}}\n")
                .as_bytes(),
        );
    }
    data
}

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");
    let data = payload(1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk in [1usize, 16, 256, 4096, data.len()] {
        group.bench_with_input(BenchmarkId::new("chunked", chunk), &chunk, |b, &chunk| {
            b.iter_batched(
                || LineFramer::new(MAX_LINE_BYTES),
                |mut framer| {
                    let mut emitted = 0usize;
                    for piece in data.chunks(chunk) {
                        framer.push(piece).expect("within bound");
                        emitted += framer.drain_lines().count();
                    }
                    emitted
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(framing_benches, bench_framing);
criterion_main!(framing_benches);

//! Benchmarks for the SSE frame decoder.
//!
//! Measures decoding a realistic streamed reply (a few hundred frames of
//! Vietnamese text) delivered as one read, as small network-sized reads,
//! and byte by byte.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use medchat_client::SseDecoder;

/// Build a streamed reply of `frames` chunk frames.
fn generate_stream(frames: usize) -> Vec<u8> {
    let words = [
        "Triệu chứng ",
        "thường gặp ",
        "của cảm cúm ",
        "gồm sốt, ",
        "ho, ",
        "đau họng ",
        "và mệt mỏi. ",
        "Nên nghỉ ngơi ",
        "và uống nhiều nước. ",
    ];
    let mut body = String::new();
    for i in 0..frames {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({ "chunk": words[i % words.len()] })
        ));
    }
    body.into_bytes()
}

fn decode(reads: &[&[u8]]) -> usize {
    let mut decoder = SseDecoder::new();
    let mut count = 0;
    for read in reads {
        count += decoder.push(read).len();
    }
    decoder.finish();
    count
}

fn bench_sse_decoding(c: &mut Criterion) {
    let body = generate_stream(500);
    let whole: Vec<&[u8]> = vec![&body];
    let network_reads: Vec<&[u8]> = body.chunks(1460).collect();
    let single_bytes: Vec<&[u8]> = body.chunks(1).collect();

    let mut group = c.benchmark_group("sse_decoding");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("single_read_500_frames", |b| {
        b.iter(|| decode(black_box(&whole)))
    });

    group.bench_function("mtu_reads_500_frames", |b| {
        b.iter(|| decode(black_box(&network_reads)))
    });

    group.bench_function("byte_reads_500_frames", |b| {
        b.iter(|| decode(black_box(&single_bytes)))
    });

    group.finish();
}

criterion_group!(benches, bench_sse_decoding);
criterion_main!(benches);

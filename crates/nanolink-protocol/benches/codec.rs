//! Codec benchmarks for nanolink-protocol.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nanolink_protocol::{codec, Framer, Message, Topic};

fn bench_encode_small(c: &mut Criterion) {
    let message = Message::send(Topic::from(1u32), "x".repeat(64));

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("send_64B", |b| b.iter(|| codec::encode(black_box(&message))));
    group.finish();
}

fn bench_decode_small(c: &mut Criterion) {
    let encoded = codec::encode(&Message::request(Topic::from(1u32), 42, "x".repeat(64)));

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("request_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_framed_roundtrip(c: &mut Criterion) {
    let message = Message::send(Topic::new("test:topic:room").unwrap(), "x".repeat(256));

    c.bench_function("framed_roundtrip_256B", |b| {
        let mut framer = Framer::default();
        let mut buf = BytesMut::with_capacity(512);
        b.iter(|| {
            framer.encode_into(black_box(&message), &mut buf).unwrap();
            let record = framer.decode_from(&mut buf).unwrap().unwrap();
            codec::decode_bytes(black_box(&record)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_encode_small,
    bench_decode_small,
    bench_framed_roundtrip
);
criterion_main!(benches);

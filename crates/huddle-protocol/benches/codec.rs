//! Codec benchmarks for huddle-protocol.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use huddle_protocol::{codec, ControlRequest};

const TOKEN: &[u8] = b"00112233445566778899aabbccddeeff";

fn bench_encode_datagram(c: &mut Criterion) {
    let message = vec![b'x'; 256];

    let mut group = c.benchmark_group("encode_datagram");
    group.throughput(Throughput::Bytes(message.len() as u64));
    group.bench_function("256B", |b| {
        b.iter(|| codec::encode_datagram(black_box(b"general"), TOKEN, black_box(&message)))
    });
    group.finish();
}

fn bench_decode_datagram(c: &mut Criterion) {
    let encoded = codec::encode_datagram(b"general", TOKEN, &[b'x'; 256]).unwrap();

    let mut group = c.benchmark_group("decode_datagram");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("256B", |b| {
        b.iter(|| codec::decode_datagram(black_box(Bytes::clone(&encoded))))
    });
    group.finish();
}

fn bench_control_request(c: &mut Criterion) {
    let request = ControlRequest::join("general", "abc", "bob");
    let encoded = codec::encode_control_request(&request).unwrap();

    c.bench_function("control_request_decode", |b| {
        b.iter(|| codec::decode_control_request(black_box(&encoded)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_encode_datagram,
    bench_decode_datagram,
    bench_control_request
);
criterion_main!(benches);

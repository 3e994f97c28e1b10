//! Checksum benchmarks
//!
//! Measures both CRC-16 implementations over representative wire
//! traffic: a short framed command and a full multi-tool tracking
//! reply. The two forms compute the same function, so any divergence
//! in throughput shows up here.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndicapi_rust::protocol::{binary_crc, text_crc, verify_text_reply};

/// A nine-tool tracking reply with valid framing, about 640 bytes.
fn tracking_reply() -> Vec<u8> {
    let record = "0A+09999+00000+00000+00000+010000+000000+000000+000120000003D0000001F";
    let mut payload = String::from("09");
    for _ in 0..9 {
        payload.push_str(record);
        payload.push('\n');
    }
    payload.push_str("0000");
    let crc = text_crc(payload.as_bytes());
    let mut reply = payload.into_bytes();
    reply.extend_from_slice(format!("{:04X}\r", crc).as_bytes());
    reply
}

fn bench_text_crc_command(c: &mut Criterion) {
    c.bench_function("text_crc_command", |b| {
        b.iter(|| black_box(text_crc(black_box(b"PHINF:0A0025"))));
    });
}

fn bench_text_crc_tracking_reply(c: &mut Criterion) {
    let reply = tracking_reply();
    c.bench_function("text_crc_tracking_reply", |b| {
        b.iter(|| black_box(text_crc(black_box(&reply))));
    });
}

fn bench_binary_crc_tracking_reply(c: &mut Criterion) {
    let reply = tracking_reply();
    c.bench_function("binary_crc_tracking_reply", |b| {
        b.iter(|| black_box(binary_crc(black_box(&reply))));
    });
}

fn bench_verify_tracking_reply(c: &mut Criterion) {
    let reply = tracking_reply();
    c.bench_function("verify_tracking_reply", |b| {
        b.iter(|| {
            let payload = verify_text_reply(black_box(&reply)).unwrap();
            black_box(payload.len())
        });
    });
}

criterion_group!(
    benches,
    bench_text_crc_command,
    bench_text_crc_tracking_reply,
    bench_binary_crc_tracking_reply,
    bench_verify_tracking_reply
);

criterion_main!(benches);

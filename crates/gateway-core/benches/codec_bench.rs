//! Criterion benchmarks for the authorization command codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package gateway-core --bench codec_bench
//! ```

use std::net::Ipv4Addr;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gateway_core::{decode_command, encode_command, AuthorizationCommand, Expiration};

fn make_commands() -> Vec<(&'static str, AuthorizationCommand)> {
    vec![
        (
            "never",
            AuthorizationCommand::authenticate(Ipv4Addr::new(127, 0, 0, 1), Expiration::Never),
        ),
        (
            "one_hour",
            AuthorizationCommand::authenticate(Ipv4Addr::new(10, 20, 30, 40), Expiration::After(3600)),
        ),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");
    for (name, cmd) in make_commands() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &cmd, |b, cmd| {
            b.iter(|| encode_command(black_box(cmd)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_command");
    for (name, cmd) in make_commands() {
        let bytes = encode_command(&cmd);
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_command(black_box(bytes)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);

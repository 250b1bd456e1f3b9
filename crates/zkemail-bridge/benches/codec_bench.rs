// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for argument decoding in the zkemail-bridge crate.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use zkemail_bridge::codec::{decode_prove, decode_verify};
use zkemail_core::Value;

/// Prove payload with a padded header of `header_len` bytes and 18 limbs per
/// big integer, the shape of a 2048-bit RSA DKIM signature.
fn prove_payload(header_len: usize) -> Value {
    let limbs = |seed: u64| {
        Value::List(
            (0..18)
                .map(|i| Value::from(format!("0x{:030x}", seed.wrapping_mul(i + 1))))
                .collect(),
        )
    };
    let single = |n: usize| Value::List(vec![Value::from(n.to_string())]);

    Value::map([
        ("srsPath", Value::from("/data/user/0/app/files/srs.local")),
        (
            "inputs",
            Value::map([
                ("header_storage", Value::Bytes(vec![b'a'; header_len])),
                ("header_len", single(header_len)),
                ("pubkey_modulus", limbs(0x9e37_79b9)),
                ("pubkey_redc", limbs(0x85eb_ca6b)),
                ("signature", limbs(0xc2b2_ae35)),
                ("date_index", single(12)),
                ("subject_index", single(40)),
                ("subject_length", single(20)),
                ("from_header_index", single(0)),
                ("from_header_length", single(30)),
                ("from_address_index", single(6)),
                ("from_address_length", single(18)),
            ]),
        ),
    ])
}

/// Benchmark prove-payload validation across header sizes.
///
/// Sizes: 512, 1 KiB and 4 KiB headers; real DKIM-signed headers sit in the
/// low hundreds to a few thousand bytes.
fn bench_decode_prove(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_prove");
    for size in [512usize, 1024, 4096] {
        let payload = prove_payload(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, p| {
            b.iter(|| black_box(decode_prove(black_box(p)).expect("valid payload")));
        });
    }
    group.finish();
}

/// Benchmark verify-payload validation on a 16 KiB proof.
fn bench_decode_verify(c: &mut Criterion) {
    let payload = Value::map([
        ("srsPath", Value::from("/data/user/0/app/files/srs.local")),
        ("proof", Value::Bytes(vec![0x5a; 16 * 1024])),
    ]);
    c.bench_function("decode_verify (16 KiB)", |b| {
        b.iter(|| black_box(decode_verify(black_box(&payload)).expect("valid payload")));
    });
}

criterion_group!(benches, bench_decode_prove, bench_decode_verify);
criterion_main!(benches);

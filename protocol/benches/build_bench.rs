// Build, sign and verify benchmarks for the spend core.
//
// Covers the sighash digest, building a signed transaction from one and
// from many inputs, and verifying every input of a built transaction.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use memo_protocol::crypto::SpendKey;
use memo_protocol::fee::FeePolicy;
use memo_protocol::script::Script;
use memo_protocol::transaction::sighash::signature_hash_all;
use memo_protocol::transaction::{
    verify_transaction, OutPoint, SpendOutput, TransactionBuilder, TxId,
};
use memo_protocol::utxo::UnspentOutput;

fn inputs(key: &SpendKey, count: usize) -> Vec<UnspentOutput> {
    (0..count)
        .map(|i| UnspentOutput {
            outpoint: OutPoint::new(TxId::from_bytes([(i % 251) as u8; 32]), i as u32),
            value: 5_000,
            script: Script::pay_to_key_hash(&key.pk_hash()),
            height: Some(800_000),
        })
        .collect()
}

fn post() -> Vec<SpendOutput> {
    vec![SpendOutput::DataEmbed {
        payload: b"\x6d\x02benchmarking the spend path".to_vec(),
    }]
}

fn bench_sighash(c: &mut Criterion) {
    let key = SpendKey::from_seed(&[1u8; 32]);
    let policy = FeePolicy::default();
    let built = TransactionBuilder::new(&policy)
        .build(inputs(&key, 1), &key, &post())
        .unwrap();
    let spent = &built.spent[0];

    c.bench_function("sighash/single_input", |b| {
        b.iter(|| signature_hash_all(&built.transaction, 0, &spent.script, spent.value).unwrap());
    });
}

fn bench_build(c: &mut Criterion) {
    let key = SpendKey::from_seed(&[2u8; 32]);
    let policy = FeePolicy::default();
    let outputs = post();

    let mut group = c.benchmark_group("builder/build_and_sign");
    for count in [1usize, 10, 50] {
        let utxos = inputs(&key, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &utxos, |b, utxos| {
            b.iter(|| {
                TransactionBuilder::new(&policy)
                    .build(utxos.clone(), &key, &outputs)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let key = SpendKey::from_seed(&[3u8; 32]);
    let policy = FeePolicy::default();
    let built = TransactionBuilder::new(&policy)
        .build(inputs(&key, 10), &key, &post())
        .unwrap();

    c.bench_function("verify/ten_inputs", |b| {
        b.iter(|| verify_transaction(&built.transaction, &built.spent).unwrap());
    });
}

criterion_group!(benches, bench_sighash, bench_build, bench_verify);
criterion_main!(benches);

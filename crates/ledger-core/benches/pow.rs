use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{chain::genesis_block, mine::find_proof_parallel, pow::find_proof};

fn bench_pow(c: &mut Criterion) {
    let genesis = genesis_block();
    let previous_hash = genesis.hash();

    c.bench_function("find_proof_sequential", |b| {
        b.iter(|| find_proof(genesis.proof, &previous_hash));
    });

    c.bench_function("find_proof_parallel", |b| {
        b.iter(|| find_proof_parallel(genesis.proof, &previous_hash, || false));
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);

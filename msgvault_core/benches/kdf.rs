use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use msgvault_core::{AeadCipher, KeyDerivation, MasterSecret, PasswordHasher};

fn kdf_benchmarks(c: &mut Criterion) {
    let master = Arc::new(MasterSecret::new(vec![0x5au8; 32]).unwrap());
    let kdf = KeyDerivation::new(master.clone());
    let salt = [7u8; 32];

    let mut group = c.benchmark_group("kdf");
    group.sample_size(10);

    group.bench_function("derive_envelope_key", |b| {
        b.iter(|| kdf.derive(black_box(&salt)))
    });

    let hasher = PasswordHasher::default();
    group.bench_function("hash_password", |b| {
        b.iter(|| hasher.hash(black_box("correct horse battery staple")).unwrap())
    });

    let cipher = AeadCipher::new(KeyDerivation::new(master));
    let payload = vec![0u8; 4096];
    group.bench_function("encrypt_4k", |b| {
        b.iter(|| cipher.encrypt(black_box(&payload)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, kdf_benchmarks);
criterion_main!(benches);

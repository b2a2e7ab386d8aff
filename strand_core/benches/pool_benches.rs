use criterion::{criterion_group, criterion_main, Criterion};
use strand_core::{SharedStr, StrPool};

fn criterion_benchmark(c: &mut Criterion) {
  c.bench_function("intern hit", |b| {
    let pool = StrPool::new();
    let keep = pool.intern("benchmark content");

    b.iter(|| pool.intern("benchmark content"));

    drop(keep);
  });

  c.bench_function("intern miss", |b| {
    let pool = StrPool::new();
    let mut round = 0u64;

    b.iter(|| {
      round += 1;
      pool.intern(format!("benchmark content {round}"))
    });
  });

  c.bench_function("clone handle", |b| {
    let pool = StrPool::new();
    let keep = pool.intern("benchmark content");

    b.iter(|| keep.clone());
  });

  c.bench_function("empty handle", |b| {
    b.iter(SharedStr::new);
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

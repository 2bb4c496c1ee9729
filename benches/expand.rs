//! Safe-read expansion benchmarks
//!
//! Run with: cargo bench --bench expand

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use tplir::{CompatibilityMode, CompilationJob, CompilationUnit, Op};

/// Build a job holding one chain of `links` accesses, alternating safe and
/// plain links, rooted at a bare reference.
fn chain_job(links: usize) -> CompilationJob {
    let mut job = CompilationJob::new(CompatibilityMode::Standard);
    let mut expr = job.arena.read_var("root");
    for i in 0..links {
        expr = if i % 2 == 0 {
            job.arena.safe_prop(expr, format!("p{i}"))
        } else {
            job.arena.prop(expr, format!("p{i}"))
        };
    }
    let mut unit = CompilationUnit::new();
    unit.ops.push(Op::Statement { expr });
    job.units.push(unit);
    job
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_safe_chain");
    for links in [8usize, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(links), &links, |b, &links| {
            b.iter_batched(
                || chain_job(links),
                |mut job| {
                    tplir::passes::run(&mut job);
                    job
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);

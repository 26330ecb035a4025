use criterion::{black_box, criterion_group, criterion_main, Criterion};
use finalg::{cg, Closer, IntArray, Operation, OperationSymbol, PowerCloser, SmallAlgebra};

fn cyclic(n: usize) -> SmallAlgebra {
    let add = Operation::computed(OperationSymbol::new("add", 2), n, move |a| {
        Ok((a[0] + a[1]) % n)
    })
    .unwrap();
    SmallAlgebra::new(format!("z{}", n), n, vec![add]).unwrap()
}

fn bench_cg(c: &mut Criterion) {
    let alg = cyclic(24);
    c.bench_function("cg z24", |b| {
        b.iter(|| cg(&alg, black_box(0), black_box(8)).unwrap())
    });
}

fn bench_con(c: &mut Criterion) {
    c.bench_function("con z12", |b| {
        b.iter(|| {
            // fresh algebra each round so the memo does not short-circuit
            let alg = cyclic(12);
            black_box(alg.con().unwrap().size())
        })
    });
}

fn bench_closure(c: &mut Criterion) {
    let alg = cyclic(60);
    c.bench_function("sg z60", |b| {
        b.iter(|| {
            Closer::new(&alg, black_box(&[7])).unwrap().close().unwrap()
        })
    });
}

fn bench_power_closure(c: &mut Criterion) {
    let alg = cyclic(6);
    let gens = vec![IntArray::new(vec![1, 2, 3])];
    c.bench_function("sg z6^3", |b| {
        b.iter(|| {
            PowerCloser::new(&alg, 3, black_box(&gens))
                .unwrap()
                .close()
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_cg, bench_con, bench_closure, bench_power_closure);
criterion_main!(benches);

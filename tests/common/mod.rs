//! Shared fixtures: the small algebras the scenario tests revolve
//! around.
#![allow(dead_code)]

use finalg::{Operation, OperationSymbol, SmallAlgebra};

/// Install a subscriber so `RUST_LOG=debug cargo test` shows the phase
/// logging of the closure and lattice algorithms.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a binary operation from a function.
pub fn binary(name: &str, n: usize, f: impl Fn(usize, usize) -> usize + Send + Sync + 'static) -> Operation {
    Operation::computed(OperationSymbol::new(name, 2), n, move |a| Ok(f(a[0], a[1]))).unwrap()
}

/// The two element lattice.
pub fn lat2() -> SmallAlgebra {
    SmallAlgebra::new(
        "lat2",
        2,
        vec![
            binary("join", 2, |x, y| x.max(y)),
            binary("meet", 2, |x, y| x.min(y)),
        ],
    )
    .unwrap()
}

/// The diamond M3: bottom 0, atoms 1, 2, 3, top 4.
pub fn m3() -> SmallAlgebra {
    fn join(x: usize, y: usize) -> usize {
        match (x, y) {
            _ if x == y => x,
            (0, z) | (z, 0) => z,
            _ => 4,
        }
    }
    fn meet(x: usize, y: usize) -> usize {
        match (x, y) {
            _ if x == y => x,
            (4, z) | (z, 4) => z,
            _ => 0,
        }
    }
    SmallAlgebra::new(
        "m3",
        5,
        vec![binary("join", 5, join), binary("meet", 5, meet)],
    )
    .unwrap()
}

/// The pentagon N5: bottom 0, chain 0 < 1 < 2 < 4, side element 3.
pub fn n5() -> SmallAlgebra {
    fn leq(x: usize, y: usize) -> bool {
        x == y
            || x == 0
            || y == 4
            || (x == 1 && y == 2)
    }
    fn join(x: usize, y: usize) -> usize {
        for z in [0, 1, 2, 3, 4] {
            if leq(x, z) && leq(y, z) {
                return z;
            }
        }
        4
    }
    fn meet(x: usize, y: usize) -> usize {
        for z in [4, 3, 2, 1, 0] {
            if leq(z, x) && leq(z, y) {
                return z;
            }
        }
        0
    }
    SmallAlgebra::new(
        "n5",
        5,
        vec![binary("join", 5, join), binary("meet", 5, meet)],
    )
    .unwrap()
}

/// The cyclic group Z3 as a single binary addition.
pub fn z3() -> SmallAlgebra {
    SmallAlgebra::new("z3", 3, vec![binary("add", 3, |x, y| (x + y) % 3)]).unwrap()
}

/// Two binary projections on a three element carrier; every partition is
/// a congruence of this algebra.
pub fn projections3() -> SmallAlgebra {
    SmallAlgebra::new(
        "proj3",
        3,
        vec![
            Operation::projection(0, 2, 3).unwrap(),
            Operation::projection(1, 2, 3).unwrap(),
        ],
    )
    .unwrap()
}

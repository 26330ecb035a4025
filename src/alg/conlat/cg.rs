/*!
Principal congruence generation.

`Cg(a, b)` is the smallest congruence identifying `a` with `b`. The
worker here is a Maltsev chain closure over a queue of newly identified
pairs: for each pair `(x, y)` pulled off the queue, each operation `f`,
each argument position, and each tuple filling the remaining positions,
the images `f(..x..)` and `f(..y..)` are joined and, when that actually
merges two blocks, their roots are enqueued. The partition only coarsens
and the partition lattice is finite, so the queue drains.

`cg_sweep` is the unoptimized fixpoint formulation; it is kept so tests
can cross-check the two on small algebras.
*/

use std::collections::VecDeque;

use tracing::trace;

use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult};
use crate::progress::TaskContext;
use crate::util::tuples;

use super::partition::{find_root, join_blocks, Partition};

/// The principal congruence `Cg(a, b)`.
pub fn cg(algebra: &SmallAlgebra, a: usize, b: usize) -> CalcResult<Partition> {
    cg_with(algebra, a, b, &TaskContext::default())
}

/// [`cg`] with cancellation and progress.
pub fn cg_with(
    algebra: &SmallAlgebra,
    a: usize,
    b: usize,
    ctx: &TaskContext,
) -> CalcResult<Partition> {
    let n = algebra.cardinality();
    check_pair(n, a, b)?;
    if a == b {
        return Ok(Partition::zero(n));
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let mut array = vec![-1i32; n];
    array[lo] = -2;
    array[hi] = lo as i32;
    let mut queue = VecDeque::new();
    queue.push_back((lo, hi));
    chain_close(algebra, array, queue, ctx)
}

/// The smallest congruence above an arbitrary partition.
pub fn cg_partition(algebra: &SmallAlgebra, init: &Partition) -> CalcResult<Partition> {
    cg_partition_with(algebra, init, &TaskContext::default())
}

/// [`cg_partition`] with cancellation and progress.
pub fn cg_partition_with(
    algebra: &SmallAlgebra,
    init: &Partition,
    ctx: &TaskContext,
) -> CalcResult<Partition> {
    if init.size() != algebra.cardinality() {
        return Err(CalcError::invalid_argument(format!(
            "partition over {} elements for an algebra of cardinality {}",
            init.size(),
            algebra.cardinality()
        )));
    }
    let array = init.to_array().to_vec();
    let mut queue = VecDeque::new();
    for block in init.blocks() {
        let root = block[0];
        for &e in &block[1..] {
            queue.push_back((root, e));
        }
    }
    chain_close(algebra, array, queue, ctx)
}

/// Close a raw partition under compatibility, driven by a pair queue.
fn chain_close(
    algebra: &SmallAlgebra,
    mut array: Vec<i32>,
    mut queue: VecDeque<(usize, usize)>,
    ctx: &TaskContext,
) -> CalcResult<Partition> {
    let n = algebra.cardinality();
    let ops = algebra.operations();
    let mut processed = 0usize;
    while let Some((x, y)) = queue.pop_front() {
        ctx.check_cancelled()?;
        processed += 1;
        for op in ops {
            let k = op.arity();
            if k == 0 {
                continue;
            }
            let mut args = vec![0usize; k];
            for position in 0..k {
                args.iter_mut().for_each(|slot| *slot = 0);
                loop {
                    args[position] = x;
                    let r = find_root(&array, op.value(&args)?);
                    args[position] = y;
                    let s = find_root(&array, op.value(&args)?);
                    if r != s {
                        join_blocks(&mut array, r, s);
                        queue.push_back((r, s));
                    }
                    if !tuples::next_tuple_skipping(&mut args, n, position) {
                        break;
                    }
                }
            }
        }
    }
    trace!(pairs = processed, "principal congruence chain drained");
    Partition::from_raw(array)
}

/// Reference formulation: sweep every pair of componentwise-related
/// argument tuples until nothing merges. Exponential in arity; only for
/// cross-checking [`cg`] on small algebras.
pub fn cg_sweep(algebra: &SmallAlgebra, a: usize, b: usize) -> CalcResult<Partition> {
    let n = algebra.cardinality();
    check_pair(n, a, b)?;
    let mut part = Partition::zero(n);
    if a == b {
        return Ok(part);
    }
    part.union(a, b)?;
    loop {
        let mut changed = false;
        for op in algebra.operations() {
            let k = op.arity();
            if k == 0 {
                continue;
            }
            let mut u = vec![0usize; k];
            loop {
                let mut v = vec![0usize; k];
                loop {
                    if u.iter().zip(&v).all(|(&ui, &vi)| part.is_related(ui, vi)) {
                        let fu = op.value(&u)?;
                        let fv = op.value(&v)?;
                        if !part.is_related(fu, fv) {
                            part.union(fu, fv)?;
                            changed = true;
                        }
                    }
                    if !tuples::next_tuple(&mut v, n) {
                        break;
                    }
                }
                if !tuples::next_tuple(&mut u, n) {
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }
    Ok(part)
}

fn check_pair(n: usize, a: usize, b: usize) -> CalcResult<()> {
    if a >= n || b >= n {
        return Err(CalcError::invalid_argument(format!(
            "cg({}, {}) out of range for an algebra of cardinality {}",
            a, b, n
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::op::{Operation, OperationSymbol};

    fn z4() -> SmallAlgebra {
        let add = Operation::computed(OperationSymbol::new("add", 2), 4, |args| {
            Ok((args[0] + args[1]) % 4)
        })
        .unwrap();
        SmallAlgebra::new("z4", 4, vec![add]).unwrap()
    }

    #[test]
    fn cg_of_equal_elements_is_zero() {
        let alg = z4();
        assert!(cg(&alg, 2, 2).unwrap().is_zero());
    }

    #[test]
    fn cg_is_symmetric() {
        let alg = z4();
        assert_eq!(cg(&alg, 1, 3).unwrap(), cg(&alg, 3, 1).unwrap());
    }

    #[test]
    fn z4_has_the_expected_principal_congruences() {
        let alg = z4();
        // identifying 0 with 2 yields the congruence mod the subgroup {0,2}
        let theta = cg(&alg, 0, 2).unwrap();
        assert_eq!(theta.blocks(), vec![vec![0, 2], vec![1, 3]]);
        // identifying 0 with 1 collapses everything
        assert!(cg(&alg, 0, 1).unwrap().is_one());
    }

    #[test]
    fn chain_and_sweep_agree() {
        let alg = z4();
        for a in 0..4 {
            for b in 0..4 {
                assert_eq!(cg(&alg, a, b).unwrap(), cg_sweep(&alg, a, b).unwrap());
            }
        }
    }

    #[test]
    fn cg_partition_closes_an_initial_partition() {
        let alg = z4();
        let init = Partition::from_blocks(4, &[vec![0, 2], vec![1], vec![3]]).unwrap();
        let theta = cg_partition(&alg, &init).unwrap();
        assert_eq!(theta, cg(&alg, 0, 2).unwrap());
    }

    #[test]
    fn out_of_range_pairs_fail() {
        let alg = z4();
        assert!(cg(&alg, 0, 4).is_err());
    }
}

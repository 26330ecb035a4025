/*!
Finite algebras with integer carriers.

A [`SmallAlgebra`] is a carrier `{0..n-1}` together with a list of
operations behind shared handles. The algebra is immutable after
construction; the congruence and subalgebra lattices are computed on
first request and memoized (and not memoized when the computation
fails or is cancelled).

Derived algebras — subalgebra, quotient, product, power — are new
`SmallAlgebra` values. Their operations hold `Arc` handles to the parent
operations plus whatever carrier data they need; nothing points back at
the owning algebra, so no reference cycles arise and "cloning" derived
structure is always shallow.
*/

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{CalcError, CalcResult};
use crate::progress::TaskContext;
use crate::util::tuples;

use super::closer::Closer;
use super::conlat::{self, CongruenceLattice, Partition};
use super::op::{Operation, OperationSymbol};
use super::sublat::SubalgebraLattice;

#[derive(Debug, Clone)]
pub struct SmallAlgebra {
    name: String,
    description: Option<String>,
    size: usize,
    operations: Vec<Arc<Operation>>,
    con: OnceCell<Arc<CongruenceLattice>>,
    sub: OnceCell<Arc<SubalgebraLattice>>,
}

impl SmallAlgebra {
    /// Build an algebra from owned operations.
    pub fn new(
        name: impl Into<String>,
        size: usize,
        operations: Vec<Operation>,
    ) -> CalcResult<Self> {
        Self::from_shared(name, size, operations.into_iter().map(Arc::new).collect())
    }

    /// Build an algebra from shared operation handles.
    pub fn from_shared(
        name: impl Into<String>,
        size: usize,
        operations: Vec<Arc<Operation>>,
    ) -> CalcResult<Self> {
        if size == 0 {
            return Err(CalcError::invalid_argument(
                "an algebra needs a nonempty carrier",
            ));
        }
        for op in &operations {
            if op.set_size() != size {
                return Err(CalcError::invalid_algebra(format!(
                    "operation {} has set size {}, algebra has cardinality {}",
                    op.symbol(),
                    op.set_size(),
                    size
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            description: None,
            size,
            operations,
            con: OnceCell::new(),
            sub: OnceCell::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn cardinality(&self) -> usize {
        self.size
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    /// First operation with the given name.
    pub fn operation_by_name(&self, name: &str) -> Option<&Arc<Operation>> {
        self.operations.iter().find(|op| op.symbol().name() == name)
    }

    /// Operation matching both name and arity.
    pub fn operation_by_symbol(&self, symbol: &OperationSymbol) -> Option<&Arc<Operation>> {
        self.operations.iter().find(|op| op.symbol() == symbol)
    }

    /// The similarity type: operation symbols, sorted.
    pub fn similarity_type(&self) -> Vec<OperationSymbol> {
        let mut symbols: Vec<_> = self
            .operations
            .iter()
            .map(|op| op.symbol().clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// The subuniverse generated by `generators`, sorted.
    pub fn sg(&self, generators: &[usize]) -> CalcResult<Vec<usize>> {
        Closer::new(self, generators)?.close()
    }

    /// The subalgebra on the subuniverse generated by `generators`.
    ///
    /// The carrier is renumbered: local element `i` is `subuniverse[i]`
    /// of this algebra. The operations are the restrictions, sharing the
    /// parent operations.
    pub fn subalgebra(&self, generators: &[usize]) -> CalcResult<SmallAlgebra> {
        let subuniverse = Arc::new(self.sg(generators)?);
        if subuniverse.is_empty() {
            return Err(CalcError::invalid_argument(
                "the generated subuniverse is empty",
            ));
        }
        let operations = self
            .operations
            .iter()
            .map(|op| {
                Operation::restriction_of(Arc::clone(op), Arc::clone(&subuniverse))
                    .map(Arc::new)
            })
            .collect::<CalcResult<Vec<_>>>()?;
        SmallAlgebra::from_shared(
            format!("Sg({})", self.name),
            subuniverse.len(),
            operations,
        )
    }

    /// Whether `partition` is compatible with every operation.
    pub fn is_congruence(&self, partition: &Partition) -> CalcResult<bool> {
        if partition.size() != self.size {
            return Err(CalcError::invalid_argument(format!(
                "partition over {} elements for an algebra of cardinality {}",
                partition.size(),
                self.size
            )));
        }
        // compatibility reduces to f(u) ~ f(rep(u)) for every tuple u
        for op in &self.operations {
            let k = op.arity();
            if k == 0 {
                continue;
            }
            let mut args = vec![0usize; k];
            let mut reps = vec![0usize; k];
            loop {
                for (r, &a) in reps.iter_mut().zip(&args) {
                    *r = partition.representative(a);
                }
                if !partition.is_related(op.value(&args)?, op.value(&reps)?) {
                    return Ok(false);
                }
                if !tuples::next_tuple(&mut args, self.size) {
                    break;
                }
            }
        }
        Ok(true)
    }

    /// The quotient algebra modulo a congruence. The carrier is the set
    /// of blocks, numbered by [`Partition::block_index`].
    pub fn quotient(&self, congruence: &Partition) -> CalcResult<SmallAlgebra> {
        if !self.is_congruence(congruence)? {
            return Err(CalcError::invalid_argument(
                "the partition is not a congruence of this algebra",
            ));
        }
        let reps = Arc::new(congruence.representatives());
        let mut block_of = vec![0usize; self.size];
        for (e, slot) in block_of.iter_mut().enumerate() {
            *slot = congruence.block_index(e)?;
        }
        let block_of = Arc::new(block_of);
        let m = reps.len();
        let operations = self
            .operations
            .iter()
            .map(|op| {
                let parent = Arc::clone(op);
                let reps = Arc::clone(&reps);
                let block_of = Arc::clone(&block_of);
                let symbol = op.symbol().clone();
                Operation::computed(symbol, m, move |args| {
                    let mut lifted = [0usize; super::op::MAX_OPERATION_ARITY];
                    for (slot, &a) in lifted.iter_mut().zip(args) {
                        *slot = reps[a];
                    }
                    Ok(block_of[parent.value(&lifted[..args.len()])?])
                })
                .map(Arc::new)
            })
            .collect::<CalcResult<Vec<_>>>()?;
        SmallAlgebra::from_shared(format!("{}/theta", self.name), m, operations)
    }

    /// The direct product `a x b`. The carriers must share a similarity
    /// type; the product element `(x, y)` is the code `x + |a| * y`.
    pub fn product(a: &SmallAlgebra, b: &SmallAlgebra) -> CalcResult<SmallAlgebra> {
        if a.similarity_type() != b.similarity_type() {
            return Err(CalcError::invalid_algebra(
                "product factors must share a similarity type",
            ));
        }
        let sizes = Arc::new(vec![a.size, b.size]);
        let operations = a
            .operations
            .iter()
            .map(|op| {
                let other = b.operation_by_symbol(op.symbol()).ok_or_else(|| {
                    CalcError::invalid_algebra(format!(
                        "factor is missing operation {}",
                        op.symbol()
                    ))
                })?;
                Operation::component_wise(
                    vec![Arc::clone(op), Arc::clone(other)],
                    Arc::clone(&sizes),
                )
                .map(Arc::new)
            })
            .collect::<CalcResult<Vec<_>>>()?;
        let size = a
            .size
            .checked_mul(b.size)
            .ok_or_else(|| CalcError::memory_limit("product carrier overflows usize"))?;
        SmallAlgebra::from_shared(format!("{}x{}", a.name, b.name), size, operations)
    }

    /// The direct power `base^exponent` with Horner-coded elements.
    pub fn power(base: &SmallAlgebra, exponent: usize) -> CalcResult<SmallAlgebra> {
        if exponent == 0 {
            return Err(CalcError::invalid_argument("power must be positive"));
        }
        let sizes = Arc::new(vec![base.size; exponent]);
        let operations = base
            .operations
            .iter()
            .map(|op| {
                Operation::component_wise(
                    vec![Arc::clone(op); exponent],
                    Arc::clone(&sizes),
                )
                .map(Arc::new)
            })
            .collect::<CalcResult<Vec<_>>>()?;
        let size = sizes
            .iter()
            .try_fold(1usize, |acc, &s| acc.checked_mul(s))
            .ok_or_else(|| CalcError::memory_limit("power carrier overflows usize"))?;
        SmallAlgebra::from_shared(format!("{}^{}", base.name, exponent), size, operations)
    }

    /// The principal congruence `Cg(a, b)`.
    pub fn cg(&self, a: usize, b: usize) -> CalcResult<Partition> {
        conlat::cg(self, a, b)
    }

    /// The congruence lattice, computed on first request and memoized.
    pub fn con(&self) -> CalcResult<Arc<CongruenceLattice>> {
        self.con_with(&TaskContext::default())
    }

    /// [`Self::con`] with cancellation and progress. The memo is only
    /// populated on success.
    pub fn con_with(&self, ctx: &TaskContext) -> CalcResult<Arc<CongruenceLattice>> {
        self.con
            .get_or_try_init(|| CongruenceLattice::build(self, ctx).map(Arc::new))
            .cloned()
    }

    /// The subalgebra lattice, computed on first request and memoized.
    pub fn sub(&self) -> CalcResult<Arc<SubalgebraLattice>> {
        self.sub_with(&TaskContext::default())
    }

    /// [`Self::sub`] with cancellation and progress.
    pub fn sub_with(&self, ctx: &TaskContext) -> CalcResult<Arc<SubalgebraLattice>> {
        self.sub
            .get_or_try_init(|| SubalgebraLattice::build(self, ctx).map(Arc::new))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::horner;

    fn z6() -> SmallAlgebra {
        let add = Operation::computed(OperationSymbol::new("add", 2), 6, |args| {
            Ok((args[0] + args[1]) % 6)
        })
        .unwrap();
        SmallAlgebra::new("z6", 6, vec![add]).unwrap()
    }

    #[test]
    fn construction_validates_set_sizes() {
        let wrong = Operation::projection(0, 1, 4).unwrap();
        assert!(matches!(
            SmallAlgebra::new("bad", 3, vec![wrong]),
            Err(CalcError::InvalidAlgebra { .. })
        ));
        assert!(SmallAlgebra::new("empty", 0, vec![]).is_err());
    }

    #[test]
    fn operation_lookup() {
        let alg = z6();
        assert!(alg.operation_by_name("add").is_some());
        assert!(alg.operation_by_name("mul").is_none());
        assert!(alg
            .operation_by_symbol(&OperationSymbol::new("add", 2))
            .is_some());
        assert!(alg
            .operation_by_symbol(&OperationSymbol::new("add", 1))
            .is_none());
    }

    #[test]
    fn subalgebra_restricts_operations() {
        let alg = z6();
        let sub = alg.subalgebra(&[2]).unwrap();
        // subuniverse {0, 2, 4}, renumbered to {0, 1, 2}
        assert_eq!(sub.cardinality(), 3);
        let add = sub.operation_by_name("add").unwrap();
        // local 1 + local 2 = 2 + 4 = 0 mod 6 = local 0
        assert_eq!(add.value(&[1, 2]).unwrap(), 0);
    }

    #[test]
    fn congruence_recognition() {
        let alg = z6();
        let mod2 = Partition::from_blocks(6, &[vec![0, 2, 4], vec![1, 3, 5]]).unwrap();
        let bad = Partition::from_blocks(6, &[vec![0, 1], vec![2, 3], vec![4], vec![5]]).unwrap();
        assert!(alg.is_congruence(&mod2).unwrap());
        assert!(!alg.is_congruence(&bad).unwrap());
    }

    #[test]
    fn quotient_by_a_congruence() {
        let alg = z6();
        let mod3 = alg.cg(0, 3).unwrap();
        assert_eq!(mod3.blocks(), vec![vec![0, 3], vec![1, 4], vec![2, 5]]);
        let q = alg.quotient(&mod3).unwrap();
        assert_eq!(q.cardinality(), 3);
        let add = q.operation_by_name("add").unwrap();
        // the quotient is z3
        assert_eq!(add.value(&[1, 2]).unwrap(), 0);
        assert_eq!(add.value(&[2, 2]).unwrap(), 1);

        let not_cong =
            Partition::from_blocks(6, &[vec![0, 1], vec![2, 3], vec![4, 5]]).unwrap();
        assert!(alg.quotient(&not_cong).is_err());
    }

    #[test]
    fn product_and_power() {
        let a = z6();
        let p = SmallAlgebra::product(&a, &a).unwrap();
        assert_eq!(p.cardinality(), 36);
        let add = p.operation_by_name("add").unwrap();
        // (1,2) + (3,4) = (4,0)
        let x = horner::encode_mixed(&[1, 2], &[6, 6]).unwrap();
        let y = horner::encode_mixed(&[3, 4], &[6, 6]).unwrap();
        let expected = horner::encode_mixed(&[4, 0], &[6, 6]).unwrap();
        assert_eq!(add.value(&[x, y]).unwrap(), expected);

        let sq = SmallAlgebra::power(&a, 2).unwrap();
        assert_eq!(sq.cardinality(), 36);
        assert_eq!(
            sq.operation_by_name("add").unwrap().value(&[x, y]).unwrap(),
            expected
        );
        assert!(SmallAlgebra::power(&a, 0).is_err());
    }

    #[test]
    fn similarity_type_is_sorted() {
        let j = Operation::projection(0, 2, 3).unwrap();
        let m = Operation::projection(1, 2, 3).unwrap();
        let alg = SmallAlgebra::new("p", 3, vec![m, j]).unwrap();
        let symbols: Vec<_> = alg
            .similarity_type()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        let mut sorted = symbols.clone();
        sorted.sort();
        assert_eq!(symbols, sorted);
    }
}

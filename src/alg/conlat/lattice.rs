/*!
The congruence lattice of a finite algebra.

Construction has two phases. First every principal congruence
`Cg(a, b)` for `a < b` is generated and deduplicated by canonical form.
Then, starting from the zero partition, the set is closed under binary
join — the join of two congruences is their partition join, so this
produces exactly the congruences (every congruence is the join of the
principal congruences of its related pairs).

The universe is kept in a deterministic order (zero first, then by
generation) with a canonical-partition dictionary for index lookup.
Structural queries — atoms, coatoms, irreducibles, covers, height,
width — reduce to the shared [`FiniteOrder`] helpers and are cached.
*/

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult};
use crate::lat::FiniteOrder;
use crate::progress::TaskContext;

use super::cg::cg_with;
use super::partition::Partition;

#[derive(Debug)]
pub struct CongruenceLattice {
    algebra_name: String,
    algebra_size: usize,
    /// All congruences; index 0 is the zero congruence.
    universe: Vec<Partition>,
    index_of: AHashMap<Partition, usize>,
    /// Indices of the distinct principal congruences, by rank.
    principals: Vec<usize>,
    /// `(a, b)` with `a < b` mapped to the index of `Cg(a, b)`.
    principal_pairs: AHashMap<(usize, usize), usize>,
    order: FiniteOrder,
    zero: usize,
    one: usize,
    atoms: OnceCell<Vec<usize>>,
    coatoms: OnceCell<Vec<usize>>,
    join_irr: OnceCell<Vec<usize>>,
    meet_irr: OnceCell<Vec<usize>>,
    covers: OnceCell<Vec<(usize, usize)>>,
    height: OnceCell<usize>,
    width: OnceCell<usize>,
}

impl CongruenceLattice {
    /// Compute the full congruence lattice of `algebra`.
    pub fn build(algebra: &SmallAlgebra, ctx: &TaskContext) -> CalcResult<Self> {
        let n = algebra.cardinality();

        // phase one: principal congruences
        let total_pairs = n * n.saturating_sub(1) / 2;
        let mut distinct: Vec<Partition> = Vec::new();
        let mut seen: AHashMap<Partition, usize> = AHashMap::new();
        let mut pair_to_distinct: AHashMap<(usize, usize), usize> = AHashMap::new();
        let mut done = 0usize;
        for a in 0..n {
            for b in (a + 1)..n {
                ctx.check_cancelled()?;
                let theta = cg_with(algebra, a, b, ctx)?;
                let index = match seen.get(&theta) {
                    Some(&i) => i,
                    None => {
                        let i = distinct.len();
                        seen.insert(theta.clone(), i);
                        distinct.push(theta);
                        i
                    }
                };
                pair_to_distinct.insert((a, b), index);
                done += 1;
                if total_pairs > 0 {
                    ctx.report(
                        0.5 * done as f64 / total_pairs as f64,
                        &format!("principal congruences {}/{}", done, total_pairs),
                    );
                }
            }
        }
        debug!(
            algebra = algebra.name(),
            pairs = total_pairs,
            distinct = distinct.len(),
            "principal congruences generated"
        );

        // deterministic generator order: by rank, then canonical array
        let mut generator_order: Vec<usize> = (0..distinct.len()).collect();
        generator_order.sort_by(|&i, &j| {
            distinct[i]
                .rank()
                .cmp(&distinct[j].rank())
                .then_with(|| distinct[i].to_array().cmp(distinct[j].to_array()))
        });
        let generators: Vec<Partition> =
            generator_order.iter().map(|&i| distinct[i].clone()).collect();

        // phase two: close under binary join
        let mut universe: Vec<Partition> = vec![Partition::zero(n)];
        let mut index_of: AHashMap<Partition, usize> = AHashMap::new();
        index_of.insert(universe[0].clone(), 0);
        for theta in &generators {
            if !index_of.contains_key(theta) {
                index_of.insert(theta.clone(), universe.len());
                universe.push(theta.clone());
            }
        }
        // one ascending pass over the generators is enough: the join of a
        // set of generators appears at the step of its largest member,
        // because the join of the smaller members is already present
        for (k, generator) in generators.iter().enumerate() {
            ctx.check_cancelled()?;
            let mut start = 0;
            while start < universe.len() {
                let end = universe.len();
                let joins = joins_with(generator, &universe[start..end])?;
                for join in joins {
                    if !index_of.contains_key(&join) {
                        index_of.insert(join.clone(), universe.len());
                        universe.push(join);
                    }
                }
                start = end;
            }
            ctx.report(
                0.5 + 0.5 * (k + 1) as f64 / generators.len().max(1) as f64,
                &format!("join closure: {} congruences", universe.len()),
            );
        }
        debug!(
            algebra = algebra.name(),
            size = universe.len(),
            "congruence universe closed under join"
        );

        let principals: Vec<usize> = generators.iter().map(|g| index_of[g]).collect();
        let principal_pairs: AHashMap<(usize, usize), usize> = pair_to_distinct
            .into_iter()
            .map(|(pair, d)| (pair, index_of[&distinct[d]]))
            .collect();

        let order = FiniteOrder::new(universe.len(), |i, j| universe[i].leq(&universe[j]));
        let one_partition = Partition::one(n);
        let one = index_of.get(&one_partition).copied().unwrap_or(0);

        Ok(Self {
            algebra_name: algebra.name().to_string(),
            algebra_size: n,
            universe,
            index_of,
            principals,
            principal_pairs,
            order,
            zero: 0,
            one,
            atoms: OnceCell::new(),
            coatoms: OnceCell::new(),
            join_irr: OnceCell::new(),
            meet_irr: OnceCell::new(),
            covers: OnceCell::new(),
            height: OnceCell::new(),
            width: OnceCell::new(),
        })
    }

    pub fn algebra_name(&self) -> &str {
        &self.algebra_name
    }

    pub fn algebra_size(&self) -> usize {
        self.algebra_size
    }

    /// Number of congruences.
    pub fn size(&self) -> usize {
        self.universe.len()
    }

    /// All congruences; index 0 is zero.
    pub fn universe(&self) -> &[Partition] {
        &self.universe
    }

    pub fn partition(&self, index: usize) -> CalcResult<&Partition> {
        self.universe.get(index).ok_or_else(|| {
            CalcError::invalid_argument(format!(
                "lattice index {} out of range for {} congruences",
                index,
                self.universe.len()
            ))
        })
    }

    pub fn index_of(&self, partition: &Partition) -> Option<usize> {
        self.index_of.get(partition).copied()
    }

    pub fn zero(&self) -> usize {
        self.zero
    }

    pub fn one(&self) -> usize {
        self.one
    }

    /// Indices of the distinct principal congruences.
    pub fn principals(&self) -> &[usize] {
        &self.principals
    }

    /// Index of `Cg(a, b)`.
    pub fn principal(&self, a: usize, b: usize) -> Option<usize> {
        if a == b {
            return Some(self.zero);
        }
        let key = if a < b { (a, b) } else { (b, a) };
        self.principal_pairs.get(&key).copied()
    }

    pub fn leq(&self, i: usize, j: usize) -> bool {
        self.order.leq(i, j)
    }

    /// Join by index; the result is again in the lattice.
    pub fn join(&self, i: usize, j: usize) -> CalcResult<usize> {
        let joined = self.partition(i)?.join(self.partition(j)?)?;
        self.index_of(&joined).ok_or_else(|| {
            CalcError::invalid_algebra("join of two congruences escaped the lattice")
        })
    }

    /// Meet by index; the meet of congruences is their partition meet.
    pub fn meet(&self, i: usize, j: usize) -> CalcResult<usize> {
        let met = self.partition(i)?.meet(self.partition(j)?)?;
        self.index_of(&met).ok_or_else(|| {
            CalcError::invalid_algebra("meet of two congruences escaped the lattice")
        })
    }

    /// Minimal nonzero congruences.
    pub fn atoms(&self) -> &[usize] {
        self.atoms.get_or_init(|| self.order.atoms(self.zero))
    }

    /// Maximal proper congruences.
    pub fn coatoms(&self) -> &[usize] {
        self.coatoms.get_or_init(|| self.order.coatoms(self.one))
    }

    /// Congruences with exactly one lower cover.
    pub fn join_irreducibles(&self) -> &[usize] {
        self.join_irr.get_or_init(|| self.order.join_irreducibles())
    }

    /// Congruences with exactly one upper cover.
    pub fn meet_irreducibles(&self) -> &[usize] {
        self.meet_irr.get_or_init(|| self.order.meet_irreducibles())
    }

    /// The covering relation as `(lower, upper)` index pairs.
    pub fn covers(&self) -> &[(usize, usize)] {
        self.covers.get_or_init(|| self.order.covers())
    }

    /// Length of the longest chain from zero to one.
    pub fn height(&self) -> usize {
        *self.height.get_or_init(|| self.order.height())
    }

    /// Size of the largest antichain.
    pub fn width(&self) -> usize {
        *self.width.get_or_init(|| self.order.width())
    }

    /// A simple algebra has exactly the two trivial congruences.
    pub fn is_simple(&self) -> bool {
        self.size() == 2
    }
}

/// Join a generator with a slice of the universe. The joins come back in
/// slice order, so the universe grows identically with or without the
/// `parallel` feature.
#[cfg(feature = "parallel")]
fn joins_with(generator: &Partition, slice: &[Partition]) -> CalcResult<Vec<Partition>> {
    use rayon::prelude::*;
    slice.par_iter().map(|p| generator.join(p)).collect()
}

#[cfg(not(feature = "parallel"))]
fn joins_with(generator: &Partition, slice: &[Partition]) -> CalcResult<Vec<Partition>> {
    slice.iter().map(|p| generator.join(p)).collect()
}

/*!
The subalgebra lattice of a finite algebra.

The lattice of subuniverses, ordered by inclusion. The join-irreducible
candidates are the one-generated subuniverses `Sg({x})` together with
`Sg(∅)` (the closure of the constants) as zero; the universe is their
closure under join, where the join of two subuniverses is the
subuniverse generated by their union. The meet is plain intersection,
which is again a subuniverse and always present.

Structural queries share the [`FiniteOrder`] helpers with the
congruence lattice.
*/

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::alg::closer::Closer;
use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult};
use crate::lat::FiniteOrder;
use crate::progress::TaskContext;

#[derive(Debug)]
pub struct SubalgebraLattice {
    algebra_name: String,
    algebra_size: usize,
    /// All subuniverses as sorted element lists; index 0 is `Sg(∅)`.
    universe: Vec<Vec<usize>>,
    index_of: AHashMap<Vec<usize>, usize>,
    /// Indices of the one-generated subuniverses, by size.
    one_generated: Vec<usize>,
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

impl SubalgebraLattice {
    /// Compute the full subalgebra lattice of `algebra`.
    pub fn build(algebra: &SmallAlgebra, ctx: &TaskContext) -> CalcResult<Self> {
        let n = algebra.cardinality();

        let zero_universe = Closer::new(algebra, &[])?.close()?;
        let mut generators: Vec<Vec<usize>> = Vec::new();
        let mut seen: AHashMap<Vec<usize>, ()> = AHashMap::new();
        for x in 0..n {
            ctx.check_cancelled()?;
            let sg = Closer::new(algebra, &[x])?.close()?;
            if sg != zero_universe && !seen.contains_key(&sg) {
                seen.insert(sg.clone(), ());
                generators.push(sg);
            }
            ctx.report(
                0.5 * (x + 1) as f64 / n as f64,
                &format!("one-generated subuniverses {}/{}", x + 1, n),
            );
        }
        generators.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let mut universe: Vec<Vec<usize>> = vec![zero_universe];
        let mut index_of: AHashMap<Vec<usize>, usize> = AHashMap::new();
        index_of.insert(universe[0].clone(), 0);
        for sg in &generators {
            if !index_of.contains_key(sg) {
                index_of.insert(sg.clone(), universe.len());
                universe.push(sg.clone());
            }
        }
        // ascending pass over the generators; see the congruence lattice
        for (k, generator) in generators.iter().enumerate() {
            ctx.check_cancelled()?;
            let mut i = 0;
            while i < universe.len() {
                let joined = join_universes(algebra, generator, &universe[i])?;
                if !index_of.contains_key(&joined) {
                    index_of.insert(joined.clone(), universe.len());
                    universe.push(joined);
                }
                i += 1;
            }
            ctx.report(
                0.5 + 0.5 * (k + 1) as f64 / generators.len().max(1) as f64,
                &format!("join closure: {} subuniverses", universe.len()),
            );
        }
        // the full carrier is the join of all one-generated subuniverses,
        // so it is already present unless the carrier is empty of joins
        let carrier: Vec<usize> = (0..n).collect();
        let one = match index_of.get(&carrier) {
            Some(&i) => i,
            None => {
                index_of.insert(carrier.clone(), universe.len());
                universe.push(carrier);
                universe.len() - 1
            }
        };
        debug!(
            algebra = algebra.name(),
            size = universe.len(),
            "subuniverse lattice closed under join"
        );

        let one_generated: Vec<usize> = generators.iter().map(|g| index_of[g]).collect();
        let order = FiniteOrder::new(universe.len(), |i, j| {
            is_subset(&universe[i], &universe[j])
        });

        Ok(Self {
            algebra_name: algebra.name().to_string(),
            algebra_size: n,
            universe,
            index_of,
            one_generated,
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

    /// Number of subuniverses.
    pub fn size(&self) -> usize {
        self.universe.len()
    }

    /// All subuniverses as sorted element lists.
    pub fn universe(&self) -> &[Vec<usize>] {
        &self.universe
    }

    pub fn subuniverse(&self, index: usize) -> CalcResult<&[usize]> {
        self.universe
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                CalcError::invalid_argument(format!(
                    "lattice index {} out of range for {} subuniverses",
                    index,
                    self.universe.len()
                ))
            })
    }

    pub fn index_of(&self, subuniverse: &[usize]) -> Option<usize> {
        self.index_of.get(subuniverse).copied()
    }

    pub fn zero(&self) -> usize {
        self.zero
    }

    pub fn one(&self) -> usize {
        self.one
    }

    /// Indices of the one-generated subuniverses.
    pub fn one_generated(&self) -> &[usize] {
        &self.one_generated
    }

    /// Inclusion order by index.
    pub fn leq(&self, i: usize, j: usize) -> bool {
        self.order.leq(i, j)
    }

    /// Join by index: the subuniverse generated by the union, which is
    /// the smallest lattice element containing both.
    pub fn join(&self, i: usize, j: usize) -> CalcResult<usize> {
        let a = self.subuniverse(i)?;
        let b = self.subuniverse(j)?;
        let mut union: Vec<usize> = a.to_vec();
        union.extend_from_slice(b);
        union.sort_unstable();
        union.dedup();
        self.universe
            .iter()
            .enumerate()
            .filter(|(_, u)| is_subset(&union, u))
            .min_by_key(|(_, u)| u.len())
            .map(|(index, _)| index)
            .ok_or_else(|| {
                CalcError::invalid_algebra("join of two subuniverses escaped the lattice")
            })
    }

    /// Meet by index: the intersection.
    pub fn meet(&self, i: usize, j: usize) -> CalcResult<usize> {
        let a = self.subuniverse(i)?;
        let b = self.subuniverse(j)?;
        let intersection: Vec<usize> =
            a.iter().copied().filter(|x| b.binary_search(x).is_ok()).collect();
        self.index_of(&intersection).ok_or_else(|| {
            CalcError::invalid_algebra("meet of two subuniverses escaped the lattice")
        })
    }

    /// Minimal nonzero subuniverses.
    pub fn atoms(&self) -> &[usize] {
        self.atoms.get_or_init(|| self.order.atoms(self.zero))
    }

    /// Maximal proper subuniverses.
    pub fn coatoms(&self) -> &[usize] {
        self.coatoms.get_or_init(|| self.order.coatoms(self.one))
    }

    /// Subuniverses with exactly one lower cover.
    pub fn join_irreducibles(&self) -> &[usize] {
        self.join_irr.get_or_init(|| self.order.join_irreducibles())
    }

    /// Subuniverses with exactly one upper cover.
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
}

/// `Sg(a ∪ b)` for two subuniverses given as sorted lists.
fn join_universes(
    algebra: &SmallAlgebra,
    a: &[usize],
    b: &[usize],
) -> CalcResult<Vec<usize>> {
    let mut union: Vec<usize> = a.to_vec();
    union.extend_from_slice(b);
    union.sort_unstable();
    union.dedup();
    Closer::new(algebra, &union)?.close()
}

fn is_subset(a: &[usize], b: &[usize]) -> bool {
    a.iter().all(|x| b.binary_search(x).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::op::{Operation, OperationSymbol};

    fn z6() -> SmallAlgebra {
        let add = Operation::computed(OperationSymbol::new("add", 2), 6, |args| {
            Ok((args[0] + args[1]) % 6)
        })
        .unwrap();
        SmallAlgebra::new("z6", 6, vec![add]).unwrap()
    }

    #[test]
    fn subgroups_of_z6() {
        // subuniverses of (Z6, +): {}, {0}, {0,3}, {0,2,4}, Z6 — but the
        // closure of the empty set is empty (no constants), so zero = {}
        let alg = z6();
        let sub = alg.sub().unwrap();
        assert_eq!(sub.size(), 5);
        assert!(sub.subuniverse(sub.zero()).unwrap().is_empty());
        assert_eq!(sub.subuniverse(sub.one()).unwrap(), &[0, 1, 2, 3, 4, 5]);
        assert!(sub.index_of(&[0, 3]).is_some());
        assert!(sub.index_of(&[0, 2, 4]).is_some());
        assert!(sub.index_of(&[0]).is_some());
        assert!(sub.index_of(&[0, 1]).is_none());
    }

    #[test]
    fn join_and_meet_by_index() {
        let alg = z6();
        let sub = alg.sub().unwrap();
        let i = sub.index_of(&[0, 3]).unwrap();
        let j = sub.index_of(&[0, 2, 4]).unwrap();
        assert_eq!(sub.join(i, j).unwrap(), sub.one());
        assert_eq!(sub.meet(i, j).unwrap(), sub.index_of(&[0]).unwrap());
    }

    #[test]
    fn one_generated_are_join_irreducible_candidates() {
        let alg = z6();
        let sub = alg.sub().unwrap();
        // Sg({1}) = Sg({5}) = Z6, Sg({2}) = Sg({4}) = {0,2,4},
        // Sg({3}) = {0,3}, Sg({0}) = {0}
        assert_eq!(sub.one_generated().len(), 4);
    }

    #[test]
    fn structure_of_the_z6_subalgebra_lattice() {
        let alg = z6();
        let sub = alg.sub().unwrap();
        // {} < {0} < {0,3} and {0,2,4} < Z6
        assert_eq!(sub.atoms(), &[sub.index_of(&[0]).unwrap()]);
        assert_eq!(sub.coatoms().len(), 2);
        assert_eq!(sub.height(), 3);
        assert_eq!(sub.width(), 2);
    }
}

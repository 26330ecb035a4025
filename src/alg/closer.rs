/*!
Closure of generating sets.

[`Closer`] computes the smallest subuniverse containing a seed set by
breadth-first application of the algebra's operations. A frontier mark
separates elements whose argument combinations have already been swept
from the newer ones; each pass enumerates only the tuples containing at
least one frontier element, so no combination is evaluated twice. When
term recording is on, every element carries a witness term: generator `i`
is the variable `x{i}`, and an element produced by `f` applied to
arguments carries `f` applied to their witnesses.

[`PowerCloser`] is the same engine specialized to a power `B^m`: elements
are [`IntArray`]s over the base carrier and operations act componentwise
through the base algebra's tables, so no product table is ever built.
*/

use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult};
use crate::progress::TaskContext;
use crate::term::Term;
use crate::util::int_array::IntArray;
use crate::util::{horner, tuples};

/// Closure engine over a small algebra's carrier.
pub struct Closer<'a> {
    algebra: &'a SmallAlgebra,
    generators: Vec<usize>,
    record_terms: bool,
    max_size: Option<usize>,
    element_to_find: Option<usize>,
    ctx: TaskContext,
    term_map: AHashMap<usize, Arc<Term>>,
    found: bool,
}

impl<'a> Closer<'a> {
    pub fn new(algebra: &'a SmallAlgebra, generators: &[usize]) -> CalcResult<Self> {
        let n = algebra.cardinality();
        if let Some(&bad) = generators.iter().find(|&&g| g >= n) {
            return Err(CalcError::invalid_argument(format!(
                "generator {} out of range for an algebra of cardinality {}",
                bad, n
            )));
        }
        let mut seen = vec![false; n];
        let mut gens = Vec::with_capacity(generators.len());
        for &g in generators {
            if !seen[g] {
                seen[g] = true;
                gens.push(g);
            }
        }
        Ok(Self {
            algebra,
            generators: gens,
            record_terms: false,
            max_size: None,
            element_to_find: None,
            ctx: TaskContext::default(),
            term_map: AHashMap::new(),
            found: false,
        })
    }

    /// Record a witness term for every element of the closure.
    pub fn with_terms(mut self) -> Self {
        self.record_terms = true;
        self
    }

    /// Abort with `MemoryLimitExceeded` when the closure outgrows `max`.
    pub fn with_max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }

    /// Stop as soon as `element` is generated.
    pub fn with_element_to_find(mut self, element: usize) -> Self {
        self.element_to_find = Some(element);
        self
    }

    pub fn with_context(mut self, ctx: TaskContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn generators(&self) -> &[usize] {
        &self.generators
    }

    /// Whether the element to find was reached.
    pub fn found(&self) -> bool {
        self.found
    }

    /// Witness term for `element`, when term recording was on.
    pub fn term_for(&self, element: usize) -> Option<&Arc<Term>> {
        self.term_map.get(&element)
    }

    pub fn term_map(&self) -> &AHashMap<usize, Arc<Term>> {
        &self.term_map
    }

    /// Run the closure; returns the subuniverse sorted ascending.
    ///
    /// The enumeration order of new elements is fixed by the operation
    /// order and the tuple order, so the witness terms are deterministic.
    pub fn close(&mut self) -> CalcResult<Vec<usize>> {
        let n = self.algebra.cardinality();
        let mut universe = self.generators.clone();
        let mut member = vec![false; n];
        for &g in &universe {
            member[g] = true;
        }
        if self.record_terms {
            self.term_map.clear();
            for (i, &g) in universe.iter().enumerate() {
                self.term_map
                    .insert(g, Arc::new(Term::variable(format!("x{}", i))));
            }
        }
        self.check_budget(universe.len())?;
        if let Some(target) = self.element_to_find {
            if member.get(target).copied().unwrap_or(false) {
                self.found = true;
            }
        }

        let mut mark = 0usize;
        let mut pass = 0usize;
        'closing: loop {
            let size0 = universe.len();
            pass += 1;
            self.ctx.check_cancelled()?;
            self.ctx
                .report(size0 as f64 / n as f64, &format!("closure pass {}", pass));

            for op_index in 0..self.algebra.operations().len() {
                let op = &self.algebra.operations()[op_index];
                let k = op.arity();
                if k == 0 {
                    // constants belong to every subuniverse; sweep them once
                    if mark == 0 {
                        let value = op.value(&[])?;
                        if !member[value] {
                            member[value] = true;
                            universe.push(value);
                            if self.record_terms {
                                self.term_map.insert(
                                    value,
                                    Arc::new(Term::constant(op.symbol().clone())),
                                );
                            }
                            self.check_budget(universe.len())?;
                            if self.element_to_find == Some(value) {
                                self.found = true;
                                break 'closing;
                            }
                        }
                    }
                    continue;
                }
                if size0 == 0 {
                    continue;
                }
                let mut args = vec![0usize; k];
                let mut indices = vec![0usize; k];
                let mut lows = vec![0usize; k];
                let mut highs = vec![0usize; k];
                // `frontier` is the position of the first frontier index:
                // earlier positions stay below the mark, later ones range
                // over everything known at the start of the pass
                for frontier in 0..k {
                    for i in 0..k {
                        lows[i] = if i == frontier { mark } else { 0 };
                        highs[i] = if i < frontier { mark } else { size0 };
                    }
                    if tuples::ranges_empty(&lows, &highs) {
                        continue;
                    }
                    indices.copy_from_slice(&lows);
                    loop {
                        for (slot, &idx) in args.iter_mut().zip(&indices) {
                            *slot = universe[idx];
                        }
                        let value = op.value(&args)?;
                        if !member[value] {
                            member[value] = true;
                            universe.push(value);
                            if self.record_terms {
                                let children = args
                                    .iter()
                                    .map(|a| Arc::clone(&self.term_map[a]))
                                    .collect();
                                self.term_map.insert(
                                    value,
                                    Arc::new(Term::application_shared(
                                        op.symbol().clone(),
                                        children,
                                    )?),
                                );
                            }
                            self.check_budget(universe.len())?;
                            if self.element_to_find == Some(value) {
                                self.found = true;
                                break 'closing;
                            }
                        }
                        if !tuples::next_in_ranges(&mut indices, &lows, &highs) {
                            break;
                        }
                    }
                }
            }

            mark = size0;
            if universe.len() == size0 {
                break;
            }
        }

        debug!(
            algebra = self.algebra.name(),
            generators = self.generators.len(),
            size = universe.len(),
            passes = pass,
            "closure finished"
        );
        universe.sort_unstable();
        Ok(universe)
    }

    fn check_budget(&self, size: usize) -> CalcResult<()> {
        match self.max_size {
            Some(max) if size > max => Err(CalcError::memory_limit(format!(
                "closure exceeded the requested bound of {} elements",
                max
            ))),
            _ => Ok(()),
        }
    }
}

/// Closure engine for a power `B^m`, acting componentwise on tuples.
pub struct PowerCloser<'a> {
    base: &'a SmallAlgebra,
    power: usize,
    generators: Vec<IntArray>,
    record_terms: bool,
    max_size: Option<usize>,
    element_to_find: Option<IntArray>,
    ctx: TaskContext,
    term_map: AHashMap<IntArray, Arc<Term>>,
    found: bool,
}

impl<'a> PowerCloser<'a> {
    pub fn new(
        base: &'a SmallAlgebra,
        power: usize,
        generators: &[IntArray],
    ) -> CalcResult<Self> {
        if power == 0 {
            return Err(CalcError::invalid_argument("power must be positive"));
        }
        let n = base.cardinality();
        let mut gens: Vec<IntArray> = Vec::with_capacity(generators.len());
        for g in generators {
            if g.len() != power {
                return Err(CalcError::invalid_argument(format!(
                    "generator {} has {} coordinates, expected {}",
                    g,
                    g.len(),
                    power
                )));
            }
            if let Some(&bad) = g.as_slice().iter().find(|&&v| v >= n) {
                return Err(CalcError::invalid_argument(format!(
                    "coordinate {} out of range for base cardinality {}",
                    bad, n
                )));
            }
            if !gens.contains(g) {
                gens.push(g.clone());
            }
        }
        Ok(Self {
            base,
            power,
            generators: gens,
            record_terms: false,
            max_size: None,
            element_to_find: None,
            ctx: TaskContext::default(),
            term_map: AHashMap::new(),
            found: false,
        })
    }

    pub fn with_terms(mut self) -> Self {
        self.record_terms = true;
        self
    }

    pub fn with_max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }

    pub fn with_element_to_find(mut self, element: IntArray) -> Self {
        self.element_to_find = Some(element);
        self
    }

    pub fn with_context(mut self, ctx: TaskContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn found(&self) -> bool {
        self.found
    }

    pub fn term_for(&self, element: &IntArray) -> Option<&Arc<Term>> {
        self.term_map.get(element)
    }

    pub fn term_map(&self) -> &AHashMap<IntArray, Arc<Term>> {
        &self.term_map
    }

    /// Run the closure; returns the generated subuniverse of `B^m`
    /// sorted lexicographically.
    pub fn close(&mut self) -> CalcResult<Vec<IntArray>> {
        let n = self.base.cardinality();
        // materialize every base table once; all power evaluation is
        // table lookup over Horner codes
        let tables: Vec<(usize, Vec<usize>)> = self
            .base
            .operations()
            .iter()
            .map(|op| Ok((op.arity(), op.table()?.to_vec())))
            .collect::<CalcResult<_>>()?;
        let symbols: Vec<_> = self
            .base
            .operations()
            .iter()
            .map(|op| op.symbol().clone())
            .collect();

        let mut universe: Vec<IntArray> = self.generators.clone();
        let mut member: AHashMap<IntArray, usize> = AHashMap::new();
        for (i, g) in universe.iter().enumerate() {
            member.insert(g.clone(), i);
        }
        if self.record_terms {
            self.term_map.clear();
            for (i, g) in universe.iter().enumerate() {
                self.term_map
                    .insert(g.clone(), Arc::new(Term::variable(format!("x{}", i))));
            }
        }
        if let Some(target) = &self.element_to_find {
            if member.contains_key(target) {
                self.found = true;
            }
        }

        let mut mark = 0usize;
        let mut pass = 0usize;
        let mut value_buf = vec![0usize; self.power];
        'closing: loop {
            let size0 = universe.len();
            pass += 1;
            self.ctx.check_cancelled()?;
            self.ctx.report(
                0.0,
                &format!("power closure pass {} ({} elements)", pass, size0),
            );

            for (op_index, (k, table)) in tables.iter().enumerate() {
                let k = *k;
                if k == 0 {
                    if mark == 0 {
                        let element = IntArray::constant(self.power, table[0]);
                        if !member.contains_key(&element) {
                            member.insert(element.clone(), universe.len());
                            universe.push(element.clone());
                            if self.record_terms {
                                self.term_map.insert(
                                    element.clone(),
                                    Arc::new(Term::constant(symbols[op_index].clone())),
                                );
                            }
                            self.check_budget(universe.len())?;
                            if self.element_to_find.as_ref() == Some(&element) {
                                self.found = true;
                                break 'closing;
                            }
                        }
                    }
                    continue;
                }
                if size0 == 0 {
                    continue;
                }
                let mut indices = vec![0usize; k];
                let mut lows = vec![0usize; k];
                let mut highs = vec![0usize; k];
                let mut coord_args = vec![0usize; k];
                for frontier in 0..k {
                    for i in 0..k {
                        lows[i] = if i == frontier { mark } else { 0 };
                        highs[i] = if i < frontier { mark } else { size0 };
                    }
                    if tuples::ranges_empty(&lows, &highs) {
                        continue;
                    }
                    indices.copy_from_slice(&lows);
                    loop {
                        for c in 0..self.power {
                            for (slot, &idx) in coord_args.iter_mut().zip(&indices) {
                                *slot = universe[idx][c];
                            }
                            value_buf[c] = table[horner::encode(&coord_args, n)?];
                        }
                        let element = IntArray::new(value_buf.clone());
                        if !member.contains_key(&element) {
                            member.insert(element.clone(), universe.len());
                            universe.push(element.clone());
                            if self.record_terms {
                                let children = indices
                                    .iter()
                                    .map(|&idx| Arc::clone(&self.term_map[&universe[idx]]))
                                    .collect();
                                self.term_map.insert(
                                    element.clone(),
                                    Arc::new(Term::application_shared(
                                        symbols[op_index].clone(),
                                        children,
                                    )?),
                                );
                            }
                            self.check_budget(universe.len())?;
                            if self.element_to_find.as_ref() == Some(&element) {
                                self.found = true;
                                break 'closing;
                            }
                        }
                        if !tuples::next_in_ranges(&mut indices, &lows, &highs) {
                            break;
                        }
                    }
                }
            }

            mark = size0;
            if universe.len() == size0 {
                break;
            }
        }

        debug!(
            base = self.base.name(),
            power = self.power,
            size = universe.len(),
            passes = pass,
            "power closure finished"
        );
        universe.sort();
        Ok(universe)
    }

    fn check_budget(&self, size: usize) -> CalcResult<()> {
        match self.max_size {
            Some(max) if size > max => Err(CalcError::memory_limit(format!(
                "closure exceeded the requested bound of {} elements",
                max
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::op::{Operation, OperationSymbol};
    use std::collections::HashMap;

    fn z6() -> SmallAlgebra {
        let add = Operation::computed(OperationSymbol::new("add", 2), 6, |args| {
            Ok((args[0] + args[1]) % 6)
        })
        .unwrap();
        SmallAlgebra::new("z6", 6, vec![add]).unwrap()
    }

    #[test]
    fn closure_of_a_subgroup_generator() {
        let alg = z6();
        let mut closer = Closer::new(&alg, &[2]).unwrap();
        assert_eq!(closer.close().unwrap(), vec![0, 2, 4]);
        let mut closer = Closer::new(&alg, &[1]).unwrap();
        assert_eq!(closer.close().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn closure_is_idempotent() {
        let alg = z6();
        let first = Closer::new(&alg, &[3]).unwrap().close().unwrap();
        let second = Closer::new(&alg, &first).unwrap().close().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_seed_without_constants_is_empty() {
        let alg = z6();
        assert!(Closer::new(&alg, &[]).unwrap().close().unwrap().is_empty());
    }

    #[test]
    fn constants_seed_the_closure() {
        let two = Operation::constant("two", 2, 6).unwrap();
        let add = Operation::computed(OperationSymbol::new("add", 2), 6, |args| {
            Ok((args[0] + args[1]) % 6)
        })
        .unwrap();
        let alg = SmallAlgebra::new("z6c", 6, vec![two, add]).unwrap();
        let closure = Closer::new(&alg, &[]).unwrap().close().unwrap();
        assert_eq!(closure, vec![0, 2, 4]);
    }

    #[test]
    fn witness_terms_evaluate_back() {
        let alg = z6();
        let mut closer = Closer::new(&alg, &[2, 3]).unwrap().with_terms();
        let universe = closer.close().unwrap();
        assert_eq!(universe, vec![0, 1, 2, 3, 4, 5]);
        let assignment: HashMap<String, usize> =
            [("x0".to_string(), 2), ("x1".to_string(), 3)].into();
        for &e in &universe {
            let term = closer.term_for(e).expect("every element has a witness");
            assert_eq!(term.eval(&alg, &assignment).unwrap(), e);
        }
    }

    #[test]
    fn max_size_aborts_with_budget_error() {
        let alg = z6();
        let result = Closer::new(&alg, &[1]).unwrap().with_max_size(3).close();
        assert!(matches!(result, Err(CalcError::MemoryLimitExceeded { .. })));
    }

    #[test]
    fn element_to_find_short_circuits() {
        let alg = z6();
        let mut closer = Closer::new(&alg, &[1]).unwrap().with_element_to_find(3);
        closer.close().unwrap();
        assert!(closer.found());

        let mut closer = Closer::new(&alg, &[2]).unwrap().with_element_to_find(3);
        closer.close().unwrap();
        assert!(!closer.found());
    }

    #[test]
    fn power_closure_matches_componentwise_action() {
        let alg = z6();
        // the diagonal of z6^2 under addition
        let gens = vec![IntArray::new(vec![1, 1])];
        let mut closer = PowerCloser::new(&alg, 2, &gens).unwrap();
        let closure = closer.close().unwrap();
        assert_eq!(closure.len(), 6);
        assert!(closure.iter().all(|ia| ia[0] == ia[1]));

        // (1, 2) generates all pairs (a, 2a) = full subgroup of order 6
        let gens = vec![IntArray::new(vec![1, 2])];
        let closure = PowerCloser::new(&alg, 2, &gens).unwrap().close().unwrap();
        assert_eq!(closure.len(), 6);
        for ia in &closure {
            assert_eq!((2 * ia[0]) % 6, ia[1]);
        }
    }

    #[test]
    fn power_witnesses_are_componentwise_consistent() {
        let alg = z6();
        let gens = vec![IntArray::new(vec![1, 5])];
        let mut closer = PowerCloser::new(&alg, 2, &gens).unwrap().with_terms();
        let closure = closer.close().unwrap();
        for element in &closure {
            let term = closer.term_for(element).unwrap();
            for c in 0..2 {
                let assignment: HashMap<String, usize> =
                    [("x0".to_string(), gens[0][c])].into();
                assert_eq!(term.eval(&alg, &assignment).unwrap(), element[c]);
            }
        }
    }
}

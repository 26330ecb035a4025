/*!
Finitary operations on `{0..n-1}`.

An [`Operation`] is one struct dispatching over a tagged kind rather than
a hierarchy of implementations: table-backed, projection, restriction to a
subuniverse, componentwise product, or an arbitrary computed function.
Every kind shares the same evaluator surface and a lazily materialized
Horner-indexed table, so an operation behaves identically whether it is
evaluated symbolically or through its table.

Derived operations hold `Arc` handles to their parents, never to the
algebra that owns them; cloning a handle is shallow and no ownership cycle
can form.
*/

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{CalcError, CalcResult};
use crate::util::{horner, tuples};

use super::symbol::OperationSymbol;

/// Upper bound on operation arity; argument buffers are sized by it.
pub const MAX_OPERATION_ARITY: usize = 16;

type ComputeFn = dyn Fn(&[usize]) -> CalcResult<usize> + Send + Sync;

enum OpKind {
    /// Fully materialized at construction; the table cell is pre-filled.
    Table,
    /// Returns argument `index`.
    Projection { index: usize },
    /// A parent operation restricted to a subuniverse of its algebra.
    /// `subuniverse` is sorted; local element `i` stands for
    /// `subuniverse[i]` in the parent.
    Restricted {
        parent: Arc<Operation>,
        subuniverse: Arc<Vec<usize>>,
    },
    /// Componentwise action of factor operations on a product carrier.
    /// Product elements are mixed-radix codes over `sizes`.
    ComponentWise {
        factors: Vec<Arc<Operation>>,
        sizes: Arc<Vec<usize>>,
    },
    /// Evaluated on demand by a closure.
    Computed { eval: Box<ComputeFn> },
}

pub struct Operation {
    symbol: OperationSymbol,
    set_size: usize,
    kind: OpKind,
    table: OnceCell<Vec<usize>>,
}

impl Operation {
    /// A table-backed operation. The table must have exactly
    /// `set_size^arity` entries in Horner order, all below `set_size`.
    pub fn from_table(
        symbol: OperationSymbol,
        set_size: usize,
        table: Vec<usize>,
    ) -> CalcResult<Self> {
        check_arity_bound(symbol.arity())?;
        let expected = horner::table_size(symbol.arity(), set_size)?;
        if table.len() != expected {
            return Err(CalcError::invalid_algebra(format!(
                "operation {} needs a table of {} entries, got {}",
                symbol,
                expected,
                table.len()
            )));
        }
        if let Some(&bad) = table.iter().find(|&&v| v >= set_size) {
            return Err(CalcError::invalid_algebra(format!(
                "operation {} table contains {} outside the carrier of size {}",
                symbol, bad, set_size
            )));
        }
        let cell = OnceCell::new();
        let _ = cell.set(table);
        Ok(Self {
            symbol,
            set_size,
            kind: OpKind::Table,
            table: cell,
        })
    }

    /// A nullary constant.
    pub fn constant(name: impl Into<String>, value: usize, set_size: usize) -> CalcResult<Self> {
        Self::from_table(OperationSymbol::new(name, 0), set_size, vec![value])
    }

    /// The projection onto argument `index` among `arity` arguments.
    pub fn projection(index: usize, arity: usize, set_size: usize) -> CalcResult<Self> {
        check_arity_bound(arity)?;
        if index >= arity {
            return Err(CalcError::invalid_argument(format!(
                "projection index {} out of range for arity {}",
                index, arity
            )));
        }
        Ok(Self {
            symbol: OperationSymbol::new(format!("p{}_{}", index, arity), arity),
            set_size,
            kind: OpKind::Projection { index },
            table: OnceCell::new(),
        })
    }

    /// An operation evaluated by a closure. The closure's results are
    /// range-checked on every call.
    pub fn computed<F>(symbol: OperationSymbol, set_size: usize, eval: F) -> CalcResult<Self>
    where
        F: Fn(&[usize]) -> CalcResult<usize> + Send + Sync + 'static,
    {
        check_arity_bound(symbol.arity())?;
        Ok(Self {
            symbol,
            set_size,
            kind: OpKind::Computed {
                eval: Box::new(eval),
            },
            table: OnceCell::new(),
        })
    }

    /// The restriction of `parent` to a subuniverse of its algebra.
    /// `subuniverse` must be sorted and closed under `parent`.
    pub fn restriction_of(
        parent: Arc<Operation>,
        subuniverse: Arc<Vec<usize>>,
    ) -> CalcResult<Self> {
        if subuniverse.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CalcError::invalid_argument(
                "subuniverse must be strictly increasing",
            ));
        }
        if let Some(&last) = subuniverse.last() {
            if last >= parent.set_size() {
                return Err(CalcError::invalid_argument(format!(
                    "subuniverse element {} out of range for parent carrier of size {}",
                    last,
                    parent.set_size()
                )));
            }
        }
        Ok(Self {
            symbol: parent.symbol().clone(),
            set_size: subuniverse.len(),
            kind: OpKind::Restricted {
                parent,
                subuniverse,
            },
            table: OnceCell::new(),
        })
    }

    /// The componentwise action of `factors` on the product of carriers
    /// with the given sizes. All factors must share one symbol.
    pub fn component_wise(factors: Vec<Arc<Operation>>, sizes: Arc<Vec<usize>>) -> CalcResult<Self> {
        let first = factors
            .first()
            .ok_or_else(|| CalcError::invalid_argument("a product needs at least one factor"))?;
        let symbol = first.symbol().clone();
        if factors.len() != sizes.len() {
            return Err(CalcError::invalid_argument(format!(
                "{} factor operations for {} factor sizes",
                factors.len(),
                sizes.len()
            )));
        }
        for (op, &size) in factors.iter().zip(sizes.iter()) {
            if op.symbol() != &symbol {
                return Err(CalcError::invalid_algebra(format!(
                    "product factors disagree on symbols: {} vs {}",
                    symbol,
                    op.symbol()
                )));
            }
            if op.set_size() != size {
                return Err(CalcError::invalid_algebra(format!(
                    "factor operation {} has set size {}, expected {}",
                    op.symbol(),
                    op.set_size(),
                    size
                )));
            }
        }
        let mut set_size: usize = 1;
        for &size in sizes.iter() {
            set_size = set_size
                .checked_mul(size)
                .ok_or_else(|| CalcError::memory_limit("product carrier overflows usize"))?;
        }
        Ok(Self {
            symbol,
            set_size,
            kind: OpKind::ComponentWise { factors, sizes },
            table: OnceCell::new(),
        })
    }

    pub fn symbol(&self) -> &OperationSymbol {
        &self.symbol
    }

    pub fn arity(&self) -> usize {
        self.symbol.arity()
    }

    pub fn set_size(&self) -> usize {
        self.set_size
    }

    /// Apply the operation. Fails on a wrong-arity tuple or an
    /// out-of-range element.
    pub fn value(&self, args: &[usize]) -> CalcResult<usize> {
        self.check_args(args)?;
        if let Some(table) = self.table.get() {
            let code = horner::encode(args, self.set_size)?;
            return Ok(table[code]);
        }
        self.value_unchecked(args)
    }

    /// Table lookup by Horner code; builds the table on first use.
    pub fn value_at_code(&self, code: usize) -> CalcResult<usize> {
        let table = self.table()?;
        table.get(code).copied().ok_or_else(|| {
            CalcError::invalid_argument(format!(
                "code {} out of range for table of {} entries",
                code,
                table.len()
            ))
        })
    }

    /// The full Horner-indexed result table, built lazily and reused.
    pub fn table(&self) -> CalcResult<&[usize]> {
        self.table
            .get_or_try_init(|| {
                let size = horner::table_size(self.arity(), self.set_size)?;
                let mut table = Vec::with_capacity(size);
                let mut args = vec![0usize; self.arity()];
                loop {
                    table.push(self.value_unchecked(&args)?);
                    if !tuples::next_tuple(&mut args, self.set_size) {
                        break;
                    }
                }
                debug_assert_eq!(table.len(), size);
                Ok(table)
            })
            .map(Vec::as_slice)
    }

    /// Whether the table has been materialized yet.
    pub fn has_table(&self) -> bool {
        self.table.get().is_some()
    }

    fn check_args(&self, args: &[usize]) -> CalcResult<()> {
        if args.len() != self.arity() {
            return Err(CalcError::invalid_argument(format!(
                "operation {} expects {} arguments, got {}",
                self.symbol,
                self.arity(),
                args.len()
            )));
        }
        if let Some(&bad) = args.iter().find(|&&a| a >= self.set_size) {
            return Err(CalcError::invalid_argument(format!(
                "argument {} out of range for set size {}",
                bad, self.set_size
            )));
        }
        Ok(())
    }

    /// Kind dispatch without argument validation; `args` must be in range.
    fn value_unchecked(&self, args: &[usize]) -> CalcResult<usize> {
        match &self.kind {
            OpKind::Table => {
                let table = self.table.get().ok_or_else(|| {
                    CalcError::invalid_algebra("table operation without a table")
                })?;
                Ok(table[horner::encode(args, self.set_size)?])
            }
            OpKind::Projection { index } => Ok(args[*index]),
            OpKind::Restricted {
                parent,
                subuniverse,
            } => {
                let mut parent_args = [0usize; MAX_OPERATION_ARITY];
                for (slot, &a) in parent_args.iter_mut().zip(args) {
                    *slot = subuniverse[a];
                }
                let result = parent.value(&parent_args[..args.len()])?;
                subuniverse.binary_search(&result).map_err(|_| {
                    CalcError::invalid_algebra(format!(
                        "operation {} left the subuniverse: {} is not a member",
                        self.symbol, result
                    ))
                })
            }
            OpKind::ComponentWise { factors, sizes } => {
                let mut components = Vec::with_capacity(args.len());
                for &a in args {
                    components.push(horner::decode_mixed(a, sizes)?);
                }
                let mut result = Vec::with_capacity(factors.len());
                let mut factor_args = [0usize; MAX_OPERATION_ARITY];
                for (j, factor) in factors.iter().enumerate() {
                    for (slot, comp) in factor_args.iter_mut().zip(&components) {
                        *slot = comp[j];
                    }
                    result.push(factor.value(&factor_args[..args.len()])?);
                }
                horner::encode_mixed(&result, sizes)
            }
            OpKind::Computed { eval } => {
                let result = eval(args)?;
                if result >= self.set_size {
                    return Err(CalcError::invalid_algebra(format!(
                        "operation {} produced {} outside the carrier of size {}",
                        self.symbol, result, self.set_size
                    )));
                }
                Ok(result)
            }
        }
    }

    /// `f(x,..,x) = x` for every `x`.
    pub fn is_idempotent(&self) -> CalcResult<bool> {
        let k = self.arity();
        for x in 0..self.set_size {
            let args = vec![x; k];
            if self.value(&args)? != x {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `f(f(x,y),z) = f(x,f(y,z))`; `false` for non-binary operations.
    pub fn is_associative(&self) -> CalcResult<bool> {
        if self.arity() != 2 {
            return Ok(false);
        }
        let n = self.set_size;
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    let left = self.value(&[self.value(&[x, y])?, z])?;
                    let right = self.value(&[x, self.value(&[y, z])?])?;
                    if left != right {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// `f(x,y) = f(y,x)`; `false` for non-binary operations.
    pub fn is_commutative(&self) -> CalcResult<bool> {
        if self.arity() != 2 {
            return Ok(false);
        }
        let n = self.set_size;
        for x in 0..n {
            for y in (x + 1)..n {
                if self.value(&[x, y])? != self.value(&[y, x])? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// `f(x,x,y) = y` and `f(x,y,y) = x`; `false` for non-ternary
    /// operations.
    pub fn is_maltsev(&self) -> CalcResult<bool> {
        if self.arity() != 3 {
            return Ok(false);
        }
        let n = self.set_size;
        for x in 0..n {
            for y in 0..n {
                if self.value(&[x, x, y])? != y || self.value(&[x, y, y])? != x {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn check_arity_bound(arity: usize) -> CalcResult<()> {
    if arity > MAX_OPERATION_ARITY {
        return Err(CalcError::invalid_argument(format!(
            "arity {} exceeds the supported maximum {}",
            arity, MAX_OPERATION_ARITY
        )));
    }
    Ok(())
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            OpKind::Table => "table",
            OpKind::Projection { .. } => "projection",
            OpKind::Restricted { .. } => "restricted",
            OpKind::ComponentWise { .. } => "componentwise",
            OpKind::Computed { .. } => "computed",
        };
        f.debug_struct("Operation")
            .field("symbol", &self.symbol.name())
            .field("arity", &self.arity())
            .field("set_size", &self.set_size)
            .field("kind", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mod_add(n: usize) -> Operation {
        let mut table = vec![0; n * n];
        let mut args = vec![0usize; 2];
        let mut code = 0;
        loop {
            table[code] = (args[0] + args[1]) % n;
            code += 1;
            if !tuples::next_tuple(&mut args, n) {
                break;
            }
        }
        Operation::from_table(OperationSymbol::new("add", 2), n, table).unwrap()
    }

    #[test]
    fn table_and_symbolic_evaluation_agree() {
        let add = mod_add(5);
        let proj = Operation::projection(1, 3, 5).unwrap();
        for x in 0..5 {
            for y in 0..5 {
                assert_eq!(add.value(&[x, y]).unwrap(), (x + y) % 5);
                assert_eq!(proj.value(&[x, y, 0]).unwrap(), y);
            }
        }
        // materialize the projection table and cross-check
        let table = proj.table().unwrap().to_vec();
        for code in 0..table.len() {
            let args = horner::decode(code, 3, 5).unwrap();
            assert_eq!(table[code], args[1]);
        }
    }

    #[test]
    fn value_validates_arity_and_range() {
        let add = mod_add(3);
        assert!(add.value(&[1]).is_err());
        assert!(add.value(&[1, 3]).is_err());
        assert!(add.value(&[1, 2]).is_ok());
    }

    #[test]
    fn from_table_validates_shape() {
        let sym = OperationSymbol::new("f", 1);
        assert!(Operation::from_table(sym.clone(), 3, vec![0, 1]).is_err());
        assert!(Operation::from_table(sym.clone(), 3, vec![0, 1, 3]).is_err());
        assert!(Operation::from_table(sym, 3, vec![0, 1, 2]).is_ok());
    }

    #[test]
    fn nullary_operations_have_unit_tables() {
        let c = Operation::constant("c", 2, 4).unwrap();
        assert_eq!(c.arity(), 0);
        assert_eq!(c.value(&[]).unwrap(), 2);
        assert_eq!(c.table().unwrap(), &[2]);
        assert!(Operation::constant("c", 4, 4).is_err());
    }

    #[test]
    fn restriction_maps_through_the_subuniverse() {
        let add = Arc::new(mod_add(6));
        // {0, 2, 4} is closed under addition mod 6
        let sub = Arc::new(vec![0usize, 2, 4]);
        let restricted = Operation::restriction_of(add, sub).unwrap();
        assert_eq!(restricted.set_size(), 3);
        // 2 + 4 = 0 mod 6, so local 1 + local 2 = local 0
        assert_eq!(restricted.value(&[1, 2]).unwrap(), 0);
        assert_eq!(restricted.value(&[1, 1]).unwrap(), 2);
    }

    #[test]
    fn restriction_detects_escape() {
        let add = Arc::new(mod_add(6));
        let not_closed = Arc::new(vec![0usize, 1]);
        let restricted = Operation::restriction_of(add, not_closed).unwrap();
        assert!(matches!(
            restricted.value(&[1, 1]),
            Err(CalcError::InvalidAlgebra { .. })
        ));
    }

    #[test]
    fn componentwise_product_acts_per_coordinate() {
        let a = Arc::new(mod_add(2));
        let b = Arc::new(mod_add(3));
        let sizes = Arc::new(vec![2usize, 3]);
        let prod = Operation::component_wise(vec![a, b], sizes.clone()).unwrap();
        assert_eq!(prod.set_size(), 6);
        for x in 0..6 {
            for y in 0..6 {
                let xc = horner::decode_mixed(x, &sizes).unwrap();
                let yc = horner::decode_mixed(y, &sizes).unwrap();
                let expected = horner::encode_mixed(
                    &[(xc[0] + yc[0]) % 2, (xc[1] + yc[1]) % 3],
                    &sizes,
                )
                .unwrap();
                assert_eq!(prod.value(&[x, y]).unwrap(), expected);
            }
        }
    }

    #[test]
    fn property_checks() {
        let add = mod_add(3);
        assert!(add.is_associative().unwrap());
        assert!(add.is_commutative().unwrap());
        assert!(!add.is_idempotent().unwrap());

        let first = Operation::projection(0, 2, 3).unwrap();
        assert!(first.is_idempotent().unwrap());
        assert!(first.is_associative().unwrap());
        assert!(!first.is_commutative().unwrap());

        // p(x,y,z) = x - y + z mod 3 is a Maltsev operation
        let sym = OperationSymbol::new("p", 3);
        let p = Operation::computed(sym, 3, |args| Ok((args[0] + 3 - args[1] + args[2]) % 3))
            .unwrap();
        assert!(p.is_maltsev().unwrap());
        let proj3 = Operation::projection(0, 3, 3).unwrap();
        assert!(!proj3.is_maltsev().unwrap());
    }
}

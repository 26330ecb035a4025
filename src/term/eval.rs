/*!
Iterative term evaluation.

The evaluator keeps an explicit work stack of `(node, expanded)` frames
so arbitrarily deep terms never touch the call stack, and a per-call
cache keyed by node identity so shared subterms are evaluated once.
Argument buffers are bounded by [`MAX_OPERATION_ARITY`].
*/

use std::collections::HashMap;
use std::sync::Arc;

use ahash::AHashMap;
use arrayvec::ArrayVec;

use crate::alg::op::{Operation, OperationSymbol, MAX_OPERATION_ARITY};
use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult};
use crate::util::{horner, tuples};

use super::Term;

struct Frame<'t> {
    term: &'t Term,
    expanded: bool,
}

/// Evaluate `term` in `algebra` under `assignment`.
pub fn eval(
    term: &Term,
    algebra: &SmallAlgebra,
    assignment: &HashMap<String, usize>,
) -> CalcResult<usize> {
    // cache lives for this evaluation only
    let mut cache: AHashMap<*const Term, usize> = AHashMap::new();
    let mut stack = vec![Frame {
        term,
        expanded: false,
    }];
    while !stack.is_empty() {
        let top = stack.len() - 1;
        let current: &Term = stack[top].term;
        let expanded = stack[top].expanded;
        let key = current as *const Term;
        if cache.contains_key(&key) {
            stack.pop();
            continue;
        }
        match current {
            Term::Variable(name) => {
                let value = *assignment.get(name).ok_or_else(|| {
                    CalcError::UnboundVariable { name: name.clone() }
                })?;
                if value >= algebra.cardinality() {
                    return Err(CalcError::invalid_argument(format!(
                        "assignment {} = {} out of range for cardinality {}",
                        name,
                        value,
                        algebra.cardinality()
                    )));
                }
                cache.insert(key, value);
                stack.pop();
            }
            Term::Application { symbol, children } => {
                if !expanded {
                    stack[top].expanded = true;
                    for child in children.iter().rev() {
                        let child_ref: &Term = child.as_ref();
                        if !cache.contains_key(&(child_ref as *const Term)) {
                            stack.push(Frame {
                                term: child_ref,
                                expanded: false,
                            });
                        }
                    }
                } else {
                    let mut args: ArrayVec<usize, MAX_OPERATION_ARITY> = ArrayVec::new();
                    if children.len() > MAX_OPERATION_ARITY {
                        return Err(CalcError::invalid_argument(format!(
                            "application of {} has {} children, maximum is {}",
                            symbol,
                            children.len(),
                            MAX_OPERATION_ARITY
                        )));
                    }
                    for child in children {
                        args.push(cache[&Arc::as_ptr(child)]);
                    }
                    let value = apply_symbol(algebra, symbol, &args)?;
                    cache.insert(key, value);
                    stack.pop();
                }
            }
        }
    }
    Ok(cache[&(term as *const Term)])
}

/// Resolve a symbol against the algebra and apply it.
///
/// Flat applications of an associative symbol may have more children
/// than the algebra's binary operation; those are folded left to right.
fn apply_symbol(
    algebra: &SmallAlgebra,
    symbol: &OperationSymbol,
    args: &[usize],
) -> CalcResult<usize> {
    if let Some(op) = algebra.operation_by_symbol(symbol) {
        return op.value(args);
    }
    if symbol.is_associative() && args.len() >= 2 {
        if let Some(op) = algebra
            .operations()
            .iter()
            .find(|op| op.symbol().name() == symbol.name() && op.arity() == 2)
        {
            let mut acc = op.value(&[args[0], args[1]])?;
            for &arg in &args[2..] {
                acc = op.value(&[acc, arg])?;
            }
            return Ok(acc);
        }
    }
    Err(CalcError::UnknownOperation {
        symbol: format!("{}/{}", symbol.name(), symbol.arity()),
    })
}

/// Interpret `term` as an operation over the given variable order: the
/// resulting operation has arity `variables.len()` and its table is the
/// tuple-indexed evaluation of the term.
///
/// The table is materialized eagerly.
pub fn interpretation(
    term: &Term,
    algebra: &SmallAlgebra,
    variables: &[String],
) -> CalcResult<Operation> {
    let arity = variables.len();
    if arity > MAX_OPERATION_ARITY {
        return Err(CalcError::invalid_argument(format!(
            "interpretation over {} variables, maximum is {}",
            arity, MAX_OPERATION_ARITY
        )));
    }
    for name in term.variables() {
        if !variables.contains(&name) {
            return Err(CalcError::UnboundVariable { name });
        }
    }
    let n = algebra.cardinality();
    let size = horner::table_size(arity, n)?;
    let mut assignment: HashMap<String, usize> =
        variables.iter().map(|v| (v.clone(), 0)).collect();
    let mut table = Vec::with_capacity(size);
    let mut tuple = vec![0usize; arity];
    loop {
        for (name, &value) in variables.iter().zip(&tuple) {
            assignment.insert(name.clone(), value);
        }
        table.push(eval(term, algebra, &assignment)?);
        if !tuples::next_tuple(&mut tuple, n) {
            break;
        }
    }
    Operation::from_table(OperationSymbol::new(term.to_string(), arity), n, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::op::Operation;

    fn algebra() -> SmallAlgebra {
        // f = addition mod 3, g = successor
        let f = Operation::computed(OperationSymbol::new("f", 2), 3, |a| {
            Ok((a[0] + a[1]) % 3)
        })
        .unwrap();
        let g = Operation::computed(OperationSymbol::new("g", 1), 3, |a| Ok((a[0] + 1) % 3))
            .unwrap();
        SmallAlgebra::new("a", 3, vec![f, g]).unwrap()
    }

    #[test]
    fn evaluates_nested_applications() {
        let alg = algebra();
        let term = Term::parse("f(x,g(x))").unwrap();
        let assignment = [("x".to_string(), 1)].into();
        // f(1, g(1)) = 1 + 2 = 0 mod 3
        assert_eq!(eval(&term, &alg, &assignment).unwrap(), 0);
    }

    #[test]
    fn missing_binding_fails() {
        let alg = algebra();
        let term = Term::parse("g(y)").unwrap();
        let assignment = [("x".to_string(), 1)].into();
        assert!(matches!(
            eval(&term, &alg, &assignment),
            Err(CalcError::UnboundVariable { .. })
        ));
    }

    #[test]
    fn unknown_symbol_fails() {
        let alg = algebra();
        let term = Term::parse("h(x)").unwrap();
        let assignment = [("x".to_string(), 0)].into();
        assert!(matches!(
            eval(&term, &alg, &assignment),
            Err(CalcError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn deep_terms_evaluate_without_recursion() {
        let alg = algebra();
        let g = OperationSymbol::new("g", 1);
        let mut term = Term::variable("x");
        for _ in 0..100_000 {
            term = Term::application(g.clone(), vec![term]).unwrap();
        }
        let assignment = [("x".to_string(), 0)].into();
        assert_eq!(eval(&term, &alg, &assignment).unwrap(), 100_000 % 3);
    }

    #[test]
    fn eval_is_invariant_under_flattening() {
        let f = Operation::computed(OperationSymbol::new_associative("f", 2), 4, |a| {
            Ok((a[0] + a[1]) % 4)
        })
        .unwrap();
        let alg = SmallAlgebra::new("z4", 4, vec![f]).unwrap();
        let sym = OperationSymbol::new_associative("f", 2);
        let inner = Term::application(
            sym.clone(),
            vec![Term::variable("x"), Term::variable("y")],
        )
        .unwrap();
        let nested = Term::application(sym, vec![inner, Term::variable("z")]).unwrap();
        let flat = nested.flatten();
        let assignment = [
            ("x".to_string(), 1),
            ("y".to_string(), 2),
            ("z".to_string(), 3),
        ]
        .into();
        assert_eq!(
            eval(&nested, &alg, &assignment).unwrap(),
            eval(&flat, &alg, &assignment).unwrap()
        );
        assert_eq!(eval(&flat, &alg, &assignment).unwrap(), 2);
    }

    #[test]
    fn interpretation_matches_pointwise_evaluation() {
        let alg = algebra();
        let term = Term::parse("f(x,g(y))").unwrap();
        let vars = vec!["x".to_string(), "y".to_string()];
        let op = interpretation(&term, &alg, &vars).unwrap();
        assert_eq!(op.arity(), 2);
        for x in 0..3 {
            for y in 0..3 {
                let assignment = [("x".to_string(), x), ("y".to_string(), y)].into();
                assert_eq!(
                    op.value(&[x, y]).unwrap(),
                    eval(&term, &alg, &assignment).unwrap()
                );
            }
        }
    }

    #[test]
    fn interpretation_rejects_unlisted_variables() {
        let alg = algebra();
        let term = Term::parse("g(x)").unwrap();
        assert!(matches!(
            interpretation(&term, &alg, &["y".to_string()]),
            Err(CalcError::UnboundVariable { .. })
        ));
    }
}

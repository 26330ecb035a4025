/*!
Terms over variables and operation symbols.

A term is either a variable or an application of an [`OperationSymbol`]
to child terms. Children sit behind `Arc` so that witness maps produced
by the closure engine can share subterms freely; equality and hashing
are structural regardless of sharing.

Terms can be deep — witnesses of long closures nest one application per
step — so every traversal here (attributes, substitution, flattening,
evaluation) uses an explicit stack instead of recursion.
*/

mod eval;
mod parser;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::alg::op::OperationSymbol;
use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult};
use crate::alg::op::Operation;

pub use eval::{eval, interpretation};
pub use parser::parse;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Variable(String),
    Application {
        symbol: OperationSymbol,
        children: Vec<Arc<Term>>,
    },
}

impl Term {
    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    /// An application; the child count must match the symbol arity.
    pub fn application(symbol: OperationSymbol, children: Vec<Term>) -> CalcResult<Self> {
        Self::application_shared(symbol, children.into_iter().map(Arc::new).collect())
    }

    /// An application over already-shared children.
    pub fn application_shared(
        symbol: OperationSymbol,
        children: Vec<Arc<Term>>,
    ) -> CalcResult<Self> {
        if children.len() != symbol.arity() {
            return Err(CalcError::invalid_argument(format!(
                "symbol {} has arity {}, got {} children",
                symbol,
                symbol.arity(),
                children.len()
            )));
        }
        Ok(Term::Application { symbol, children })
    }

    /// A constant term from a nullary symbol.
    pub fn constant(symbol: OperationSymbol) -> Self {
        debug_assert_eq!(symbol.arity(), 0);
        Term::Application {
            symbol,
            children: Vec::new(),
        }
    }

    /// Parse the textual form produced by `Display`.
    pub fn parse(input: &str) -> CalcResult<Self> {
        parser::parse(input)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn leading_symbol(&self) -> Option<&OperationSymbol> {
        match self {
            Term::Variable(_) => None,
            Term::Application { symbol, .. } => Some(symbol),
        }
    }

    pub fn children(&self) -> &[Arc<Term>] {
        match self {
            Term::Variable(_) => &[],
            Term::Application { children, .. } => children,
        }
    }

    /// Evaluate in `algebra` under a variable assignment.
    pub fn eval(
        &self,
        algebra: &SmallAlgebra,
        assignment: &std::collections::HashMap<String, usize>,
    ) -> CalcResult<usize> {
        eval::eval(self, algebra, assignment)
    }

    /// Interpret as a table-backed operation over the given variable
    /// order.
    pub fn interpretation(
        &self,
        algebra: &SmallAlgebra,
        variables: &[String],
    ) -> CalcResult<Operation> {
        eval::interpretation(self, algebra, variables)
    }

    /// Nodes in depth-first pre-order, parents before children.
    fn walk(&self) -> Vec<&Term> {
        let mut order = Vec::new();
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            order.push(t);
            for child in t.children().iter().rev() {
                stack.push(child.as_ref());
            }
        }
        order
    }

    /// Depth of the tree; a variable or constant has depth 0.
    pub fn depth(&self) -> usize {
        let order = self.walk();
        let mut depth_of: AHashMap<*const Term, usize> = AHashMap::new();
        for &t in order.iter().rev() {
            let d = t
                .children()
                .iter()
                .map(|c| depth_of[&(Arc::as_ptr(c))] + 1)
                .max()
                .unwrap_or(0);
            depth_of.insert(t as *const Term, d);
        }
        depth_of[&(self as *const Term)]
    }

    /// Total number of symbol occurrences (variables included).
    pub fn length(&self) -> usize {
        self.walk().len()
    }

    /// Variable names in order of first occurrence.
    pub fn variables(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for t in self.walk() {
            if let Term::Variable(name) = t {
                if seen.insert(name.clone()) {
                    out.push(name.clone());
                }
            }
        }
        out
    }

    /// All operation symbols occurring in the term.
    pub fn operation_symbols(&self) -> HashSet<OperationSymbol> {
        let mut out = HashSet::new();
        for t in self.walk() {
            if let Term::Application { symbol, .. } = t {
                out.insert(symbol.clone());
            }
        }
        out
    }

    /// Replace variables by terms; unmapped variables stay.
    pub fn substitute(&self, map: &std::collections::HashMap<String, Term>) -> Term {
        self.rebuild(|t, rebuilt_children| match t {
            Term::Variable(name) => map
                .get(name)
                .cloned()
                .unwrap_or_else(|| Term::Variable(name.clone())),
            Term::Application { symbol, .. } => Term::Application {
                symbol: symbol.clone(),
                children: rebuilt_children,
            },
        })
    }

    /// Normalize nested applications of associative symbols:
    /// `f(f(x,y),z)` becomes the flat `f(x,y,z)`. The flat application
    /// carries the same name with its child count as arity, still marked
    /// associative, so flattening a flattened term changes nothing.
    pub fn flatten(&self) -> Term {
        self.rebuild(|t, rebuilt_children| match t {
            Term::Variable(name) => Term::Variable(name.clone()),
            Term::Application { symbol, .. } => {
                if !symbol.is_associative() {
                    return Term::Application {
                        symbol: symbol.clone(),
                        children: rebuilt_children,
                    };
                }
                let mut spliced: Vec<Arc<Term>> = Vec::with_capacity(rebuilt_children.len());
                for child in rebuilt_children {
                    match &*child {
                        Term::Application {
                            symbol: child_symbol,
                            children: grandchildren,
                        } if child_symbol.name() == symbol.name()
                            && child_symbol.is_associative() =>
                        {
                            spliced.extend(grandchildren.iter().cloned());
                        }
                        _ => spliced.push(child),
                    }
                }
                let symbol =
                    OperationSymbol::new_associative(symbol.name(), spliced.len());
                Term::Application {
                    symbol,
                    children: spliced,
                }
            }
        })
    }

    /// Bottom-up rebuild without recursion: `f` receives each node with
    /// its already-rebuilt children (empty for variables).
    fn rebuild(&self, f: impl Fn(&Term, Vec<Arc<Term>>) -> Term) -> Term {
        let order = self.walk();
        let mut rebuilt: AHashMap<*const Term, Arc<Term>> = AHashMap::new();
        for &t in order.iter().rev() {
            let children = t
                .children()
                .iter()
                .map(|c| Arc::clone(&rebuilt[&Arc::as_ptr(c)]))
                .collect();
            rebuilt.insert(t as *const Term, Arc::new(f(t, children)));
        }
        rebuilt[&(self as *const Term)].as_ref().clone()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // iterative writer; Print frames interleave children and commas
        enum Frame<'t> {
            Term(&'t Term),
            Text(&'static str),
        }
        let mut stack = vec![Frame::Term(self)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Text(s) => f.write_str(s)?,
                Frame::Term(Term::Variable(name)) => f.write_str(name)?,
                Frame::Term(Term::Application { symbol, children }) => {
                    f.write_str(symbol.name())?;
                    f.write_str("(")?;
                    stack.push(Frame::Text(")"));
                    for (i, child) in children.iter().enumerate().rev() {
                        stack.push(Frame::Term(child.as_ref()));
                        if i > 0 {
                            stack.push(Frame::Text(","));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

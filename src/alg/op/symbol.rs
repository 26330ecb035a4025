//! Operation symbols.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A named operation symbol with an arity.
///
/// Two symbols are equal exactly when their names and arities agree; the
/// `associative` flag is metadata consulted by term flattening and plays
/// no part in equality, hashing or ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSymbol {
    name: String,
    arity: usize,
    associative: bool,
}

impl OperationSymbol {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            associative: false,
        }
    }

    /// A symbol marked associative; only meaningful for binary symbols
    /// and the flat applications produced from them.
    pub fn new_associative(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            associative: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_associative(&self) -> bool {
        self.associative
    }
}

impl PartialEq for OperationSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity == other.arity
    }
}

impl Eq for OperationSymbol {}

impl Hash for OperationSymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.arity.hash(state);
    }
}

impl PartialOrd for OperationSymbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OperationSymbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.arity.cmp(&other.arity))
    }
}

impl fmt::Display for OperationSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(s: &OperationSymbol) -> u64 {
        let mut h = DefaultHasher::new();
        s.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equality_ignores_associativity() {
        let f = OperationSymbol::new("f", 2);
        let g = OperationSymbol::new_associative("f", 2);
        assert_eq!(f, g);
        assert_eq!(hash_of(&f), hash_of(&g));
        assert_ne!(f, OperationSymbol::new("f", 3));
        assert_ne!(f, OperationSymbol::new("g", 2));
    }

    #[test]
    fn order_is_lexicographic_on_name_then_arity() {
        let mut symbols = vec![
            OperationSymbol::new("meet", 2),
            OperationSymbol::new("join", 2),
            OperationSymbol::new("join", 0),
        ];
        symbols.sort();
        let names: Vec<_> = symbols.iter().map(|s| (s.name(), s.arity())).collect();
        assert_eq!(names, vec![("join", 0), ("join", 2), ("meet", 2)]);
    }
}

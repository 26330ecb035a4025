//! An immutable integer tuple with structural equality and hashing.
//!
//! `IntArray` is the element type of power algebras and the key type of
//! the witness maps produced by the power closer.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntArray {
    values: Vec<usize>,
}

impl IntArray {
    pub fn new(values: Vec<usize>) -> Self {
        Self { values }
    }

    /// A tuple of `len` copies of `value`.
    pub fn constant(len: usize, value: usize) -> Self {
        Self {
            values: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.values.get(index).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.values
    }

    pub fn is_constant(&self) -> bool {
        self.values.windows(2).all(|w| w[0] == w[1])
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.values
    }
}

impl From<Vec<usize>> for IntArray {
    fn from(values: Vec<usize>) -> Self {
        Self::new(values)
    }
}

impl From<&[usize]> for IntArray {
    fn from(values: &[usize]) -> Self {
        Self::new(values.to_vec())
    }
}

impl Index<usize> for IntArray {
    type Output = usize;

    fn index(&self, index: usize) -> &usize {
        &self.values[index]
    }
}

impl fmt::Display for IntArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(ia: &IntArray) -> u64 {
        let mut h = DefaultHasher::new();
        ia.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equality_and_hash_are_structural() {
        let a = IntArray::new(vec![0, 1, 2]);
        let b = IntArray::from(&[0, 1, 2][..]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, IntArray::new(vec![0, 1]));
        assert_ne!(a, IntArray::new(vec![0, 1, 3]));
    }

    #[test]
    fn constant_detection() {
        assert!(IntArray::constant(4, 2).is_constant());
        assert!(IntArray::new(vec![]).is_constant());
        assert!(!IntArray::new(vec![1, 2]).is_constant());
    }

    #[test]
    fn display_is_bracketed() {
        assert_eq!(IntArray::new(vec![2, 0, 1]).to_string(), "[2,0,1]");
    }
}

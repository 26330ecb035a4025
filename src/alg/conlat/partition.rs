/*!
Partitions of `{0..n-1}` in canonical union-find form.

The representation is a single `Vec<i32>`: a root element stores the
negated size of its block, every other element stores the index of its
root. Canonical form means every non-root points directly at its root and
the root is the least element of its block, so `parent(i) <= i` and
`parent(parent(i)) = parent(i)` hold everywhere. Equality and hashing are
on the canonical array, which makes a `Partition` usable as a dictionary
key during lattice construction.

The algorithms (principal congruences, closures) work on the raw array
through the `find_root`/`join_blocks` helpers and canonicalize once at the
end; the public `union` keeps the canonical form eagerly.
*/

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CalcError, CalcResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    array: Vec<i32>,
}

/// Root of `element` in a raw partition array.
pub(crate) fn find_root(array: &[i32], element: usize) -> usize {
    let mut e = element;
    while array[e] >= 0 {
        e = array[e] as usize;
    }
    e
}

/// Merge the blocks rooted at `r` and `s` in a raw array, smaller block
/// under larger. No-op when `r == s`.
pub(crate) fn join_blocks(array: &mut [i32], r: usize, s: usize) {
    if r == s {
        return;
    }
    let size_r = -array[r];
    let size_s = -array[s];
    if size_r >= size_s {
        array[s] = r as i32;
        array[r] = -(size_r + size_s);
    } else {
        array[r] = s as i32;
        array[s] = -(size_r + size_s);
    }
}

/// Rewrite a raw array into canonical form: least-element roots with all
/// other members pointing directly at them.
pub(crate) fn normalize(array: &mut [i32]) {
    let n = array.len();
    let mut root_of = vec![0usize; n];
    for i in 0..n {
        root_of[i] = find_root(array, i);
    }
    // first element seen with a given old root is the least of its block
    let mut remap = vec![usize::MAX; n];
    for i in 0..n {
        let r = root_of[i];
        if remap[r] == usize::MAX {
            remap[r] = i;
        }
    }
    let mut counts = vec![0i32; n];
    for i in 0..n {
        counts[remap[root_of[i]]] += 1;
    }
    for i in 0..n {
        let root = remap[root_of[i]];
        array[i] = if i == root { -counts[root] } else { root as i32 };
    }
}

impl Partition {
    /// The partition into singletons.
    pub fn zero(size: usize) -> Self {
        Self {
            array: vec![-1; size],
        }
    }

    /// The partition with a single block.
    pub fn one(size: usize) -> Self {
        if size == 0 {
            return Self::zero(0);
        }
        let mut array = vec![0; size];
        array[0] = -(size as i32);
        Self { array }
    }

    /// Build a partition from explicit blocks. Every element of
    /// `{0..size-1}` must appear in exactly one block.
    pub fn from_blocks(size: usize, blocks: &[Vec<usize>]) -> CalcResult<Self> {
        let mut seen = vec![false; size];
        let mut array = vec![-1i32; size];
        for block in blocks {
            if block.is_empty() {
                return Err(CalcError::invalid_partition("empty block"));
            }
            let root = *block.iter().min().unwrap_or(&0);
            for &e in block {
                if e >= size {
                    return Err(CalcError::invalid_partition(format!(
                        "element {} out of range for universe of size {}",
                        e, size
                    )));
                }
                if seen[e] {
                    return Err(CalcError::invalid_partition(format!(
                        "element {} appears twice",
                        e
                    )));
                }
                seen[e] = true;
                if e != root {
                    array[e] = root as i32;
                }
            }
            array[root] = -(block.len() as i32);
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(CalcError::invalid_partition(format!(
                "element {} is missing from the blocks",
                missing
            )));
        }
        Ok(Self { array })
    }

    /// Adopt a raw union-find array, canonicalizing it. Fails if a parent
    /// pointer is out of range.
    pub fn from_raw(mut array: Vec<i32>) -> CalcResult<Self> {
        let n = array.len() as i32;
        if let Some(&bad) = array.iter().find(|&&p| p >= n) {
            return Err(CalcError::invalid_partition(format!(
                "parent pointer {} out of range for universe of size {}",
                bad, n
            )));
        }
        normalize(&mut array);
        Ok(Self { array })
    }

    /// The canonical array form: roots hold negated block sizes, other
    /// elements hold their root.
    pub fn to_array(&self) -> &[i32] {
        &self.array
    }

    pub fn size(&self) -> usize {
        self.array.len()
    }

    pub fn representative(&self, element: usize) -> usize {
        find_root(&self.array, element)
    }

    pub fn is_related(&self, x: usize, y: usize) -> bool {
        x < self.size()
            && y < self.size()
            && self.representative(x) == self.representative(y)
    }

    pub fn number_of_blocks(&self) -> usize {
        self.array.iter().filter(|&&v| v < 0).count()
    }

    /// `size - number_of_blocks`: the height in the partition lattice.
    pub fn rank(&self) -> usize {
        self.size() - self.number_of_blocks()
    }

    pub fn is_zero(&self) -> bool {
        self.array.iter().all(|&v| v == -1)
    }

    pub fn is_one(&self) -> bool {
        self.number_of_blocks() <= 1
    }

    /// All blocks have equal size.
    pub fn is_uniform(&self) -> bool {
        let mut block_size = None;
        for &v in &self.array {
            if v < 0 {
                match block_size {
                    None => block_size = Some(v),
                    Some(s) if s != v => return false,
                    _ => {}
                }
            }
        }
        true
    }

    /// The block containing `element`, ascending.
    pub fn block(&self, element: usize) -> CalcResult<Vec<usize>> {
        if element >= self.size() {
            return Err(CalcError::invalid_argument(format!(
                "element {} out of range for universe of size {}",
                element,
                self.size()
            )));
        }
        let root = self.representative(element);
        Ok((0..self.size())
            .filter(|&i| self.representative(i) == root)
            .collect())
    }

    /// All blocks, outer order by least element, inner ascending.
    pub fn blocks(&self) -> Vec<Vec<usize>> {
        let n = self.size();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            by_root[self.representative(i)].push(i);
        }
        by_root.into_iter().filter(|b| !b.is_empty()).collect()
    }

    /// Block representatives (the least element of each block), ascending.
    pub fn representatives(&self) -> Vec<usize> {
        (0..self.size()).filter(|&i| self.array[i] < 0).collect()
    }

    /// Index of the block of `element` among [`Self::representatives`].
    pub fn block_index(&self, element: usize) -> CalcResult<usize> {
        if element >= self.size() {
            return Err(CalcError::invalid_argument(format!(
                "element {} out of range for universe of size {}",
                element,
                self.size()
            )));
        }
        let root = self.representative(element);
        self.representatives()
            .binary_search(&root)
            .map_err(|_| CalcError::invalid_partition("representative list out of sync"))
    }

    /// Merge the blocks of `x` and `y` in place, keeping canonical form.
    pub fn union(&mut self, x: usize, y: usize) -> CalcResult<()> {
        let n = self.size();
        if x >= n || y >= n {
            return Err(CalcError::invalid_argument(format!(
                "union({}, {}) out of range for universe of size {}",
                x, y, n
            )));
        }
        let r = self.representative(x);
        let s = self.representative(y);
        if r != s {
            join_blocks(&mut self.array, r, s);
            normalize(&mut self.array);
        }
        Ok(())
    }

    /// The smallest partition coarsening both `self` and `other`.
    pub fn join(&self, other: &Partition) -> CalcResult<Partition> {
        if self.size() != other.size() {
            return Err(CalcError::invalid_argument(
                "cannot join partitions over different universes",
            ));
        }
        let mut array = other.array.clone();
        for i in 0..self.array.len() {
            if self.array[i] >= 0 {
                let r = find_root(&array, self.array[i] as usize);
                let s = find_root(&array, i);
                join_blocks(&mut array, r, s);
            }
        }
        normalize(&mut array);
        Ok(Partition { array })
    }

    /// The largest partition refining both: `x ~ y` iff related in both.
    pub fn meet(&self, other: &Partition) -> CalcResult<Partition> {
        if self.size() != other.size() {
            return Err(CalcError::invalid_argument(
                "cannot meet partitions over different universes",
            ));
        }
        let n = self.size();
        let mut first_of: AHashMap<(usize, usize), usize> = AHashMap::new();
        let mut array = vec![-1i32; n];
        for i in 0..n {
            let key = (self.representative(i), other.representative(i));
            match first_of.get(&key) {
                Some(&root) => {
                    array[root] -= 1;
                    array[i] = root as i32;
                }
                None => {
                    first_of.insert(key, i);
                }
            }
        }
        Ok(Partition { array })
    }

    /// Refinement order: every block of `self` lies inside a block of
    /// `other`.
    pub fn leq(&self, other: &Partition) -> bool {
        if self.size() != other.size() {
            return false;
        }
        (0..self.size()).all(|i| other.is_related(i, self.representative(i)))
    }
}

impl fmt::Display for Partition {
    /// Canonical block format: `|0,1|2|` — blocks by least element,
    /// elements ascending.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|")?;
        for block in self.blocks() {
            for (i, e) in block.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", e)?;
            }
            write!(f, "|")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_one() {
        let zero = Partition::zero(4);
        let one = Partition::one(4);
        assert!(zero.is_zero() && !zero.is_one());
        assert!(one.is_one() && !one.is_zero());
        assert_eq!(zero.number_of_blocks(), 4);
        assert_eq!(one.number_of_blocks(), 1);
        assert_eq!(zero.rank(), 0);
        assert_eq!(one.rank(), 3);
        assert!(zero.leq(&one));
        assert!(!one.leq(&zero));
    }

    #[test]
    fn from_blocks_validates() {
        assert!(Partition::from_blocks(3, &[vec![0, 1], vec![2]]).is_ok());
        // missing element
        assert!(matches!(
            Partition::from_blocks(3, &[vec![0, 1]]),
            Err(CalcError::InvalidPartition { .. })
        ));
        // repeated element
        assert!(matches!(
            Partition::from_blocks(3, &[vec![0, 1], vec![1, 2]]),
            Err(CalcError::InvalidPartition { .. })
        ));
        // out of range
        assert!(Partition::from_blocks(3, &[vec![0, 3], vec![1, 2]]).is_err());
    }

    #[test]
    fn union_keeps_canonical_form() {
        let mut p = Partition::zero(5);
        p.union(3, 1).unwrap();
        p.union(4, 3).unwrap();
        // block {1,3,4} must be rooted at 1 with direct pointers
        assert_eq!(p.to_array(), &[-1, -3, -1, 1, 1]);
        assert_eq!(p.representative(4), 1);
        assert_eq!(p.block(3).unwrap(), vec![1, 3, 4]);
        assert!(p.union(0, 7).is_err());
    }

    #[test]
    fn blocks_are_ordered() {
        let p = Partition::from_blocks(5, &[vec![2, 4], vec![3, 0], vec![1]]).unwrap();
        assert_eq!(p.blocks(), vec![vec![0, 3], vec![1], vec![2, 4]]);
        assert_eq!(p.representatives(), vec![0, 1, 2]);
        assert_eq!(p.block_index(4).unwrap(), 2);
        assert_eq!(p.to_string(), "|0,3|1|2,4|");
    }

    #[test]
    fn join_and_meet() {
        let p = Partition::from_blocks(4, &[vec![0, 1], vec![2], vec![3]]).unwrap();
        let q = Partition::from_blocks(4, &[vec![1, 2], vec![0], vec![3]]).unwrap();
        let join = p.join(&q).unwrap();
        assert_eq!(join.blocks(), vec![vec![0, 1, 2], vec![3]]);
        let meet = p.meet(&q).unwrap();
        assert!(meet.is_zero());

        assert!(p.leq(&join) && q.leq(&join));
        assert!(meet.leq(&p) && meet.leq(&q));
    }

    #[test]
    fn meet_intersects_blocks() {
        let p = Partition::from_blocks(6, &[vec![0, 1, 2], vec![3, 4, 5]]).unwrap();
        let q = Partition::from_blocks(6, &[vec![0, 1, 3, 4], vec![2, 5]]).unwrap();
        let meet = p.meet(&q).unwrap();
        assert_eq!(
            meet.blocks(),
            vec![vec![0, 1], vec![2], vec![3, 4], vec![5]]
        );
    }

    #[test]
    fn uniformity() {
        assert!(Partition::from_blocks(4, &[vec![0, 1], vec![2, 3]])
            .unwrap()
            .is_uniform());
        assert!(!Partition::from_blocks(4, &[vec![0, 1, 2], vec![3]])
            .unwrap()
            .is_uniform());
        assert!(Partition::zero(4).is_uniform());
    }

    #[test]
    fn from_raw_canonicalizes() {
        // 2 <- 0, with 2 the old root of {0, 2}
        let p = Partition::from_raw(vec![2, -1, -2]).unwrap();
        assert_eq!(p.to_array(), &[-2, -1, 0]);
        assert!(Partition::from_raw(vec![5, -1]).is_err());
    }

    #[test]
    fn equality_is_structural() {
        let a = Partition::from_blocks(3, &[vec![0, 2], vec![1]]).unwrap();
        let mut b = Partition::zero(3);
        b.union(2, 0).unwrap();
        assert_eq!(a, b);
    }
}

/*!
Finite partial orders.

Both lattices in this crate (congruences under refinement, subuniverses
under inclusion) reduce their structural queries — covers, atoms,
irreducibles, height, width — to the same finite-order computations over
a boolean order matrix. Width uses Dilworth's theorem: the largest
antichain of a finite poset has `n - m` elements, where `m` is a maximum
matching in the bipartite graph of strict comparabilities.
*/

/// A reflexive partial order on `{0..n-1}` stored as an `n x n` matrix.
#[derive(Debug, Clone)]
pub struct FiniteOrder {
    n: usize,
    leq: Vec<bool>,
}

impl FiniteOrder {
    /// Build from a comparison predicate. The caller guarantees that the
    /// predicate is reflexive, antisymmetric and transitive.
    pub fn new(n: usize, leq: impl Fn(usize, usize) -> bool) -> Self {
        let mut matrix = vec![false; n * n];
        for i in 0..n {
            for j in 0..n {
                matrix[i * n + j] = leq(i, j);
            }
        }
        Self { n, leq: matrix }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn leq(&self, i: usize, j: usize) -> bool {
        self.leq[i * self.n + j]
    }

    pub fn lt(&self, i: usize, j: usize) -> bool {
        i != j && self.leq(i, j)
    }

    pub fn minimal_elements(&self) -> Vec<usize> {
        (0..self.n)
            .filter(|&j| (0..self.n).all(|i| !self.lt(i, j)))
            .collect()
    }

    pub fn maximal_elements(&self) -> Vec<usize> {
        (0..self.n)
            .filter(|&i| (0..self.n).all(|j| !self.lt(i, j)))
            .collect()
    }

    /// `j` covers `i`: `i < j` with nothing strictly between.
    pub fn is_cover(&self, i: usize, j: usize) -> bool {
        self.lt(i, j) && (0..self.n).all(|k| !(self.lt(i, k) && self.lt(k, j)))
    }

    /// All covering pairs `(lower, upper)`.
    pub fn covers(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for i in 0..self.n {
            for j in 0..self.n {
                if self.is_cover(i, j) {
                    out.push((i, j));
                }
            }
        }
        out
    }

    pub fn lower_covers(&self, j: usize) -> Vec<usize> {
        (0..self.n).filter(|&i| self.is_cover(i, j)).collect()
    }

    pub fn upper_covers(&self, i: usize) -> Vec<usize> {
        (0..self.n).filter(|&j| self.is_cover(i, j)).collect()
    }

    /// Elements covering `bottom`.
    pub fn atoms(&self, bottom: usize) -> Vec<usize> {
        self.upper_covers(bottom)
    }

    /// Elements covered by `top`.
    pub fn coatoms(&self, top: usize) -> Vec<usize> {
        self.lower_covers(top)
    }

    /// Elements with exactly one lower cover.
    pub fn join_irreducibles(&self) -> Vec<usize> {
        (0..self.n)
            .filter(|&j| self.lower_covers(j).len() == 1)
            .collect()
    }

    /// Elements with exactly one upper cover.
    pub fn meet_irreducibles(&self) -> Vec<usize> {
        (0..self.n)
            .filter(|&i| self.upper_covers(i).len() == 1)
            .collect()
    }

    /// Length (number of covers) of the longest chain.
    pub fn height(&self) -> usize {
        // process elements in order of how many lie strictly below; that
        // order is compatible with the strict order, so the longest-path
        // recurrence sees its predecessors first
        let n = self.n;
        let mut below = vec![0usize; n];
        for (i, b) in below.iter_mut().enumerate() {
            *b = (0..n).filter(|&j| self.lt(j, i)).count();
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| below[i]);
        let mut longest = vec![0usize; n];
        let mut best = 0;
        for &i in &order {
            let mut h = 0;
            for j in 0..n {
                if self.lt(j, i) {
                    h = h.max(longest[j] + 1);
                }
            }
            longest[i] = h;
            best = best.max(h);
        }
        best
    }

    /// Size of the largest antichain, by Dilworth via bipartite matching
    /// on the strict comparability graph.
    pub fn width(&self) -> usize {
        let n = self.n;
        if n == 0 {
            return 0;
        }
        let adjacency: Vec<Vec<usize>> = (0..n)
            .map(|i| (0..n).filter(|&j| self.lt(i, j)).collect())
            .collect();
        let mut matched_to: Vec<Option<usize>> = vec![None; n];
        let mut matching = 0;
        for i in 0..n {
            let mut visited = vec![false; n];
            if augment(i, &adjacency, &mut matched_to, &mut visited) {
                matching += 1;
            }
        }
        n - matching
    }
}

/// Kuhn's augmenting-path step for maximum bipartite matching.
fn augment(
    i: usize,
    adjacency: &[Vec<usize>],
    matched_to: &mut Vec<Option<usize>>,
    visited: &mut [bool],
) -> bool {
    for &j in &adjacency[i] {
        if visited[j] {
            continue;
        }
        visited[j] = true;
        let previous = matched_to[j];
        match previous {
            None => {
                matched_to[j] = Some(i);
                return true;
            }
            Some(p) => {
                if augment(p, adjacency, matched_to, visited) {
                    matched_to[j] = Some(i);
                    return true;
                }
            }
        }
    }
    false
}

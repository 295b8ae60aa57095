//! Equation connectivity graph used to size system storage.

use std::collections::BTreeSet;

/// Adjacency of equations: vertex `i` is equation `i`, an edge joins two
/// equations that share at least one element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DofGraph {
    adjacency: Vec<BTreeSet<usize>>,
}

impl DofGraph {
    pub fn new(num_eqn: usize) -> Self {
        Self {
            adjacency: vec![BTreeSet::new(); num_eqn],
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    /// Connect every pair of equations in `eqns` (an element's clique).
    /// Constrained DOFs (`None`) are skipped.
    pub fn add_clique(&mut self, eqns: &[Option<usize>]) {
        let active: Vec<usize> = eqns.iter().flatten().copied().collect();
        for &a in &active {
            for &b in &active {
                if a != b {
                    self.adjacency[a].insert(b);
                }
            }
        }
    }

    pub fn neighbors(&self, eqn: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[eqn].iter().copied()
    }

    pub fn degree(&self, eqn: usize) -> usize {
        self.adjacency[eqn].len()
    }

    /// Largest |i - j| over all edges.
    pub fn half_bandwidth(&self) -> usize {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(i, adj)| adj.iter().map(move |&j| i.abs_diff(j)))
            .max()
            .unwrap_or(0)
    }

    /// First (smallest) row index with a nonzero in each column of the upper
    /// triangle, diagonal included.
    pub fn column_tops(&self) -> Vec<usize> {
        self.adjacency
            .iter()
            .enumerate()
            .map(|(j, adj)| adj.iter().next().map_or(j, |&first| first.min(j)))
            .collect()
    }

    /// Total number of stored entries in a profile (skyline) layout.
    pub fn profile_size(&self) -> usize {
        self.column_tops()
            .iter()
            .enumerate()
            .map(|(j, &top)| j - top + 1)
            .sum()
    }

    /// Sorted CSR row pointers and column indices, diagonal included.
    pub fn csr_pattern(&self) -> (Vec<usize>, Vec<usize>) {
        let mut indptr = Vec::with_capacity(self.adjacency.len() + 1);
        let mut indices = Vec::new();
        indptr.push(0);
        for (i, adj) in self.adjacency.iter().enumerate() {
            let mut row: BTreeSet<usize> = adj.clone();
            row.insert(i);
            indices.extend(row);
            indptr.push(indices.len());
        }
        (indptr, indices)
    }

    /// Graph with vertices relabelled so that vertex `i` becomes `perm[i]`.
    pub fn permuted(&self, perm: &[usize]) -> DofGraph {
        let mut out = DofGraph::new(self.adjacency.len());
        for (i, adj) in self.adjacency.iter().enumerate() {
            for &j in adj {
                out.adjacency[perm[i]].insert(perm[j]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> DofGraph {
        let mut g = DofGraph::new(n);
        for i in 0..n - 1 {
            g.add_clique(&[Some(i), Some(i + 1)]);
        }
        g
    }

    #[test]
    fn chain_has_unit_bandwidth() {
        let g = chain(5);
        assert_eq!(g.half_bandwidth(), 1);
        assert_eq!(g.column_tops(), vec![0, 0, 1, 2, 3]);
        assert_eq!(g.profile_size(), 9);
    }

    #[test]
    fn constrained_dofs_are_skipped() {
        let mut g = DofGraph::new(2);
        g.add_clique(&[None, Some(0), Some(1)]);
        assert_eq!(g.degree(0), 1);
        assert_eq!(g.neighbors(1).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn csr_pattern_includes_diagonal() {
        let g = chain(3);
        let (indptr, indices) = g.csr_pattern();
        assert_eq!(indptr, vec![0, 2, 5, 7]);
        assert_eq!(indices, vec![0, 1, 0, 1, 2, 1, 2]);
    }

    #[test]
    fn permutation_reverses_chain() {
        let g = chain(3).permuted(&[2, 1, 0]);
        assert_eq!(g.neighbors(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(g.half_bandwidth(), 1);
    }
}

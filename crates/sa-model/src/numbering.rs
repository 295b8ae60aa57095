//! Equation numbering of free DOFs.

use sa_soe::DofGraph;
use std::collections::VecDeque;

/// Strategy used to map free DOFs to equation numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Numberer {
    /// Equations follow DOF creation order.
    #[default]
    Plain,
    /// Reverse Cuthill–McKee, reduces band and profile size.
    ReverseCuthillMcKee,
}

impl Numberer {
    /// Permutation `perm[old] = new` for the vertices of `graph`.
    pub fn permutation(&self, graph: &DofGraph) -> Vec<usize> {
        let n = graph.num_vertices();
        match self {
            Numberer::Plain => (0..n).collect(),
            Numberer::ReverseCuthillMcKee => {
                let order = cuthill_mckee_order(graph);
                let mut perm = vec![0; n];
                for (new, &old) in order.iter().rev().enumerate() {
                    perm[old] = new;
                }
                perm
            }
        }
    }
}

/// Breadth-first ordering started from a minimum-degree vertex of each
/// connected component; neighbours are visited by increasing degree.
fn cuthill_mckee_order(graph: &DofGraph) -> Vec<usize> {
    let n = graph.num_vertices();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    while order.len() < n {
        let Some(start) = (0..n)
            .filter(|&v| !visited[v])
            .min_by_key(|&v| (graph.degree(v), v))
        else {
            break;
        };
        visited[start] = true;
        queue.push_back(start);

        while let Some(v) = queue.pop_front() {
            order.push(v);
            let mut next: Vec<usize> = graph.neighbors(v).filter(|&w| !visited[w]).collect();
            next.sort_by_key(|&w| (graph.degree(w), w));
            for w in next {
                visited[w] = true;
                queue.push_back(w);
            }
        }
    }
    order
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn graph_strategy() -> impl Strategy<Value = DofGraph> {
        (1usize..30).prop_flat_map(|n| {
            proptest::collection::vec((0..n, 0..n), 0..60).prop_map(move |edges| {
                let mut g = DofGraph::new(n);
                for (a, b) in edges {
                    g.add_clique(&[Some(a), Some(b)]);
                }
                g
            })
        })
    }

    proptest! {
        #[test]
        fn rcm_is_a_permutation(g in graph_strategy()) {
            let mut perm = Numberer::ReverseCuthillMcKee.permutation(&g);
            perm.sort_unstable();
            let expected: Vec<usize> = (0..g.num_vertices()).collect();
            prop_assert_eq!(perm, expected);
        }

        #[test]
        fn rcm_preserves_edge_count(g in graph_strategy()) {
            let perm = Numberer::ReverseCuthillMcKee.permutation(&g);
            let p = g.permuted(&perm);
            let edges = |g: &DofGraph| (0..g.num_vertices()).map(|v| g.degree(v)).sum::<usize>();
            prop_assert_eq!(edges(&g), edges(&p));
        }
    }
}

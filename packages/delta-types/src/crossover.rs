use serde::{Deserialize, Serialize};

/// Per-pivot above/below adjacency. A dense `Vec<u32>` pair per pivot
/// stands in for the source's heap-allocated singly linked lists — the
/// vector length *is* the crossing count, so `|above[i]| == nAbove[i]`
/// holds structurally rather than by hand-maintained counters
/// (SPEC_FULL.md S9).
///
/// Invariant: `j` is in `above[i]` if and only if `i` is in `below[j]`.
/// Every mutating method here preserves it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossoverGraph {
    above: Vec<Vec<u32>>,
    below: Vec<Vec<u32>>,
}

impl CrossoverGraph {
    pub fn new(num_pivots: usize) -> Self {
        Self {
            above: vec![Vec::new(); num_pivots],
            below: vec![Vec::new(); num_pivots],
        }
    }

    pub fn num_pivots(&self) -> usize {
        self.above.len()
    }

    pub fn above(&self, i: usize) -> &[u32] {
        &self.above[i]
    }

    pub fn below(&self, i: usize) -> &[u32] {
        &self.below[i]
    }

    pub fn n_above(&self, i: usize) -> usize {
        self.above[i].len()
    }

    pub fn n_below(&self, i: usize) -> usize {
        self.below[i].len()
    }

    /// Prepend `j` to `above[i]`. Does not check for duplicates; the
    /// caller guarantees uniqueness.
    pub fn add_above(&mut self, i: usize, j: u32) {
        self.above[i].insert(0, j);
    }

    pub fn add_below(&mut self, i: usize, j: u32) {
        self.below[i].insert(0, j);
    }

    /// Remove the first occurrence of `j` from `above[i]`. No-op if absent.
    pub fn delete_above(&mut self, i: usize, j: u32) {
        if let Some(pos) = self.above[i].iter().position(|&x| x == j) {
            self.above[i].remove(pos);
        }
    }

    pub fn delete_below(&mut self, i: usize, j: u32) {
        if let Some(pos) = self.below[i].iter().position(|&x| x == j) {
            self.below[i].remove(pos);
        }
    }

    pub fn find_above(&self, i: usize, j: u32) -> bool {
        self.above[i].contains(&j)
    }

    pub fn find_below(&self, i: usize, j: u32) -> bool {
        self.below[i].contains(&j)
    }

    /// Remove every entry from `below[i]`; for each removed `j`, also
    /// remove `i` from `above[j]`. Used when a fibre is moved: by
    /// definition it had nothing crossing above it, and its below-list is
    /// stale once it occupies a new position.
    pub fn clear_below(&mut self, i: usize) {
        let removed = std::mem::take(&mut self.below[i]);
        for j in removed {
            self.delete_above(j as usize, i as u32);
        }
    }

    /// Build a graph from the flat exchange-format `above` array: repeated
    /// records `pivot, j1, j2, ..., jk, 0`, 1-based. A single `[0]` means
    /// no crossings at all.
    pub fn from_above_array(num_pivots: usize, flat: &[i64]) -> Self {
        let mut graph = Self::new(num_pivots);
        if flat.len() <= 1 {
            return graph;
        }
        let mut idx = 0;
        while idx < flat.len() {
            let pivot = flat[idx];
            idx += 1;
            if pivot == 0 {
                continue;
            }
            let i = (pivot - 1) as usize;
            while idx < flat.len() && flat[idx] != 0 {
                let j = (flat[idx] - 1) as usize;
                graph.above[i].push(j as u32);
                graph.below[j].push(i as u32);
                idx += 1;
            }
            idx += 1; // skip the terminating 0
        }
        graph
    }

    /// Serialize back to the flat exchange format. Ordering within a
    /// single record need not match the original construction order.
    pub fn to_above_array(&self) -> Vec<i64> {
        let mut out = Vec::new();
        for i in 0..self.above.len() {
            if self.above[i].is_empty() {
                continue;
            }
            out.push((i + 1) as i64);
            for &j in &self.above[i] {
                out.push((j + 1) as i64);
            }
            out.push(0);
        }
        if out.is_empty() {
            out.push(0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinel_yields_empty_graph() {
        let g = CrossoverGraph::from_above_array(3, &[0]);
        assert_eq!(g.n_above(0), 0);
        assert_eq!(g.n_above(1), 0);
        assert_eq!(g.n_above(2), 0);
    }

    #[test]
    fn construction_is_symmetric() {
        // pivot 2 (index 1) is crossed above by pivot 1 (index 0).
        let g = CrossoverGraph::from_above_array(2, &[2, 1, 0]);
        assert_eq!(g.above(1), &[0]);
        assert_eq!(g.below(0), &[1]);
        assert!(g.find_above(1, 0));
        assert!(g.find_below(0, 1));
    }

    #[test]
    fn round_trip_preserves_records() {
        let original = vec![2i64, 1, 3, 0, 4, 1, 0];
        let g = CrossoverGraph::from_above_array(4, &original);
        let back = g.to_above_array();
        // Same set of records, each internally order-stable since we
        // reconstruct in insertion order here.
        assert_eq!(back, original);
    }

    #[test]
    fn clear_below_updates_both_sides() {
        let mut g = CrossoverGraph::new(3);
        g.add_above(1, 0); // pivot 0 crosses above pivot 1
        g.add_below(0, 1); // symmetric
        assert_eq!(g.n_below(0), 1);
        assert_eq!(g.n_above(1), 1);
        g.clear_below(0);
        assert_eq!(g.n_below(0), 0);
        assert_eq!(g.n_above(1), 0);
    }

    #[test]
    fn delete_missing_is_noop() {
        let mut g = CrossoverGraph::new(2);
        g.delete_above(0, 5);
        g.delete_below(1, 3);
        assert_eq!(g.n_above(0), 0);
    }
}

//! Reading dendrograms out of a linkage

use crate::cluster::Linkage;

impl Linkage {
    /// Observation indices in dendrogram order, left branch first
    pub fn leaves(&self) -> Vec<usize> {
        let n = self.observations;
        let Some(last) = self.steps.len().checked_sub(1) else {
            return (0..n).collect();
        };

        let mut order = Vec::with_capacity(n);
        let mut stack = vec![n + last];
        while let Some(cluster) = stack.pop() {
            if cluster < n {
                order.push(cluster);
                continue;
            }
            let step = &self.steps[cluster - n];
            stack.push(step.right);
            stack.push(step.left);
        }
        order
    }

    /// Flat clustering into at most `k` clusters by undoing the last merges.
    ///
    /// Labels are numbered from 0 in order of first observation.
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let n = self.observations;
        let keep = n.saturating_sub(k.max(1)).min(self.steps.len());

        // Union the first `keep` merges; cluster ids >= n point at their step
        let mut parent: Vec<usize> = (0..n + keep).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for (i, step) in self.steps.iter().take(keep).enumerate() {
            let merged = n + i;
            parent[step.left] = merged;
            parent[step.right] = merged;
        }

        let mut label_of_root = std::collections::HashMap::new();
        (0..n)
            .map(|obs| {
                let root = find(&mut parent, obs);
                let next = label_of_root.len();
                *label_of_root.entry(root).or_insert(next)
            })
            .collect()
    }
}

//! Augmented interval tree with a deterministic best-overlap query
//!
//! Intervals are closed (`[start, end]`) and kept in an AVL tree ordered by
//! `(start, end)`. Every node carries the largest `end` found in its subtree, which
//! lets queries skip whole subtrees that cannot reach the query.

use std::cmp::Ordering;

/// A closed interval `[start, end]` carrying a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval<T> {
    start: i32,
    end: i32,
    data: T,
}
impl<T> Interval<T> {
    /// Creates a new interval
    ///
    /// # Panics
    ///
    /// Panics if `start > end`
    #[must_use]
    pub fn new(start: i32, end: i32, data: T) -> Self {
        assert!(start <= end, "interval start ({start}) exceeds end ({end})");
        Self { start, end, data }
    }

    #[must_use]
    pub fn start(&self) -> i32 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> i32 {
        self.end
    }

    #[must_use]
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Number of positions covered (`end - start + 1`)
    #[must_use]
    pub fn len(&self) -> i64 {
        i64::from(self.end) - i64::from(self.start) + 1
    }

    /// Always false: a closed interval covers at least one position
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of positions shared with `[start, end]`, zero if disjoint
    #[must_use]
    pub fn overlap(&self, start: i32, end: i32) -> i64 {
        let lo = i64::from(self.start.max(start));
        let hi = i64::from(self.end.min(end));
        (hi - lo + 1).max(0)
    }

    fn cmp_coords(&self, other: &Self) -> Ordering {
        (self.start, self.end).cmp(&(other.start, other.end))
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    interval: Interval<T>,
    max_end: i32,
    height: i32,
    left: Option<usize>,
    right: Option<usize>,
}

/// A set of intervals supporting overlap queries
///
/// Nodes live in an arena and reference each other by index. Intervals with identical
/// coordinates are kept in insertion order.
#[derive(Debug, Clone)]
pub struct IntervalTree<T> {
    nodes: Vec<Node<T>>,
    root: Option<usize>,
}
impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T> IntervalTree<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts the interval `[start, end]`
    ///
    /// # Panics
    ///
    /// Panics if `start > end`
    pub fn insert(&mut self, start: i32, end: i32, data: T) {
        self.insert_interval(Interval::new(start, end, data));
    }

    pub fn insert_interval(&mut self, interval: Interval<T>) {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            max_end: interval.end,
            interval,
            height: 1,
            left: None,
            right: None,
        });
        self.root = Some(self.insert_at(self.root, idx));
    }

    /// Iterates over all intervals in `(start, end)` order
    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left(self.root);
        iter
    }

    /// All intervals sharing at least one position with `[start, end]`, in `(start, end)` order
    #[must_use]
    pub fn overlapping(&self, start: i32, end: i32) -> Vec<&Interval<T>> {
        let mut hits = Vec::new();
        if start <= end {
            self.visit(self.root, start, end, &mut |iv| hits.push(iv));
        }
        hits
    }

    /// Finds the interval that best overlaps `[start, end]`
    ///
    /// The score of a candidate is `overlap / max(len(candidate), len(query))`. The
    /// highest-scoring candidate is returned if its score reaches `min_fraction`. Ties go
    /// to the smallest start, then the smallest end, then the earliest inserted.
    #[must_use]
    pub fn best_overlap(&self, start: i32, end: i32, min_fraction: f64) -> Option<&Interval<T>> {
        if start > end {
            return None;
        }
        let query_len = i64::from(end) - i64::from(start) + 1;

        let mut best: Option<(&Interval<T>, i64, i64)> = None;
        self.visit(self.root, start, end, &mut |iv| {
            let overlap = iv.overlap(start, end);
            let basis = iv.len().max(query_len);
            let better = match best {
                None => true,
                // overlap / basis > best_overlap / best_basis
                Some((_, b_overlap, b_basis)) => {
                    i128::from(overlap) * i128::from(b_basis)
                        > i128::from(b_overlap) * i128::from(basis)
                }
            };
            if better {
                best = Some((iv, overlap, basis));
            }
        });

        best.and_then(|(iv, overlap, basis)| {
            (overlap as f64 / basis as f64 >= min_fraction).then_some(iv)
        })
    }

    // in-order walk over intervals intersecting [start, end]
    fn visit<'a, F>(&'a self, node: Option<usize>, start: i32, end: i32, f: &mut F)
    where
        F: FnMut(&'a Interval<T>),
    {
        let Some(idx) = node else {
            return;
        };
        let n = &self.nodes[idx];
        if n.max_end < start {
            return;
        }
        self.visit(n.left, start, end, f);
        if n.interval.start > end {
            return;
        }
        if n.interval.end >= start {
            f(&n.interval);
        }
        self.visit(n.right, start, end, f);
    }

    fn insert_at(&mut self, node: Option<usize>, new: usize) -> usize {
        let Some(idx) = node else {
            return new;
        };
        if self.nodes[new].interval.cmp_coords(&self.nodes[idx].interval) == Ordering::Less {
            let left = self.insert_at(self.nodes[idx].left, new);
            self.nodes[idx].left = Some(left);
        } else {
            let right = self.insert_at(self.nodes[idx].right, new);
            self.nodes[idx].right = Some(right);
        }
        self.rebalance(idx)
    }

    fn height(&self, node: Option<usize>) -> i32 {
        node.map_or(0, |i| self.nodes[i].height)
    }

    fn max_end(&self, node: Option<usize>) -> i32 {
        node.map_or(i32::MIN, |i| self.nodes[i].max_end)
    }

    fn update(&mut self, idx: usize) {
        let (left, right) = (self.nodes[idx].left, self.nodes[idx].right);
        let height = 1 + self.height(left).max(self.height(right));
        let max_end = self.nodes[idx]
            .interval
            .end
            .max(self.max_end(left))
            .max(self.max_end(right));
        let node = &mut self.nodes[idx];
        node.height = height;
        node.max_end = max_end;
    }

    fn balance_factor(&self, idx: usize) -> i32 {
        self.height(self.nodes[idx].left) - self.height(self.nodes[idx].right)
    }

    fn rotate_right(&mut self, idx: usize) -> usize {
        let Some(pivot) = self.nodes[idx].left else {
            return idx;
        };
        self.nodes[idx].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(idx);
        self.update(idx);
        self.update(pivot);
        pivot
    }

    fn rotate_left(&mut self, idx: usize) -> usize {
        let Some(pivot) = self.nodes[idx].right else {
            return idx;
        };
        self.nodes[idx].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(idx);
        self.update(idx);
        self.update(pivot);
        pivot
    }

    fn rebalance(&mut self, idx: usize) -> usize {
        self.update(idx);
        let balance = self.balance_factor(idx);
        if balance > 1 {
            if let Some(left) = self.nodes[idx].left {
                if self.balance_factor(left) < 0 {
                    let left = self.rotate_left(left);
                    self.nodes[idx].left = Some(left);
                }
            }
            self.rotate_right(idx)
        } else if balance < -1 {
            if let Some(right) = self.nodes[idx].right {
                if self.balance_factor(right) > 0 {
                    let right = self.rotate_right(right);
                    self.nodes[idx].right = Some(right);
                }
            }
            self.rotate_left(idx)
        } else {
            idx
        }
    }
}

impl<T> FromIterator<Interval<T>> for IntervalTree<T> {
    fn from_iter<I: IntoIterator<Item = Interval<T>>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<T> Extend<Interval<T>> for IntervalTree<T> {
    fn extend<I: IntoIterator<Item = Interval<T>>>(&mut self, iter: I) {
        for interval in iter {
            self.insert_interval(interval);
        }
    }
}

/// In-order iterator over the intervals of an [`IntervalTree`]
pub struct Iter<'a, T> {
    tree: &'a IntervalTree<T>,
    stack: Vec<usize>,
}
impl<T> Iter<'_, T> {
    fn push_left(&mut self, mut node: Option<usize>) {
        while let Some(idx) = node {
            self.stack.push(idx);
            node = self.tree.nodes[idx].left;
        }
    }
}
impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a Interval<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = &self.tree.nodes[idx];
        self.push_left(node.right);
        Some(&node.interval)
    }
}

impl<'a, T> IntoIterator for &'a IntervalTree<T> {
    type Item = &'a Interval<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

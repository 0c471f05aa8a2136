//! Bounding volume hierarchy over primitive boxes.
//!
//! Nodes live in one array with the root at 0 and siblings adjacent. Splits
//! are chosen by a full surface-area sweep: primitives are ordered by
//! centroid along each axis and every split position is costed.

use smallvec::SmallVec;

use crate::util::{Aabb, Ray, Result, Vec3};

/// Nodes with this many primitives or fewer are never split.
const LEAF_SIZE: usize = 4;

/// Recursion limit; deeper nodes become leaves.
const MAX_DEPTH: usize = 48;

/// Cost of visiting a node, in units of one primitive test.
const NODE_COST: f32 = 1.0;

/// Flat BVH node.
///
/// Internal node: left_or_first = left child index, count = 0
/// Leaf node: left_or_first = first slot in `prim_indices`, count > 0
#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub left_or_first: u32,
    pub count: u32,
}

impl BvhNode {
    const EMPTY: Self = Self {
        bounds: Aabb::EMPTY,
        left_or_first: 0,
        count: 0,
    };

    #[inline]
    fn leaf(bounds: Aabb, first: usize, count: usize) -> Self {
        Self {
            bounds,
            left_or_first: first as u32,
            count: count as u32,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Built BVH.
#[derive(Debug, Clone)]
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    /// Reordered primitive indices (leaves reference into this).
    pub prim_indices: Vec<usize>,
}

impl Bvh {
    /// Single leaf holding every primitive, for unaccelerated traversal.
    pub fn flat(aabbs: &[Aabb]) -> Self {
        let mut bounds = Aabb::EMPTY;
        for b in aabbs {
            bounds.grow(b);
        }
        Self {
            nodes: vec![BvhNode::leaf(bounds, 0, aabbs.len())],
            prim_indices: (0..aabbs.len()).collect(),
        }
    }

    /// Bounds of everything in the hierarchy.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or(Aabb::EMPTY)
    }

    /// Walk every leaf the ray overlaps, nearest-first where cheap.
    ///
    /// `visit(prim, t_max)` tests one primitive and returns its hit distance,
    /// which then tightens `t_max` for the rest of the walk.
    pub fn traverse<F>(&self, ray: &Ray, t_min: f32, mut t_max: f32, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, f32) -> Result<Option<f32>>,
    {
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        if self.nodes.first().is_some_and(|n| n.count > 0 || !n.bounds.is_empty()) {
            stack.push(0);
        }

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            if node.bounds.intersect(ray, t_min, t_max).is_none() {
                continue;
            }
            if node.is_leaf() {
                let first = node.left_or_first as usize;
                for &prim in &self.prim_indices[first..first + node.count as usize] {
                    if let Some(t) = visit(prim, t_max)? {
                        t_max = t_max.min(t);
                    }
                }
                continue;
            }

            // Push the farther child first so the nearer one is popped next.
            let left = node.left_or_first;
            let right = left + 1;
            let tl = self.nodes[left as usize].bounds.intersect(ray, t_min, t_max);
            let tr = self.nodes[right as usize].bounds.intersect(ray, t_min, t_max);
            match (tl, tr) {
                (Some(a), Some(b)) if a <= b => {
                    stack.push(right);
                    stack.push(left);
                }
                (Some(_), Some(_)) => {
                    stack.push(left);
                    stack.push(right);
                }
                (Some(_), None) => stack.push(left),
                (None, Some(_)) => stack.push(right),
                (None, None) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    axis: usize,
    /// Number of primitives on the left after ordering along `axis`.
    index: usize,
    cost: f32,
}

struct Builder<'a> {
    aabbs: &'a [Aabb],
    centroids: Vec<Vec3>,
    nodes: Vec<BvhNode>,
}

impl Builder<'_> {
    fn bounds_of(&self, prims: &[usize]) -> Aabb {
        prims.iter().fold(Aabb::EMPTY, |mut b, &p| {
            b.grow(&self.aabbs[p]);
            b
        })
    }

    /// Order by centroid along `axis`; ties keep input order.
    fn sort_along(&self, prims: &mut [usize], axis: usize) {
        prims.sort_unstable_by(|&a, &b| {
            self.centroids[a][axis]
                .total_cmp(&self.centroids[b][axis])
                .then(a.cmp(&b))
        });
    }

    /// Cheapest split over all axes and positions, if it beats a leaf.
    ///
    /// Costs are relative to the parent area, so a leaf costs `prims.len()`.
    fn best_split(&self, prims: &mut [usize], parent: &Aabb) -> Option<Split> {
        let n = prims.len();
        let parent_area = parent.area();
        if parent_area <= 0.0 {
            return None;
        }

        let mut right_area = vec![0.0f32; n];
        let mut best: Option<Split> = None;
        for axis in 0..3 {
            self.sort_along(prims, axis);

            let mut right = Aabb::EMPTY;
            for i in (1..n).rev() {
                right.grow(&self.aabbs[prims[i]]);
                right_area[i] = right.area();
            }

            let mut left = Aabb::EMPTY;
            for i in 1..n {
                left.grow(&self.aabbs[prims[i - 1]]);
                let cost = NODE_COST
                    + (i as f32 * left.area() + (n - i) as f32 * right_area[i]) / parent_area;
                if best.map_or(true, |b| cost < b.cost) {
                    best = Some(Split { axis, index: i, cost });
                }
            }
        }
        best.filter(|s| s.cost < n as f32)
    }

    /// Fill `nodes[node]` from `prims`, which start at `first` in the final order.
    fn subdivide(&mut self, node: usize, prims: &mut [usize], first: usize, depth: usize) {
        let bounds = self.bounds_of(prims);
        let split = if prims.len() > LEAF_SIZE && depth < MAX_DEPTH {
            self.best_split(prims, &bounds)
        } else {
            None
        };
        let Some(split) = split else {
            self.nodes[node] = BvhNode::leaf(bounds, first, prims.len());
            return;
        };

        self.sort_along(prims, split.axis);
        let left = self.nodes.len();
        self.nodes.extend([BvhNode::EMPTY; 2]);
        self.nodes[node] = BvhNode {
            bounds,
            left_or_first: left as u32,
            count: 0,
        };

        let (lo, hi) = prims.split_at_mut(split.index);
        self.subdivide(left, lo, first, depth + 1);
        self.subdivide(left + 1, hi, first + split.index, depth + 1);
    }
}

/// Build a hierarchy over `aabbs`. Leaf slots index into `aabbs`.
#[tracing::instrument(skip_all, fields(prims = aabbs.len()))]
pub fn build_bvh(aabbs: &[Aabb]) -> Bvh {
    let mut order: Vec<usize> = (0..aabbs.len()).collect();
    let mut builder = Builder {
        aabbs,
        centroids: aabbs.iter().map(Aabb::centroid).collect(),
        nodes: Vec::with_capacity(2 * aabbs.len().max(1)),
    };
    builder.nodes.push(BvhNode::EMPTY);
    builder.subdivide(0, &mut order, 0, 0);

    Bvh {
        nodes: builder.nodes,
        prim_indices: order,
    }
}

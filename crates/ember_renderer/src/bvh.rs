//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Nodes live in one flat array built with an explicit worklist, so neither
//! construction nor traversal recurses. Each node also stores the summed
//! surface area of the primitives below it, which makes the same tree an
//! area-proportional sampler for emitters.

use crate::primitive::{FaceCulling, HitRecord, Primitive, SurfacePoint};
use crate::sampling::gen_f32;
use ember_math::{Aabb, Interval, Ray};
use rand::RngCore;
use std::sync::Arc;

/// Capacity of the traversal stack. Children that would overflow it are
/// skipped, which can only happen for trees deeper than the stack.
pub const BVH_STACK_SIZE: usize = 64;

/// BVH node - either a branch with two children or a leaf with one primitive.
#[derive(Debug, Clone, Copy)]
pub enum BvhNode {
    /// Internal node; children are indices into the node array.
    Branch {
        left: u32,
        right: u32,
        bbox: Aabb,
        area: f32,
    },
    /// Leaf node; `primitive` indexes the primitive array.
    Leaf { primitive: u32, bbox: Aabb, area: f32 },
}

impl BvhNode {
    pub fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Branch { bbox, .. } | BvhNode::Leaf { bbox, .. } => *bbox,
        }
    }

    /// Summed area of every primitive below this node.
    pub fn area(&self) -> f32 {
        match self {
            BvhNode::Branch { area, .. } | BvhNode::Leaf { area, .. } => *area,
        }
    }
}

/// A point drawn from a [`Bvh`] together with the primitive it lies on.
#[derive(Clone, Copy)]
pub struct AreaSample<'a> {
    pub point: SurfacePoint,
    pub primitive: &'a dyn Primitive,
    /// Area density of the whole procedure: one over the total area.
    pub pdf: f32,
}

/// Work item for the build: a node slot and the primitive range it covers.
struct BuildTask {
    node: usize,
    start: usize,
    end: usize,
}

pub struct Bvh {
    nodes: Vec<BvhNode>,
    primitives: Vec<Arc<dyn Primitive>>,
}

impl Bvh {
    /// Build a BVH over `primitives`. An empty list gives an empty tree that
    /// never reports hits and cannot be sampled.
    pub fn new(primitives: Vec<Arc<dyn Primitive>>) -> Self {
        let n = primitives.len();
        if n == 0 {
            return Self {
                nodes: Vec::new(),
                primitives,
            };
        }

        let bounds: Vec<Aabb> = primitives.iter().map(|p| p.bounding_box()).collect();
        let mut order: Vec<u32> = (0..n as u32).collect();

        // A binary tree over n leaves has exactly 2n - 1 nodes
        let placeholder = BvhNode::Leaf {
            primitive: 0,
            bbox: Aabb::EMPTY,
            area: 0.0,
        };
        let mut nodes = vec![placeholder; 2 * n - 1];
        let mut next_free = 1;
        let mut worklist = vec![BuildTask {
            node: 0,
            start: 0,
            end: n,
        }];

        while let Some(task) = worklist.pop() {
            let count = task.end - task.start;
            if count == 1 {
                nodes[task.node] = BvhNode::Leaf {
                    primitive: order[task.start],
                    bbox: Aabb::EMPTY,
                    area: 0.0,
                };
                continue;
            }

            // Median split along the axis of largest centroid spread
            let slice = &mut order[task.start..task.end];
            let centroid_bounds = slice.iter().fold(Aabb::EMPTY, |acc, &i| {
                let c = bounds[i as usize].centroid();
                Aabb::surrounding(&acc, &Aabb::from_points(&[c]))
            });
            let axis = centroid_bounds.longest_axis();
            slice.sort_unstable_by(|&a, &b| {
                let a_val = bounds[a as usize].centroid()[axis];
                let b_val = bounds[b as usize].centroid()[axis];
                a_val.partial_cmp(&b_val).unwrap_or(std::cmp::Ordering::Equal)
            });

            let mid = task.start + count / 2;
            let left = next_free;
            let right = next_free + 1;
            next_free += 2;

            nodes[task.node] = BvhNode::Branch {
                left: left as u32,
                right: right as u32,
                bbox: Aabb::EMPTY,
                area: 0.0,
            };
            worklist.push(BuildTask {
                node: left,
                start: task.start,
                end: mid,
            });
            worklist.push(BuildTask {
                node: right,
                start: mid,
                end: task.end,
            });
        }

        // Children always sit after their parent, so a reverse sweep sees
        // both children before the parent.
        for i in (0..nodes.len()).rev() {
            nodes[i] = match nodes[i] {
                BvhNode::Leaf { primitive, .. } => {
                    let p = &primitives[primitive as usize];
                    BvhNode::Leaf {
                        primitive,
                        bbox: p.bounding_box(),
                        area: p.area(),
                    }
                }
                BvhNode::Branch { left, right, .. } => {
                    let l = nodes[left as usize];
                    let r = nodes[right as usize];
                    BvhNode::Branch {
                        left,
                        right,
                        bbox: Aabb::surrounding(&l.bbox(), &r.bbox()),
                        area: l.area() + r.area(),
                    }
                }
            };
        }

        Self { nodes, primitives }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Total surface area of all primitives.
    pub fn total_area(&self) -> f32 {
        self.nodes.first().map_or(0.0, BvhNode::area)
    }

    pub fn bounding_box(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, BvhNode::bbox)
    }

    /// Closest hit inside `ray_t` that passes `culling`.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval, culling: FaceCulling) -> Option<HitRecord<'_>> {
        let mut rec = HitRecord::default();
        let mut found = false;

        self.traverse(ray, ray_t, |primitive, max| {
            if primitive.hit(ray, ray_t.with_max(max), culling, &mut rec) {
                found = true;
                return (rec.t, false);
            }
            (max, false)
        });

        found.then_some(rec)
    }

    /// Whether anything at all blocks the open segment `ray_t`, ignoring culling.
    pub fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool {
        let mut rec = HitRecord::default();
        let mut blocked = false;

        self.traverse(ray, ray_t, |primitive, max| {
            blocked = primitive.hit(ray, ray_t.with_max(max), FaceCulling::None, &mut rec);
            (max, blocked)
        });

        blocked
    }

    /// Stack-based traversal. `visit` receives each leaf primitive whose box
    /// the current segment touches, with the current segment end, and
    /// returns the new end plus whether to stop.
    fn traverse<'a, F>(&'a self, ray: &Ray, ray_t: Interval, mut visit: F)
    where
        F: FnMut(&'a dyn Primitive, f32) -> (f32, bool),
    {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = [0u32; BVH_STACK_SIZE];
        let mut top = 1;
        let mut max = ray_t.max;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];
            if !node.bbox().hit(ray, ray_t.with_max(max)) {
                continue;
            }

            match *node {
                BvhNode::Leaf { primitive, .. } => {
                    let (new_max, stop) = visit(self.primitives[primitive as usize].as_ref(), max);
                    if stop {
                        return;
                    }
                    max = new_max;
                }
                BvhNode::Branch { left, right, .. } => {
                    if top + 2 <= BVH_STACK_SIZE {
                        stack[top] = right;
                        stack[top + 1] = left;
                        top += 2;
                    }
                }
            }
        }
    }

    /// Pick a primitive with probability proportional to its area, then a
    /// uniform point on it. The combined density is one over the total area.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<AreaSample<'_>> {
        let total = self.total_area();
        if total <= 0.0 {
            return None;
        }

        let mut u = gen_f32(rng) * total;
        let mut index = 0;
        loop {
            match self.nodes[index] {
                BvhNode::Branch { left, right, .. } => {
                    let left_area = self.nodes[left as usize].area();
                    if u < left_area {
                        index = left as usize;
                    } else {
                        u -= left_area;
                        index = right as usize;
                    }
                }
                BvhNode::Leaf { primitive, .. } => {
                    let primitive = self.primitives[primitive as usize].as_ref();
                    return Some(AreaSample {
                        point: primitive.sample_point(rng),
                        primitive,
                        pdf: 1.0 / total,
                    });
                }
            }
        }
    }
}

//! The k-d acceleration structure: surface-area-heuristic construction over
//! primitive prototypes, simplex batching, and the two traversal variants the
//! shader uses (`intersect_tree` for the nearest opaque hit plus transparent
//! hits, `occludes_tree` for shadow rays).

use std::sync::Arc;

use log::debug;

use crate::aabb::{Aabb, PrimitivePrototype};
use crate::math::{Ray, Vector};
use crate::primitives::{Material, Primitive};
use crate::simd::LANES;

pub const KD_DEFAULT_MAX_DEPTH: i32 = if LANES > 1 { 25 } else { 18 };

/// Nodes holding this many primitives or fewer become leaves outright.
pub const KD_DEFAULT_SPLIT_THRESHOLD: usize = 2;

/// Children are built through the work-stealing pool only above this many
/// primitives; small subtrees stay on the current thread.
const PARALLEL_BUILD_THRESHOLD: usize = 64;

// These values were found through experimentation on fairly simple scenes, so
// further tuning will likely help.

fn default_cost_traversal(d: usize) -> f32 {
    match d {
        3 => 0.0,
        4 => 1.0,
        5 => 8.0,
        6 => 500.0,
        _ => 700.0,
    }
}

fn default_cost_intersection(d: usize) -> f32 {
    match d {
        3 => 0.5,
        _ => 0.1,
    }
}

#[derive(Debug, Clone)]
pub struct KdTreeParams {
    pub max_depth: i32,
    pub split_threshold: usize,
    pub traversal: f32,
    pub intersection: f32,
}

impl KdTreeParams {
    pub fn new(dimension: usize) -> Self {
        KdTreeParams {
            max_depth: KD_DEFAULT_MAX_DEPTH,
            split_threshold: KD_DEFAULT_SPLIT_THRESHOLD,
            traversal: default_cost_traversal(dimension),
            intersection: default_cost_intersection(dimension),
        }
    }
}

// ─── Nodes ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum KdNode {
    Leaf(KdLeaf),
    Branch(KdBranch),
}

#[derive(Debug)]
pub struct KdBranch {
    pub axis: usize,
    pub split: f32,
    /// Child covering coordinates below the split.
    pub left: Option<Box<KdNode>>,
    /// Child covering coordinates above the split.
    pub right: Option<Box<KdNode>>,
}

/// Items are partitioned so batches come before scalar primitives.
#[derive(Debug)]
pub struct KdLeaf {
    pub items: Box<[Arc<Primitive>]>,
    pub batches: usize,
}

impl KdNode {
    pub fn leaf(mut items: Vec<Arc<Primitive>>) -> Self {
        items.sort_by_key(|p| !p.is_batch());
        let batches = items.iter().take_while(|p| p.is_batch()).count();
        KdNode::Leaf(KdLeaf { items: items.into_boxed_slice(), batches })
    }

    pub fn branch(axis: usize, split: f32, left: Option<Box<KdNode>>, right: Option<Box<KdNode>>) -> Self {
        KdNode::Branch(KdBranch { axis, split, left, right })
    }
}

// ─── Hit records ────────────────────────────────────────────────────────────

/// A reference to the primitive a ray hit. For a batch the lane index picks
/// the member; scalar primitives carry lane −1.
#[derive(Debug, Clone, Copy)]
pub struct TargetRef<'a> {
    pub primitive: &'a Primitive,
    pub lane: i32,
}

impl<'a> TargetRef<'a> {
    #[inline(always)]
    pub fn material(&self) -> &'a Material {
        self.primitive.material(self.lane)
    }

    #[inline(always)]
    fn ptr(&self) -> *const Primitive {
        self.primitive as *const Primitive
    }
}

impl PartialEq for TargetRef<'_> {
    fn eq(&self, b: &Self) -> bool {
        std::ptr::eq(self.primitive, b.primitive) && self.lane == b.lane
    }
}

/// A hit ordered by distance; `normal.origin` is the hit point.
#[derive(Debug, Clone)]
pub struct RayIntersection<'a> {
    pub dist: f32,
    pub target: TargetRef<'a>,
    pub normal: Ray,
}

/// Sorts by distance and drops duplicate targets, which arise when a
/// primitive straddles several leaves.
pub fn sort_and_dedup_hits(hits: &mut Vec<RayIntersection<'_>>) {
    hits.sort_unstable_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap_or(std::cmp::Ordering::Equal));
    hits.dedup_by(|a, b| a.target == b.target);
}

/// Drops hits at `dist` or beyond, starting at index `from`.
fn trim_intersections(hits: &mut Vec<RayIntersection<'_>>, dist: f32, from: usize) {
    let mut i = from;
    while i < hits.len() {
        if hits[i].dist >= dist {
            hits.swap_remove(i);
        } else {
            i += 1;
        }
    }
}

struct OpaqueHit<'a> {
    dist: f32,
    target: Option<TargetRef<'a>>,
    normal: Ray,
}

// ─── Leaf intersection ──────────────────────────────────────────────────────

impl KdLeaf {
    /// Tests every item not yet in `checked`, keeping the nearest opaque hit
    /// in `o_hit` (its distance doubles as the cutoff) and accumulating
    /// transparent hits. Transparent hits beyond a newly found opaque hit are
    /// trimmed before returning.
    fn intersects<'a>(
        &'a self,
        target: &Ray,
        skip_ptr: *const Primitive,
        skip_lane: i32,
        o_hit: &mut OpaqueHit<'a>,
        t_hits: &mut Vec<RayIntersection<'a>>,
        checked: &mut Vec<*const Primitive>,
    ) -> bool {
        let h_start = t_hits.len();
        let mut found = false;
        let mut normal = Ray::zeros(target.dimension());

        for (i, item) in self.items.iter().enumerate() {
            let item: &'a Primitive = item;
            let ptr = item as *const Primitive;

            if i < self.batches {
                if checked.contains(&ptr) {
                    continue;
                }
                let batch = item.as_batch().expect("leaf batch partition out of sync");
                let lane_skip = if ptr == skip_ptr { skip_lane } else { -1 };
                if let Some((dist, lane)) = batch.intersects(target, &mut normal, lane_skip, o_hit.dist) {
                    let target_ref = TargetRef { primitive: item, lane: lane as i32 };
                    if batch.opaque(lane) {
                        o_hit.dist = dist;
                        o_hit.target = Some(target_ref);
                        std::mem::swap(&mut o_hit.normal, &mut normal);
                        found = true;
                    } else {
                        t_hits.push(RayIntersection { dist, target: target_ref, normal: normal.clone() });
                    }
                }
                checked.push(ptr);
            } else {
                if ptr == skip_ptr || checked.contains(&ptr) {
                    continue;
                }
                let dist = item.intersects(target, &mut normal, o_hit.dist);
                if dist != 0.0 {
                    let target_ref = TargetRef { primitive: item, lane: -1 };
                    if item.opaque(-1) {
                        o_hit.dist = dist;
                        o_hit.target = Some(target_ref);
                        std::mem::swap(&mut o_hit.normal, &mut normal);
                        found = true;
                    } else {
                        t_hits.push(RayIntersection { dist, target: target_ref, normal: normal.clone() });
                    }
                }
                checked.push(ptr);
            }
        }

        if found {
            trim_intersections(t_hits, o_hit.dist, h_start);
        }
        found
    }

    /// True at the first opaque hit within `ldistance`; transparent hits on
    /// the way accumulate so the caller can attenuate the light.
    fn occludes<'a>(
        &'a self,
        target: &Ray,
        ldistance: f32,
        skip_ptr: *const Primitive,
        skip_lane: i32,
        hits: &mut Vec<RayIntersection<'a>>,
    ) -> bool {
        let mut normal = Ray::zeros(target.dimension());

        for (i, item) in self.items.iter().enumerate() {
            let item: &'a Primitive = item;
            let ptr = item as *const Primitive;

            if i < self.batches {
                let batch = item.as_batch().expect("leaf batch partition out of sync");
                let lane_skip = if ptr == skip_ptr { skip_lane } else { -1 };
                if let Some((dist, lane)) = batch.intersects(target, &mut normal, lane_skip, ldistance) {
                    if batch.opaque(lane) {
                        return true;
                    }
                    hits.push(RayIntersection {
                        dist,
                        target: TargetRef { primitive: item, lane: lane as i32 },
                        normal: normal.clone(),
                    });
                }
            } else if ptr != skip_ptr {
                let dist = item.intersects(target, &mut normal, ldistance);
                if dist != 0.0 {
                    if item.opaque(-1) {
                        return true;
                    }
                    hits.push(RayIntersection {
                        dist,
                        target: TargetRef { primitive: item, lane: -1 },
                        normal: normal.clone(),
                    });
                }
            }
        }
        false
    }
}

// ─── Traversal ──────────────────────────────────────────────────────────────

struct IntersectWalk<'a, 'w> {
    target: &'w Ray,
    invdir: Vector,
    skip_ptr: *const Primitive,
    skip_lane: i32,
    o_hit: &'w mut OpaqueHit<'a>,
    t_hits: &'w mut Vec<RayIntersection<'a>>,
    checked: Vec<*const Primitive>,
}

impl<'a, 'w> IntersectWalk<'a, 'w> {
    fn visit(&mut self, mut node: Option<&'a KdNode>, mut t_near: f32, t_far: f32) -> bool {
        while let Some(n) = node {
            let b = match n {
                KdNode::Leaf(leaf) => {
                    return leaf.intersects(
                        self.target,
                        self.skip_ptr,
                        self.skip_lane,
                        self.o_hit,
                        self.t_hits,
                        &mut self.checked,
                    );
                }
                KdNode::Branch(b) => b,
            };

            if self.target.direction[b.axis] != 0.0 {
                // an origin exactly in the plane descends by direction sign
                if self.target.origin[b.axis] == b.split {
                    node = if self.target.direction[b.axis] > 0.0 { b.right.as_deref() } else { b.left.as_deref() };
                    continue;
                }

                let t = (b.split - self.target.origin[b.axis]) * self.invdir[b.axis];

                let from_right = self.target.origin[b.axis] > b.split;
                let n_near = if from_right { b.right.as_deref() } else { b.left.as_deref() };
                let n_far = if from_right { b.left.as_deref() } else { b.right.as_deref() };

                if t < 0.0 || t > t_far {
                    node = n_near;
                    continue;
                }
                if t < t_near {
                    node = n_far;
                    continue;
                }

                if n_near.is_some() {
                    let h_start = self.t_hits.len();
                    let hit = self.visit(n_near, t_near, t);
                    if (hit && self.o_hit.dist <= t) || n_far.is_none() {
                        return hit;
                    }

                    if hit {
                        /* A hit past t means the intersection lies in a farther
                           cell (primitives span cells), so something closer may
                           still exist there. But a primitive embedded in the
                           split plane can also land past t through rounding, so
                           the far cell cannot be assumed to contain it. */
                        if self.visit(n_far, t, t_far) {
                            // a closer opaque hit invalidates some accumulated
                            // transparent hits
                            trim_intersections(self.t_hits, self.o_hit.dist, h_start);
                        }
                        return true;
                    }
                }

                debug_assert!(n_far.is_some());
                node = n_far;
                t_near = t;
                continue;
            }

            node = if self.target.origin[b.axis] >= b.split { b.right.as_deref() } else { b.left.as_deref() };
        }
        false
    }
}

/// Walks the tree for the nearest opaque hit, accumulating deduplicated
/// transparent hits along the way. `skip` names the primitive the ray
/// originates from (reflection rays), which is never re-tested.
pub fn intersect_tree<'a>(
    root: Option<&'a KdNode>,
    target: &Ray,
    skip: Option<TargetRef<'a>>,
    t_hits: &mut Vec<RayIntersection<'a>>,
    t_near: f32,
    t_far: f32,
) -> Option<RayIntersection<'a>> {
    let mut o_hit = OpaqueHit {
        dist: f32::MAX,
        target: None,
        normal: Ray::zeros(target.dimension()),
    };

    let mut walk = IntersectWalk {
        target,
        invdir: Vector::from_fn(target.dimension(), |i| 1.0 / target.direction[i]),
        skip_ptr: skip.map_or(std::ptr::null(), |s| s.ptr()),
        skip_lane: skip.map_or(-1, |s| s.lane),
        o_hit: &mut o_hit,
        t_hits,
        checked: Vec::with_capacity(20),
    };

    if walk.visit(root, t_near, t_far) {
        Some(RayIntersection {
            dist: o_hit.dist,
            target: o_hit.target.expect("opaque hit without a target"),
            normal: o_hit.normal,
        })
    } else {
        None
    }
}

fn occludes_walk<'a>(
    mut node: Option<&'a KdNode>,
    target: &Ray,
    invdir: &Vector,
    ldistance: f32,
    skip_ptr: *const Primitive,
    skip_lane: i32,
    hits: &mut Vec<RayIntersection<'a>>,
    mut t_near: f32,
    mut t_far: f32,
) -> bool {
    while let Some(n) = node {
        let b = match n {
            KdNode::Leaf(leaf) => return leaf.occludes(target, ldistance, skip_ptr, skip_lane, hits),
            KdNode::Branch(b) => b,
        };

        if target.direction[b.axis] != 0.0 {
            if target.origin[b.axis] == b.split {
                node = if target.direction[b.axis] > 0.0 { b.right.as_deref() } else { b.left.as_deref() };
                continue;
            }

            let t = (b.split - target.origin[b.axis]) * invdir[b.axis];

            let from_right = target.origin[b.axis] > b.split;
            let n_near = if from_right { b.right.as_deref() } else { b.left.as_deref() };
            let n_far = if from_right { b.left.as_deref() } else { b.right.as_deref() };

            if t < 0.0 || t > t_far {
                node = n_near;
                continue;
            }
            if t < t_near {
                node = n_far;
                continue;
            }

            if n_near.is_some() {
                if n_far.is_none() {
                    t_far = t;
                    node = n_near;
                    continue;
                }
                if occludes_walk(n_near, target, invdir, ldistance, skip_ptr, skip_lane, hits, t_near, t) {
                    return true;
                }
            }

            // the far cell starts past the light; nothing there can occlude
            if t >= ldistance {
                return false;
            }

            debug_assert!(n_far.is_some());
            t_near = t;
            node = n_far;
            continue;
        }

        node = if target.origin[b.axis] >= b.split { b.right.as_deref() } else { b.left.as_deref() };
    }
    false
}

/// True when an opaque primitive blocks `target` within `ldistance`.
/// Transparent primitives on the way land in `hits`.
pub fn occludes_tree<'a>(
    root: Option<&'a KdNode>,
    target: &Ray,
    ldistance: f32,
    skip: Option<TargetRef<'a>>,
    hits: &mut Vec<RayIntersection<'a>>,
    t_near: f32,
    t_far: f32,
) -> bool {
    let invdir = Vector::from_fn(target.dimension(), |i| 1.0 / target.direction[i]);
    occludes_walk(
        root,
        target,
        &invdir,
        ldistance,
        skip.map_or(std::ptr::null(), |s| s.ptr()),
        skip.map_or(-1, |s| s.lane),
        hits,
        t_near,
        t_far,
    )
}

// ─── Simplex batching ───────────────────────────────────────────────────────

/// Surface measure of the AABB enclosing both prototypes: the sum over axes
/// of the product of the other axes' extents.
fn grouping_metric(a: &PrimitivePrototype, b: &PrimitivePrototype) -> f32 {
    let dim = a.dimension();
    let end = a.boundary.end.max_with(&b.boundary.end);
    let start = a.boundary.start.min_with(&b.boundary.start);
    let combined = &end - &start;

    let mut m = 0.0;
    for i in 0..dim {
        let mut surface = 1.0;
        for j in 0..dim {
            if i != j {
                surface *= combined[j];
            }
        }
        m += surface;
    }
    m
}

/// Keeps `batch` sorted by metric after the fixed seed entry, capped at
/// [`LANES`] entries.
fn add_sorted(batch: &mut Vec<(usize, f32)>, candidate: (usize, f32)) {
    for i in 1..batch.len() {
        if candidate.1 < batch[i].1 {
            debug_assert!(batch.len() <= LANES);
            if batch.len() == LANES {
                batch.pop();
            }
            batch.insert(i, candidate);
            return;
        }
    }
    if batch.len() < LANES {
        batch.push(candidate);
    }
}

/// Greedily fuses simplex prototypes into batches of [`LANES`]. Prototypes
/// are sorted by AABB centre along `axis` (the scene's longest extent), then
/// each unconsumed simplex seeds a batch filled with the candidates that
/// minimize the enclosing surface area. A tail too small to fill a batch
/// stays scalar.
pub(crate) fn group_simplices(prototypes: &mut Vec<PrimitivePrototype>, axis: usize) {
    if LANES <= 1 {
        return;
    }

    prototypes.sort_by(|a, b| {
        let ac = a.boundary.center()[axis];
        let bc = b.boundary.center()[axis];
        ac.partial_cmp(&bc).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut slots: Vec<Option<PrimitivePrototype>> = prototypes.drain(..).map(Some).collect();

    for p in 0..slots.len() {
        match &slots[p] {
            Some(proto) if proto.is_simplex() => {}
            _ => continue,
        }

        let mut batch: Vec<(usize, f32)> = vec![(p, 0.0)];
        for (q, slot) in slots.iter().enumerate().skip(p + 1) {
            let Some(cand) = slot else { continue };
            if !cand.is_simplex() {
                continue;
            }
            let metric = grouping_metric(slots[p].as_ref().unwrap(), cand);
            add_sorted(&mut batch, (q, metric));
        }

        if batch.len() < LANES {
            break;
        }

        let members: Vec<PrimitivePrototype> =
            batch.iter().map(|&(i, _)| slots[i].take().unwrap()).collect();
        let refs: Vec<&PrimitivePrototype> = members.iter().collect();
        slots[p] = Some(PrimitivePrototype::batch(&refs));
    }

    prototypes.extend(slots.into_iter().flatten());
}

// ─── Build ──────────────────────────────────────────────────────────────────

fn best_axis(boundary: &Aabb) -> usize {
    let widths = &boundary.end - &boundary.start;
    let mut axis = 0;
    let mut width = widths[0];
    for i in 1..boundary.dimension() {
        if widths[i] > width {
            width = widths[i];
            axis = i;
        }
    }
    axis
}

/// SAH split search along `axis`. Sweeps the merged, sorted start/end
/// boundaries, evaluating the cost at every distinct position strictly inside
/// the node. Returns the best split only when it beats the leaf cost.
fn find_split(
    boundary: &Aabb,
    axis: usize,
    contain: &[&PrimitivePrototype],
    overlap: &[&PrimitivePrototype],
    params: &KdTreeParams,
) -> Option<f32> {
    let dim = boundary.dimension();
    let cube_range = &boundary.end - &boundary.start;

    let mut side_area = 1.0;
    for i in 0..dim {
        if i != axis {
            side_area *= cube_range[i];
        }
    }

    let mut shaft_area_factor = 0.0;
    for i in 0..dim {
        if i != axis {
            let mut tmp = 1.0;
            for j in 0..dim {
                if j != i && j != axis {
                    tmp *= cube_range[j];
                }
            }
            shaft_area_factor += tmp;
        }
    }

    /* This is one half the surface measure of the box, but only the ratios
       between areas matter. */
    let area = side_area + shaft_area_factor * cube_range[axis];

    let split_cost = |l_count: usize, r_count: usize, split: f32| -> f32 {
        let shaft_area = shaft_area_factor * (split - boundary.start[axis]);
        let l_area = side_area + shaft_area;
        let r_area = area - shaft_area;
        params.traversal
            + params.intersection * (l_area / area * l_count as f32 + r_area / area * r_count as f32)
    };

    let mut search_l: Vec<&PrimitivePrototype> = Vec::with_capacity(contain.len() + overlap.len());
    search_l.extend_from_slice(contain);
    search_l.extend_from_slice(overlap);
    search_l.sort_unstable_by(|a, b| {
        a.boundary.start[axis]
            .partial_cmp(&b.boundary.start[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut search_r = search_l.clone();
    search_r.sort_unstable_by(|a, b| {
        a.boundary.end[axis]
            .partial_cmp(&b.boundary.end[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut best_cost = f32::MAX;
    let mut pos = 0.0;

    let mut il = 1;
    let mut ir = 0;
    let mut last_split = search_l[0].boundary.start[axis];
    let mut last_il = 0;

    while il < search_l.len() {
        let split = search_l[il].boundary.start[axis].min(search_r[ir].boundary.end[axis]);

        /* Not an optimization: collapsing equal positions keeps l_count and
           r_count correct. */
        if split != last_split {
            if boundary.end[axis] > last_split && last_split > boundary.start[axis] {
                let cost = split_cost(last_il, search_l.len() - ir, last_split);
                if cost < best_cost {
                    best_cost = cost;
                    pos = last_split;
                }
            }
            last_il = il;
            last_split = split;
        }

        if search_l[il].boundary.start[axis] <= search_r[ir].boundary.end[axis] {
            il += 1;
        } else {
            ir += 1;
        }
    }

    while ir < search_l.len() {
        let split = search_r[ir].boundary.end[axis];
        if split != last_split {
            if boundary.end[axis] > last_split && last_split > boundary.start[axis] {
                let cost = split_cost(search_l.len(), search_l.len() - ir, last_split);
                if cost < best_cost {
                    best_cost = cost;
                    pos = last_split;
                }
            }
            last_split = split;
        }
        ir += 1;
    }

    let mut leaf_cost = search_l.len() as f32;
    for i in 0..dim {
        leaf_cost *= boundary.end[i] - boundary.start[i];
    }

    (best_cost < leaf_cost).then_some(pos)
}

fn overlap_intersects(
    bound: &Aabb,
    pp: &PrimitivePrototype,
    skip: Option<usize>,
    axis: usize,
    right: bool,
) -> bool {
    match skip {
        None => bound.intersects(pp),
        Some(s) if s == axis => {
            // flat on the split axis itself: membership is decided by side,
            // with a prototype exactly in the plane going right
            if right {
                pp.boundary.start[axis] >= bound.start[axis]
            } else {
                pp.boundary.start[axis] < bound.end[axis]
            }
        }
        Some(s) => bound.intersects_flat(pp, s),
    }
}

fn create_leaf(contain: &[&PrimitivePrototype], overlap: &[&PrimitivePrototype]) -> Option<Box<KdNode>> {
    let items: Vec<Arc<Primitive>> = contain
        .iter()
        .chain(overlap.iter())
        .map(|p| p.primitive.clone())
        .collect();
    Some(Box::new(KdNode::leaf(items)))
}

/* Primitives are divided into contain (entirely inside the node, cheap to
   partition) and overlap (straddling earlier splits). A primitive belongs to
   a side only if some point of it lies at non-zero distance from the split
   plane; a primitive entirely inside the plane goes right. */
fn create_node(
    depth: i32,
    boundary: &Aabb,
    contain: Vec<&PrimitivePrototype>,
    overlap: Vec<&PrimitivePrototype>,
    params: &KdTreeParams,
) -> Option<Box<KdNode>> {
    let depth = depth + 1;

    if contain.is_empty() && overlap.is_empty() {
        return None;
    }

    let axis = best_axis(boundary);
    let total = contain.len() + overlap.len();

    if depth >= params.max_depth || total <= params.split_threshold {
        return create_leaf(&contain, &overlap);
    }
    let Some(split) = find_split(boundary, axis, &contain, &overlap, params) else {
        return create_leaf(&contain, &overlap);
    };

    let mut l_contain = Vec::new();
    let mut r_contain = Vec::new();
    let mut l_overlap = Vec::new();
    let mut r_overlap = Vec::new();

    for p in contain {
        if p.boundary.start[axis] < split {
            if p.boundary.end[axis] <= split {
                l_contain.push(p);
            } else {
                l_overlap.push(p);
                r_overlap.push(p);
            }
        } else {
            r_contain.push(p);
        }
    }

    let b_left = Aabb::new(boundary.start.clone(), boundary.end.set_c(axis, split));
    let b_right = Aabb::new(boundary.start.set_c(axis, split), boundary.end.clone());

    for p in overlap {
        /* A prototype flat along some axis can be embedded in the hull of the
           node and intersect neither child; the reduced-dimension test
           resolves it, keyed by the flat axis. */
        let mut flat: Option<usize> = None;
        if p.is_simplex() || p.primitive.is_batch() {
            for i in 0..boundary.dimension() {
                if p.boundary.start[i] == p.boundary.end[i] {
                    flat = Some(i);
                    break;
                }
            }
        }

        if overlap_intersects(&b_left, p, flat, axis, false) {
            l_overlap.push(p);
            if overlap_intersects(&b_right, p, flat, axis, true) {
                r_overlap.push(p);
            }
        } else {
            r_overlap.push(p);
        }
    }

    let (left, right) = if total >= PARALLEL_BUILD_THRESHOLD {
        rayon::join(
            || create_node(depth, &b_left, l_contain, l_overlap, params),
            || create_node(depth, &b_right, r_contain, r_overlap, params),
        )
    } else {
        (
            create_node(depth, &b_left, l_contain, l_overlap, params),
            create_node(depth, &b_right, r_contain, r_overlap, params),
        )
    };

    Some(Box::new(KdNode::Branch(KdBranch { axis, split, left, right })))
}

/// Builds the tree: computes the scene boundary, fuses simplices into
/// batches along the longest axis, and recursively splits. Subtrees build in
/// parallel on the rayon pool; a panic on any worker propagates to the
/// caller once outstanding work drains.
pub fn build_kdtree(
    mut prototypes: Vec<PrimitivePrototype>,
    params: &KdTreeParams,
) -> (Aabb, Option<Box<KdNode>>) {
    assert!(!prototypes.is_empty(), "building a k-d tree over no primitives");

    let mut boundary = prototypes[0].boundary.clone();
    for p in &prototypes[1..] {
        boundary = boundary.union(&p.boundary);
    }

    let before = prototypes.len();
    group_simplices(&mut prototypes, best_axis(&boundary));
    debug!(
        "kd build: {} prototypes ({} after batching), bounds {:?} .. {:?}",
        before,
        prototypes.len(),
        boundary.start,
        boundary.end
    );

    let refs: Vec<&PrimitivePrototype> = prototypes.iter().collect();
    let root = create_node(-1, &boundary, refs, Vec::new(), params);

    (boundary, root)
}

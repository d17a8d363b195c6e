//! Axis-aligned bounding boxes and the build-time primitive prototypes.
//!
//! A prototype pairs a primitive with its AABB plus the precomputed data the
//! separating-axis tests need. Every `intersects` here reports true only when
//! the overlap has non-zero volume: k-d split planes sit on primitive
//! boundaries, and a primitive touching a child box only at its hull must
//! land on exactly one side.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::math::{LaneVector, Matrix, Ray, Vector};
use crate::primitives::{Material, Primitive, Simplex, SimplexBatch, Solid, SolidKind};
use crate::simd::{VReal, LANES};

/// Product of 1-D intervals: `start[i] <= end[i]` componentwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Aabb {
    pub start: Vector,
    pub end: Vector,
}

#[inline]
fn clamp_unit(x: f32) -> f32 {
    if x > 1.0 {
        1.0
    } else if x < -1.0 {
        -1.0
    } else {
        x
    }
}

/// Dot product with one coordinate left out: the projection of `a` onto `b`
/// restricted to the hyperplane orthogonal to axis `skip`.
#[inline]
fn skip_dot(a: &Vector, b: &Vector, skip: usize) -> f32 {
    debug_assert_eq!(a.dimension(), b.dimension());
    let mut tot = 0.0;
    for i in 0..a.dimension() {
        if i != skip {
            tot += a[i] * b[i];
        }
    }
    tot
}

#[inline]
fn skip_dot_lanes(a: &LaneVector, b: &LaneVector, skip: usize) -> VReal {
    debug_assert_eq!(a.dimension(), b.dimension());
    let mut tot = VReal::zeros();
    for i in 0..a.dimension() {
        if i != skip {
            tot += a.comp(i) * b.comp(i);
        }
    }
    tot
}

impl Aabb {
    pub fn new(start: Vector, end: Vector) -> Self {
        assert_eq!(start.dimension(), end.dimension());
        Aabb { start, end }
    }

    pub fn zeros(dim: usize) -> Self {
        Aabb { start: Vector::zeros(dim), end: Vector::zeros(dim) }
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.start.dimension()
    }

    pub fn center(&self) -> Vector {
        &(&self.start + &self.end) * 0.5
    }

    pub fn contains(&self, p: &Vector) -> bool {
        assert_eq!(p.dimension(), self.dimension());
        (0..self.dimension()).all(|i| p[i] >= self.start[i] && p[i] <= self.end[i])
    }

    pub fn union(&self, b: &Aabb) -> Aabb {
        Aabb {
            start: self.start.min_with(&b.start),
            end: self.end.max_with(&b.end),
        }
    }

    fn check_split(&self, axis: usize, split: f32) -> Result<()> {
        if axis >= self.dimension() {
            return Err(Error::InvalidAxis { axis, dimension: self.dimension() });
        }
        if split <= self.start[axis] || split >= self.end[axis] {
            return Err(Error::SplitOutOfRange);
        }
        Ok(())
    }

    /// The half below `split` on `axis`.
    pub fn left(&self, axis: usize, split: f32) -> Result<Aabb> {
        self.check_split(axis, split)?;
        Ok(Aabb { start: self.start.clone(), end: self.end.set_c(axis, split) })
    }

    /// The half above `split` on `axis`.
    pub fn right(&self, axis: usize, split: f32) -> Result<Aabb> {
        self.check_split(axis, split)?;
        Ok(Aabb { start: self.start.set_c(axis, split), end: self.end.clone() })
    }

    /// Half-extent of the box projected onto `axis`, skipping one coordinate.
    fn radius_skip(&self, axis: &Vector, skip: usize) -> f32 {
        let mut r = 0.0;
        for k in 0..self.dimension() {
            if k != skip {
                r += ((self.end[k] - self.start[k]) / 2.0 * axis[k]).abs();
            }
        }
        r
    }

    // ── simplex SAT ──

    fn intersects_simplex(&self, boundary: &Aabb, simplex: &Simplex, points: &[Vector], sat_normals: &[Vector]) -> bool {
        let dim = self.dimension();

        for i in 0..dim {
            if boundary.start[i] >= self.end[i] || boundary.end[i] <= self.start[i] {
                return false;
            }
        }

        // face-plane slab
        let n_offset = simplex.face_normal.dot(&points[0]);
        let origin = self.center();
        let po = origin.dot(&simplex.face_normal);
        let mut b_max = 0.0;
        for k in 0..dim {
            b_max += ((self.end[k] - self.start[k]) / 2.0 * simplex.face_normal[k]).abs();
        }
        let b_min = po - b_max;
        b_max += po;
        if b_max < n_offset || b_min > n_offset {
            return false;
        }

        // edge normals projected onto each coordinate hyperplane
        for axis in sat_normals {
            for j in 0..dim {
                let mut t_min = f32::MAX;
                let mut t_max = f32::MIN;
                for p in points {
                    let val = skip_dot(p, axis, j);
                    t_min = t_min.min(val);
                    t_max = t_max.max(val);
                }

                let po = skip_dot(&origin, axis, j);
                let b_radius = self.radius_skip(axis, j);
                // a zero radius means the axis is parallel to the dropped
                // coordinate and the projection is invalid
                if b_radius != 0.0 && (po + b_radius <= t_min || po - b_radius >= t_max) {
                    return false;
                }
            }
        }

        true
    }

    /// The simplex test run in one fewer dimension. Used when a simplex is
    /// degenerate (flat) along `skip`, so a simplex embedded in the splitting
    /// hyperplane resolves onto exactly one side.
    fn intersects_simplex_flat(&self, boundary: &Aabb, points: &[Vector], sat_normals: &[Vector], skip: usize) -> bool {
        let dim = self.dimension();

        for i in 0..dim {
            if i != skip && (boundary.start[i] >= self.end[i] || boundary.end[i] <= self.start[i]) {
                return false;
            }
        }

        let origin = self.center();

        for (i, axis) in sat_normals.iter().enumerate() {
            let mut t_max = skip_dot(&points[0], axis, skip);
            let mut t_min = skip_dot(&points[if i != 0 { i } else { 1 }], axis, skip);
            if t_min > t_max {
                std::mem::swap(&mut t_min, &mut t_max);
            }

            let po = skip_dot(&origin, axis, skip);
            let mut b_max = self.radius_skip(axis, skip);
            let b_min = po - b_max;
            b_max += po;

            if b_max <= t_min || b_min >= t_max {
                return false;
            }
        }

        true
    }

    // ── simplex-batch SAT (any surviving lane wins) ──

    fn intersects_batch(&self, boundary: &Aabb, batch: &SimplexBatch, points: &[LaneVector], sat_normals: &[LaneVector]) -> bool {
        let dim = self.dimension();

        for i in 0..dim {
            if boundary.start[i] >= self.end[i] || boundary.end[i] <= self.start[i] {
                return false;
            }
        }

        let origin = self.center();
        let origin_l = LaneVector::broadcast(&origin);

        let n_offset = batch.face_normal.dot(&points[0]);
        let po = batch.face_normal.dot(&origin_l);
        let mut b_max = VReal::zeros();
        for k in 0..dim {
            b_max += (batch.face_normal.comp(k) * ((self.end[k] - self.start[k]) / 2.0)).abs();
        }
        let b_min = po - b_max;
        let b_max = b_max + po;

        let mut miss = b_max.lt(n_offset).or(b_min.gt(n_offset));
        if miss.all() {
            return false;
        }

        for axis in sat_normals {
            for j in 0..dim {
                let mut t_min = VReal::repeat(f32::MAX);
                let mut t_max = VReal::repeat(f32::MIN);
                for p in points {
                    let val = skip_dot_lanes(p, axis, j);
                    t_min = VReal::blend(val.lt(t_min), val, t_min);
                    t_max = VReal::blend(val.gt(t_max), val, t_max);
                }

                let po = skip_dot_lanes(&origin_l, axis, j);

                let mut b_radius = VReal::zeros();
                for k in 0..dim {
                    if k != j {
                        b_radius += (axis.comp(k) * ((self.end[k] - self.start[k]) / 2.0)).abs();
                    }
                }
                let b_min = po - b_radius;
                let b_max = po + b_radius;

                let valid = b_radius.ne_lanes(VReal::zeros());
                miss = miss.or(valid.and(b_max.le(t_min).or(b_min.ge(t_max))));
                if miss.all() {
                    return false;
                }
            }
        }

        true
    }

    fn intersects_batch_flat(&self, boundary: &Aabb, points: &[LaneVector], sat_normals: &[LaneVector], skip: usize) -> bool {
        let dim = self.dimension();

        for i in 0..dim {
            if i != skip && (boundary.start[i] >= self.end[i] || boundary.end[i] <= self.start[i]) {
                return false;
            }
        }

        let origin_l = LaneVector::broadcast(&self.center());
        let mut miss = crate::simd::VMask::zeros();

        for (i, axis) in sat_normals.iter().enumerate() {
            let a = skip_dot_lanes(&points[0], axis, skip);
            let b = skip_dot_lanes(&points[if i != 0 { i } else { 1 }], axis, skip);
            let cmp = a.gt(b);
            let t_max = VReal::blend(cmp, a, b);
            let t_min = VReal::blend(cmp, b, a);

            let po = skip_dot_lanes(&origin_l, axis, skip);
            let mut b_max = VReal::zeros();
            for k in 0..dim {
                if k != skip {
                    b_max += (axis.comp(k) * ((self.end[k] - self.start[k]) / 2.0)).abs();
                }
            }
            let b_min = po - b_max;
            let b_max = b_max + po;

            miss = miss.or(b_max.le(t_min)).or(b_min.ge(t_max));
            if miss.all() {
                return false;
            }
        }

        true
    }

    // ── solid SAT ──

    /// True when `axis` separates this box from the solid cube.
    fn box_axis_test(&self, solid: &Solid, axis: &Vector) -> bool {
        let a_po = solid.world_position().dot(axis);
        let b_po = self.center().dot(axis);

        let mut a_max = 0.0;
        for i in 0..self.dimension() {
            a_max += solid.cube_component(i).dot(axis).abs();
        }

        let mut b_max = 0.0;
        for k in 0..self.dimension() {
            b_max += ((self.end[k] - self.start[k]) / 2.0 * axis[k]).abs();
        }

        b_po + b_max < a_po - a_max || b_po - b_max > a_po + a_max
    }

    fn intersects_solid(&self, boundary: &Aabb, solid: &Solid) -> bool {
        let dim = self.dimension();

        match solid.kind {
            SolidKind::Cube => {
                for i in 0..dim {
                    if self.end[i] <= boundary.start[i] || self.start[i] >= boundary.end[i] {
                        return false;
                    }
                }

                for i in 0..dim {
                    let normal = solid.cube_normal(i);
                    if self.box_axis_test(solid, &normal) {
                        return false;
                    }

                    // the normal projected onto each coordinate hyperplane
                    for j in 0..dim {
                        let mut axis = &normal * -normal[j];
                        axis[j] += normal.square();
                        if self.box_axis_test(solid, &axis) {
                            return false;
                        }
                    }
                }

                true
            }
            SolidKind::Sphere => {
                // clamp the box centre onto the oriented half-extents and
                // compare against the unit radius in the sphere's frame
                let box_p = &solid.position - &(&solid.inv_orientation * &self.center());

                let mut closest = Vector::zeros(dim);
                for i in 0..dim {
                    let component = &solid.orientation.row_vector(i) * ((self.end[i] - self.start[i]) / 2.0);
                    closest += &(&component * clamp_unit(box_p.dot(&component) / component.square()));
                }

                (&solid.position - &closest).square() < 1.0
            }
        }
    }

    /// Non-zero-volume overlap test against a prototype.
    pub fn intersects(&self, pp: &PrimitivePrototype) -> bool {
        match (&*pp.primitive, &pp.data) {
            (Primitive::Simplex(s), PrototypeData::Simplex { points, sat_normals }) => {
                self.intersects_simplex(&pp.boundary, s, points, sat_normals)
            }
            (Primitive::Batch(b), PrototypeData::Batch { points, sat_normals }) => {
                self.intersects_batch(&pp.boundary, b, points, sat_normals)
            }
            (Primitive::Solid(s), PrototypeData::Solid) => self.intersects_solid(&pp.boundary, s),
            _ => unreachable!("prototype data out of sync with its primitive"),
        }
    }

    /// The overlap test run with `skip` dropped, for simplices flat on that
    /// axis. Solids are never flat.
    pub fn intersects_flat(&self, pp: &PrimitivePrototype, skip: usize) -> bool {
        match &pp.data {
            PrototypeData::Simplex { points, sat_normals } => {
                self.intersects_simplex_flat(&pp.boundary, points, sat_normals, skip)
            }
            PrototypeData::Batch { points, sat_normals } => {
                self.intersects_batch_flat(&pp.boundary, points, sat_normals, skip)
            }
            PrototypeData::Solid => unreachable!("solids have no flat axis"),
        }
    }

    /// Distance along `target` to this box's surface, or `None` when the ray
    /// misses entirely. A ray starting inside reports 0.
    pub fn surface_distance(&self, target: &Ray) -> Option<f32> {
        let dim = self.dimension();
        'axes: for i in 0..dim {
            if target.direction[i] != 0.0 {
                let o = if target.direction[i] > 0.0 { self.start[i] } else { self.end[i] };
                let mut dist = (o - target.origin[i]) / target.direction[i];
                let mut skip = Some(i);
                if dist < 0.0 {
                    dist = 0.0;
                    skip = None;
                }

                for j in 0..dim {
                    if skip != Some(j) {
                        let o = target.direction[j] * dist + target.origin[j];
                        if o >= self.end[j] || o <= self.start[j] {
                            continue 'axes;
                        }
                    }
                }
                return Some(dist);
            }
        }
        None
    }
}

// ─── Prototypes ─────────────────────────────────────────────────────────────

/// SAT payload carried alongside a primitive during the k-d build.
#[derive(Debug, Clone)]
pub enum PrototypeData {
    Solid,
    /// The simplex's n vertices and n SAT axes; axis 0 is the negated sum of
    /// the simplex's edge normals, axis i is edge normal i−1.
    Simplex { points: Box<[Vector]>, sat_normals: Box<[Vector]> },
    Batch { points: Box<[LaneVector]>, sat_normals: Box<[LaneVector]> },
}

/// Build-time wrapper pairing a primitive with its AABB and SAT data.
#[derive(Debug, Clone)]
pub struct PrimitivePrototype {
    pub boundary: Aabb,
    pub primitive: Arc<Primitive>,
    pub data: PrototypeData,
}

impl PrimitivePrototype {
    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.boundary.dimension()
    }

    pub fn is_simplex(&self) -> bool {
        matches!(self.data, PrototypeData::Simplex { .. })
    }

    /// A simplex prototype from its vertices.
    pub fn simplex(points: &[Vector], material: Arc<Material>) -> Result<Self> {
        let simplex = Simplex::from_points(points, material)?;
        let dim = simplex.dimension();

        let mut start = points[0].clone();
        let mut end = points[0].clone();
        for p in &points[1..] {
            start = start.min_with(p);
            end = end.max_with(p);
        }

        let mut first = Vector::zeros(dim);
        for en in simplex.edge_normals.iter() {
            first -= en;
        }
        let mut sat_normals = Vec::with_capacity(dim);
        sat_normals.push(first);
        sat_normals.extend(simplex.edge_normals.iter().cloned());

        Ok(PrimitivePrototype {
            boundary: Aabb::new(start, end),
            primitive: Arc::new(Primitive::Simplex(simplex)),
            data: PrototypeData::Simplex {
                points: points.to_vec().into_boxed_slice(),
                sat_normals: sat_normals.into_boxed_slice(),
            },
        })
    }

    /// A solid prototype; the AABB is the tight envelope of the oriented
    /// shape around its world-space centre.
    pub fn solid(kind: SolidKind, orientation: Matrix, position: Vector, material: Arc<Material>) -> Result<Self> {
        let solid = Solid::new(kind, orientation, position, material)?;
        let dim = solid.dimension();
        let center = solid.world_position();

        let mut half = Vector::zeros(dim);
        match kind {
            SolidKind::Cube => {
                for i in 0..dim {
                    half += &solid.cube_component(i).apply(f32::abs);
                }
            }
            SolidKind::Sphere => {
                for k in 0..dim {
                    half[k] = Vector::from_slice(solid.orientation.row(k)).absolute();
                }
            }
        }

        Ok(PrimitivePrototype {
            boundary: Aabb::new(&center - &half, &center + &half),
            primitive: Arc::new(Primitive::Solid(solid)),
            data: PrototypeData::Solid,
        })
    }

    /// Fuses [`LANES`] simplex prototypes into one batch prototype. The
    /// boundary is the member union, built from the same extents the grouping
    /// metric measured.
    pub fn batch(members: &[&PrimitivePrototype]) -> Self {
        assert_eq!(members.len(), LANES);
        let dim = members[0].dimension();

        let simplices: Vec<&Simplex> = members
            .iter()
            .map(|m| m.primitive.as_simplex().expect("batching a non-simplex prototype"))
            .collect();
        let batch = SimplexBatch::from_simplices(&simplices);

        let mut boundary = members[0].boundary.clone();
        for m in &members[1..] {
            boundary = boundary.union(&m.boundary);
        }

        let member_data: Vec<(&[Vector], &[Vector])> = members
            .iter()
            .map(|m| match &m.data {
                PrototypeData::Simplex { points, sat_normals } => (&points[..], &sat_normals[..]),
                _ => unreachable!(),
            })
            .collect();

        let points: Box<[LaneVector]> = (0..dim)
            .map(|i| {
                let vs: Vec<&Vector> = member_data.iter().map(|(p, _)| &p[i]).collect();
                LaneVector::from_lanes(&vs)
            })
            .collect();
        let sat_normals: Box<[LaneVector]> = (0..dim)
            .map(|i| {
                let vs: Vec<&Vector> = member_data.iter().map(|(_, s)| &s[i]).collect();
                LaneVector::from_lanes(&vs)
            })
            .collect();

        PrimitivePrototype {
            boundary,
            primitive: Arc::new(Primitive::Batch(batch)),
            data: PrototypeData::Batch { points, sat_normals },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Color, Matrix};

    fn unit_box() -> Aabb {
        Aabb::new(Vector::zeros(3), Vector::filled(3, 1.0))
    }

    fn tri(points: [[f32; 3]; 3]) -> PrimitivePrototype {
        let pts: Vec<Vector> = points.iter().map(|p| Vector::from_slice(p)).collect();
        PrimitivePrototype::simplex(&pts, Material::solid_color(Color::white())).unwrap()
    }

    #[test]
    fn simplex_inside_intersects() {
        let pp = tri([[0.2, 0.2, 0.5], [0.8, 0.2, 0.5], [0.2, 0.8, 0.4]]);
        assert!(unit_box().intersects(&pp));
    }

    #[test]
    fn simplex_outside_misses() {
        let pp = tri([[2.2, 0.2, 0.5], [2.8, 0.2, 0.5], [2.2, 0.8, 0.4]]);
        assert!(!unit_box().intersects(&pp));
    }

    #[test]
    fn simplex_sharing_a_face_misses() {
        // the triangle lives in the plane x = 1, a zero-volume contact
        let pp = tri([[1.0, 0.2, 0.2], [1.0, 0.8, 0.2], [1.0, 0.2, 0.8]]);
        assert!(!unit_box().intersects(&pp));
    }

    #[test]
    fn simplex_crossing_a_corner() {
        let pp = tri([[-0.5, 0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5]]);
        assert!(unit_box().intersects(&pp));
    }

    #[test]
    fn simplex_near_but_diagonal_misses() {
        // AABBs overlap, yet the diagonal plane separates; the slab test
        // alone would pass
        let pp = tri([[1.2, -0.2, 0.5], [-0.2, 1.2, 0.5], [1.2, 1.2, 0.5]]);
        let thin = Aabb::new(Vector::zeros(3), Vector::from_slice(&[0.4, 0.4, 1.0]));
        assert!(!thin.intersects(&pp));
    }

    #[test]
    fn flat_simplex_resolves_by_side() {
        // triangle embedded in the z = 0.5 plane, flat on axis 2
        let pp = tri([[0.2, 0.2, 0.5], [0.8, 0.2, 0.5], [0.2, 0.8, 0.5]]);
        let below = Aabb::new(Vector::zeros(3), Vector::from_slice(&[1.0, 1.0, 0.5]));
        let above = Aabb::new(Vector::from_slice(&[0.0, 0.0, 0.5]), Vector::filled(3, 1.0));
        assert!(below.intersects_flat(&pp, 2));
        assert!(above.intersects_flat(&pp, 2));
        let beside = Aabb::new(Vector::from_slice(&[2.0, 0.0, 0.0]), Vector::from_slice(&[3.0, 1.0, 0.5]));
        assert!(!beside.intersects_flat(&pp, 2));
    }

    #[test]
    fn batch_prototype_matches_members() {
        let members: Vec<PrimitivePrototype> = (0..LANES)
            .map(|i| {
                let o = i as f32 * 0.1;
                tri([[0.2 + o, 0.2, 0.3], [0.6 + o, 0.2, 0.3], [0.2 + o, 0.6, 0.4]])
            })
            .collect();
        let refs: Vec<&PrimitivePrototype> = members.iter().collect();
        let batch = PrimitivePrototype::batch(&refs);

        // union AABB
        let mut expect = members[0].boundary.clone();
        for m in &members[1..] {
            expect = expect.union(&m.boundary);
        }
        assert_eq!(batch.boundary, expect);

        // the batch intersects wherever any member does
        let probe = Aabb::new(Vector::from_slice(&[0.5, 0.1, 0.25]), Vector::from_slice(&[0.9, 0.9, 0.5]));
        let any_member = members.iter().any(|m| probe.intersects(m));
        assert_eq!(probe.intersects(&batch), any_member);
    }

    #[test]
    fn solid_cube_rotated_overlap() {
        let m = Material::solid_color(Color::white());
        let rot = Matrix::rotation(&Vector::axis(3, 0, 1.0), &Vector::axis(3, 1, 1.0), 0.6);
        let pp = PrimitivePrototype::solid(SolidKind::Cube, rot, Vector::zeros(3), m).unwrap();
        assert!(unit_box().intersects(&pp));
        let far = Aabb::new(Vector::filled(3, 5.0), Vector::filled(3, 6.0));
        assert!(!far.intersects(&pp));
    }

    #[test]
    fn solid_sphere_corner_cases() {
        let m = Material::solid_color(Color::white());
        let pp = PrimitivePrototype::solid(SolidKind::Sphere, Matrix::identity(3), Vector::zeros(3), m).unwrap();
        // a box whose corner pokes into the unit sphere
        let poke = Aabb::new(Vector::filled(3, 0.5), Vector::filled(3, 2.0));
        assert!(poke.intersects(&pp));
        // a box whose nearest corner stays outside (corner distance √3·0.9 > 1)
        let out = Aabb::new(Vector::filled(3, 0.9), Vector::filled(3, 2.0));
        assert!(!out.intersects(&pp));
    }

    #[test]
    fn solid_prototype_envelope() {
        let m = Material::solid_color(Color::white());
        let pp = PrimitivePrototype::solid(
            SolidKind::Sphere,
            Matrix::scale(3, 2.0),
            Vector::axis(3, 1, 1.0),
            m,
        )
        .unwrap();
        // centre = orientation·position = (0,2,0); radius 2 per axis
        assert_eq!(pp.boundary.start, Vector::from_slice(&[-2.0, 0.0, -2.0]));
        assert_eq!(pp.boundary.end, Vector::from_slice(&[2.0, 4.0, 2.0]));
    }

    #[test]
    fn split_halves() {
        let b = unit_box();
        let l = b.left(0, 0.25).unwrap();
        let r = b.right(0, 0.25).unwrap();
        assert_eq!(l.end[0], 0.25);
        assert_eq!(r.start[0], 0.25);
        assert_eq!(l.start, b.start);
        assert_eq!(r.end, b.end);
        assert_eq!(b.left(0, 1.5).unwrap_err(), Error::SplitOutOfRange);
        assert_eq!(b.left(7, 0.5).unwrap_err(), Error::InvalidAxis { axis: 7, dimension: 3 });
    }

    #[test]
    fn surface_distance_cases() {
        let b = unit_box();
        let outside = Ray::new(Vector::from_slice(&[-1.0, 0.5, 0.5]), Vector::axis(3, 0, 1.0));
        assert_eq!(b.surface_distance(&outside), Some(1.0));
        let inside = Ray::new(Vector::filled(3, 0.5), Vector::axis(3, 0, 1.0));
        assert_eq!(b.surface_distance(&inside), Some(0.0));
        let miss = Ray::new(Vector::from_slice(&[-1.0, 5.0, 0.5]), Vector::axis(3, 0, 1.0));
        assert_eq!(b.surface_distance(&miss), None);
    }
}

//! Scene primitives and their ray-intersection kernels.
//!
//! Every kernel follows the same contract: it returns a strictly positive hit
//! distance no greater than `cutoff`, or 0 for a miss, and on a hit it fills
//! the output ray with the world-space hit point (`origin`) and the unit
//! outward surface normal (`direction`), oriented toward the incoming ray.
//! The kernels never allocate and never fail.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::math::{cross_into, Color, LaneVector, Matrix, Ray, Vector};
use crate::simd::{VReal, LANES};

/// Slack applied to inclusion tests so hits on face and edge boundaries
/// survive float rounding.
pub const ROUNDING_FUZZ: f32 = f32::EPSILON * 10.0;

pub const DEFAULT_SPECULAR_EXP: f32 = 8.0;

// ─── Material ───────────────────────────────────────────────────────────────

/// Surface description shared by primitives. A primitive is opaque when
/// `opacity >= 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Color,
    pub specular: Color,
    pub opacity: f32,
    pub reflectivity: f32,
    pub specular_intensity: f32,
    pub specular_exp: f32,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            color: Color::white(),
            specular: Color::white(),
            opacity: 1.0,
            reflectivity: 0.0,
            specular_intensity: 1.0,
            specular_exp: DEFAULT_SPECULAR_EXP,
        }
    }
}

impl Material {
    pub fn solid_color(color: Color) -> Arc<Self> {
        Arc::new(Material { color, ..Material::default() })
    }

    #[inline(always)]
    pub fn opaque(&self) -> bool {
        self.opacity >= 1.0
    }
}

// ─── Unit-shape kernels ─────────────────────────────────────────────────────

/// Intersection with the axis-aligned hypercube spanning [−1, 1]ⁿ.
///
/// Walks the axes with non-zero direction, computes the entry distance of the
/// facing slab, and accepts when every other coordinate at that distance is
/// inside the cube (with fuzz). The normal is the ±axis of the face hit.
pub fn hypercube_intersects(target: &Ray, normal: &mut Ray, cutoff: f32) -> f32 {
    debug_assert_eq!(target.dimension(), normal.dimension());
    let dim = target.dimension();

    'axes: for i in 0..dim {
        if target.direction[i] != 0.0 {
            let face = if target.direction[i] < 0.0 { 1.0 } else { -1.0 };
            normal.origin[i] = face;
            let dist = (face - target.origin[i]) / target.direction[i];
            if dist > 0.0 {
                for j in 0..dim {
                    if i != j {
                        let c = target.direction[j] * dist + target.origin[j];
                        normal.origin[j] = c;
                        if c.abs() > 1.0 + ROUNDING_FUZZ {
                            continue 'axes;
                        }
                    }
                }
                if dist >= cutoff {
                    return 0.0;
                }
                normal.direction = Vector::axis(dim, i, face);
                return dist;
            }
        }
    }

    0.0
}

/// Intersection with the unit hypersphere centered at the origin. The nearer
/// positive quadratic root wins; the hit point doubles as the normal.
pub fn hypersphere_intersects(target: &Ray, normal: &mut Ray, cutoff: f32) -> f32 {
    let a = target.direction.square();
    let b = 2.0 * target.direction.dot(&target.origin);
    let c = target.origin.square() - 1.0;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return 0.0;
    }

    let dist = (-b - discriminant.sqrt()) / (2.0 * a);
    if dist <= 0.0 || dist >= cutoff {
        return 0.0;
    }

    normal.origin = target.at(dist);
    normal.direction = normal.origin.clone();
    dist
}

// ─── Solid ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidKind {
    Cube,
    Sphere,
}

/// A unit cube or sphere under an affine placement. A world-space ray enters
/// local coordinates as `inv_orientation·p − position`, so the world-space
/// centre of the shape is `orientation · position`.
#[derive(Debug, Clone)]
pub struct Solid {
    pub kind: SolidKind,
    pub orientation: Matrix,
    pub inv_orientation: Matrix,
    pub position: Vector,
    pub material: Arc<Material>,
}

impl Solid {
    pub fn new(kind: SolidKind, orientation: Matrix, position: Vector, material: Arc<Material>) -> Result<Self> {
        if orientation.dimension() != position.dimension() {
            return Err(Error::DimensionMismatch {
                expected: position.dimension(),
                actual: orientation.dimension(),
            });
        }
        let inv_orientation = orientation.inverse()?;
        Ok(Solid { kind, orientation, inv_orientation, position, material })
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.position.dimension()
    }

    /// Row `axis` of the inverse orientation: the world-space normal of the
    /// local face pair along `axis`.
    pub fn cube_normal(&self, axis: usize) -> Vector {
        self.inv_orientation.row_vector(axis)
    }

    /// Column `axis` of the orientation: the world-space edge vector of the
    /// local axis.
    pub fn cube_component(&self, axis: usize) -> Vector {
        self.orientation.column(axis)
    }

    pub fn world_position(&self) -> Vector {
        &self.orientation * &self.position
    }

    pub fn intersects(&self, target: &Ray, normal: &mut Ray, cutoff: f32) -> f32 {
        let transformed = Ray {
            origin: &(&self.inv_orientation * &target.origin) - &self.position,
            direction: &self.inv_orientation * &target.direction,
        };

        let dist = match self.kind {
            SolidKind::Cube => hypercube_intersects(&transformed, normal, cutoff),
            SolidKind::Sphere => hypersphere_intersects(&transformed, normal, cutoff),
        };
        if dist == 0.0 {
            return 0.0;
        }

        normal.origin = &self.orientation * &(&normal.origin + &self.position);
        normal.direction = &self.orientation * &normal.direction;
        dist
    }
}

// ─── Simplex ────────────────────────────────────────────────────────────────

/// An (n−1)-simplex embedded in n-space: a triangle in 3-D, a tetrahedron in
/// 4-D. Stored as a supporting hyperplane (`face_normal`, `d`) plus n−1 edge
/// normals that read off barycentric coordinates; the n-th coordinate is
/// implicit as one minus the rest.
#[derive(Debug, Clone)]
pub struct Simplex {
    pub face_normal: Vector,
    pub p1: Vector,
    pub d: f32,
    pub edge_normals: Box<[Vector]>,
    pub material: Arc<Material>,
}

impl Simplex {
    pub fn new(p1: Vector, face_normal: Vector, edge_normals: Box<[Vector]>, material: Arc<Material>) -> Self {
        let dim = p1.dimension();
        assert_eq!(face_normal.dimension(), dim);
        assert_eq!(edge_normals.len(), dim - 1);
        let d = -face_normal.dot(&p1);
        Simplex { face_normal, p1, d, edge_normals, material }
    }

    /// Builds a simplex from its n vertices. The face normal is the
    /// generalized cross product of the edges from `points[0]`; edge normal i
    /// comes from the same cross product with side i swapped for the face
    /// normal, scaled so the barycentric coordinates hit 1 at the vertices.
    pub fn from_points(points: &[Vector], material: Arc<Material>) -> Result<Self> {
        let dim = points[0].dimension();
        if points.len() != dim {
            return Err(Error::WrongPointCount { dimension: dim, got: points.len() });
        }

        let mut sides: Vec<Vector> = (1..dim).map(|i| &points[i] - &points[0]).collect();
        let mut tmp = Matrix::zeros(dim - 1);
        let mut face_normal = Vector::zeros(dim);
        cross_into(&mut face_normal, &mut tmp, &sides);
        let square = face_normal.square();
        if square == 0.0 {
            return Err(Error::DegenerateSimplex);
        }

        let mut edge_normals = Vec::with_capacity(dim - 1);
        for i in 0..dim - 1 {
            let old = std::mem::replace(&mut sides[i], face_normal.clone());
            let mut en = Vector::zeros(dim);
            cross_into(&mut en, &mut tmp, &sides);
            sides[i] = old;
            en /= square;
            edge_normals.push(en);
        }

        Ok(Simplex::new(points[0].clone(), face_normal, edge_normals.into_boxed_slice(), material))
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.p1.dimension()
    }

    pub fn intersects(&self, target: &Ray, normal: &mut Ray, cutoff: f32) -> f32 {
        let denom = self.face_normal.dot(&target.direction);
        if denom == 0.0 {
            return 0.0;
        }

        let t = -(self.face_normal.dot(&target.origin) + self.d) / denom;
        if t <= 0.0 || t >= cutoff {
            return 0.0;
        }

        let p = target.at(t);
        let pside = &self.p1 - &p;

        let mut tot_area = 0.0;
        for en in self.edge_normals.iter() {
            let area = en.dot(&pside);
            if !(-ROUNDING_FUZZ..=1.0 + ROUNDING_FUZZ).contains(&area) {
                return 0.0;
            }
            tot_area += area;
        }

        if tot_area <= 1.0 + ROUNDING_FUZZ {
            normal.origin = p;
            normal.direction = self.face_normal.unit();
            if denom > 0.0 {
                normal.direction = -&normal.direction;
            }
            return t;
        }
        0.0
    }
}

// ─── Simplex batch ──────────────────────────────────────────────────────────

/// [`LANES`] simplices tested against a ray at once. Fields mirror
/// [`Simplex`] with every scalar widened to a lane pack; the materials stay
/// per-lane.
#[derive(Debug, Clone)]
pub struct SimplexBatch {
    pub d: VReal,
    pub p1: LaneVector,
    pub face_normal: LaneVector,
    pub edge_normals: Box<[LaneVector]>,
    pub materials: [Arc<Material>; LANES],
}

impl SimplexBatch {
    pub fn from_simplices(members: &[&Simplex]) -> Self {
        assert_eq!(members.len(), LANES);
        let dim = members[0].dimension();
        for s in members {
            assert_eq!(s.dimension(), dim);
        }

        let p1s: Vec<&Vector> = members.iter().map(|s| &s.p1).collect();
        let fns: Vec<&Vector> = members.iter().map(|s| &s.face_normal).collect();
        let p1 = LaneVector::from_lanes(&p1s);
        let face_normal = LaneVector::from_lanes(&fns);
        let d = {
            let mut lanes = [0.0f32; LANES];
            for (l, s) in members.iter().enumerate() {
                lanes[l] = s.d;
            }
            crate::simd::Lanes(lanes)
        };
        let edge_normals = (0..dim - 1)
            .map(|i| {
                let ens: Vec<&Vector> = members.iter().map(|s| &s.edge_normals[i]).collect();
                LaneVector::from_lanes(&ens)
            })
            .collect();
        let materials = std::array::from_fn(|l| members[l].material.clone());

        SimplexBatch { d, p1, face_normal, edge_normals, materials }
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.p1.dimension()
    }

    #[inline(always)]
    pub fn opaque(&self, lane: usize) -> bool {
        self.materials[lane].opaque()
    }

    /// Tests all lanes at once and returns the nearest passing lane below
    /// `cutoff`, excluding `skip` (the lane the ray originated from, or −1).
    pub fn intersects(&self, target: &Ray, normal: &mut Ray, skip: i32, cutoff: f32) -> Option<(f32, usize)> {
        let zeros = VReal::zeros();

        let origin = LaneVector::broadcast(&target.origin);
        let direction = LaneVector::broadcast(&target.direction);

        let denom = self.face_normal.dot(&direction);
        let mut mask = denom.ne_lanes(zeros);

        let t = -(self.face_normal.dot(&origin) + self.d) / denom;
        mask = mask.and(t.ge(zeros));

        let p = &origin + &(&direction * t);
        let pside = &self.p1 - &p;

        let a_min = VReal::repeat(-ROUNDING_FUZZ);
        let a_max = VReal::repeat(1.0 + ROUNDING_FUZZ);
        let mut tot_area = zeros;
        for en in self.edge_normals.iter() {
            let area = en.dot(&pside);
            mask = mask.and(area.ge(a_min)).and(area.le(a_max));
            tot_area += area;
        }
        mask = mask.and(tot_area.le(a_max));

        let t = VReal::zfilter(mask, t);

        let mut min_t = cutoff;
        let mut r_index: i32 = -1;
        for i in 0..LANES as i32 {
            let ti = t[i as usize];
            if i != skip && ti != 0.0 && ti < min_t {
                min_t = ti;
                r_index = i;
            }
        }
        if r_index < 0 {
            return None;
        }

        let lane = r_index as usize;
        normal.origin = p.extract_lane(lane);
        normal.direction = self.face_normal.extract_lane(lane).unit();
        if denom[lane] > 0.0 {
            normal.direction = -&normal.direction;
        }
        Some((min_t, lane))
    }
}

// ─── Primitive sum type ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Primitive {
    Solid(Solid),
    Simplex(Simplex),
    Batch(SimplexBatch),
}

impl Primitive {
    pub fn dimension(&self) -> usize {
        match self {
            Primitive::Solid(s) => s.dimension(),
            Primitive::Simplex(s) => s.dimension(),
            Primitive::Batch(b) => b.dimension(),
        }
    }

    #[inline(always)]
    pub fn is_batch(&self) -> bool {
        matches!(self, Primitive::Batch(_))
    }

    pub fn as_simplex(&self) -> Option<&Simplex> {
        match self {
            Primitive::Simplex(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_batch(&self) -> Option<&SimplexBatch> {
        match self {
            Primitive::Batch(b) => Some(b),
            _ => None,
        }
    }

    /// The material of a scalar primitive, or of one lane of a batch.
    pub fn material(&self, lane: i32) -> &Arc<Material> {
        match self {
            Primitive::Solid(s) => &s.material,
            Primitive::Simplex(s) => &s.material,
            Primitive::Batch(b) => &b.materials[lane as usize],
        }
    }

    pub fn opaque(&self, lane: i32) -> bool {
        self.material(lane).opaque()
    }

    /// Scalar dispatch; batches go through [`SimplexBatch::intersects`].
    pub fn intersects(&self, target: &Ray, normal: &mut Ray, cutoff: f32) -> f32 {
        match self {
            Primitive::Solid(s) => s.intersects(target, normal, cutoff),
            Primitive::Simplex(s) => s.intersects(target, normal, cutoff),
            Primitive::Batch(_) => unreachable!("batched primitives take a lane index"),
        }
    }
}

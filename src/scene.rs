//! The composite scene: a k-d tree of primitives, lights, a camera, and the
//! recursive shader that turns a primary ray into a color.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::aabb::{Aabb, PrimitivePrototype};
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::kdtree::{
    build_kdtree, intersect_tree, occludes_tree, sort_and_dedup_hits, KdNode, KdTreeParams,
    TargetRef,
};
use crate::math::{Color, Ray, Vector};
use crate::primitives::Material;

/// Occlusion tests are expensive; point lights whose contribution would fall
/// below this are not shadow-tested and contribute nothing.
pub const LIGHT_THRESHOLD: f32 = 1.0 / 512.0;

/// A light radiating from a point, attenuated by `1/dist^(n−1)`, the
/// n-dimensional inverse-power falloff.
#[derive(Debug, Clone)]
pub struct PointLight {
    pub position: Vector,
    pub color: Color,
}

impl PointLight {
    #[inline]
    fn strength(&self, distance: f32) -> f32 {
        1.0 / distance.powi(self.position.dimension() as i32 - 1)
    }
}

/// A directional light: parallel rays travelling along `direction`.
#[derive(Debug, Clone)]
pub struct GlobalLight {
    pub direction: Vector,
    pub color: Color,
}

/// Maps pixel coordinates to primary-ray directions on the view plane
/// spanned by the camera's first two axes.
#[derive(Debug, Clone, Copy, Default)]
struct FlatOriginRaySource {
    half_w: f32,
    half_h: f32,
    fov_i: f32,
}

impl FlatOriginRaySource {
    fn set_params(&mut self, w: usize, h: usize, fov: f32) {
        self.half_w = w as f32 / 2.0;
        self.half_h = h as f32 / 2.0;
        self.fov_i = (fov / 2.0).tan() / self.half_w;
    }

    fn direction(&self, cam: &Camera, x: f32, y: f32) -> Vector {
        let rx = self.fov_i * (x - self.half_w);
        let uy = self.fov_i * (y - self.half_h);
        let right = cam.right();
        let up = cam.up();
        let forward = cam.forward();
        Vector::from_fn(cam.dimension(), |i| forward[i] + right[i] * rx - up[i] * uy).unit()
    }
}

const DEFAULT_BG_GRADIENT_AXIS: usize = 1;

/// A renderable scene. Immutable once locked by a renderer; every mutator
/// fails while a render holds the lock.
#[derive(Debug)]
pub struct CompositeScene {
    locked: AtomicU32,
    shadows: bool,
    camera_light: bool,
    fov: f32,
    max_reflect_depth: i32,
    bg_gradient_axis: usize,
    ambient: Color,
    bg1: Color,
    bg2: Color,
    bg3: Color,
    cam: Camera,
    ray_source: FlatOriginRaySource,
    boundary: Aabb,
    root: Option<Box<KdNode>>,
    point_lights: Vec<PointLight>,
    global_lights: Vec<GlobalLight>,
}

impl CompositeScene {
    pub fn new(boundary: Aabb, root: Option<Box<KdNode>>) -> Result<Self> {
        let cam = Camera::new(boundary.dimension())?;
        Ok(CompositeScene {
            locked: AtomicU32::new(0),
            shadows: false,
            camera_light: true,
            fov: 0.8,
            max_reflect_depth: 4,
            bg_gradient_axis: DEFAULT_BG_GRADIENT_AXIS,
            ambient: Color::black(),
            bg1: Color::white(),
            bg2: Color::black(),
            bg3: Color::new(0.0, 1.0, 1.0),
            cam,
            ray_source: FlatOriginRaySource::default(),
            boundary,
            root,
            point_lights: Vec::new(),
            global_lights: Vec::new(),
        })
    }

    /// Builds the k-d tree over `prototypes` with per-dimension default
    /// parameters and wraps it in a scene.
    pub fn build(prototypes: Vec<PrimitivePrototype>) -> Result<Self> {
        let dim = prototypes
            .first()
            .map(|p| p.dimension())
            .ok_or(Error::BadDimension(0))?;
        let (boundary, root) = build_kdtree(prototypes, &KdTreeParams::new(dim));
        Self::new(boundary, root)
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.cam.dimension()
    }

    // ── lock ──

    /// Current lock count; non-zero while a render is in flight.
    pub fn locked(&self) -> u32 {
        self.locked.load(Ordering::Acquire)
    }

    pub fn lock(&self) {
        self.locked.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unlock(&self) {
        let prev = self.locked.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "scene unlocked more times than locked");
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked() > 0 {
            Err(Error::SceneLocked)
        } else {
            Ok(())
        }
    }

    // ── accessors and checked mutators ──

    pub fn camera(&self) -> &Camera {
        &self.cam
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn max_reflect_depth(&self) -> i32 {
        self.max_reflect_depth
    }

    pub fn shadows(&self) -> bool {
        self.shadows
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn global_lights(&self) -> &[GlobalLight] {
        &self.global_lights
    }

    pub fn boundary(&self) -> &Aabb {
        &self.boundary
    }

    pub fn root(&self) -> Option<&KdNode> {
        self.root.as_deref()
    }

    pub fn set_camera(&mut self, cam: Camera) -> Result<()> {
        self.ensure_unlocked()?;
        if cam.dimension() != self.dimension() {
            return Err(Error::DimensionMismatch { expected: self.dimension(), actual: cam.dimension() });
        }
        self.cam = cam;
        Ok(())
    }

    /// Sets the field of view. Takes effect at the next `set_view_size`.
    pub fn set_fov(&mut self, fov: f32) -> Result<()> {
        self.ensure_unlocked()?;
        self.fov = fov;
        Ok(())
    }

    pub fn set_max_reflect_depth(&mut self, depth: i32) -> Result<()> {
        self.ensure_unlocked()?;
        self.max_reflect_depth = depth;
        Ok(())
    }

    pub fn set_shadows(&mut self, shadows: bool) -> Result<()> {
        self.ensure_unlocked()?;
        self.shadows = shadows;
        Ok(())
    }

    pub fn set_camera_light(&mut self, camera_light: bool) -> Result<()> {
        self.ensure_unlocked()?;
        self.camera_light = camera_light;
        Ok(())
    }

    pub fn set_ambient(&mut self, ambient: Color) -> Result<()> {
        self.ensure_unlocked()?;
        self.ambient = ambient;
        Ok(())
    }

    /// `bg1` fills the positive gradient direction, `bg3` the negative, and
    /// `bg2` the horizon between them.
    pub fn set_background(&mut self, bg1: Color, bg2: Color, bg3: Color) -> Result<()> {
        self.ensure_unlocked()?;
        self.bg1 = bg1;
        self.bg2 = bg2;
        self.bg3 = bg3;
        Ok(())
    }

    pub fn set_bg_gradient_axis(&mut self, axis: usize) -> Result<()> {
        self.ensure_unlocked()?;
        if axis >= self.dimension() {
            return Err(Error::InvalidAxis { axis, dimension: self.dimension() });
        }
        self.bg_gradient_axis = axis;
        Ok(())
    }

    pub fn add_point_light(&mut self, light: PointLight) -> Result<()> {
        self.ensure_unlocked()?;
        if light.position.dimension() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: light.position.dimension(),
            });
        }
        self.point_lights.push(light);
        Ok(())
    }

    pub fn add_global_light(&mut self, light: GlobalLight) -> Result<()> {
        self.ensure_unlocked()?;
        if light.direction.dimension() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: light.direction.dimension(),
            });
        }
        self.global_lights.push(light);
        Ok(())
    }

    /// Fixes the pixel-to-ray mapping for a `w`×`h` image at the current
    /// field of view. Must be called before `calculate_color`.
    pub fn set_view_size(&mut self, w: usize, h: usize) -> Result<()> {
        self.ensure_unlocked()?;
        self.ray_source.set_params(w, h, self.fov);
        Ok(())
    }

    // ── shading ──

    /// True when the light along `target` (unit direction, at `ldistance`)
    /// reaches the ray origin. Transparent occluders attenuate `filtered`.
    fn light_reaches(&self, target: Ray, ldistance: f32, skip: TargetRef<'_>, filtered: &mut Color) -> bool {
        let mut transparent_hits = Vec::with_capacity(10);
        if occludes_tree(
            self.root.as_deref(),
            &target,
            ldistance,
            Some(skip),
            &mut transparent_hits,
            0.0,
            f32::MAX,
        ) {
            return false;
        }

        if !transparent_hits.is_empty() {
            sort_and_dedup_hits(&mut transparent_hits);
            for hit in transparent_hits.iter().rev() {
                debug_assert!(!hit.target.material().opaque());
                *filtered *= 1.0 - hit.target.material().opacity;
            }
        }

        true
    }

    fn base_color(&self, target: &Ray, normal: &Ray, source: TargetRef<'_>, depth: i32) -> Color {
        let m = source.material();

        let mut light = Color::black();
        let mut specular = Color::black();
        let mut spec_a = 0.0f32;

        for pl in &self.point_lights {
            let mut lv = &pl.position - &normal.origin;
            let dist = lv.absolute();
            lv /= dist;

            let sine = normal.direction.dot(&lv);
            if sine > 0.0 {
                let strength = pl.strength(dist);
                if self.shadows {
                    if pl.color.max_channel() * strength * sine > LIGHT_THRESHOLD {
                        let mut filtered = pl.color;
                        if self.light_reaches(
                            Ray::new(normal.origin.clone(), lv.clone()),
                            dist,
                            source,
                            &mut filtered,
                        ) {
                            filtered *= strength;
                            light += filtered * sine;
                            if m.specular_intensity != 0.0 {
                                append_specular(&mut specular, &mut spec_a, m, filtered, &target.direction, &normal.direction, &lv);
                            }
                        }
                    }
                } else {
                    light += pl.color * (strength * sine);
                }
            }
        }

        for gl in &self.global_lights {
            let sine = -normal.direction.dot(&gl.direction);
            if sine > 0.0 {
                if self.shadows {
                    let mut filtered = gl.color;
                    let to_light = -&gl.direction;
                    if self.light_reaches(
                        Ray::new(normal.origin.clone(), to_light.clone()),
                        f32::MAX,
                        source,
                        &mut filtered,
                    ) {
                        light += filtered * sine;
                        if m.specular_intensity != 0.0 {
                            append_specular(&mut specular, &mut spec_a, m, filtered, &target.direction, &normal.direction, &to_light);
                        }
                    }
                } else {
                    light += gl.color * sine;
                }
            }
        }

        let sine = -target.direction.dot(&normal.direction);
        if self.camera_light && sine > 0.0 {
            // white headlight at the camera
            light += Color::new(sine, sine, sine);
            if m.specular_intensity != 0.0 {
                let base = sine.powf(m.specular_exp) * m.specular_intensity;
                specular += m.specular * (base * (1.0 - spec_a));
                spec_a += base * (1.0 - spec_a);
                specular *= spec_a;
            }
        }

        let mut r = self.ambient + m.color * light;

        if m.reflectivity != 0.0 && depth < self.max_reflect_depth {
            let reflected = Ray::new(
                normal.origin.clone(),
                &target.direction - &(&normal.direction * (-2.0 * sine)),
            );
            r = m.color * self.ray_color(&reflected, depth + 1, Some(source)) * m.reflectivity
                + r * (1.0 - m.reflectivity);
        }

        specular + r * (1.0 - spec_a)
    }

    /// Shades one ray: nearest opaque hit or the background gradient, then
    /// back-to-front composition of the transparent hits in front of it.
    fn ray_color(&self, target: &Ray, depth: i32, source: Option<TargetRef<'_>>) -> Color {
        let mut transparent_hits = Vec::with_capacity(10);

        let entry = self.boundary.surface_distance(target);
        let hit = entry.and_then(|d| {
            intersect_tree(self.root.as_deref(), target, source, &mut transparent_hits, d, f32::MAX)
        });

        let mut r = match &hit {
            Some(h) => self.base_color(target, &h.normal, h.target, depth),
            None => {
                let intensity = target.direction[self.bg_gradient_axis];
                if intensity >= 0.0 {
                    self.bg1 * intensity + self.bg2 * (1.0 - intensity)
                } else {
                    self.bg3 * -intensity + self.bg2 * (1.0 + intensity)
                }
            }
        };

        if !transparent_hits.is_empty() {
            sort_and_dedup_hits(&mut transparent_hits);
            for h in transparent_hits.iter().rev() {
                let opacity = h.target.material().opacity;
                debug_assert!(opacity < 1.0);
                let base = self.base_color(target, &h.normal, h.target, depth);
                r = base * opacity + r * (1.0 - opacity);
            }
        }

        r
    }

    /// The color of pixel `(x, y)` under the view set by `set_view_size`.
    /// Thread-safe: takes `&self` and touches no mutable state.
    pub fn calculate_color(&self, x: f32, y: f32) -> Color {
        let direction = self.ray_source.direction(&self.cam, x, y);
        self.ray_color(&Ray::new(self.cam.origin.clone(), direction), 0, None)
    }
}

/// Blinn-Phong specular accumulation: `to_light` and the view direction give
/// the half-vector; repeated calls blend highlight layers front to back.
fn append_specular(
    c: &mut Color,
    a: &mut f32,
    m: &Material,
    light_c: Color,
    view: &Vector,
    normal: &Vector,
    to_light: &Vector,
) {
    let half = (to_light - view).unit();
    let base = normal.dot(&half).max(0.0).powf(m.specular_exp) * m.specular_intensity;
    *c += m.specular * light_c * (base * (1.0 - *a));
    *a += base * (1.0 - *a);
    *c *= *a;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Matrix;
    use crate::primitives::{Material, SolidKind};
    use std::sync::Arc;

    fn sphere_scene(material: Arc<Material>) -> CompositeScene {
        let pp = PrimitivePrototype::solid(SolidKind::Sphere, Matrix::identity(3), Vector::zeros(3), material).unwrap();
        CompositeScene::build(vec![pp]).unwrap()
    }

    fn look_along_z(scene: &mut CompositeScene, origin: Vector) {
        let dim = origin.dimension();
        let rows: Vec<Vector> = (0..dim).map(|i| Vector::axis(dim, i, 1.0)).collect();
        scene.set_camera(Camera::with_frame(origin, &rows).unwrap()).unwrap();
    }

    #[test]
    fn mirror_sphere_center_pixel() {
        // a fully reflective white sphere lit head-on reads as near-white
        let m = Arc::new(Material { reflectivity: 1.0, ..Material::default() });
        let mut scene = sphere_scene(m);
        look_along_z(&mut scene, Vector::axis(3, 2, -3.0));
        scene.set_fov(0.8).unwrap();
        scene.set_max_reflect_depth(1).unwrap();
        scene
            .add_global_light(GlobalLight { direction: Vector::axis(3, 2, 1.0), color: Color::white() })
            .unwrap();
        scene.set_view_size(100, 100).unwrap();

        let c = scene.calculate_color(50.0, 50.0);
        assert!(c.r >= 0.95 && c.g >= 0.95 && c.b >= 0.95, "{c:?}");
    }

    #[test]
    fn hypercube_normal_in_four_dimensions() {
        let m = Arc::new(Material::default());
        let pp = PrimitivePrototype::solid(SolidKind::Cube, Matrix::identity(4), Vector::zeros(4), m).unwrap();
        let mut scene = CompositeScene::build(vec![pp]).unwrap();

        // frame looking along +w: the view axis is the fourth basis vector
        let origin = Vector::axis(4, 3, -3.0);
        let rows = [
            Vector::axis(4, 0, 1.0),
            Vector::axis(4, 1, 1.0),
            Vector::axis(4, 3, 1.0),
            Vector::axis(4, 2, 1.0),
        ];
        scene.set_camera(Camera::with_frame(origin.clone(), &rows).unwrap()).unwrap();
        scene.set_view_size(64, 64).unwrap();

        let ray = Ray::new(origin, Vector::axis(4, 3, 1.0));
        let entry = scene.boundary().surface_distance(&ray).unwrap();
        let mut t_hits = Vec::new();
        let hit = intersect_tree(scene.root(), &ray, None, &mut t_hits, entry, f32::MAX)
            .expect("centre ray must hit the hypercube");
        assert_eq!(hit.normal.direction[3], -1.0);
        assert_eq!(hit.dist, 2.0);

        // and the centre pixel shades as a surface, not background
        let c = scene.calculate_color(32.0, 32.0);
        assert!(c.max_channel() > 0.5, "{c:?}");
    }

    fn glass_cube(x: f32, color: Color) -> PrimitivePrototype {
        let m = Arc::new(Material {
            color,
            opacity: 0.5,
            specular_intensity: 0.0,
            ..Material::default()
        });
        PrimitivePrototype::solid(SolidKind::Cube, Matrix::identity(3), Vector::axis(3, 0, x), m).unwrap()
    }

    #[test]
    fn transparency_composites_back_to_front() {
        let c1 = Color::new(0.9, 0.1, 0.1);
        let c2 = Color::new(0.1, 0.9, 0.1);
        let c3 = Color::new(0.1, 0.1, 0.9);
        let protos = vec![glass_cube(2.0, c1), glass_cube(4.5, c2), glass_cube(7.0, c3)];
        let mut scene = CompositeScene::build(protos).unwrap();

        // frame looking along +x
        let rows = [Vector::axis(3, 1, 1.0), Vector::axis(3, 2, 1.0), Vector::axis(3, 0, 1.0)];
        scene.set_camera(Camera::with_frame(Vector::zeros(3), &rows).unwrap()).unwrap();
        scene.set_bg_gradient_axis(0).unwrap();
        let c0 = Color::new(0.2, 0.3, 0.4);
        scene.set_background(c0, Color::black(), Color::black()).unwrap();
        scene.set_view_size(100, 100).unwrap();

        // straight through all three cubes: each front face shades to its own
        // material color under the white headlight
        let got = scene.calculate_color(50.0, 50.0);
        let want = ((c3 * 0.5 + c0 * 0.5) * 0.5 + c2 * 0.5) * 0.5 + c1 * 0.5;
        assert!((got.r - want.r).abs() < 1e-4, "{got:?} vs {want:?}");
        assert!((got.g - want.g).abs() < 1e-4);
        assert!((got.b - want.b).abs() < 1e-4);
    }

    #[test]
    fn background_gradient_by_direction() {
        let m = Arc::new(Material::default());
        let pp = PrimitivePrototype::solid(SolidKind::Sphere, Matrix::identity(3), Vector::axis(3, 0, 50.0), m).unwrap();
        let mut scene = CompositeScene::build(vec![pp]).unwrap();
        look_along_z(&mut scene, Vector::zeros(3));
        scene
            .set_background(Color::new(1.0, 0.0, 0.0), Color::new(0.0, 1.0, 0.0), Color::new(0.0, 0.0, 1.0))
            .unwrap();
        scene.set_fov(2.0).unwrap();
        scene.set_view_size(100, 100).unwrap();

        // above centre: direction tilts along +y (pixel y runs downward)
        let up = scene.calculate_color(50.0, 0.0);
        assert!(up.r > 0.0 && up.b == 0.0);
        // below centre tilts along −y
        let down = scene.calculate_color(50.0, 100.0);
        assert!(down.b > 0.0 && down.r == 0.0);
        // dead centre is pure horizon
        let mid = scene.calculate_color(50.0, 50.0);
        assert_eq!((mid.r, mid.b), (0.0, 0.0));
        assert!(mid.g > 0.99);
    }

    fn lit_cube_scene(light_pos: Vector, pane: bool) -> CompositeScene {
        let m = Arc::new(Material { specular_intensity: 0.0, ..Material::default() });
        let mut protos = vec![
            PrimitivePrototype::solid(SolidKind::Cube, Matrix::identity(3), Vector::zeros(3), m).unwrap(),
        ];
        if pane {
            // a pane in the y = 2 plane: it crosses the shadow path but never
            // the camera ray, which stays on the z axis
            let glass = Arc::new(Material {
                opacity: 0.5,
                specular_intensity: 0.0,
                ..Material::default()
            });
            let points = [
                Vector::from_slice(&[-3.0, 2.0, -6.0]),
                Vector::from_slice(&[6.0, 2.0, -6.0]),
                Vector::from_slice(&[-3.0, 2.0, 3.0]),
            ];
            protos.push(PrimitivePrototype::simplex(&points, glass).unwrap());
        }
        let mut scene = CompositeScene::build(protos).unwrap();
        look_along_z(&mut scene, Vector::axis(3, 2, -5.0));
        scene.set_camera_light(false).unwrap();
        scene.set_shadows(true).unwrap();
        scene
            .add_point_light(PointLight { position: light_pos, color: Color::white() })
            .unwrap();
        scene.set_view_size(100, 100).unwrap();
        scene
    }

    #[test]
    fn transparent_occluder_halves_the_light() {
        // light off to the side; the pane halves what reaches the cube face
        let light = Vector::from_slice(&[0.0, 4.0, -4.0]);
        let open = lit_cube_scene(light.clone(), false).calculate_color(50.0, 50.0);
        let shaded = lit_cube_scene(light, true).calculate_color(50.0, 50.0);
        assert!(open.r > 0.0);
        assert!((shaded.r / open.r - 0.5).abs() < 1e-3, "{shaded:?} vs {open:?}");
    }

    #[test]
    fn dim_point_lights_are_skipped() {
        // strength 1/d² drops the contribution below the shadow-test
        // threshold at d = 32
        let bright = lit_cube_scene(Vector::axis(3, 2, -17.0), false).calculate_color(50.0, 50.0);
        assert!(bright.r > 0.0);
        let dim = lit_cube_scene(Vector::axis(3, 2, -33.0), false).calculate_color(50.0, 50.0);
        assert_eq!(dim.r, 0.0);
    }

    #[test]
    fn locked_scene_rejects_mutation() {
        let mut scene = sphere_scene(Arc::new(Material::default()));
        scene.lock();
        assert_eq!(scene.set_fov(1.0).unwrap_err(), Error::SceneLocked);
        assert_eq!(scene.set_shadows(true).unwrap_err(), Error::SceneLocked);
        scene.unlock();
        assert_eq!(scene.locked(), 0);
        scene.set_fov(1.0).unwrap();
    }
}

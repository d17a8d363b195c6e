//! End-to-end renders in dimensions above 3: the whole pipeline — camera,
//! k-d tree, shading, packing, tiling — must be dimension-generic.

use std::sync::Arc;

use nray::aabb::PrimitivePrototype;
use nray::camera::Camera;
use nray::math::{Color, Matrix, Vector};
use nray::pixels::{rgb24_channels, ImageFormat};
use nray::primitives::{Material, SolidKind};
use nray::renderer::BlockingRenderer;
use nray::scene::{CompositeScene, GlobalLight};

/// Camera at −4 along the last axis, looking along it; the image plane stays
/// spanned by the first two axes.
fn camera_along_last_axis(dim: usize) -> Camera {
    let mut rows: Vec<Vector> = (0..dim).map(|i| Vector::axis(dim, i, 1.0)).collect();
    rows.swap(2, dim - 1);
    Camera::with_frame(Vector::axis(dim, dim - 1, -4.0), &rows).unwrap()
}

fn render_center_pixel(scene: Arc<CompositeScene>, size: usize) -> (Vec<u8>, [u8; 3]) {
    let format = ImageFormat::new(size, size, rgb24_channels()).unwrap();
    let renderer = BlockingRenderer::new(Some(2));
    let mut pixels = vec![0u8; format.required_len()];
    assert!(renderer.render(&mut pixels, &format, &scene).unwrap());

    let off = (size / 2) * format.pitch + (size / 2) * format.bytes_per_pixel();
    let center = [pixels[off], pixels[off + 1], pixels[off + 2]];
    (pixels, center)
}

#[test]
fn five_dimensional_sphere_renders() {
    let m = Arc::new(Material {
        color: Color::new(1.0, 0.2, 0.2),
        specular_intensity: 0.0,
        ..Material::default()
    });
    let pp = PrimitivePrototype::solid(SolidKind::Sphere, Matrix::identity(5), Vector::zeros(5), m)
        .unwrap();
    let mut scene = CompositeScene::build(vec![pp]).unwrap();
    scene.set_camera(camera_along_last_axis(5)).unwrap();
    scene.set_background(Color::black(), Color::black(), Color::black()).unwrap();
    scene
        .add_global_light(GlobalLight {
            direction: Vector::axis(5, 4, 1.0),
            color: Color::new(0.5, 0.5, 0.5),
        })
        .unwrap();
    scene.set_view_size(64, 64).unwrap();
    let scene = Arc::new(scene);

    let (pixels, center) = render_center_pixel(scene.clone(), 64);
    // head-on: camera light (1) plus global light (0.5) saturate red
    assert_eq!(center[0], 255);
    assert!(center[1] < 255);
    // corners miss the sphere and show the black background
    assert_eq!(&pixels[..3], &[0, 0, 0]);
    assert_eq!(scene.locked(), 0);
}

#[test]
fn six_dimensional_rotated_cube_renders() {
    // rotate the cube in the plane of the view axis and a hidden axis, so the
    // visible silhouette changes only through the extra dimensions
    let spin = Matrix::rotation(&Vector::axis(6, 5, 1.0), &Vector::axis(6, 3, 1.0), 0.4);
    let m = Arc::new(Material { color: Color::new(0.3, 0.9, 0.5), ..Material::default() });
    let pp = PrimitivePrototype::solid(SolidKind::Cube, spin, Vector::zeros(6), m).unwrap();
    let mut scene = CompositeScene::build(vec![pp]).unwrap();
    scene.set_camera(camera_along_last_axis(6)).unwrap();
    scene.set_background(Color::black(), Color::black(), Color::black()).unwrap();
    scene.set_view_size(48, 48).unwrap();

    let (_, center) = render_center_pixel(Arc::new(scene), 48);
    assert!(center[1] > 0, "centre pixel must hit the cube");
}

#[test]
fn four_dimensional_simplex_field_matches_scan() {
    use nray::kdtree::{intersect_tree, KdNode};
    use nray::math::Ray;
    use nray::primitives::Primitive;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    let mut rng = SmallRng::seed_from_u64(41);
    let mut protos = Vec::new();
    while protos.len() < 24 {
        let points: Vec<Vector> = (0..4)
            .map(|_| Vector::from_fn(4, |_| rng.gen_range(-1.0..1.0)))
            .collect();
        if let Ok(pp) = PrimitivePrototype::simplex(&points, Material::solid_color(Color::white())) {
            protos.push(pp);
        }
    }

    let scene = CompositeScene::build(protos.clone()).unwrap();
    let root: Option<&KdNode> = scene.root();

    for i in 0..256 {
        let ray = Ray::new(
            Vector::from_fn(4, |_| rng.gen_range(-3.0..3.0)),
            Vector::from_fn(4, |_| rng.gen_range(-1.0..1.0)).unit(),
        );

        let mut best: Option<f32> = None;
        let mut scratch = Ray::zeros(4);
        for p in &protos {
            if let Primitive::Simplex(s) = &*p.primitive {
                let d = s.intersects(&ray, &mut scratch, f32::MAX);
                if d != 0.0 && best.map_or(true, |b| d < b) {
                    best = Some(d);
                }
            }
        }

        let mut t_hits = Vec::new();
        let got = scene
            .boundary()
            .surface_distance(&ray)
            .and_then(|d| intersect_tree(root, &ray, None, &mut t_hits, d, f32::MAX));

        match (best, got) {
            (None, None) => {}
            (Some(b), Some(h)) => assert!((b - h.dist).abs() <= b.max(1.0) * 1e-4, "ray {i}"),
            (b, g) => panic!("ray {i}: scan {b:?} vs traversal {:?}", g.map(|h| h.dist)),
        }
    }
}

//! Demo scenes for the command-line renderer.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use nray::aabb::PrimitivePrototype;
use nray::camera::Camera;
use nray::math::{Color, Matrix, Vector};
use nray::primitives::{Material, SolidKind};
use nray::scene::{CompositeScene, GlobalLight, PointLight};

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum ScenePreset {
    /// Reflective sphere, tinted cubes and a glass pyramid on a lit floor.
    Showcase,
    /// A rotated unit hypercube in four dimensions.
    Tesseract,
    /// A field of random translucent triangles.
    Simplices,
}

impl ScenePreset {
    pub fn name(self) -> &'static str {
        match self {
            ScenePreset::Showcase => "showcase",
            ScenePreset::Tesseract => "tesseract",
            ScenePreset::Simplices => "simplices",
        }
    }

    pub fn build(self, seed: u64) -> CompositeScene {
        match self {
            ScenePreset::Showcase => showcase(),
            ScenePreset::Tesseract => tesseract(),
            ScenePreset::Simplices => simplices(seed),
        }
    }
}

fn material(color: Color) -> Arc<Material> {
    Arc::new(Material { color, specular_intensity: 0.4, ..Material::default() })
}

fn floor_quad(size: f32, y: f32, m: &Arc<Material>) -> Vec<PrimitivePrototype> {
    let corners = [
        Vector::from_slice(&[-size, y, -size]),
        Vector::from_slice(&[size, y, -size]),
        Vector::from_slice(&[size, y, size]),
        Vector::from_slice(&[-size, y, size]),
    ];
    vec![
        PrimitivePrototype::simplex(&[corners[0].clone(), corners[1].clone(), corners[2].clone()], m.clone())
            .expect("floor triangle"),
        PrimitivePrototype::simplex(&[corners[0].clone(), corners[2].clone(), corners[3].clone()], m.clone())
            .expect("floor triangle"),
    ]
}

fn showcase() -> CompositeScene {
    let mut protos = Vec::new();

    let floor = material(Color::new(0.75, 0.75, 0.8));
    protos.extend(floor_quad(12.0, -1.0, &floor));

    let mirror = Arc::new(Material {
        color: Color::new(0.9, 0.9, 0.9),
        reflectivity: 0.8,
        ..Material::default()
    });
    protos.push(
        PrimitivePrototype::solid(SolidKind::Sphere, Matrix::identity(3), Vector::from_slice(&[0.0, 0.0, 4.0]), mirror)
            .expect("mirror sphere"),
    );

    let tilt = Matrix::rotation(&Vector::axis(3, 0, 1.0), &Vector::axis(3, 2, 1.0), 0.5);
    for (x, color) in [(-2.6, Color::new(0.9, 0.25, 0.2)), (2.6, Color::new(0.2, 0.4, 0.9))] {
        let placement = &tilt * &Matrix::scale(3, 0.7);
        let local = placement.inverse().expect("placement is invertible");
        protos.push(
            PrimitivePrototype::solid(
                SolidKind::Cube,
                placement,
                &local * &Vector::from_slice(&[x, -0.3, 4.5]),
                material(color),
            )
            .expect("tinted cube"),
        );
    }

    let glass = Arc::new(Material {
        color: Color::new(0.6, 0.9, 0.7),
        opacity: 0.35,
        specular_intensity: 0.6,
        ..Material::default()
    });
    let apex = Vector::from_slice(&[0.0, 1.2, 2.2]);
    let base = [
        Vector::from_slice(&[-0.8, -1.0, 1.6]),
        Vector::from_slice(&[0.8, -1.0, 1.6]),
        Vector::from_slice(&[0.0, -1.0, 2.9]),
    ];
    for i in 0..3 {
        protos.push(
            PrimitivePrototype::simplex(
                &[apex.clone(), base[i].clone(), base[(i + 1) % 3].clone()],
                glass.clone(),
            )
            .expect("pyramid face"),
        );
    }

    let mut scene = CompositeScene::build(protos).expect("showcase scene");
    scene.set_shadows(true).unwrap();
    scene.set_camera_light(false).unwrap();
    scene.set_ambient(Color::new(0.06, 0.06, 0.08)).unwrap();
    scene
        .set_background(Color::new(0.5, 0.7, 1.0), Color::new(0.95, 0.95, 1.0), Color::new(0.25, 0.2, 0.2))
        .unwrap();
    scene
        .add_point_light(PointLight {
            position: Vector::from_slice(&[-3.0, 4.0, 0.5]),
            color: Color::new(26.0, 25.0, 23.0),
        })
        .unwrap();
    scene
        .add_global_light(GlobalLight {
            direction: Vector::from_slice(&[0.3, -1.0, 0.45]).unit(),
            color: Color::new(0.35, 0.35, 0.4),
        })
        .unwrap();

    let mut cam = Camera::new(3).unwrap();
    cam.translate(&Vector::from_slice(&[0.0, 0.6, -3.5]));
    scene.set_camera(cam).unwrap();
    scene
}

fn tesseract() -> CompositeScene {
    let spin = &Matrix::rotation(&Vector::axis(4, 0, 1.0), &Vector::axis(4, 3, 1.0), 0.6)
        * &Matrix::rotation(&Vector::axis(4, 1, 1.0), &Vector::axis(4, 2, 1.0), 0.3);
    let m = Arc::new(Material {
        color: Color::new(0.85, 0.55, 0.2),
        specular_intensity: 0.7,
        ..Material::default()
    });
    let protos = vec![
        PrimitivePrototype::solid(SolidKind::Cube, spin, Vector::zeros(4), m).expect("hypercube"),
    ];

    let mut scene = CompositeScene::build(protos).expect("tesseract scene");
    scene
        .set_background(Color::new(0.2, 0.25, 0.45), Color::new(0.05, 0.05, 0.1), Color::new(0.35, 0.15, 0.3))
        .unwrap();

    // look down the w axis; the image plane stays spanned by x and y
    let rows = [
        Vector::axis(4, 0, 1.0),
        Vector::axis(4, 1, 1.0),
        Vector::axis(4, 3, 1.0),
        Vector::axis(4, 2, 1.0),
    ];
    let cam = Camera::with_frame(Vector::axis(4, 3, -3.5), &rows).unwrap();
    scene.set_camera(cam).unwrap();
    scene
}

fn simplices(seed: u64) -> CompositeScene {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut protos = Vec::new();

    while protos.len() < 60 {
        let center = Vector::from_fn(3, |i| rng.gen_range(-2.0..2.0) + if i == 2 { 4.0 } else { 0.0 });
        let points: Vec<Vector> = (0..3)
            .map(|_| Vector::from_fn(3, |i| center[i] + rng.gen_range(-0.7..0.7)))
            .collect();
        let m = Arc::new(Material {
            color: Color::new(rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0)),
            opacity: if rng.gen_bool(0.4) { 0.45 } else { 1.0 },
            specular_intensity: 0.3,
            ..Material::default()
        });
        if let Ok(pp) = PrimitivePrototype::simplex(&points, m) {
            protos.push(pp);
        }
    }

    let mut scene = CompositeScene::build(protos).expect("simplex scene");
    scene.set_shadows(true).unwrap();
    scene
        .add_global_light(GlobalLight {
            direction: Vector::from_slice(&[-0.2, -1.0, 0.3]).unit(),
            color: Color::new(0.9, 0.85, 0.8),
        })
        .unwrap();
    scene.set_ambient(Color::new(0.1, 0.1, 0.12)).unwrap();
    scene
}

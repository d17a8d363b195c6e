//! The pinhole camera: an origin plus an orthonormal frame stored as matrix
//! rows. The view plane is spanned by the first two axes; the third is the
//! view direction. Higher axes exist in dimensions above 3 and stay fixed
//! under the 2-D projection.

use crate::error::{Error, Result};
use crate::math::{Matrix, Vector};

#[derive(Debug, Clone)]
pub struct Camera {
    pub origin: Vector,
    axes: Matrix,
}

impl Camera {
    /// A camera at the coordinate origin with the standard basis as its frame.
    pub fn new(dim: usize) -> Result<Self> {
        if dim < 3 {
            return Err(Error::BadDimension(dim));
        }
        Ok(Camera { origin: Vector::zeros(dim), axes: Matrix::identity(dim) })
    }

    pub fn with_frame(origin: Vector, rows: &[Vector]) -> Result<Self> {
        let dim = origin.dimension();
        if dim < 3 {
            return Err(Error::BadDimension(dim));
        }
        if rows.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: rows.len() });
        }
        Ok(Camera { origin, axes: Matrix::from_rows(rows) })
    }

    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.origin.dimension()
    }

    pub fn axis(&self, i: usize) -> Vector {
        self.axes.row_vector(i)
    }

    pub fn set_axis(&mut self, i: usize, v: &Vector) {
        self.axes.set_row(i, v);
    }

    pub fn right(&self) -> &[f32] {
        self.axes.row(0)
    }

    pub fn up(&self) -> &[f32] {
        self.axes.row(1)
    }

    pub fn forward(&self) -> &[f32] {
        self.axes.row(2)
    }

    /// Moves the origin by `v` interpreted in the camera's own basis.
    pub fn translate(&mut self, v: &Vector) {
        assert_eq!(v.dimension(), self.dimension());
        for i in 0..self.dimension() {
            let row = self.axes.row_vector(i);
            self.origin += &(&row * v[i]);
        }
    }

    /// Rotates the frame by `m` (right-multiplies the axes by `mᵀ`).
    pub fn transform(&mut self, m: &Matrix) {
        self.axes = self.axes.mult_transpose(m);
    }

    /// Restores orthonormality with classical Gram-Schmidt: row 0 keeps its
    /// direction, each later row is orthogonalized against the rows before it,
    /// and every row ends up unit length.
    pub fn normalize(&mut self) {
        let n = self.dimension();
        let row0 = self.axes.row_vector(0).unit();
        self.axes.set_row(0, &row0);

        for i in 1..n {
            let mut v = self.axes.row_vector(i);
            for j in 0..i {
                let e = self.axes.row_vector(j);
                v -= &(&e * v.dot(&e));
            }
            self.axes.set_row(i, &v.unit());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Matrix;

    fn frame_error(cam: &Camera) -> f32 {
        let n = cam.dimension();
        let mut worst = 0.0f32;
        for i in 0..n {
            for j in 0..n {
                let d = cam.axis(i).dot(&cam.axis(j));
                let want = if i == j { 1.0 } else { 0.0 };
                worst = worst.max((d - want).abs());
            }
        }
        worst
    }

    #[test]
    fn rejects_low_dimensions() {
        assert_eq!(Camera::new(2).unwrap_err(), Error::BadDimension(2));
    }

    #[test]
    fn translate_uses_frame_coordinates() {
        let mut cam = Camera::new(3).unwrap();
        let rot = Matrix::rotation(&Vector::axis(3, 0, 1.0), &Vector::axis(3, 2, 1.0), 0.5);
        cam.transform(&rot);
        let fwd = cam.axis(2);
        cam.translate(&Vector::axis(3, 2, 2.0));
        assert_eq!(cam.origin, &fwd * 2.0);
    }

    #[test]
    fn normalize_restores_orthonormality() {
        let mut cam = Camera::new(4).unwrap();
        let rot = Matrix::rotation(&Vector::axis(4, 1, 1.0), &Vector::axis(4, 3, 1.0), 1.1);
        cam.transform(&rot);
        cam.translate(&Vector::from_slice(&[0.5, 1.0, -2.0, 3.0]));
        // skew the frame, then repair it
        cam.set_axis(1, &(&cam.axis(1) * 3.0));
        cam.set_axis(3, &(&cam.axis(3) + &cam.axis(0)));
        cam.normalize();
        assert!(frame_error(&cam) <= 10.0 * f32::EPSILON, "error {}", frame_error(&cam));
    }

    #[test]
    fn normalize_keeps_first_axis_direction() {
        let mut cam = Camera::new(3).unwrap();
        cam.set_axis(0, &Vector::from_slice(&[3.0, 0.0, 0.0]));
        cam.normalize();
        assert_eq!(cam.axis(0), Vector::axis(3, 0, 1.0));
    }
}

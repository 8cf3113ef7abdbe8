//! Small fixed-size linear-algebra glue shared by transforms and elements.
//!
//! Element-level work stays in stack-allocated `SMatrix`/`SVector` values;
//! conversion to `DMatrix`/`DVector` happens only at the solver boundary.

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, SVector};

pub type Vec3 = nalgebra::Vector3<f64>;
pub type Vec6 = SVector<f64, 6>;
pub type Vec12 = SVector<f64, 12>;
pub type Mat3 = Matrix3<f64>;
pub type Mat6 = SMatrix<f64, 6, 6>;
pub type Mat12 = SMatrix<f64, 12, 12>;

/// Lengths below this are treated as coincident nodes.
pub const LENGTH_TOL: f64 = 1e-12;

/// `Tᵗ · K · T`
pub fn triple_product<const R: usize, const C: usize>(
    t: &SMatrix<f64, R, C>,
    k: &SMatrix<f64, R, R>,
) -> SMatrix<f64, C, C> {
    t.transpose() * k * t
}

/// Repeat `block` along the diagonal of an `N × N` matrix.
pub fn block_diagonal<const B: usize, const N: usize>(
    block: &SMatrix<f64, B, B>,
) -> SMatrix<f64, N, N> {
    debug_assert_eq!(N % B, 0, "block size must divide matrix size");
    let mut out = SMatrix::<f64, N, N>::zeros();
    for offset in (0..N).step_by(B) {
        for i in 0..B {
            for j in 0..B {
                out[(offset + i, offset + j)] = block[(i, j)];
            }
        }
    }
    out
}

/// `R · Rᵗ == I` within `tol`
pub fn is_orthonormal(r: &Mat3, tol: f64) -> bool {
    let residual = r * r.transpose() - Mat3::identity();
    residual.iter().all(|v| v.abs() <= tol)
}

pub fn to_dmatrix<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> DMatrix<f64> {
    DMatrix::from_column_slice(R, C, m.as_slice())
}

pub fn to_dvector<const R: usize>(v: &SVector<f64, R>) -> DVector<f64> {
    DVector::from_column_slice(v.as_slice())
}

/// Sign function with `sgn(0) = 0`.
pub fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn triple_product_matches_explicit_product() {
        let t = SMatrix::<f64, 2, 3>::new(1.0, 2.0, 0.0, 0.0, 1.0, -1.0);
        let k = SMatrix::<f64, 2, 2>::new(4.0, 1.0, 1.0, 3.0);
        let expected = t.transpose() * k * t;
        assert_eq!(triple_product(&t, &k), expected);
    }

    #[test]
    fn block_diagonal_repeats_block() {
        let r = Mat3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let t: Mat12 = block_diagonal(&r);
        for b in 0..4 {
            for i in 0..3 {
                for j in 0..3 {
                    assert_eq!(t[(3 * b + i, 3 * b + j)], r[(i, j)]);
                }
            }
        }
        assert_eq!(t[(0, 3)], 0.0);
        assert_eq!(t[(11, 0)], 0.0);
    }

    #[test]
    fn detects_orthonormal_rotation() {
        let angle: f64 = 0.3;
        let r = Mat3::new(
            angle.cos(),
            angle.sin(),
            0.0,
            -angle.sin(),
            angle.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        );
        assert!(is_orthonormal(&r, 1e-12));
        assert!(!is_orthonormal(&(r * 2.0), 1e-12));
    }

    #[test]
    fn conversions_keep_layout() {
        let m = SMatrix::<f64, 2, 3>::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let d = to_dmatrix(&m);
        assert_eq!(d.nrows(), 2);
        assert_eq!(d[(1, 2)], 6.0);

        let v = Vec6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_relative_eq!(to_dvector(&v).sum(), 21.0);
    }

    #[test]
    fn sgn_of_zero_is_zero() {
        assert_eq!(sgn(0.0), 0.0);
        assert_eq!(sgn(-0.0), 0.0);
        assert_eq!(sgn(2.0), 1.0);
        assert_eq!(sgn(-1e-300), -1.0);
    }
}

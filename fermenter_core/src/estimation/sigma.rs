// fermenter_core/src/estimation/sigma.rs

use crate::error::EstimatorError;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

/// Eigenvalues below `-PSD_TOL` times the covariance scale are treated as a
/// real loss of positive semidefiniteness, not roundoff.
const PSD_TOL: f64 = 1.0e-9;

/// Merwe scaled sigma-point parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MerweScaling {
    /// Spread of the points around the mean, typically small.
    pub alpha: f64,
    /// Prior-distribution weighting, 2 for Gaussian posteriors.
    pub beta: f64,
    /// Secondary scaling, usually zero.
    pub kappa: f64,
}

impl Default for MerweScaling {
    fn default() -> Self {
        Self {
            alpha: 1.0e-3,
            beta: 2.0,
            kappa: 0.0,
        }
    }
}

impl MerweScaling {
    /// The composite spread parameter for an `n`-dimensional state.
    pub fn lambda(&self, n: usize) -> f64 {
        self.alpha.powi(2) * (n as f64 + self.kappa) - n as f64
    }

    /// Mean and covariance weights for the `2n + 1` points.
    ///
    /// With a small `alpha` the center weight is hugely negative and the
    /// wing weights hugely positive; they cancel to one only when every
    /// point is recombined exactly as generated. Nothing downstream may
    /// drop, reorder or adjust individual points.
    pub fn weights(&self, n: usize) -> (DVector<f64>, DVector<f64>) {
        let lambda = self.lambda(n);
        let denom = n as f64 + lambda;
        let mut weights_m = DVector::from_element(2 * n + 1, 0.5 / denom);
        let mut weights_c = weights_m.clone();
        weights_m[0] = lambda / denom;
        weights_c[0] = weights_m[0] + (1.0 - self.alpha.powi(2) + self.beta);
        (weights_m, weights_c)
    }
}

/// A generated sigma-point set with its recombination weights. Points are
/// the columns of `points`; column zero carries the mean itself.
#[derive(Debug, Clone)]
pub struct SigmaPoints {
    pub points: DMatrix<f64>,
    pub weights_m: DVector<f64>,
    pub weights_c: DVector<f64>,
}

impl SigmaPoints {
    /// Spreads `2n + 1` points around `mean` along the columns of the
    /// square root of the scaled covariance.
    pub fn generate(
        mean: &DVector<f64>,
        covariance: &DMatrix<f64>,
        scaling: &MerweScaling,
    ) -> Result<Self, EstimatorError> {
        let n = mean.len();
        let lambda = scaling.lambda(n);
        let root = symmetric_sqrt(&(covariance * (n as f64 + lambda)))?;

        let mut points = DMatrix::zeros(n, 2 * n + 1);
        points.column_mut(0).copy_from(mean);
        for i in 0..n {
            points.column_mut(i + 1).copy_from(&(mean + root.column(i)));
            points
                .column_mut(i + n + 1)
                .copy_from(&(mean - root.column(i)));
        }

        let (weights_m, weights_c) = scaling.weights(n);
        Ok(Self {
            points,
            weights_m,
            weights_c,
        })
    }

    /// Number of points in the set.
    pub fn count(&self) -> usize {
        self.points.ncols()
    }

    /// State dimension.
    pub fn dim(&self) -> usize {
        self.points.nrows()
    }

    /// Weighted mean of the carried points.
    pub fn mean(&self) -> DVector<f64> {
        &self.points * &self.weights_m
    }

    /// Weighted covariance of the carried points about `mean`.
    pub fn covariance_about(&self, mean: &DVector<f64>) -> DMatrix<f64> {
        let n = self.dim();
        let mut cov = DMatrix::zeros(n, n);
        for i in 0..self.count() {
            let diff = self.points.column(i) - mean;
            cov += self.weights_c[i] * &diff * diff.transpose();
        }
        cov
    }
}

/// Symmetric square root of a covariance matrix by eigendecomposition.
///
/// Runs start from an exactly zero covariance, which a Cholesky
/// factorization rejects; the eigenroot handles it and every other
/// semidefinite case. Eigenvalues dipping below zero by roundoff are
/// floored, anything further negative fails.
pub fn symmetric_sqrt(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>, EstimatorError> {
    let symmetric = (matrix + matrix.transpose()) * 0.5;
    let eigen = symmetric.symmetric_eigen();
    let scale = eigen
        .eigenvalues
        .iter()
        .fold(1.0_f64, |acc, &value| acc.max(value));
    let mut roots = eigen.eigenvalues.clone();
    for value in roots.iter_mut() {
        if *value < -PSD_TOL * scale {
            return Err(EstimatorError::CovarianceNotPsd { eigenvalue: *value });
        }
        *value = value.max(0.0).sqrt();
    }
    Ok(&eigen.eigenvectors * DMatrix::from_diagonal(&roots) * eigen.eigenvectors.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_recombine_to_one() {
        let scaling = MerweScaling::default();
        let (weights_m, weights_c) = scaling.weights(14);
        assert_eq!(weights_m.len(), 29);
        assert_relative_eq!(weights_m.sum(), 1.0, epsilon = 1e-9);

        // The covariance center weight carries the beta correction.
        let expected =
            weights_m[0] + (1.0 - scaling.alpha.powi(2) + scaling.beta);
        assert_relative_eq!(weights_c[0], expected, epsilon = 1e-9);
        assert_relative_eq!(weights_c[1], weights_m[1], epsilon = 1e-15);
    }

    #[test]
    fn points_reconstruct_mean_and_covariance() {
        let mean = DVector::from_vec(vec![1.0, -0.5, 2.0]);
        let covariance =
            DMatrix::from_diagonal(&DVector::from_vec(vec![0.04, 0.01, 0.09]));
        let scaling = MerweScaling::default();
        let sigmas = SigmaPoints::generate(&mean, &covariance, &scaling).unwrap();

        assert_eq!(sigmas.count(), 7);
        let recombined = sigmas.mean();
        for i in 0..3 {
            assert_relative_eq!(recombined[i], mean[i], epsilon = 1e-8);
        }

        let recovered = sigmas.covariance_about(&recombined);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(recovered[(i, j)], covariance[(i, j)], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn zero_covariance_collapses_every_point_onto_the_mean() {
        let mean = DVector::from_vec(vec![0.25, 4.0]);
        let covariance = DMatrix::zeros(2, 2);
        let sigmas = SigmaPoints::generate(&mean, &covariance, &MerweScaling::default()).unwrap();
        for i in 0..sigmas.count() {
            assert_eq!(sigmas.points.column(i), mean.column(0));
        }
    }

    #[test]
    fn indefinite_covariance_is_fatal() {
        let mean = DVector::zeros(2);
        let covariance =
            DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0e-2]));
        let result = SigmaPoints::generate(&mean, &covariance, &MerweScaling::default());
        assert!(matches!(
            result,
            Err(EstimatorError::CovarianceNotPsd { .. })
        ));
    }

    #[test]
    fn roundoff_negatives_are_floored() {
        let matrix = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0e-14]));
        let root = symmetric_sqrt(&matrix).unwrap();
        assert_relative_eq!(root[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(root[(1, 1)], 0.0, epsilon = 1e-7);
    }

    #[test]
    fn eigenroot_squares_back_to_the_input() {
        let matrix = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let root = symmetric_sqrt(&matrix).unwrap();
        let squared = &root * &root;
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(squared[(i, j)], matrix[(i, j)], epsilon = 1e-10);
            }
        }
    }
}

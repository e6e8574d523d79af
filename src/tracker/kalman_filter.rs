//! Constant-velocity Kalman filter for bounding box tracking.
//!
//! State vector is `[cx, cy, a, h, vcx, vcy, va, vh]`: box center, aspect
//! ratio (w/h), height and their velocities. Measurements are the first four
//! components. State lives in `ndarray` buffers; the innovation solve goes
//! through `nalgebra`'s Cholesky decomposition.

use nalgebra::{DMatrix, DVector, Matrix4, SMatrix};
use ndarray::{Array1, Array2, s};

const NDIM: usize = 4;

/// 0.95 quantile of the chi-square distribution, indexed by degrees of
/// freedom minus one (1..=9).
pub const CHI2INV95: [f64; 9] = [
    3.8415, 5.9915, 7.8147, 9.4877, 11.070, 12.592, 14.067, 15.507, 16.919,
];

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = Array2::eye(2 * NDIM);
        for i in 0..NDIM {
            motion_mat[[i, NDIM + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((NDIM, 2 * NDIM));
        for i in 0..NDIM {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Create a track state from an unassociated `(cx, cy, a, h)` measurement.
    ///
    /// Velocities start at zero; their uncertainty is larger than the
    /// position uncertainty, both scaled by the box height.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(2 * NDIM);
        for i in 0..NDIM {
            mean[i] = measurement[i];
        }

        let h = measurement[3];
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        (mean, diag_squared(&std))
    }

    /// Run the prediction step in place.
    pub fn predict(&self, mean: &mut Array1<f64>, covariance: &mut Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];
        let motion_cov = diag_squared(&std);

        *mean = self.motion_mat.dot(&*mean);
        *covariance = self.motion_mat.dot(&*covariance).dot(&self.motion_mat.t()) + motion_cov;
    }

    /// Project the state distribution into measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];
        let innovation_cov = diag_squared(&std);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Run the correction step with a `(cx, cy, a, h)` measurement.
    ///
    /// If the innovation covariance cannot be factorised the measurement is
    /// ignored and the input state is returned.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        // K^T solves S * K^T = (P * H^T)^T.
        let pht = covariance.dot(&self.update_mat.t()); // 8x4
        let Some(gain_t) = solve_innovation(&projected_cov, &pht) else {
            log::warn!("innovation covariance is singular, skipping measurement");
            return (mean.clone(), covariance.clone());
        };
        let kalman_gain = gain_t.t().to_owned(); // 8x4

        let innovation = Array1::from_vec(measurement.to_vec()) - projected_mean;

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        (new_mean, new_covariance)
    }

    /// Squared Mahalanobis distance between the state distribution and each
    /// measurement.
    ///
    /// With `only_position` only the box center takes part and the result
    /// should be compared against `CHI2INV95[1]`, otherwise `CHI2INV95[3]`.
    /// Distances are infinite when the projected covariance is not positive
    /// definite.
    pub fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurements: &[[f64; 4]],
        only_position: bool,
    ) -> Vec<f64> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let dims = if only_position { 2 } else { NDIM };

        let cov = projected_cov.slice(s![..dims, ..dims]);
        let Some(chol) = DMatrix::from_fn(dims, dims, |i, j| cov[[i, j]]).cholesky() else {
            return vec![f64::INFINITY; measurements.len()];
        };

        measurements
            .iter()
            .map(|m| {
                let d = DVector::from_fn(dims, |i, _| m[i] - projected_mean[i]);
                let z = chol.solve(&d);
                d.dot(&z)
            })
            .collect()
    }
}

fn diag_squared<const N: usize>(std: &[f64; N]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_iter(std.iter().map(|s| s * s)))
}

/// Solve `S * X = B^T` for X (4x8), where `S` is 4x4 and `B` is 8x4.
///
/// Cholesky first; LU when `S` has drifted away from positive definite.
fn solve_innovation(s: &Array2<f64>, b: &Array2<f64>) -> Option<Array2<f64>> {
    let s_na = Matrix4::from_fn(|i, j| s[[i, j]]);
    let rhs = SMatrix::<f64, 4, 8>::from_fn(|i, j| b[[j, i]]);

    let x = match s_na.cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => {
            log::warn!("innovation covariance not positive definite, using LU solve");
            s_na.lu().solve(&rhs)?
        }
    };

    Some(Array2::from_shape_fn((NDIM, 2 * NDIM), |(i, j)| x[(i, j)]))
}

//! Constant-velocity Kalman filter over XYAH boxes, using ndarray for the
//! state algebra and nalgebra for the 4x4 innovation inverse.
//!
//! State is `[cx, cy, a, h, vcx, vcy, va, vh]`; only the first four terms are
//! observed. Process and measurement noise are scaled by the current box
//! height so the filter behaves the same for near and far objects.

use ndarray::{Array1, Array2};

const NDIM: usize = 4;

/// Default position noise weight relative to box height.
pub const STD_WEIGHT_POSITION: f64 = 1.0 / 20.0;
/// Default velocity noise weight relative to box height.
pub const STD_WEIGHT_VELOCITY: f64 = 1.0 / 160.0;

/// Per-track filter state.
///
/// `predicted` records whether [`KalmanFilter::predict`] has run since the
/// last measurement update. An update always consumes a prediction; if none
/// is pending the filter predicts first so the covariance is never stale.
#[derive(Debug, Clone)]
pub struct KalmanState {
    pub mean: Array1<f64>,
    pub covariance: Array2<f64>,
    predicted: bool,
}

impl KalmanState {
    /// Observed part of the mean: `[cx, cy, a, h]`.
    pub fn xyah(&self) -> [f64; 4] {
        [self.mean[0], self.mean[1], self.mean[2], self.mean[3]]
    }

    pub fn is_predicted(&self) -> bool {
        self.predicted
    }
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(STD_WEIGHT_POSITION, STD_WEIGHT_VELOCITY)
    }
}

impl KalmanFilter {
    pub fn new(std_weight_position: f64, std_weight_velocity: f64) -> Self {
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
            std_weight_position,
            std_weight_velocity,
        }
    }

    /// Start a track from an unassociated measurement; velocities start at 0.
    pub fn initiate(&self, measurement: [f64; 4]) -> KalmanState {
        let mut mean = Array1::zeros(2 * NDIM);
        for (i, &m) in measurement.iter().enumerate() {
            mean[i] = m;
        }

        let h = measurement[3];
        let pos = 2.0 * self.std_weight_position * h;
        let vel = 10.0 * self.std_weight_velocity * h;
        let covariance = diag_squared(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        KalmanState {
            mean,
            covariance,
            predicted: false,
        }
    }

    /// Advance the state by one frame.
    pub fn predict(&self, state: &mut KalmanState) {
        let h = state.mean[3];
        let pos = self.std_weight_position * h;
        let vel = self.std_weight_velocity * h;
        let motion_cov = diag_squared(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        state.mean = self.motion_mat.dot(&state.mean);
        state.covariance =
            self.motion_mat.dot(&state.covariance).dot(&self.motion_mat.t()) + motion_cov;
        state.predicted = true;
    }

    /// Project the state into measurement space.
    pub fn project(&self, state: &KalmanState) -> (Array1<f64>, Array2<f64>) {
        let h = state.mean[3];
        let pos = self.std_weight_position * h;
        let innovation_cov = diag_squared(&[pos, pos, 1e-1, pos]);

        let mean = self.update_mat.dot(&state.mean);
        let covariance =
            self.update_mat.dot(&state.covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean, covariance)
    }

    /// Correct the state with a measurement.
    ///
    /// Returns `false` when the innovation covariance cannot be inverted, in
    /// which case the state is left as predicted.
    pub fn update(&self, state: &mut KalmanState, measurement: [f64; 4]) -> bool {
        if !state.predicted {
            self.predict(state);
        }
        state.predicted = false;

        let (projected_mean, projected_cov) = self.project(state);
        let Some(s_inv) = invert_4x4(&projected_cov) else {
            return false;
        };

        let innovation = Array1::from_iter(measurement) - projected_mean;

        // H = [I 0], so P * H^T is the first four columns of P.
        let pht = state.covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        state.mean = &state.mean + &kalman_gain.dot(&innovation);
        state.covariance =
            &state.covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());
        true
    }
}

fn diag_squared(std: &[f64]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_iter(std.iter().map(|s| s * s)))
}

fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let nm = nalgebra::Matrix4::from_fn(|i, j| m[[i, j]]);
    let inv = nm.try_inverse()?;
    Some(Array2::from_shape_fn((NDIM, NDIM), |(i, j)| inv[(i, j)]))
}

//! Pluggable physics for the stepper.
//!
//! An extension supplies the right-hand side of the equation of motion at
//! the four Runge-Kutta-Nyström stages and commits its side effects (time,
//! energy loss, transport-matrix rows) once a trial step is accepted.
//! Several extensions can be active in one step; an
//! [`Auctioneer`](crate::Auctioneer) arbitrates between them from their
//! per-step bids.

use gyre_core::{
    Material,
    types::{FreeMatrix, Matrix3, Vector3, free},
};

use crate::{TrackState, options::StepperOptions};

pub mod dense;
pub mod vacuum;

pub use dense::DenseExtension;
pub use vacuum::VacuumExtension;

/// Fractions of the step length at which the four stages are evaluated.
pub(crate) const STAGE_OFFSET: [f64; 4] = [0.0, 0.5, 0.5, 1.0];

/// Per-step scratch shared between the stepper and its extensions.
///
/// Owned by the stepper and reset for every trial, so extensions stay
/// stateless between calls.
#[derive(Debug, Clone, Default)]
pub struct StageData {
    /// Direction derivatives `k1..k4` of the four stages.
    pub k: [Vector3; 4],
    /// Field samples at the stage positions.
    pub field: [Vector3; 4],
    /// Charge over momentum at each stage.
    pub qop: [f64; 4],
    /// Total energy at the step start.
    pub energy: f64,
    /// Mean energy loss per unit path at the step start.
    pub loss: f64,
}

impl StageData {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One physics contribution to a step.
///
/// The stepper drives the protocol in this order: [`bid`](Self::bid) once
/// per step, then for every trial the four [`stage`](Self::stage) calls,
/// then [`finalize`](Self::finalize) once the trial passes error control.
/// `stage` and `finalize` may veto by returning `false`; a vetoed stage
/// shrinks and retries the step, a vetoed finalize fails it.
pub trait SteppingExtension {
    /// How strongly this extension wants to participate given the current
    /// state and the material of the traversed volume. Zero means not
    /// applicable.
    fn bid(&self, state: &TrackState, material: &Material) -> u32;

    /// Evaluates stage `stage` (0 to 3) of a trial of length `h`, writing
    /// `data.k[stage]` from the field sample at the stage position.
    fn stage(
        &self,
        state: &TrackState,
        options: &StepperOptions,
        material: &Material,
        data: &mut StageData,
        stage: usize,
        h: f64,
        field: &Vector3,
    ) -> bool;

    /// Commits the extension's effects of an accepted step of length `h`
    /// onto `state` and, when covariance transport is on, writes the
    /// step's transport matrix into `transport`.
    fn finalize(
        &self,
        state: &mut TrackState,
        options: &StepperOptions,
        material: &Material,
        data: &mut StageData,
        h: f64,
        transport: Option<&mut FreeMatrix>,
    ) -> bool;
}

/// The closed set of extensions the stepper knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Vacuum(VacuumExtension),
    Dense(DenseExtension),
}

impl SteppingExtension for Extension {
    fn bid(&self, state: &TrackState, material: &Material) -> u32 {
        match self {
            Self::Vacuum(e) => e.bid(state, material),
            Self::Dense(e) => e.bid(state, material),
        }
    }

    fn stage(
        &self,
        state: &TrackState,
        options: &StepperOptions,
        material: &Material,
        data: &mut StageData,
        stage: usize,
        h: f64,
        field: &Vector3,
    ) -> bool {
        match self {
            Self::Vacuum(e) => e.stage(state, options, material, data, stage, h, field),
            Self::Dense(e) => e.stage(state, options, material, data, stage, h, field),
        }
    }

    fn finalize(
        &self,
        state: &mut TrackState,
        options: &StepperOptions,
        material: &Material,
        data: &mut StageData,
        h: f64,
        transport: Option<&mut FreeMatrix>,
    ) -> bool {
        match self {
            Self::Vacuum(e) => e.finalize(state, options, material, data, h, transport),
            Self::Dense(e) => e.finalize(state, options, material, data, h, transport),
        }
    }
}

/// Matrix `M` with `M·v = v × b` for every `v`.
pub(crate) fn cross_matrix(b: &Vector3) -> Matrix3 {
    Matrix3::new(
        0.0, b.z, -b.y, //
        -b.z, 0.0, b.x, //
        b.y, -b.x, 0.0,
    )
}

/// Applies a cross product with `b` to every column of `m`.
pub(crate) fn mat_cross(m: &Matrix3, b: &Vector3) -> Matrix3 {
    let mut out = Matrix3::zeros();
    for c in 0..3 {
        let col: Vector3 = m.column(c).into();
        out.set_column(c, &col.cross(b));
    }
    out
}

/// The field-dependent part of the step's transport matrix.
///
/// Linearizes the committed position and direction updates with respect to
/// the free parameters at the step start, using the staged field samples,
/// `k` vectors, and Lorentz coefficients of the accepted trial. `free_qop`
/// is the step-start value of the q/p parameter, which is what the time row
/// differentiates against; for a neutral track the Lorentz coefficients
/// vanish and with them every field-bending block. The q/p row beyond the
/// shared `∂t/∂(q/p)` entry is the caller's business.
pub(crate) fn directional_transport(
    direction: &Vector3,
    mass: f64,
    momentum: f64,
    free_qop: f64,
    data: &StageData,
    h: f64,
) -> FreeMatrix {
    let half_h = 0.5 * h;
    let (b1, b2, b3) = (&data.field[0], &data.field[1], &data.field[3]);
    let (k1, k2, k3) = (&data.k[0], &data.k[1], &data.k[2]);
    let qop = &data.qop;

    let dk1dl = direction.cross(b1);
    let dk2dl = (direction + half_h * k1).cross(b2) + qop[1] * half_h * dk1dl.cross(b2);
    let dk3dl = (direction + half_h * k2).cross(b2) + qop[2] * half_h * dk2dl.cross(b2);
    let dk4dl = (direction + h * k3).cross(b3) + qop[3] * h * dk3dl.cross(b3);

    let dk1dt = qop[0] * cross_matrix(b1);
    let dk2dt = qop[1] * mat_cross(&(Matrix3::identity() + half_h * dk1dt), b2);
    let dk3dt = qop[2] * mat_cross(&(Matrix3::identity() + half_h * dk2dt), b2);
    let dk4dt = qop[3] * mat_cross(&(Matrix3::identity() + h * dk3dt), b3);

    // A neutral track's bending is identically zero regardless of q/p.
    let charged = if qop[0] == 0.0 { 0.0 } else { 1.0 };
    let dfdt = h * (Matrix3::identity() + h / 6.0 * (dk1dt + dk2dt + dk3dt));
    let dfdl: Vector3 = charged * h * h / 6.0 * (dk1dl + dk2dl + dk3dl);
    let dgdt = Matrix3::identity() + h / 6.0 * (dk1dt + 2.0 * (dk2dt + dk3dt) + dk4dt);
    let dgdl: Vector3 = charged * h / 6.0 * (dk1dl + 2.0 * (dk2dl + dk3dl) + dk4dl);

    let mut d = FreeMatrix::identity();
    d.fixed_view_mut::<3, 3>(free::X, free::DX).copy_from(&dfdt);
    d.fixed_view_mut::<3, 1>(free::X, free::QOP)
        .copy_from(&dfdl);
    d.fixed_view_mut::<3, 3>(free::DX, free::DX)
        .copy_from(&dgdt);
    d.fixed_view_mut::<3, 1>(free::DX, free::QOP)
        .copy_from(&dgdl);
    d[(free::T, free::QOP)] =
        h * mass * mass * free_qop / (1.0 + (mass / momentum).powi(2)).sqrt();
    d
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn cross_matrix_matches_cross_product() {
        let b = Vector3::new(0.3, -1.2, 2.5);
        let v = Vector3::new(1.0, 2.0, -0.5);
        assert_relative_eq!(cross_matrix(&b) * v, v.cross(&b), epsilon = 1e-15);
    }

    #[test]
    fn mat_cross_applies_columnwise() {
        let b = Vector3::new(0.5, 1.5, -0.25);
        let m = Matrix3::new(
            1.0, 0.0, 2.0, //
            0.0, 1.0, -1.0, //
            3.0, 0.0, 1.0,
        );
        let out = mat_cross(&m, &b);
        for c in 0..3 {
            let col: Vector3 = m.column(c).into();
            assert_relative_eq!(Vector3::from(out.column(c)), col.cross(&b), epsilon = 1e-15);
        }
    }

    #[test]
    fn transport_without_field_is_straight_line() {
        let data = StageData {
            qop: [0.5; 4],
            ..StageData::default()
        };
        let h = 2.0;
        let d = directional_transport(&Vector3::x(), 0.0, 2.0, 0.5, &data, h);

        let mut expected = FreeMatrix::identity();
        expected
            .fixed_view_mut::<3, 3>(free::X, free::DX)
            .copy_from(&(h * Matrix3::identity()));
        assert_relative_eq!(d, expected, epsilon = 1e-15);
    }
}

//! Covariance transport and frame extraction.
//!
//! The stepper accumulates its linearization in the free frame; this
//! module folds that accumulation into a bound-frame covariance whenever a
//! track is materialized at a surface or as curvilinear parameters, then
//! rebases the state so subsequent steps linearize against the new frame.

use gyre_core::{
    PlaneSurface,
    types::{BoundMatrix, BoundRowVector, BoundVector, FreeMatrix, FreeVector, free},
};

use crate::TrackState;

/// A track materialized in a bound frame.
///
/// `jacobian` is the accumulated bound-to-bound Jacobian since the last
/// materialization, `path_length` the signed path since the last rebase.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundState {
    pub parameters: BoundVector,
    pub covariance: Option<BoundMatrix>,
    pub jacobian: BoundMatrix,
    pub path_length: f64,
}

/// Folds the accumulated free-frame transport into the covariance at
/// `surface` and rebases the state's linearization there.
///
/// The projection term removes the variation along the trajectory itself:
/// a perturbed track reaches the surface at a different path length, and
/// the first-order correction for that is `derivative · s` with
/// `s = nᵀ·J_pos / (n·d)`. No-op when the state carries no covariance.
pub fn transport_covariance_to_bound(state: &mut TrackState, surface: &PlaneSurface) {
    if !state.cov_transport {
        return;
    }

    state.jac_to_global = state.jac_transport * state.jac_to_global;

    let normal = surface.normal();
    let positions = state.jac_to_global.fixed_view::<3, 6>(free::X, 0);
    let correction: BoundRowVector =
        (normal.transpose() * positions) / normal.dot(&state.direction);
    let jac_to_local = surface.free_to_bound_jacobian(&state.direction);
    let jac_full: BoundMatrix =
        jac_to_local * (state.jac_to_global - state.derivative * correction);

    state.covariance = jac_full * state.covariance * jac_full.transpose();
    state.jacobian = jac_full * state.jacobian;

    state.jac_transport = FreeMatrix::identity();
    state.derivative = FreeVector::zeros();
    state.jac_to_global = surface.bound_to_free_jacobian(&state.direction);
}

/// [`transport_covariance_to_bound`] against the curvilinear frame at the
/// current position, where the frame normal is the direction of flight.
pub fn transport_covariance_to_curvilinear(state: &mut TrackState) {
    let surface = PlaneSurface::curvilinear(state.position, state.direction);
    transport_covariance_to_bound(state, &surface);
}

/// Materializes the track at `surface`, transporting the covariance there
/// first. Resets the accumulated bound Jacobian.
pub fn bound_state(state: &mut TrackState, surface: &PlaneSurface) -> BoundState {
    transport_covariance_to_bound(state, surface);
    materialize(state, surface)
}

/// Materializes the track as curvilinear parameters at the current
/// position. Resets the accumulated bound Jacobian.
pub fn curvilinear_state(state: &mut TrackState) -> BoundState {
    let surface = PlaneSurface::curvilinear(state.position, state.direction);
    transport_covariance_to_bound(state, &surface);
    materialize(state, &surface)
}

fn materialize(state: &mut TrackState, surface: &PlaneSurface) -> BoundState {
    let result = BoundState {
        parameters: surface.free_to_bound_parameters(&state.free_parameters()),
        covariance: state.cov_transport.then_some(state.covariance),
        jacobian: state.jacobian,
        path_length: state.path_accumulated,
    };
    state.jacobian = BoundMatrix::identity();
    result
}

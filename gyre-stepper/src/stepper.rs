//! The adaptive Runge-Kutta-Nyström stepper.

use gyre_core::{
    MagneticField, Material, NavigationDirection, StepSizeSlot,
    types::{BoundMatrix, FreeMatrix, FreeVector, Vector3, free},
};

use crate::{
    Auctioneer, StepperError, TrackState,
    extension::{Extension, StageData, SteppingExtension, VacuumExtension},
    options::StepperOptions,
};

/// Floor for the local error estimate, so that error-based step scaling
/// stays finite in field-free regions.
const ERROR_FLOOR: f64 = 1e-20;

/// Bounds and prefactor of the error-based step rescaling.
const SCALE_MIN: f64 = 0.2;
const SCALE_MAX: f64 = 4.0;
const SCALE_SAFETY: f64 = 0.8;

/// Propagates a [`TrackState`] through the magnetic field `F` one adaptive
/// step at a time.
///
/// Each step runs a 4-stage Runge-Kutta-Nyström trial at the current
/// constrained step size, estimates the local truncation error from the
/// stage spread, and shrinks and retries until the state's tolerance is
/// met. The physics of the stages is delegated to the configured
/// [`Extension`]s, arbitrated once per step by the [`Auctioneer`].
#[derive(Debug, Clone)]
pub struct Stepper<F: MagneticField> {
    field: F,
    options: StepperOptions,
    extensions: Vec<Extension>,
    auctioneer: Auctioneer,
}

impl<F: MagneticField> Stepper<F> {
    /// Creates a stepper over `field` with the vacuum extension only.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending knob when `options` fails
    /// validation.
    pub fn new(field: F, options: StepperOptions) -> Result<Self, &'static str> {
        options.validate()?;
        Ok(Self {
            field,
            options,
            extensions: vec![Extension::Vacuum(VacuumExtension)],
            auctioneer: Auctioneer::default(),
        })
    }

    /// Replaces the extension list.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Replaces the bid arbitration strategy.
    #[must_use]
    pub fn with_auctioneer(mut self, auctioneer: Auctioneer) -> Self {
        self.auctioneer = auctioneer;
        self
    }

    pub fn options(&self) -> &StepperOptions {
        &self.options
    }

    /// Creates a track state governed by this stepper's error tolerance.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn make_state(
        &self,
        position: Vector3,
        direction: Vector3,
        momentum: f64,
        charge: f64,
        time: f64,
        covariance: Option<BoundMatrix>,
        navigation_direction: NavigationDirection,
        step_size: f64,
    ) -> TrackState {
        TrackState::new(
            position,
            direction,
            momentum,
            charge,
            time,
            covariance,
            navigation_direction,
            step_size,
            self.options.tolerance,
        )
    }

    /// Samples the magnetic field at a global position.
    pub fn field(&self, position: &Vector3) -> Vector3 {
        self.field.sample(position)
    }

    pub fn position(&self, state: &TrackState) -> Vector3 {
        state.position
    }

    pub fn direction(&self, state: &TrackState) -> Vector3 {
        state.direction
    }

    pub fn momentum(&self, state: &TrackState) -> f64 {
        state.momentum
    }

    pub fn charge(&self, state: &TrackState) -> f64 {
        state.charge
    }

    pub fn time(&self, state: &TrackState) -> f64 {
        state.time
    }

    /// Overwrites the state from a free-parameter vector, optionally
    /// replacing or starting the carried covariance.
    pub fn update(
        &self,
        state: &mut TrackState,
        parameters: &FreeVector,
        covariance: Option<BoundMatrix>,
    ) {
        state.update_free(parameters, covariance);
    }

    /// Overwrites the kinematic state piecewise.
    pub fn update_parts(
        &self,
        state: &mut TrackState,
        position: Vector3,
        direction: Vector3,
        momentum: f64,
        time: f64,
    ) {
        state.update_parts(position, direction, momentum, time);
    }

    /// Constrains the next step through the actor slot, remembering the
    /// previously effective step size and dropping stale constraints in
    /// the other non-user slots.
    pub fn set_step_size(&self, state: &mut TrackState, value: f64) {
        state.previous_step_size = state.step_size.value();
        state.step_size.update(StepSizeSlot::Actor, value, true);
    }

    /// Lifts the accuracy constraint, falling back to the remaining slots.
    pub fn release_step_size(&self, state: &mut TrackState) {
        state.step_size.release(StepSizeSlot::Accuracy);
    }

    /// Performs one adaptive step, returning the signed accepted length.
    ///
    /// On success the state holds the post-step kinematics, the updated
    /// Jacobian bookkeeping, and a rescaled accuracy constraint proposing
    /// the next step. On failure the state is untouched.
    ///
    /// # Errors
    ///
    /// - [`StepperError::StepSizeAdjustmentFailed`] when the trial budget
    ///   runs out before the tolerance is met.
    /// - [`StepperError::StepSizeStalled`] when shrinking pushes the trial
    ///   below the configured cutoff.
    /// - [`StepperError::StepInvalid`] when no extension wins the auction
    ///   or a winning extension vetoes the finalization.
    pub fn step(&self, state: &mut TrackState, material: &Material) -> Result<f64, StepperError> {
        let bids: Vec<u32> = self
            .extensions
            .iter()
            .map(|e| e.bid(state, material))
            .collect();
        let mask = self.auctioneer.select(&bids);
        if mask == 0 {
            return Err(StepperError::StepInvalid);
        }
        let active: Vec<&Extension> = self
            .extensions
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, e)| e)
            .collect();

        let mut data = StageData::default();
        let mut h = state.step_size.value();
        let mut trials = 0;
        let scale = loop {
            if trials >= self.options.max_rk_step_trials {
                return Err(StepperError::StepSizeAdjustmentFailed);
            }
            trials += 1;
            data.reset();

            if let Some(error) = self.try_stages(state, material, &active, &mut data, h) {
                let scale =
                    (SCALE_SAFETY * (state.tolerance / error).powf(0.25)).clamp(SCALE_MIN, SCALE_MAX);
                if error <= state.tolerance {
                    break scale;
                }
                h *= scale;
            } else {
                // A stage veto carries no error estimate to scale by.
                h *= 0.5;
            }
            if h.abs() < self.options.step_size_cut_off {
                return Err(StepperError::StepSizeStalled);
            }
        };

        // Commit onto a scratch copy so a finalize veto leaves the state
        // untouched.
        let mut next = state.clone();
        next.position +=
            h * state.direction + h * h / 6.0 * (data.k[0] + data.k[1] + data.k[2]);
        next.direction = (state.direction
            + h / 6.0 * (data.k[0] + 2.0 * (data.k[1] + data.k[2]) + data.k[3]))
            .normalize();
        let end_direction = next.direction;
        next.derivative
            .fixed_rows_mut::<3>(free::X)
            .copy_from(&end_direction);
        next.derivative
            .fixed_rows_mut::<3>(free::DX)
            .copy_from(&data.k[3]);

        let mut transport = FreeMatrix::identity();
        for extension in &active {
            let slot = state.cov_transport.then_some(&mut transport);
            if !extension.finalize(&mut next, &self.options, material, &mut data, h, slot) {
                return Err(StepperError::StepInvalid);
            }
        }
        if state.cov_transport {
            next.jac_transport = transport * next.jac_transport;
        }

        next.path_accumulated += h;
        next.previous_step_size = h;
        next.step_size.set(StepSizeSlot::Accuracy, h * scale);
        *state = next;
        Ok(h)
    }

    /// Runs the four stages of one trial, returning the error estimate or
    /// `None` when a stage vetoed.
    fn try_stages(
        &self,
        state: &TrackState,
        material: &Material,
        active: &[&Extension],
        data: &mut StageData,
        h: f64,
    ) -> Option<f64> {
        let field_first = self.field.sample(&state.position);
        for extension in active {
            if !extension.stage(state, &self.options, material, data, 0, h, &field_first) {
                return None;
            }
        }

        let half_h = 0.5 * h;
        let position_mid =
            state.position + half_h * state.direction + h * h / 8.0 * data.k[0];
        let field_mid = self.field.sample(&position_mid);
        for stage in [1, 2] {
            for extension in active {
                if !extension.stage(state, &self.options, material, data, stage, h, &field_mid) {
                    return None;
                }
            }
        }

        let position_end = state.position + h * state.direction + h * h / 2.0 * data.k[2];
        let field_end = self.field.sample(&position_end);
        for extension in active {
            if !extension.stage(state, &self.options, material, data, 3, h, &field_end) {
                return None;
            }
        }

        let spread = data.k[0] - data.k[1] - data.k[2] + data.k[3];
        Some((h * h * spread.abs().sum()).max(ERROR_FLOOR))
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use gyre_core::{ConstantField, NavigationDirection, NullField, units};

    use super::*;

    fn vacuum_state(direction: NavigationDirection, step_size: f64, tolerance: f64) -> TrackState {
        TrackState::new(
            Vector3::zeros(),
            Vector3::x(),
            1.0,
            -1.0,
            0.0,
            None,
            direction,
            step_size,
            tolerance,
        )
    }

    #[test]
    fn field_free_step_is_a_straight_line() {
        let stepper = Stepper::new(NullField, StepperOptions::default()).unwrap();
        let mut state = vacuum_state(NavigationDirection::Forward, 25.0, 1e-4);

        let h = stepper.step(&mut state, &Material::vacuum()).unwrap();

        assert_relative_eq!(h, 25.0);
        assert_relative_eq!(state.position, Vector3::new(25.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(state.direction, Vector3::x(), epsilon = 1e-15);
        assert_eq!(state.previous_step_size, 25.0);
        assert_relative_eq!(state.path_accumulated, 25.0);
        assert!(state.time > 25.0, "massive particle is slower than light");
    }

    #[test]
    fn backward_navigation_steps_with_negative_length() {
        let stepper = Stepper::new(NullField, StepperOptions::default()).unwrap();
        let mut state = vacuum_state(NavigationDirection::Backward, 10.0, 1e-4);

        let h = stepper.step(&mut state, &Material::vacuum()).unwrap();

        assert_relative_eq!(h, -10.0);
        assert_relative_eq!(state.position.x, -10.0, epsilon = 1e-12);
        assert_relative_eq!(state.path_accumulated, -10.0);
    }

    #[test]
    fn bending_preserves_direction_norm_and_momentum() {
        let field = ConstantField::new(Vector3::new(0.0, 0.0, 2.0 * units::T));
        let stepper = Stepper::new(field, StepperOptions::default()).unwrap();
        let mut state = vacuum_state(NavigationDirection::Forward, 100.0, 1e-4);

        let h = stepper.step(&mut state, &Material::vacuum()).unwrap();

        assert!(h > 0.0);
        assert_relative_eq!(state.direction.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(state.momentum, 1.0);
        // Negative charge in +z field curls the initially +x track toward +y.
        assert!(state.direction.y > 0.0);
        assert_abs_diff_eq!(state.direction.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn neutral_track_ignores_the_field() {
        let field = ConstantField::new(Vector3::new(0.0, 0.0, 2.0 * units::T));
        let stepper = Stepper::new(field, StepperOptions::default()).unwrap();
        let mut state = TrackState::new(
            Vector3::zeros(),
            Vector3::x(),
            1.0,
            0.0,
            0.0,
            None,
            NavigationDirection::Forward,
            100.0,
            1e-4,
        );

        let h = stepper.step(&mut state, &Material::vacuum()).unwrap();

        assert_relative_eq!(h, 100.0);
        assert_relative_eq!(state.direction, Vector3::x(), epsilon = 1e-15);
        assert_relative_eq!(
            state.position,
            Vector3::new(100.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn made_states_inherit_the_configured_tolerance() {
        let options = StepperOptions {
            tolerance: 1e-7,
            ..StepperOptions::default()
        };
        let stepper = Stepper::new(NullField, options).unwrap();

        let state = stepper.make_state(
            Vector3::zeros(),
            Vector3::x(),
            1.0,
            -1.0,
            0.0,
            None,
            NavigationDirection::Forward,
            25.0,
        );

        assert_eq!(state.tolerance, 1e-7);
    }

    #[test]
    fn impossible_tolerance_stalls_once_shrunk_past_the_cutoff() {
        let options = StepperOptions {
            step_size_cut_off: 1e-3,
            ..StepperOptions::default()
        };
        let stepper = Stepper::new(NullField, options).unwrap();
        // The error floor keeps the estimate above this tolerance forever.
        let mut state = vacuum_state(NavigationDirection::Forward, 25.0, 1e-21);

        assert_eq!(
            stepper.step(&mut state, &Material::vacuum()),
            Err(StepperError::StepSizeStalled)
        );
        assert_relative_eq!(state.position, Vector3::zeros());
    }

    #[test]
    fn zero_trial_budget_fails_before_the_first_stage() {
        let options = StepperOptions {
            max_rk_step_trials: 0,
            ..StepperOptions::default()
        };
        let stepper = Stepper::new(NullField, options).unwrap();
        let mut state = vacuum_state(NavigationDirection::Forward, 25.0, 1e-4);

        assert_eq!(
            stepper.step(&mut state, &Material::vacuum()),
            Err(StepperError::StepSizeAdjustmentFailed)
        );
    }

    #[test]
    fn empty_auction_refuses_to_step() {
        let stepper = Stepper::new(NullField, StepperOptions::default())
            .unwrap()
            .with_extensions(vec![]);
        let mut state = vacuum_state(NavigationDirection::Forward, 25.0, 1e-4);

        assert_eq!(
            stepper.step(&mut state, &Material::vacuum()),
            Err(StepperError::StepInvalid)
        );
    }

    #[test]
    fn set_and_release_step_size_drive_the_slots() {
        let stepper = Stepper::new(NullField, StepperOptions::default()).unwrap();
        let mut state = vacuum_state(NavigationDirection::Forward, 25.0, 1e-4);

        stepper.set_step_size(&mut state, 3.0);
        assert_relative_eq!(state.step_size.value(), 3.0);
        assert_relative_eq!(state.previous_step_size, 25.0);

        state.step_size.release(StepSizeSlot::Actor);
        stepper.release_step_size(&mut state);
        assert_relative_eq!(state.step_size.value(), 25.0);
    }

    #[test]
    fn accepted_step_proposes_a_grown_accuracy_constraint() {
        let field = ConstantField::new(Vector3::new(0.0, 0.0, 2.0 * units::T));
        let stepper = Stepper::new(field, StepperOptions::default()).unwrap();
        let mut state = vacuum_state(NavigationDirection::Forward, 1.0, 1e-4);

        let h = stepper.step(&mut state, &Material::vacuum()).unwrap();

        // A 1 mm step is far below the error budget, so the accuracy slot
        // grows the next proposal beyond the accepted step.
        assert_relative_eq!(h, 1.0);
        let next = state.step_size.value_of(StepSizeSlot::Accuracy);
        assert!(next > h);
        assert!(next <= SCALE_MAX * h + 1e-12);
    }
}

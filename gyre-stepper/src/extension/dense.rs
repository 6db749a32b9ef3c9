//! Energy loss in dense volume material.

use gyre_core::{
    Material,
    types::{FreeMatrix, Vector3, free},
};

use super::{STAGE_OFFSET, StageData, SteppingExtension, directional_transport};
use crate::{TrackState, options::StepperOptions};

/// Material-aware extension applying mean ionization loss along the step.
///
/// Outbids [`VacuumExtension`](super::VacuumExtension) inside material and
/// withdraws in vacuum or for neutral particles. The loss rate is sampled
/// once at the step start and treated as constant across the step; each
/// stage then re-derives q/p from the partially depleted energy. A stage
/// or finalize that would push the energy to the particle mass, or the
/// momentum below the configured cutoff, vetoes the step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenseExtension;

impl DenseExtension {
    /// Momentum left after `path` of depletion, or `None` when the track
    /// ranges out.
    fn depleted_momentum(
        options: &StepperOptions,
        data: &StageData,
        path: f64,
    ) -> Option<f64> {
        let energy = data.energy - data.loss * path;
        if energy <= options.mass {
            return None;
        }
        let momentum = (energy * energy - options.mass * options.mass).sqrt();
        if momentum <= options.momentum_cut_off {
            return None;
        }
        Some(momentum)
    }
}

impl SteppingExtension for DenseExtension {
    fn bid(&self, state: &TrackState, material: &Material) -> u32 {
        if material.is_vacuum() || state.charge == 0.0 {
            0
        } else {
            2
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
        data.field[stage] = *field;

        if stage == 0 {
            let p = state.momentum;
            if p <= options.momentum_cut_off {
                return false;
            }
            data.energy = (p * p + options.mass * options.mass).sqrt();
            data.loss = material.mean_energy_loss(p, options.mass, state.charge);
            data.qop[0] = state.qop();
            data.k[0] = data.qop[0] * state.direction.cross(field);
            return true;
        }

        let Some(momentum) = Self::depleted_momentum(options, data, STAGE_OFFSET[stage] * h)
        else {
            return false;
        };
        data.qop[stage] = state.charge / momentum;
        let transported = state.direction + STAGE_OFFSET[stage] * h * data.k[stage - 1];
        data.k[stage] = data.qop[stage] * transported.cross(field);
        true
    }

    fn finalize(
        &self,
        state: &mut TrackState,
        options: &StepperOptions,
        _material: &Material,
        data: &mut StageData,
        h: f64,
        transport: Option<&mut FreeMatrix>,
    ) -> bool {
        let Some(momentum) = Self::depleted_momentum(options, data, h) else {
            return false;
        };
        let energy = data.energy - data.loss * h;

        let dtds = data.energy / state.momentum;
        state.time += h * dtds;
        state.derivative[free::T] = dtds;
        state.derivative[free::QOP] =
            state.charge * data.loss * energy / momentum.powi(3);

        if let Some(d) = transport {
            *d = directional_transport(
                &state.direction,
                options.mass,
                state.momentum,
                state.qop(),
                data,
                h,
            );
            let qop_out = state.charge / momentum;
            d[(free::T, free::QOP)] = h * options.mass * options.mass * qop_out
                / (1.0 + (options.mass / momentum).powi(2)).sqrt();
            d[(free::QOP, free::QOP)] =
                state.momentum.powi(3) * energy / (momentum.powi(3) * data.energy);
        }

        state.momentum = momentum;
        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use gyre_core::{NavigationDirection, units};

    use super::*;

    fn pion(momentum: f64) -> TrackState {
        TrackState::new(
            Vector3::zeros(),
            Vector3::x(),
            momentum,
            -1.0,
            0.0,
            None,
            NavigationDirection::Forward,
            1.0 * units::M,
            1e-4,
        )
    }

    #[test]
    fn withdraws_in_vacuum_and_for_neutrals() {
        let charged = pion(1.0);
        let mut neutral = pion(1.0);
        neutral.charge = 0.0;

        assert_eq!(DenseExtension.bid(&charged, &Material::vacuum()), 0);
        assert_eq!(DenseExtension.bid(&neutral, &Material::beryllium()), 0);
        assert_eq!(DenseExtension.bid(&charged, &Material::beryllium()), 2);
    }

    #[test]
    fn stages_deplete_energy_monotonically() {
        let state = pion(0.5);
        let options = StepperOptions::default();
        let material = Material::beryllium();
        let field = Vector3::new(0.0, 0.0, 2.0 * units::T);
        let mut data = StageData::default();
        let h = 100.0;

        for stage in 0..4 {
            assert!(DenseExtension.stage(
                &state, &options, &material, &mut data, stage, h, &field,
            ));
        }
        assert!(data.loss > 0.0);
        // Negative charge: q/p grows in magnitude as the momentum depletes.
        assert!(data.qop[1] < data.qop[0]);
        assert!(data.qop[3] < data.qop[1]);
        assert_relative_eq!(data.qop[1], data.qop[2], epsilon = 1e-18);
    }

    #[test]
    fn finalize_applies_the_full_loss() {
        let mut state = pion(0.5);
        let options = StepperOptions::default();
        let material = Material::beryllium();
        let mut data = StageData::default();
        let h = 100.0;

        assert!(DenseExtension.stage(
            &state,
            &options,
            &material,
            &mut data,
            0,
            h,
            &Vector3::zeros(),
        ));
        assert!(DenseExtension.finalize(&mut state, &options, &material, &mut data, h, None));

        let expected_energy = data.energy - data.loss * h;
        let expected_momentum =
            (expected_energy * expected_energy - options.mass * options.mass).sqrt();
        assert!(state.momentum < 0.5);
        assert_relative_eq!(state.momentum, expected_momentum, epsilon = 1e-15);
        assert!(state.derivative[free::QOP] < 0.0);
    }

    #[test]
    fn ranged_out_step_is_vetoed() {
        let mut state = pion(0.05);
        let options = StepperOptions::default();
        let material = Material::beryllium();
        let mut data = StageData::default();
        // Long enough that the mean loss eats the whole kinetic energy.
        let h = 1.0e6;

        assert!(DenseExtension.stage(
            &state,
            &options,
            &material,
            &mut data,
            0,
            h,
            &Vector3::zeros(),
        ));
        assert!(!DenseExtension.finalize(&mut state, &options, &material, &mut data, h, None));
        assert_relative_eq!(state.momentum, 0.05);
    }
}

//! Pure magnetic-field kinematics.

use gyre_core::{
    Material,
    types::{FreeMatrix, Vector3, free},
};

use super::{STAGE_OFFSET, StageData, SteppingExtension, directional_transport};
use crate::{TrackState, options::StepperOptions};

/// The baseline extension: Lorentz-force bending with no material
/// interaction. Always applicable, with a modest constant bid so that
/// environment-aware extensions can outbid it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacuumExtension;

impl SteppingExtension for VacuumExtension {
    fn bid(&self, _state: &TrackState, _material: &Material) -> u32 {
        1
    }

    fn stage(
        &self,
        state: &TrackState,
        _options: &StepperOptions,
        _material: &Material,
        data: &mut StageData,
        stage: usize,
        h: f64,
        field: &Vector3,
    ) -> bool {
        // The Lorentz coefficient, not the free q/p parameter: a neutral
        // track does not bend.
        let qop = state.charge / state.momentum;
        data.field[stage] = *field;
        data.qop[stage] = qop;
        data.k[stage] = if stage == 0 {
            qop * state.direction.cross(field)
        } else {
            let transported = state.direction + STAGE_OFFSET[stage] * h * data.k[stage - 1];
            qop * transported.cross(field)
        };
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
        let dtds = (1.0 + (options.mass / state.momentum).powi(2)).sqrt();
        state.time += h * dtds;
        state.derivative[free::T] = dtds;

        if let Some(d) = transport {
            *d = directional_transport(
                &state.direction,
                options.mass,
                state.momentum,
                state.qop(),
                data,
                h,
            );
        }
        true
    }
}

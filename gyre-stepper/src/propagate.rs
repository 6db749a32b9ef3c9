//! A minimal propagation loop over a stack of homogeneous slabs.
//!
//! This is deliberately not a full navigator. It models the detector as
//! consecutive material regions bounded by parallel planes along one axis,
//! targets the next boundary through the navigator step-size slot, and
//! runs the stepper until the track leaves the world or a limit trips.

use thiserror::Error;

use gyre_core::{
    MagneticField, Material, StepSizeSlot, units,
    types::Vector3,
};

use crate::{
    StepperError, TrackState,
    options::PropagationOptions,
    stepper::Stepper,
};

/// How far past a boundary the loop aims, and how far ahead of the current
/// position it samples material, so a track sitting on a boundary binds to
/// the region it is entering.
const SURFACE_TOLERANCE: f64 = 0.1 * units::UM;

/// One homogeneous region of the detector stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Slab {
    pub material: Material,
    pub thickness: f64,
}

impl Slab {
    pub fn new(material: Material, thickness: f64) -> Self {
        Self {
            material,
            thickness,
        }
    }

    pub fn vacuum(thickness: f64) -> Self {
        Self::new(Material::vacuum(), thickness)
    }
}

/// A stack of slabs along a world axis; everything outside the stack is
/// end-of-world.
#[derive(Debug, Clone)]
pub struct SlabDetector {
    axis: Vector3,
    /// Sorted boundary coordinates along `axis`, one more than slabs.
    boundaries: Vec<f64>,
    materials: Vec<Material>,
}

impl SlabDetector {
    /// Stacks `slabs` along `axis` starting at coordinate `start`.
    pub fn new(axis: Vector3, start: f64, slabs: impl IntoIterator<Item = Slab>) -> Self {
        let mut boundaries = vec![start];
        let mut materials = Vec::new();
        let mut edge = start;
        for slab in slabs {
            edge += slab.thickness;
            boundaries.push(edge);
            materials.push(slab.material);
        }
        Self {
            axis: axis.normalize(),
            boundaries,
            materials,
        }
    }

    pub fn axis(&self) -> Vector3 {
        self.axis
    }

    fn coordinate(&self, position: &Vector3) -> f64 {
        self.axis.dot(position)
    }

    /// The material at a coordinate along the axis, or `None` outside the
    /// world.
    pub fn material_at(&self, coordinate: f64) -> Option<&Material> {
        let index = self
            .boundaries
            .windows(2)
            .position(|w| coordinate >= w[0] && coordinate < w[1])?;
        self.materials.get(index)
    }

    /// Signed straight-line step to the nearest boundary ahead in the
    /// direction of motion, or `None` when moving parallel to the planes.
    fn step_to_boundary(&self, coordinate: f64, along: f64, sign: f64) -> Option<f64> {
        if along.abs() < 1e-12 {
            return None;
        }
        self.boundaries
            .iter()
            .filter_map(|&boundary| {
                let h = (boundary - coordinate) / along;
                (h * sign > 0.0).then_some(h)
            })
            .min_by(|a, b| a.abs().total_cmp(&b.abs()))
    }
}

/// Snapshot of the track after one accepted step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub position: Vector3,
    pub direction: Vector3,
    pub momentum: f64,
    pub time: f64,
    pub path_length: f64,
}

impl StepRecord {
    fn of(state: &TrackState) -> Self {
        Self {
            position: state.position,
            direction: state.direction,
            momentum: state.momentum,
            time: state.time,
            path_length: state.path_accumulated,
        }
    }
}

/// The completed propagation of one track out of the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    pub state: TrackState,
    pub steps: Vec<StepRecord>,
}

impl Propagation {
    pub fn path_length(&self) -> f64 {
        self.state.path_accumulated
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PropagationError {
    #[error("stepping failed: {0}")]
    Step(#[from] StepperError),

    /// The step budget ran out before the track left the world.
    #[error("step budget exhausted inside the detector")]
    StepLimitReached,
}

/// Runs `state` through `detector` until it exits the world.
///
/// Before every step the navigator slot is constrained to the straight-line
/// distance to the next slab boundary (plus a small overshoot), capped at
/// the configured maximum step size, so no single step mixes materials.
///
/// # Errors
///
/// Fails when a step fails or when `max_steps` is exhausted inside the
/// world.
pub fn propagate<F: MagneticField>(
    stepper: &Stepper<F>,
    detector: &SlabDetector,
    mut state: TrackState,
    options: &PropagationOptions,
) -> Result<Propagation, PropagationError> {
    let mut steps = Vec::new();

    for _ in 0..options.max_steps {
        let sign = state.navigation_direction.sign();
        let along = detector.axis.dot(&state.direction);
        let coordinate = detector.coordinate(&state.position);
        let probe = coordinate + SURFACE_TOLERANCE * (along * sign).signum();

        let Some(material) = detector.material_at(probe) else {
            return Ok(Propagation { state, steps });
        };
        let material = *material;

        let target = detector
            .step_to_boundary(coordinate, along, sign)
            .map_or(sign * options.max_step_size, |h| {
                let limited = (h.abs() + SURFACE_TOLERANCE).min(options.max_step_size);
                sign * limited
            });
        state.step_size.set(StepSizeSlot::Navigator, target);

        stepper.step(&mut state, &material)?;
        steps.push(StepRecord::of(&state));
    }

    Err(PropagationError::StepLimitReached)
}

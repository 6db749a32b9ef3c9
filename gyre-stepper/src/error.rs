use thiserror::Error;

/// Step-local failures of the adaptive stepper.
///
/// All variants abort the current propagation leg; the track state remains
/// at the last accepted step and the caller decides whether to give up or
/// retry with different seeds.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StepperError {
    /// The trial step shrank below the configured cutoff without making
    /// forward progress.
    #[error("step size fell below the cutoff without progress")]
    StepSizeStalled,

    /// The error-control loop exhausted its trial budget without meeting
    /// the tolerance.
    #[error("step size adjustment exhausted its trial budget")]
    StepSizeAdjustmentFailed,

    /// A contributing extension reported an invalid result while finalizing
    /// the step, e.g. a particle losing all its energy in material.
    #[error("an extension rejected the step during finalization")]
    StepInvalid,
}

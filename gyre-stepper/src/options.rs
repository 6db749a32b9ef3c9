use serde::{Deserialize, Serialize};

use gyre_core::units;

/// Numeric knobs of a single propagation, shared by every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepperOptions {
    /// Particle mass hypothesis in GeV.
    pub mass: f64,
    /// Local truncation error tolerance for step acceptance.
    pub tolerance: f64,
    /// Trial steps below this length abort with a stall error.
    pub step_size_cut_off: f64,
    /// Maximum number of shrink-and-retry trials within one step.
    pub max_rk_step_trials: usize,
    /// Tracks whose momentum falls below this value range out.
    pub momentum_cut_off: f64,
}

impl Default for StepperOptions {
    fn default() -> Self {
        Self {
            mass: 139.57039 * units::MEV,
            tolerance: 1e-4,
            step_size_cut_off: 0.0,
            max_rk_step_trials: 10_000,
            momentum_cut_off: 0.0,
        }
    }
}

impl StepperOptions {
    /// Validates that all knobs are finite and within range.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending knob.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err("mass must be finite and non-negative");
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err("tolerance must be finite and positive");
        }
        if !self.step_size_cut_off.is_finite() {
            return Err("step_size_cut_off must be finite");
        }
        if !self.momentum_cut_off.is_finite() || self.momentum_cut_off < 0.0 {
            return Err("momentum_cut_off must be finite and non-negative");
        }
        Ok(())
    }
}

/// Limits of the slab-stack propagation driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropagationOptions {
    /// Hard bound on the number of accepted steps.
    pub max_steps: usize,
    /// Unsigned upper bound on any single step.
    pub max_step_size: f64,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_step_size: 1.5 * units::M,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(StepperOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let options = StepperOptions {
            tolerance: 0.0,
            ..StepperOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn rejects_negative_mass() {
        let options = StepperOptions {
            mass: -1.0,
            ..StepperOptions::default()
        };
        assert!(options.validate().is_err());
    }
}

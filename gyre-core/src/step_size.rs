use std::fmt;

/// The sources that may constrain a step size, each owning one slot in a
/// [`ConstrainedStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSizeSlot {
    /// Set by the stepper's local error control.
    Accuracy,
    /// Set by an actor targeting a specific surface.
    Actor,
    /// Set by the caller at construction; never released implicitly.
    User,
    /// Set by the navigation layer from volume boundaries.
    Navigator,
}

const SLOTS: [StepSizeSlot; 4] = [
    StepSizeSlot::Accuracy,
    StepSizeSlot::Actor,
    StepSizeSlot::User,
    StepSizeSlot::Navigator,
];

/// A signed step size composed of independently settable constraints.
///
/// Every slot holds a signed length whose sign matches the navigation
/// direction. The effective step is the signed minimum over all slots in
/// that direction: the smallest value when stepping forward, the largest
/// (least negative) when stepping backward. Released slots sit at the
/// signed numeric maximum and never win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstrainedStep {
    values: [f64; 4],
    direction: f64,
}

impl ConstrainedStep {
    /// Creates a step constrained only by the user slot.
    ///
    /// The sign of `value` fixes the navigation direction for all later
    /// updates and releases.
    #[must_use]
    pub fn new(value: f64) -> Self {
        let direction = if value < 0.0 { -1.0 } else { 1.0 };
        let mut values = [direction * f64::MAX; 4];
        values[StepSizeSlot::User as usize] = value;
        Self { values, direction }
    }

    /// The effective signed step: the most restrictive slot in the current
    /// navigation direction.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.direction > 0.0 {
            self.values.iter().copied().fold(f64::MAX, f64::min)
        } else {
            self.values.iter().copied().fold(-f64::MAX, f64::max)
        }
    }

    /// The current value of a single slot.
    #[must_use]
    pub fn value_of(&self, slot: StepSizeSlot) -> f64 {
        self.values[slot as usize]
    }

    /// The sign of the navigation direction this step was created with.
    #[must_use]
    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Overwrites one slot with a signed value.
    pub fn set(&mut self, slot: StepSizeSlot, value: f64) {
        self.values[slot as usize] = value;
    }

    /// Overwrites one slot, optionally releasing every other slot except
    /// the user constraint.
    pub fn update(&mut self, slot: StepSizeSlot, value: f64, release_others: bool) {
        if release_others {
            for other in SLOTS {
                if other != slot && other != StepSizeSlot::User {
                    self.release(other);
                }
            }
        }
        self.set(slot, value);
    }

    /// Returns a slot to its released state, the signed numeric maximum.
    pub fn release(&mut self, slot: StepSizeSlot) {
        self.values[slot as usize] = self.direction * f64::MAX;
    }
}

impl fmt::Display for ConstrainedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: f64| {
            if v.abs() >= f64::MAX {
                "released".to_string()
            } else {
                format!("{v}")
            }
        };
        write!(
            f,
            "(accuracy: {}, actor: {}, user: {}, navigator: {})",
            show(self.values[0]),
            show(self.values[1]),
            show(self.values[2]),
            show(self.values[3]),
        )
    }
}

//! Adaptive track propagation through magnetic fields and material.
//!
//! The central type is [`Stepper`], a 4-stage adaptive Runge-Kutta-Nyström
//! integrator over a [`MagneticField`](gyre_core::MagneticField). The
//! physics of each step is supplied by [`Extension`]s (pure field bending,
//! ionization loss in material) arbitrated per step by an [`Auctioneer`];
//! the [`TrackState`] carries the kinematics, the constrained step size,
//! and the running linearization that [`transport`] folds into a bound
//! covariance at a surface.
//!
//! ```
//! use gyre_core::{ConstantField, Material, NavigationDirection, units, types::Vector3};
//! use gyre_stepper::{Stepper, StepperOptions, TrackState};
//!
//! let field = ConstantField::new(Vector3::new(0.0, 0.0, 2.0 * units::T));
//! let stepper = Stepper::new(field, StepperOptions::default())?;
//!
//! let mut state = TrackState::new(
//!     Vector3::zeros(),
//!     Vector3::x(),
//!     1.0,
//!     -1.0,
//!     0.0,
//!     None,
//!     NavigationDirection::Forward,
//!     100.0,
//!     1e-4,
//! );
//! let h = stepper.step(&mut state, &Material::vacuum())?;
//! assert!(h > 0.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod auctioneer;
mod error;
mod state;
mod stepper;

pub mod extension;
pub mod options;
pub mod propagate;
pub mod transport;

pub use auctioneer::Auctioneer;
pub use error::StepperError;
pub use extension::{DenseExtension, Extension, StageData, SteppingExtension, VacuumExtension};
pub use options::{PropagationOptions, StepperOptions};
pub use propagate::{Propagation, PropagationError, Slab, SlabDetector, StepRecord, propagate};
pub use state::TrackState;
pub use stepper::Stepper;
pub use transport::{
    BoundState, bound_state, curvilinear_state, transport_covariance_to_bound,
    transport_covariance_to_curvilinear,
};

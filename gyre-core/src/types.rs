//! Fixed-size linear algebra aliases and parameter index constants.
//!
//! During integration a track is described by its *free* parameters, the
//! unconstrained global-frame vector `[x, y, z, t, dx, dy, dz, q/p]`.
//! At a surface it is described by its *bound* parameters,
//! `[loc0, loc1, phi, theta, q/p, t]`, where `loc0`/`loc1` are coordinates
//! in the surface's local frame.

use nalgebra::{SMatrix, SVector};

pub type Vector2 = nalgebra::Vector2<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Free-parameter vector `[x, y, z, t, dx, dy, dz, q/p]`.
pub type FreeVector = SVector<f64, 8>;

/// Linearization of free parameters with respect to free parameters.
pub type FreeMatrix = SMatrix<f64, 8, 8>;

/// Bound-parameter vector `[loc0, loc1, phi, theta, q/p, t]`.
pub type BoundVector = SVector<f64, 6>;

/// Symmetric covariance (or Jacobian) in a bound frame.
pub type BoundMatrix = SMatrix<f64, 6, 6>;

/// Jacobian of free parameters with respect to bound parameters.
pub type BoundToFreeMatrix = SMatrix<f64, 8, 6>;

/// Jacobian of bound parameters with respect to free parameters.
pub type FreeToBoundMatrix = SMatrix<f64, 6, 8>;

/// Row vector pairing with [`BoundVector`].
pub type BoundRowVector = SMatrix<f64, 1, 6>;

/// Indices into a [`FreeVector`].
pub mod free {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
    pub const T: usize = 3;
    pub const DX: usize = 4;
    pub const DY: usize = 5;
    pub const DZ: usize = 6;
    pub const QOP: usize = 7;
}

/// Indices into a [`BoundVector`].
pub mod bound {
    pub const LOC0: usize = 0;
    pub const LOC1: usize = 1;
    pub const PHI: usize = 2;
    pub const THETA: usize = 3;
    pub const QOP: usize = 4;
    pub const T: usize = 5;
}

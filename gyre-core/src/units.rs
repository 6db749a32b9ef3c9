//! Natural-unit constants.
//!
//! Lengths are measured in millimeters, energies in GeV, charge in units of
//! the elementary charge, and the speed of light is 1 (so time shares the
//! length unit divided by c). A quantity is expressed by multiplying with
//! the constant, e.g. `0.5 * units::M` or `5.0 * units::GEV`.

pub const MM: f64 = 1.0;
pub const UM: f64 = 1e-3 * MM;
pub const CM: f64 = 10.0 * MM;
pub const M: f64 = 1e3 * MM;

pub const GEV: f64 = 1.0;
pub const MEV: f64 = 1e-3 * GEV;
pub const KEV: f64 = 1e-6 * GEV;
pub const EV: f64 = 1e-9 * GEV;

/// Elementary charge.
pub const E: f64 = 1.0;

/// Seconds, from c = 299792458 m/s and c = 1.
pub const S: f64 = 299_792_458_000.0 * MM;
pub const NS: f64 = 1e-9 * S;

/// Tesla, in GeV / (e · mm).
pub const T: f64 = 0.000_299_792_458;

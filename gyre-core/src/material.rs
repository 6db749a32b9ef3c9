use serde::{Deserialize, Serialize};

use crate::units;

/// Electron mass in GeV.
const ELECTRON_MASS: f64 = 0.510_998_95e-3;

/// The Bethe constant `4π·N_A·r_e²·m_e·c²`, in MeV·cm²/mol.
const BETHE_K: f64 = 0.307_075;

/// Bulk material of a volume, as seen by the dense stepping extension.
///
/// Lengths are in mm; `rho` is the mass density in g/cm³ (converted at the
/// evaluation boundary). A default-constructed material is vacuum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Radiation length.
    pub x0: f64,
    /// Nuclear interaction length.
    pub l0: f64,
    /// Relative atomic mass.
    pub ar: f64,
    /// Atomic number.
    pub z: f64,
    /// Mass density in g/cm³.
    pub rho: f64,
}

impl Material {
    #[must_use]
    pub fn new(x0: f64, l0: f64, ar: f64, z: f64, rho: f64) -> Self {
        Self { x0, l0, ar, z, rho }
    }

    #[must_use]
    pub fn vacuum() -> Self {
        Self::default()
    }

    /// Beryllium, a common beam-pipe material.
    #[must_use]
    pub fn beryllium() -> Self {
        Self::new(352.8 * units::MM, 421.0 * units::MM, 9.012, 4.0, 1.848)
    }

    /// Whether this material imposes no interactions at all.
    #[must_use]
    pub fn is_vacuum(&self) -> bool {
        self.ar <= 0.0 || self.rho <= 0.0
    }

    /// Mean ionization energy loss per path length, in GeV/mm.
    ///
    /// Evaluates the Bethe formula for a particle of the given momentum,
    /// mass (both GeV) and charge (elementary charges), with the mean
    /// excitation energy approximated as `16 eV · Z^0.9`. Returns a
    /// non-negative loss rate; vacuum and neutral particles lose nothing.
    #[must_use]
    pub fn mean_energy_loss(&self, momentum: f64, mass: f64, charge: f64) -> f64 {
        if self.is_vacuum() || charge == 0.0 || momentum <= 0.0 {
            return 0.0;
        }

        let energy = momentum.hypot(mass);
        let beta2 = (momentum / energy).powi(2);
        let gamma = energy / mass;
        let mass_ratio = ELECTRON_MASS / mass;

        // Maximum kinetic energy transferable to a single electron.
        let t_max = 2.0 * ELECTRON_MASS * beta2 * gamma * gamma
            / (1.0 + 2.0 * gamma * mass_ratio + mass_ratio * mass_ratio);
        let excitation = 16.0 * units::EV * self.z.powf(0.9);

        let bracket = 0.5
            * (2.0 * ELECTRON_MASS * beta2 * gamma * gamma * t_max
                / (excitation * excitation))
                .ln()
            - beta2;

        // MeV·cm²/mol · g/cm³ yields MeV/cm; convert to GeV/mm.
        let rate = BETHE_K * (units::MEV / units::CM)
            * charge.powi(2)
            * (self.z / self.ar)
            * self.rho
            / beta2
            * bracket;
        rate.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_vacuum() {
        assert!(Material::vacuum().is_vacuum());
        assert!(!Material::beryllium().is_vacuum());
    }

    #[test]
    fn vacuum_and_neutral_lose_nothing() {
        let be = Material::beryllium();
        assert_eq!(Material::vacuum().mean_energy_loss(5.0, 0.1396, 1.0), 0.0);
        assert_eq!(be.mean_energy_loss(5.0, 0.1396, 0.0), 0.0);
    }

    #[test]
    fn beryllium_loss_is_of_mip_order() {
        // A 5 GeV pion in beryllium loses a few MeV per cm.
        let rate = Material::beryllium().mean_energy_loss(5.0, 0.13957, 1.0);
        let mev_per_cm = rate / (units::MEV / units::CM);
        assert!(mev_per_cm > 1.0 && mev_per_cm < 10.0, "rate = {mev_per_cm} MeV/cm");
    }

    #[test]
    fn loss_grows_with_density() {
        let be = Material::beryllium();
        let denser = Material::new(be.x0, be.l0, be.ar, be.z, 2.0 * be.rho);
        let thin = be.mean_energy_loss(5.0, 0.13957, 1.0);
        let thick = denser.mean_energy_loss(5.0, 0.13957, 1.0);
        assert!(thick > thin);
    }
}

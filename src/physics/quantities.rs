//! Temperature and field dependent material properties evaluated from tables.

use super::interpolation::{InterpolationGrid, ScalarTable, TableError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Material and unit constants shared by the property evaluator and the
/// coupled model. Lengths are in nm, so the tables are rescaled on lookup.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConstants {
    /// Temperature of the heat sink below the conductor [K].
    pub ambient_temperature: f64,
    /// Validity range of the resistivity data [K].
    pub clamp_min: f64,
    pub clamp_max: f64,
    /// Wiedemann-Franz Lorenz number [W Ohm / K^2].
    pub lorenz: f64,
    /// Volumetric heat capacity [J / (K nm^3)].
    pub heat_capacity: f64,
    /// Ohm m -> Ohm nm.
    pub resistivity_scale: f64,
    /// A / m^2 -> A / nm^2.
    pub emission_scale: f64,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            ambient_temperature: 300.0,
            clamp_min: 200.0,
            clamp_max: 1400.0,
            lorenz: 2.443e-8,
            heat_capacity: 3.4496e-21,
            resistivity_scale: 1.0e9,
            emission_scale: 1.0e-18,
        }
    }
}

/// Evaluates resistivity, conductivities, emission current and Nottingham
/// energy deviation from tabulated data.
#[derive(Clone, Debug)]
pub struct PhysicalQuantities {
    constants: MaterialConstants,
    resistivity: ScalarTable,
    /// `ln J` over `(ln F, T)`.
    emission: InterpolationGrid,
    /// Mean energy of emitted electrons relative to the Fermi level over `(ln F, T)` [eV].
    nottingham: InterpolationGrid,
}

impl PhysicalQuantities {
    pub fn new(
        constants: MaterialConstants,
        resistivity: ScalarTable,
        emission: InterpolationGrid,
        nottingham: InterpolationGrid,
    ) -> Self {
        Self {
            constants,
            resistivity,
            emission,
            nottingham,
        }
    }

    /// Built-in tables for a copper emitter with a 4.5 eV work function.
    pub fn with_reference_data(constants: MaterialConstants) -> Self {
        let reference = reference::tables();
        Self::new(constants, reference.0, reference.1, reference.2)
    }

    pub fn constants(&self) -> &MaterialConstants {
        &self.constants
    }

    pub fn load_emission_data(&mut self, path: impl AsRef<Path>) -> Result<(), TableError> {
        self.emission = InterpolationGrid::load_compact(path)?;
        Ok(())
    }

    pub fn load_nottingham_data(&mut self, path: impl AsRef<Path>) -> Result<(), TableError> {
        self.nottingham = InterpolationGrid::load_compact(path)?;
        Ok(())
    }

    pub fn load_resistivity_data(&mut self, path: impl AsRef<Path>) -> Result<(), TableError> {
        self.resistivity = ScalarTable::load(path)?;
        Ok(())
    }

    pub fn emission_grid(&self) -> &InterpolationGrid {
        &self.emission
    }

    pub fn nottingham_grid(&self) -> &InterpolationGrid {
        &self.nottingham
    }

    /// Tolerates `clamp_min > clamp_max`; NaN passes through.
    fn clamp(&self, temperature: f64) -> f64 {
        if temperature.is_nan() {
            return temperature;
        }
        temperature
            .max(self.constants.clamp_min)
            .min(self.constants.clamp_max)
    }

    /// Resistivity [Ohm nm]. Flat outside the table.
    pub fn resistivity(&self, temperature: f64) -> f64 {
        self.resistivity.linear_interp(temperature) * self.constants.resistivity_scale
    }

    pub fn resistivity_derivative(&self, temperature: f64) -> f64 {
        self.resistivity.deriv_linear_interp(temperature) * self.constants.resistivity_scale
    }

    /// Electrical conductivity [1 / (Ohm nm)].
    pub fn sigma(&self, temperature: f64) -> f64 {
        1.0 / self.resistivity(self.clamp(temperature))
    }

    pub fn dsigma(&self, temperature: f64) -> f64 {
        let t = self.clamp(temperature);
        let rho = self.resistivity(t);
        -self.resistivity_derivative(t) / (rho * rho)
    }

    /// Thermal conductivity from the Wiedemann-Franz law [W / (nm K)].
    pub fn kappa(&self, temperature: f64) -> f64 {
        let t = self.clamp(temperature);
        self.constants.lorenz * t * self.sigma(t)
    }

    pub fn dkappa(&self, temperature: f64) -> f64 {
        let t = self.clamp(temperature);
        self.constants.lorenz * (self.sigma(t) + t * self.dsigma(t))
    }

    /// Emitted current density [A / nm^2] for a surface field in V/nm.
    pub fn emission_current(&self, field: f64, temperature: f64) -> f64 {
        self.emission.interpolate(field.ln(), temperature).exp() * self.constants.emission_scale
    }

    /// Mean energy deviation of emitted electrons [eV].
    pub fn nottingham_deviation(&self, field: f64, temperature: f64) -> f64 {
        self.nottingham.interpolate(field.ln(), temperature)
    }

    /// Surface heat flux carried off by emission [W / nm^2].
    ///
    /// With the deviation in eV and the current in A, their product is a
    /// power in W; a negative deviation heats the surface.
    pub fn nottingham_heat(&self, field: f64, temperature: f64) -> f64 {
        -self.nottingham_deviation(field, temperature) * self.emission_current(field, temperature)
    }

    /// Dump every derived quantity as whitespace separated text files in `dir`.
    ///
    /// A missing directory is only reported; the run continues without the dump.
    pub fn output_to_files(&self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "cannot access output directory, skipping property dump");
            return;
        }
        info!(dir = %dir.display(), "writing physical quantities");
        if let Err(e) = self.write_property_files(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to write physical quantities");
        }
    }

    fn write_property_files(&self, dir: &Path) -> io::Result<()> {
        const EMISSION_TEMPERATURE: f64 = 500.0;

        let create = |name: &str| File::create(dir.join(name)).map(BufWriter::new);
        let mut rho = create("rho_file.txt")?;
        let mut sigma = create("sigma_file.txt")?;
        let mut kappa = create("kappa_file.txt")?;
        let mut emission = create("emission_file.txt")?;
        let mut nottingham = create("nottingham_file.txt")?;

        for t in (0..280).map(|i| 100.0 + 5.0 * i as f64) {
            writeln!(
                rho,
                "{:.5e} {:.5e} {:.5e}",
                t,
                self.resistivity(t),
                self.resistivity_derivative(t)
            )?;
            writeln!(sigma, "{:.5e} {:.5e} {:.5e}", t, self.sigma(t), self.dsigma(t))?;
            writeln!(kappa, "{:.5e} {:.5e} {:.5e}", t, self.kappa(t), self.dkappa(t))?;
        }

        for f in (1..1000).map(|i| 0.01 * i as f64) {
            writeln!(
                emission,
                "{:.5e} {:.5e} {:.16e}",
                f,
                EMISSION_TEMPERATURE,
                self.emission_current(f, EMISSION_TEMPERATURE)
            )?;
            writeln!(
                nottingham,
                "{:.5e} {:.5e} {:.16e}",
                f,
                EMISSION_TEMPERATURE,
                self.nottingham_deviation(f, EMISSION_TEMPERATURE)
            )?;
        }

        for w in [&mut rho, &mut sigma, &mut kappa, &mut emission, &mut nottingham] {
            w.flush()?;
        }
        Ok(())
    }
}

/// Reference tables generated from textbook models.
mod reference {
    use super::*;

    const BOLTZMANN_EV: f64 = 8.617_333e-5;
    const WORK_FUNCTION: f64 = 4.5;
    /// First and second Fowler-Nordheim constants [A eV V^-2], [eV^-3/2 V nm^-1].
    const FN_A: f64 = 1.541_434e-6;
    const FN_B: f64 = 6.830_890;
    /// `pi k T / d` stays below this so the finite temperature factors stay finite.
    const MAX_THERMAL_RATIO: f64 = 0.9;

    const LN_FIELD_AXIS: (f64, f64, usize) = (-1.0, 3.0, 81);
    const TEMPERATURE_AXIS: (f64, f64, usize) = (100.0, 1500.0, 29);

    /// Copper resistivity [Ohm m], linear in temperature.
    fn resistivity(t: f64) -> f64 {
        1.72e-8 * (1.0 + 0.0039 * (t - 293.0))
    }

    /// Tunnelling decay energy [eV] for a field in V/nm.
    fn decay_energy(field: f64) -> f64 {
        0.0976 * field / WORK_FUNCTION.sqrt()
    }

    fn thermal_ratio(field: f64, t: f64) -> f64 {
        (PI * BOLTZMANN_EV * t / decay_energy(field)).min(MAX_THERMAL_RATIO)
    }

    fn ln_current(ln_field: f64, t: f64) -> f64 {
        let field = ln_field.exp();
        let x = thermal_ratio(field, t);
        // J in A/m^2 with the field converted to V/m.
        (FN_A * (field * 1e9).powi(2) / WORK_FUNCTION).ln() - FN_B * WORK_FUNCTION.powf(1.5) / field
            + (x / x.sin()).ln()
    }

    fn energy_deviation(ln_field: f64, t: f64) -> f64 {
        let field = ln_field.exp();
        let x = thermal_ratio(field, t);
        -x * decay_energy(field) / x.tan()
    }

    pub(super) fn tables() -> (ScalarTable, InterpolationGrid, InterpolationGrid) {
        // The axes above are fixed and valid, so construction cannot fail.
        let resistivity = ScalarTable::new(
            (0..=28)
                .map(|i| {
                    let t = 100.0 + 50.0 * i as f64;
                    (t, resistivity(t))
                })
                .collect(),
        )
        .unwrap_or_else(|e| panic!("reference resistivity table: {e}"));
        let emission = InterpolationGrid::from_fn(LN_FIELD_AXIS, TEMPERATURE_AXIS, ln_current)
            .unwrap_or_else(|e| panic!("reference emission grid: {e}"));
        let nottingham = InterpolationGrid::from_fn(LN_FIELD_AXIS, TEMPERATURE_AXIS, energy_deviation)
            .unwrap_or_else(|e| panic!("reference Nottingham grid: {e}"));
        (resistivity, emission, nottingham)
    }
}

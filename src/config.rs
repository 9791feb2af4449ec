//! Run configuration, loaded from JSON.

use crate::numerics::solver::SolverControl;
use crate::numerics::transient::TimeIntegration;
use crate::physics::quantities::MaterialConstants;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Geometry of the conductor block and the vacuum gap above it [nm].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub width: f64,
    pub conductor_height: f64,
    pub vacuum_height: f64,
    pub nx: usize,
    pub ny_conductor: usize,
    pub ny_vacuum: usize,
    /// Potential of the anode closing the vacuum gap [V].
    pub anode_voltage: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            width: 40.0,
            conductor_height: 20.0,
            vacuum_height: 40.0,
            nx: 16,
            ny_conductor: 8,
            ny_vacuum: 16,
            anode_voltage: 400.0,
        }
    }
}

/// Optional table files replacing the built-in reference data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablePaths {
    pub resistivity: Option<PathBuf>,
    pub emission: Option<PathBuf>,
    pub nottingham: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// [s]
    pub time_step: f64,
    pub n_steps: usize,
    pub time_integration: TimeIntegration,
    pub current_solver: SolverControl,
    pub heat_solver: SolverControl,
    pub material: MaterialConstants,
    /// Surface field used when no vacuum solution is mapped [V/nm].
    pub uniform_field: f64,
    /// Map the vacuum potential gradient onto the emitter surface instead of
    /// using `uniform_field`.
    pub map_vacuum_field: bool,
    pub mesh: MeshConfig,
    pub tables: TablePaths,
    pub output_dir: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: 1.0e-13,
            n_steps: 20,
            time_integration: TimeIntegration::default(),
            current_solver: SolverControl::default(),
            heat_solver: SolverControl::default(),
            material: MaterialConstants::default(),
            uniform_field: 1.0,
            map_vacuum_field: true,
            mesh: MeshConfig::default(),
            tables: TablePaths::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Reject values the solvers cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let positive = |name: &str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(format!("{name} must be positive and finite, got {value}"))
            }
        };
        positive("time_step", self.time_step)?;

        let m = &self.material;
        positive("material.heat_capacity", m.heat_capacity)?;
        positive("material.resistivity_scale", m.resistivity_scale)?;
        positive("material.emission_scale", m.emission_scale)?;
        positive("material.ambient_temperature", m.ambient_temperature)?;
        if !(m.clamp_min <= m.clamp_max) {
            return Err(format!(
                "material.clamp_min ({}) exceeds material.clamp_max ({})",
                m.clamp_min, m.clamp_max
            ));
        }

        for (name, control) in [
            ("current_solver", &self.current_solver),
            ("heat_solver", &self.heat_solver),
        ] {
            if !(control.ssor_omega > 0.0 && control.ssor_omega < 2.0) {
                return Err(format!(
                    "{name}.ssor_omega must lie in (0, 2), got {}",
                    control.ssor_omega
                ));
            }
            positive(&format!("{name}.tolerance"), control.tolerance)?;
        }

        let mesh = &self.mesh;
        if mesh.nx == 0 || mesh.ny_conductor == 0 || mesh.ny_vacuum == 0 {
            return Err("mesh cell counts must be non-zero".to_string());
        }
        positive("mesh.width", mesh.width)?;
        positive("mesh.conductor_height", mesh.conductor_height)?;
        positive("mesh.vacuum_height", mesh.vacuum_height)?;
        Ok(())
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialisation cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

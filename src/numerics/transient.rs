use crate::models::currents_heating::CurrentsAndHeating;
use crate::numerics::solver::{SolverControl, SolverError, SolverResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Time discretisation of the heat equation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeIntegration {
    #[default]
    CrankNicolson,
    ImplicitEuler,
}

/// Position inside one coupled timestep. Current is always assembled and
/// solved before heat, since heat needs the fresh potential and current uses
/// the previous temperature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepState {
    #[default]
    Init,
    CurrentAssembled,
    CurrentSolved,
    HeatAssembled,
    HeatSolved,
    Advanced,
}

impl StepState {
    /// The only state allowed to follow `self`.
    pub fn next(self) -> StepState {
        match self {
            StepState::Init => StepState::CurrentAssembled,
            StepState::CurrentAssembled => StepState::CurrentSolved,
            StepState::CurrentSolved => StepState::HeatAssembled,
            StepState::HeatAssembled => StepState::HeatSolved,
            StepState::HeatSolved => StepState::Advanced,
            StepState::Advanced => StepState::CurrentAssembled,
        }
    }
}

/// Diagnostics of one completed timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub time: f64,
    pub current: SolverResult,
    pub heat: SolverResult,
    pub max_temperature: f64,
    pub max_heating_power: f64,
}

/// Runs the lagged current/heat coupling for a fixed number of steps.
///
/// Linear solves that stop at their iteration cap do not abort the run; the
/// report carries the flag and the caller decides.
pub struct TransientDriver {
    pub n_steps: usize,
    pub current_control: SolverControl,
    pub heat_control: SolverControl,
}

impl Default for TransientDriver {
    fn default() -> Self {
        Self {
            n_steps: 10,
            current_control: SolverControl::default(),
            heat_control: SolverControl::default(),
        }
    }
}

impl TransientDriver {
    /// Advance `model` by one timestep.
    pub fn step(
        &self,
        model: &mut CurrentsAndHeating,
        step: usize,
        time: f64,
    ) -> Result<StepReport, SolverError> {
        model.assemble_current_system();
        let current = model.solve_current(&self.current_control)?;
        model.assemble_heating_system();
        let heat = model.solve_heat(&self.heat_control)?;
        model.advance();

        let report = StepReport {
            step,
            time,
            current,
            heat,
            max_temperature: model.get_max_temperature(),
            max_heating_power: model.max_heating_power(),
        };
        if !current.converged || !heat.converged {
            warn!(
                step,
                current_iterations = current.iterations,
                heat_iterations = heat.iterations,
                "linear solve stopped at the iteration cap"
            );
        }
        debug!(
            step,
            t = time,
            j_iterations = current.iterations,
            t_iterations = heat.iterations,
            max_temperature = report.max_temperature,
            "step done"
        );
        Ok(report)
    }

    /// Run `n_steps` timesteps, calling `callback` after each one.
    pub fn run(
        &self,
        model: &mut CurrentsAndHeating,
        mut callback: impl FnMut(&StepReport, &CurrentsAndHeating),
    ) -> Result<Vec<StepReport>, SolverError> {
        info!(
            steps = self.n_steps,
            dt = model.time_step(),
            scheme = ?model.time_integration(),
            "starting coupled transient run"
        );

        let mut reports = Vec::with_capacity(self.n_steps);
        let mut time = 0.0;
        for step in 1..=self.n_steps {
            time += model.time_step();
            let report = self.step(model, step, time)?;
            callback(&report, model);
            reports.push(report);
        }

        if let Some(last) = reports.last() {
            info!(
                t = last.time,
                max_temperature = last.max_temperature,
                "transient run finished"
            );
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_cycles_through_the_coupling_order() {
        let mut state = StepState::Init;
        let mut seen = vec![state];
        for _ in 0..6 {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                StepState::Init,
                StepState::CurrentAssembled,
                StepState::CurrentSolved,
                StepState::HeatAssembled,
                StepState::HeatSolved,
                StepState::Advanced,
                StepState::CurrentAssembled,
            ]
        );
    }

    #[test]
    fn time_integration_parses_from_snake_case() {
        let scheme: TimeIntegration = serde_json::from_str("\"implicit_euler\"").unwrap();
        assert_eq!(scheme, TimeIntegration::ImplicitEuler);
        assert_eq!(TimeIntegration::default(), TimeIntegration::CrankNicolson);
    }
}

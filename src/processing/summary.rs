use crate::config::SimulationConfig;
use crate::discretization::mesh::{BoundaryId, Mesh};
use crate::numerics::transient::StepReport;
use crate::physics::interface::MappingReport;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct SimulationSummary {
    // Mesh info
    pub num_cells: usize,
    pub num_nodes: usize,
    pub num_surface_faces: usize,
    pub domain_extent: ((f64, f64), (f64, f64)),

    // Setup
    pub time_step: f64,
    pub time_integration: String,
    pub ambient_temperature: f64,
    pub anode_voltage: f64,

    // Interface
    pub mapped_faces: Option<usize>,
    pub unmatched_faces: Option<usize>,

    // Run
    pub steps: usize,
    pub final_time: f64,
    pub total_current_iterations: u64,
    pub total_heat_iterations: u64,
    pub unconverged_solves: usize,
    pub max_temperature: f64,
    pub peak_heating_power: f64,
}

impl SimulationSummary {
    pub fn from_problem(mesh: &Mesh, config: &SimulationConfig) -> Self {
        let (mut lo, mut hi) = ((f64::INFINITY, f64::INFINITY), (f64::NEG_INFINITY, f64::NEG_INFINITY));
        for v in &mesh.vertices {
            lo = (lo.0.min(v.x), lo.1.min(v.y));
            hi = (hi.0.max(v.x), hi.1.max(v.y));
        }

        Self {
            num_cells: mesh.cells.len(),
            num_nodes: mesh.vertices.len(),
            num_surface_faces: mesh.count_boundary_faces(BoundaryId::Surface),
            domain_extent: (lo, hi),
            time_step: config.time_step,
            time_integration: format!("{:?}", config.time_integration),
            ambient_temperature: config.material.ambient_temperature,
            anode_voltage: config.mesh.anode_voltage,
            mapped_faces: None,
            unmatched_faces: None,
            steps: 0,
            final_time: 0.0,
            total_current_iterations: 0,
            total_heat_iterations: 0,
            unconverged_solves: 0,
            max_temperature: config.material.ambient_temperature,
            peak_heating_power: 0.0,
        }
    }

    pub fn add_mapping_info(&mut self, report: &MappingReport) {
        self.mapped_faces = Some(report.matched);
        self.unmatched_faces = Some(report.unmatched.len());
    }

    pub fn add_run_info(&mut self, reports: &[StepReport]) {
        self.steps = reports.len();
        self.final_time = reports.last().map_or(0.0, |r| r.time);
        for r in reports {
            self.total_current_iterations += u64::from(r.current.iterations);
            self.total_heat_iterations += u64::from(r.heat.iterations);
            self.unconverged_solves += usize::from(!r.current.converged);
            self.unconverged_solves += usize::from(!r.heat.converged);
            self.max_temperature = self.max_temperature.max(r.max_temperature);
            self.peak_heating_power = self.peak_heating_power.max(r.max_heating_power);
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "FIELD EMITTER HEATING SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "MESH STATISTICS")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Number of cells:     {}", self.num_cells)?;
        writeln!(file, "Number of nodes:     {}", self.num_nodes)?;
        writeln!(file, "Surface faces:       {}", self.num_surface_faces)?;
        let ((x0, y0), (x1, y1)) = self.domain_extent;
        writeln!(
            file,
            "Domain extent:       [{:.3}, {:.3}] x [{:.3}, {:.3}] nm",
            x0, x1, y0, y1
        )?;
        writeln!(file)?;

        writeln!(file, "SETUP")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Time step:           {:.6e} s", self.time_step)?;
        writeln!(file, "Integration:         {}", self.time_integration)?;
        writeln!(file, "Ambient temperature: {:.2} K", self.ambient_temperature)?;
        writeln!(file, "Anode voltage:       {:.2} V", self.anode_voltage)?;
        writeln!(file)?;

        if let (Some(matched), Some(unmatched)) = (self.mapped_faces, self.unmatched_faces) {
            writeln!(file, "INTERFACE MAPPING")?;
            writeln!(file, "{}", "-".repeat(60))?;
            writeln!(file, "Matched faces:       {}", matched)?;
            writeln!(file, "Unmatched faces:     {}", unmatched)?;
            writeln!(file)?;
        }

        writeln!(file, "TRANSIENT RUN")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Steps:               {}", self.steps)?;
        writeln!(file, "Final time:          {:.6e} s", self.final_time)?;
        writeln!(file, "CG iterations (J):   {}", self.total_current_iterations)?;
        writeln!(file, "CG iterations (T):   {}", self.total_heat_iterations)?;
        writeln!(file, "Unconverged solves:  {}", self.unconverged_solves)?;
        writeln!(file, "Max temperature:     {:.4} K", self.max_temperature)?;
        writeln!(file, "Peak Joule power:    {:.6e} W/nm^3", self.peak_heating_power)?;
        writeln!(file)?;

        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SIMULATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Mesh:          {} cells, {} nodes",
            self.num_cells, self.num_nodes
        );
        if let (Some(matched), Some(unmatched)) = (self.mapped_faces, self.unmatched_faces) {
            println!("Interface:     {} matched, {} unmatched", matched, unmatched);
        }
        println!(
            "Steps:         {} ({:.3e} s, {})",
            self.steps, self.final_time, self.time_integration
        );
        println!(
            "Iterations:    current={}, heat={}",
            self.total_current_iterations, self.total_heat_iterations
        );
        println!("Max T:         {:.4} K", self.max_temperature);
        println!("{}\n", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::{RectangleTags, create_rectangle_mesh};
    use crate::numerics::solver::SolverResult;
    use glam::DVec2;

    #[test]
    fn run_info_accumulates_over_steps() {
        let mesh = create_rectangle_mesh(
            DVec2::ZERO,
            DVec2::new(2.0, 1.0),
            2,
            1,
            RectangleTags::conductor(),
        );
        let config = SimulationConfig::default();
        let mut summary = SimulationSummary::from_problem(&mesh, &config);
        assert_eq!(summary.num_surface_faces, 2);
        assert_eq!(summary.domain_extent, ((0.0, 0.0), (2.0, 1.0)));

        let solve = |iterations, converged| SolverResult {
            iterations,
            final_residual: 0.0,
            converged,
        };
        let reports = [
            StepReport {
                step: 1,
                time: 1e-13,
                current: solve(4, true),
                heat: solve(6, true),
                max_temperature: 310.0,
                max_heating_power: 2.0,
            },
            StepReport {
                step: 2,
                time: 2e-13,
                current: solve(3, true),
                heat: solve(2000, false),
                max_temperature: 305.0,
                max_heating_power: 1.0,
            },
        ];
        summary.add_run_info(&reports);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.final_time, 2e-13);
        assert_eq!(summary.total_current_iterations, 7);
        assert_eq!(summary.total_heat_iterations, 2006);
        assert_eq!(summary.unconverged_solves, 1);
        assert_eq!(summary.max_temperature, 310.0);
        assert_eq!(summary.peak_heating_power, 2.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.txt");
        summary.write_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Unconverged solves:  1"));
        assert!(!text.contains("INTERFACE MAPPING"));
    }
}

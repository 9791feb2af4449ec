//! Coupled electric current and heat diffusion in a field-emitting conductor.
//!
//! Per timestep the potential is solved with the conductivity frozen at the
//! latest temperature, then the temperature is advanced with the Joule heat of
//! the fresh potential and the Nottingham flux on the emitting surface.

use crate::discretization::fe::{
    CellValues, DOFS_PER_CELL, FaceValues, N_FACE_Q_POINTS, N_Q_POINTS, REFERENCE_VERTICES,
    gradient_at,
};
use crate::discretization::mesh::{BoundaryId, FACES_PER_CELL, FaceKey, Mesh};
use crate::numerics::solver::{ConjugateGradient, SolverControl, SolverError, SolverResult};
use crate::numerics::sparse::{CellMatrix, CellVector, SparseSystem};
use crate::numerics::timing::{self, AssemblyKind};
use crate::numerics::transient::{StepState, TimeIntegration};
use crate::physics::bc::{BoundaryConditions, DirichletBc};
use crate::physics::interface::{
    BoundaryError, BoundaryMapper, MappingReport, sample_field_magnitude, values_from_ordered,
};
use crate::physics::quantities::PhysicalQuantities;
use crate::processing::vtk_writer::{PointField, write_vtk};
use glam::DVec2;
use nalgebra::DVector;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct CurrentsAndHeating {
    mesh: Mesh,
    pq: PhysicalQuantities,
    time_step: f64,
    integration: TimeIntegration,
    bcs: BoundaryConditions,
    mapper: BoundaryMapper,
    state: StepState,

    current: SparseSystem,
    solution_current: DVector<f64>,
    old_solution_current: DVector<f64>,

    heat: SparseSystem,
    solution_heat: DVector<f64>,
    old_solution_heat: DVector<f64>,

    max_heating_power: f64,
}

impl CurrentsAndHeating {
    /// Build the model on `mesh` and allocate both systems.
    pub fn new(mesh: Mesh, pq: PhysicalQuantities, time_step: f64) -> Self {
        let n = mesh.n_dofs();
        let mut model = Self {
            current: SparseSystem::new(&mesh),
            heat: SparseSystem::new(&mesh),
            mesh,
            pq,
            time_step,
            integration: TimeIntegration::default(),
            bcs: BoundaryConditions::default(),
            mapper: BoundaryMapper::default(),
            state: StepState::Init,
            solution_current: DVector::zeros(n),
            old_solution_current: DVector::zeros(n),
            solution_heat: DVector::zeros(n),
            old_solution_heat: DVector::zeros(n),
            max_heating_power: 0.0,
        };
        model.setup_current_system();
        model.setup_heating_system();
        model
    }

    pub fn with_time_integration(mut self, integration: TimeIntegration) -> Self {
        self.integration = integration;
        self
    }

    /// Swap in a new conductor mesh. Both systems are rebuilt and all surface
    /// boundary data is dropped, since its face keys refer to the old mesh.
    pub fn import_mesh(&mut self, mesh: Mesh) {
        self.mesh = mesh;
        self.bcs = BoundaryConditions::default();
        self.setup_current_system();
        self.setup_heating_system();
    }

    pub fn setup_current_system(&mut self) {
        let n = self.mesh.n_dofs();
        self.current = SparseSystem::new(&self.mesh);
        self.solution_current = DVector::zeros(n);
        self.old_solution_current = DVector::zeros(n);
        self.state = StepState::Init;
        info!(
            dofs = n,
            nnz = self.current.matrix.nnz(),
            "current system set up"
        );
    }

    pub fn setup_heating_system(&mut self) {
        let n = self.mesh.n_dofs();
        let ambient = self.pq.constants().ambient_temperature;
        self.heat = SparseSystem::new(&self.mesh);
        self.solution_heat = DVector::from_element(n, ambient);
        self.old_solution_heat = DVector::from_element(n, ambient);
        self.max_heating_power = 0.0;
        self.state = StepState::Init;
        info!(dofs = n, ambient, "heating system set up");
    }

    fn enter(&mut self, next: StepState) {
        let expected = self.state.next();
        if next != expected {
            warn!(
                from = ?self.state,
                to = ?next,
                ?expected,
                "coupled step executed out of order"
            );
        }
        self.state = next;
    }

    /// Assemble `div(sigma(T) grad V) = 0` with the emission current as a
    /// surface source and `V = 0` on the bottom.
    pub fn assemble_current_system(&mut self) {
        timing::record_assembly(AssemblyKind::Current, || self.assemble_current_inner());
        self.enter(StepState::CurrentAssembled);
    }

    fn assemble_current_inner(&mut self) {
        self.current.reset();

        for cell in &self.mesh.cells {
            let cv = CellValues::new(&self.mesh, cell);
            let temperatures = cv.function_values(&self.solution_heat);

            let mut cell_matrix = CellMatrix::zeros();
            let mut cell_rhs = CellVector::zeros();

            for q in 0..N_Q_POINTS {
                let sigma = self.pq.sigma(temperatures[q]);
                for i in 0..DOFS_PER_CELL {
                    for j in 0..DOFS_PER_CELL {
                        cell_matrix[(i, j)] +=
                            cv.shape_grads[q][i].dot(cv.shape_grads[q][j]) * sigma * cv.jxw[q];
                    }
                }
            }

            for face in 0..FACES_PER_CELL {
                if cell.face_tag(face) != Some(BoundaryId::Surface) {
                    continue;
                }
                let key = FaceKey::new(cell.id, face);
                let fv = FaceValues::new(&self.mesh, cell, face);
                let face_temperatures = fv.function_values(&self.solution_heat);

                for q in 0..N_FACE_Q_POINTS {
                    let Some(emission) =
                        self.bcs
                            .emission_current(&key, face_temperatures[q], &self.pq)
                    else {
                        continue;
                    };
                    for i in 0..DOFS_PER_CELL {
                        cell_rhs[i] += fv.shape_values[q][i] * emission * fv.jxw[q];
                    }
                }
            }

            self.current
                .add_local(&cv.dof_indices, &cell_matrix, &cell_rhs);
        }

        let boundary_values = DirichletBc::new(BoundaryId::Bottom, 0.0).boundary_values(&self.mesh);
        self.current
            .apply_boundary_values(&boundary_values, &mut self.solution_current);
    }

    /// Assemble the heat system with the configured time integration.
    pub fn assemble_heating_system(&mut self) {
        match self.integration {
            TimeIntegration::CrankNicolson => self.assemble_heating_system_crank_nicolson(),
            TimeIntegration::ImplicitEuler => self.assemble_heating_system_euler_implicit(),
        }
    }

    /// `(M + k kappa K) T = M T_old + k sigma (|grad V|^2 + |grad V_old|^2)
    /// - k kappa K T_old + 2 k q_N`, with `k = dt / (2 C)`.
    pub fn assemble_heating_system_crank_nicolson(&mut self) {
        timing::record_assembly(AssemblyKind::Heat, || {
            self.assemble_heat_inner(TimeIntegration::CrankNicolson)
        });
        self.enter(StepState::HeatAssembled);
    }

    /// `(M + g kappa K) T = M T_old + g sigma |grad V|^2 + g q_N`, with `g = dt / C`.
    pub fn assemble_heating_system_euler_implicit(&mut self) {
        timing::record_assembly(AssemblyKind::Heat, || {
            self.assemble_heat_inner(TimeIntegration::ImplicitEuler)
        });
        self.enter(StepState::HeatAssembled);
    }

    fn assemble_heat_inner(&mut self, scheme: TimeIntegration) {
        let heat_capacity = self.pq.constants().heat_capacity;
        let (coeff, surface_factor) = match scheme {
            TimeIntegration::CrankNicolson => (self.time_step / (2.0 * heat_capacity), 2.0),
            TimeIntegration::ImplicitEuler => (self.time_step / heat_capacity, 1.0),
        };

        self.heat.reset();
        let mut max_power: f64 = 0.0;

        for cell in &self.mesh.cells {
            let cv = CellValues::new(&self.mesh, cell);
            let prev_t = cv.function_values(&self.old_solution_heat);
            let prev_t_grad = cv.function_gradients(&self.old_solution_heat);
            let v_grad = cv.function_gradients(&self.solution_current);
            let prev_v_grad = cv.function_gradients(&self.old_solution_current);

            let mut cell_matrix = CellMatrix::zeros();
            let mut cell_rhs = CellVector::zeros();

            for q in 0..N_Q_POINTS {
                let kappa = self.pq.kappa(prev_t[q]);
                let sigma = self.pq.sigma(prev_t[q]);
                let jxw = cv.jxw[q];

                // Joule source and the explicit half of the diffusion term.
                let (joule, diffusion_grad) = match scheme {
                    TimeIntegration::CrankNicolson => {
                        let joule =
                            sigma * (v_grad[q].length_squared() + prev_v_grad[q].length_squared());
                        max_power = max_power.max(0.5 * joule);
                        (joule, kappa * prev_t_grad[q])
                    }
                    TimeIntegration::ImplicitEuler => {
                        let joule = sigma * v_grad[q].length_squared();
                        max_power = max_power.max(joule);
                        (joule, DVec2::ZERO)
                    }
                };

                for i in 0..DOFS_PER_CELL {
                    let phi_i = cv.shape_values[q][i];
                    let grad_i = cv.shape_grads[q][i];
                    for j in 0..DOFS_PER_CELL {
                        cell_matrix[(i, j)] += (phi_i * cv.shape_values[q][j]
                            + coeff * kappa * grad_i.dot(cv.shape_grads[q][j]))
                            * jxw;
                    }
                    cell_rhs[i] += (phi_i * prev_t[q] + coeff * phi_i * joule
                        - coeff * grad_i.dot(diffusion_grad))
                        * jxw;
                }
            }

            for face in 0..FACES_PER_CELL {
                if cell.face_tag(face) != Some(BoundaryId::Surface) {
                    continue;
                }
                let key = FaceKey::new(cell.id, face);
                let fv = FaceValues::new(&self.mesh, cell, face);
                let face_prev_t = fv.function_values(&self.old_solution_heat);

                for q in 0..N_FACE_Q_POINTS {
                    let Some(heat) = self.bcs.nottingham_heat(&key, face_prev_t[q], &self.pq)
                    else {
                        continue;
                    };
                    for i in 0..DOFS_PER_CELL {
                        cell_rhs[i] +=
                            coeff * fv.shape_values[q][i] * surface_factor * heat * fv.jxw[q];
                    }
                }
            }

            self.heat.add_local(&cv.dof_indices, &cell_matrix, &cell_rhs);
        }

        self.max_heating_power = max_power;
        debug!(?scheme, max_heating_power = max_power, "heat system assembled");

        let ambient = self.pq.constants().ambient_temperature;
        let boundary_values = DirichletBc::new(BoundaryId::Bottom, ambient).boundary_values(&self.mesh);
        self.heat
            .apply_boundary_values(&boundary_values, &mut self.solution_heat);
    }

    /// Solve the assembled current system, starting from the last potential.
    pub fn solve_current(&mut self, control: &SolverControl) -> Result<SolverResult, SolverError> {
        self.old_solution_current.copy_from(&self.solution_current);
        let result = timing::record_linear_solve(|| {
            ConjugateGradient::new(*control).solve(
                &self.current.matrix,
                &mut self.solution_current,
                &self.current.rhs,
            )
        })?;
        self.enter(StepState::CurrentSolved);
        Ok(result)
    }

    /// Solve the assembled heat system, starting from the last temperature.
    pub fn solve_heat(&mut self, control: &SolverControl) -> Result<SolverResult, SolverError> {
        self.old_solution_heat.copy_from(&self.solution_heat);
        let result = timing::record_linear_solve(|| {
            ConjugateGradient::new(*control).solve(
                &self.heat.matrix,
                &mut self.solution_heat,
                &self.heat.rhs,
            )
        })?;
        self.enter(StepState::HeatSolved);
        Ok(result)
    }

    /// Close the timestep: the current solutions become the previous ones.
    pub fn advance(&mut self) {
        self.old_solution_current.copy_from(&self.solution_current);
        self.old_solution_heat.copy_from(&self.solution_heat);
        self.enter(StepState::Advanced);
    }

    /// Map `|grad phi|` of the vacuum potential onto the emitting surface.
    pub fn set_electric_field_from_source(
        &mut self,
        source_mesh: &Mesh,
        source_potential: &DVector<f64>,
    ) -> MappingReport {
        let samples = sample_field_magnitude(source_mesh, source_potential, BoundaryId::Surface);
        let (field, report) = self.mapper.map(&self.mesh, BoundaryId::Surface, &samples);
        self.bcs.set_field(field);
        report
    }

    /// One field value per surface face, in [`Self::get_surface_nodes`] order.
    pub fn set_electric_field_values(&mut self, fields: &[f64]) -> Result<(), BoundaryError> {
        let field = values_from_ordered(&self.mesh, BoundaryId::Surface, fields)?;
        self.bcs.set_field(field);
        Ok(())
    }

    pub fn set_uniform_electric_field(&mut self, field: f64) {
        self.bcs.set_uniform_field(field);
    }

    /// Override emission current and Nottingham heat per surface face, in
    /// [`Self::get_surface_nodes`] order.
    pub fn set_emission_bc(
        &mut self,
        emission_currents: &[f64],
        nottingham_heats: &[f64],
    ) -> Result<(), BoundaryError> {
        let currents = values_from_ordered(&self.mesh, BoundaryId::Surface, emission_currents)?;
        let heats = values_from_ordered(&self.mesh, BoundaryId::Surface, nottingham_heats)?;
        self.bcs.set_emission(currents, heats);
        Ok(())
    }

    pub fn set_mapping_epsilon(&mut self, epsilon: f64) {
        self.mapper = BoundaryMapper::new(epsilon);
    }

    pub fn set_timestep(&mut self, time_step: f64) {
        self.time_step = time_step;
    }

    pub fn set_time_integration(&mut self, integration: TimeIntegration) {
        self.integration = integration;
    }

    pub fn set_physical_quantities(&mut self, pq: PhysicalQuantities) {
        self.pq = pq;
    }

    /// Temperature at `(cell index, local vertex index)` pairs.
    ///
    /// # Panics
    /// If an index is out of range.
    pub fn get_temperature(&self, points: &[(usize, usize)]) -> Vec<f64> {
        points
            .iter()
            .map(|&(cell, vertex)| self.solution_heat[self.mesh.cells[cell].vertex_ids[vertex]])
            .collect()
    }

    /// Current density `sigma(T) E` at `(cell index, local vertex index)` pairs,
    /// with the field taken from the cell's own shape functions.
    ///
    /// # Panics
    /// If an index is out of range.
    pub fn get_current(&self, points: &[(usize, usize)]) -> Vec<DVec2> {
        points
            .iter()
            .map(|&(cell, vertex)| {
                let cell = &self.mesh.cells[cell];
                let temperature = self.solution_heat[cell.vertex_ids[vertex]];
                let field = -gradient_at(
                    &self.mesh,
                    cell,
                    &self.solution_current,
                    REFERENCE_VERTICES[vertex],
                );
                field * self.pq.sigma(temperature)
            })
            .collect()
    }

    /// Centroids of the emitting surface faces, in the order every per-face
    /// value list must follow.
    pub fn get_surface_nodes(&self) -> Vec<DVec2> {
        self.mesh
            .boundary_faces(BoundaryId::Surface)
            .map(|key| self.mesh.face_centroid(&self.mesh.cells[key.cell], key.face))
            .collect()
    }

    pub fn get_max_temperature(&self) -> f64 {
        self.solution_heat.amax()
    }

    /// Largest Joule power density seen in the last heat assembly.
    pub fn max_heating_power(&self) -> f64 {
        self.max_heating_power
    }

    /// Electric field `-grad V` at every vertex, averaged over adjacent cells.
    pub fn nodal_electric_field(&self) -> Vec<DVec2> {
        let n = self.mesh.n_dofs();
        let mut sum = vec![DVec2::ZERO; n];
        let mut count = vec![0u32; n];
        for cell in &self.mesh.cells {
            for (v, &dof) in cell.vertex_ids.iter().enumerate() {
                sum[dof] -= gradient_at(
                    &self.mesh,
                    cell,
                    &self.solution_current,
                    REFERENCE_VERTICES[v],
                );
                count[dof] += 1;
            }
        }
        sum.into_iter()
            .zip(count)
            .map(|(s, c)| if c > 0 { s / c as f64 } else { s })
            .collect()
    }

    /// Write potential and field to a VTK file. Failures are logged only.
    pub fn output_results_current(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let potential: Vec<f64> = self.solution_current.iter().copied().collect();
        let field = self.nodal_electric_field();
        let result = write_vtk(
            path,
            "electric potential",
            &self.mesh,
            &[
                PointField::Scalar("potential", &potential),
                PointField::Vector("electric_field", &field),
            ],
        );
        match result {
            Ok(()) => debug!(path = %path.display(), "current solution written"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not write current solution"),
        }
    }

    /// Write temperature and conductivity to a VTK file. Failures are logged only.
    pub fn output_results_heating(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let temperature: Vec<f64> = self.solution_heat.iter().copied().collect();
        let sigma: Vec<f64> = temperature.iter().map(|&t| self.pq.sigma(t)).collect();
        let result = write_vtk(
            path,
            "temperature",
            &self.mesh,
            &[
                PointField::Scalar("temperature", &temperature),
                PointField::Scalar("sigma", &sigma),
            ],
        );
        match result {
            Ok(()) => debug!(path = %path.display(), "heat solution written"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not write heat solution"),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn physical_quantities(&self) -> &PhysicalQuantities {
        &self.pq
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions {
        &self.bcs
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn time_integration(&self) -> TimeIntegration {
        self.integration
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn solution_current(&self) -> &DVector<f64> {
        &self.solution_current
    }

    pub fn old_solution_current(&self) -> &DVector<f64> {
        &self.old_solution_current
    }

    pub fn solution_heat(&self) -> &DVector<f64> {
        &self.solution_heat
    }

    pub fn old_solution_heat(&self) -> &DVector<f64> {
        &self.old_solution_heat
    }

    pub fn current_system(&self) -> &SparseSystem {
        &self.current
    }

    pub fn heat_system(&self) -> &SparseSystem {
        &self.heat
    }
}

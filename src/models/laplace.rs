use crate::discretization::fe::{CellValues, DOFS_PER_CELL, N_Q_POINTS};
use crate::discretization::mesh::{BoundaryId, Mesh};
use crate::numerics::solver::{ConjugateGradient, SolverControl, SolverError, SolverResult};
use crate::numerics::sparse::{CellMatrix, CellVector, SparseSystem};
use crate::physics::bc::DirichletBc;
use nalgebra::DVector;
use tracing::info;

/// Electrostatic potential in the vacuum gap: `lap phi = 0`, grounded on the
/// emitter surface and held at `anode_voltage` on the anode.
pub struct LaplaceSolver {
    mesh: Mesh,
    system: SparseSystem,
    solution: DVector<f64>,
    pub anode_voltage: f64,
}

impl LaplaceSolver {
    pub fn new(mesh: Mesh, anode_voltage: f64) -> Self {
        let n = mesh.n_dofs();
        Self {
            system: SparseSystem::new(&mesh),
            solution: DVector::zeros(n),
            mesh,
            anode_voltage,
        }
    }

    pub fn assemble(&mut self) {
        self.system.reset();
        for cell in &self.mesh.cells {
            let cv = CellValues::new(&self.mesh, cell);
            let mut cell_matrix = CellMatrix::zeros();
            for q in 0..N_Q_POINTS {
                for i in 0..DOFS_PER_CELL {
                    for j in 0..DOFS_PER_CELL {
                        cell_matrix[(i, j)] +=
                            cv.shape_grads[q][i].dot(cv.shape_grads[q][j]) * cv.jxw[q];
                    }
                }
            }
            self.system
                .add_local(&cv.dof_indices, &cell_matrix, &CellVector::zeros());
        }

        let mut boundary_values =
            DirichletBc::new(BoundaryId::Surface, 0.0).boundary_values(&self.mesh);
        boundary_values
            .extend(DirichletBc::new(BoundaryId::Anode, self.anode_voltage).boundary_values(&self.mesh));
        self.system
            .apply_boundary_values(&boundary_values, &mut self.solution);
    }

    pub fn solve(&mut self, control: &SolverControl) -> Result<SolverResult, SolverError> {
        let result = ConjugateGradient::new(*control).solve(
            &self.system.matrix,
            &mut self.solution,
            &self.system.rhs,
        )?;
        info!(
            iterations = result.iterations,
            residual = result.final_residual,
            "vacuum potential solved"
        );
        Ok(result)
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_emitter_meshes;
    use crate::physics::interface::sample_field_magnitude;
    use approx::assert_relative_eq;

    #[test]
    fn parallel_plate_gap_has_uniform_field() {
        let (_, vacuum) = create_emitter_meshes(10.0, 5.0, 20.0, 5, 3, 8);
        let mut laplace = LaplaceSolver::new(vacuum, 100.0);
        laplace.assemble();
        let control = SolverControl {
            tolerance: 1e-14,
            ..Default::default()
        };
        assert!(laplace.solve(&control).unwrap().converged);

        for (v, phi) in laplace.mesh().vertices.iter().zip(laplace.solution().iter()) {
            assert_relative_eq!(*phi, 100.0 * (v.y - 5.0) / 20.0, epsilon = 1e-7);
        }
        let samples = sample_field_magnitude(laplace.mesh(), laplace.solution(), BoundaryId::Surface);
        assert_eq!(samples.len(), 5);
        for s in samples {
            assert_relative_eq!(s.value, 5.0, epsilon = 1e-7);
        }
    }
}

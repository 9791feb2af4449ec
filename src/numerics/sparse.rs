use crate::discretization::fe::DOFS_PER_CELL;
use crate::discretization::mesh::{BoundaryId, Mesh};
use nalgebra::{DVector, SMatrix, SVector};
use nalgebra_sparse::CsrMatrix;
use std::collections::{BTreeMap, BTreeSet};

pub type CellMatrix = SMatrix<f64, DOFS_PER_CELL, DOFS_PER_CELL>;
pub type CellVector = SVector<f64, DOFS_PER_CELL>;

/// Build a zero-valued CSR matrix whose pattern couples every pair of
/// degrees of freedom sharing a cell.
pub fn make_sparsity_pattern(mesh: &Mesh) -> CsrMatrix<f64> {
    let n = mesh.n_dofs();
    let mut rows: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for cell in &mesh.cells {
        for &i in &cell.vertex_ids {
            rows[i].extend(cell.vertex_ids.iter().copied());
        }
    }

    let mut indptr = Vec::with_capacity(n + 1);
    let mut indices = Vec::new();
    indptr.push(0);
    for row in rows {
        indices.extend(row);
        indptr.push(indices.len());
    }
    let data = vec![0.0; indices.len()];

    CsrMatrix::try_from_csr_data(n, n, indptr, indices, data)
        .unwrap_or_else(|e| panic!("sparsity pattern built from mesh is malformed: {e}"))
}

/// A global linear system `A x = b` assembled from local cell contributions.
#[derive(Clone, Debug)]
pub struct SparseSystem {
    pub matrix: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
}

impl SparseSystem {
    pub fn new(mesh: &Mesh) -> Self {
        Self {
            matrix: make_sparsity_pattern(mesh),
            rhs: DVector::zeros(mesh.n_dofs()),
        }
    }

    pub fn n_dofs(&self) -> usize {
        self.rhs.len()
    }

    /// Zero all matrix entries and the right-hand side, keeping the pattern.
    pub fn reset(&mut self) {
        self.matrix.values_mut().fill(0.0);
        self.rhs.fill(0.0);
    }

    /// Scatter a local contribution into the global system.
    pub fn add_local(
        &mut self,
        dofs: &[usize; DOFS_PER_CELL],
        cell_matrix: &CellMatrix,
        cell_rhs: &CellVector,
    ) {
        for (i, &row) in dofs.iter().enumerate() {
            let mut row_view = self.matrix.row_mut(row);
            let (cols, vals) = row_view.cols_and_values_mut();
            for (j, &col) in dofs.iter().enumerate() {
                let k = cols.binary_search(&col).unwrap_or_else(|_| {
                    panic!("dof pair ({row}, {col}) is missing from the sparsity pattern")
                });
                vals[k] += cell_matrix[(i, j)];
            }
            self.rhs[row] += cell_rhs[i];
        }
    }

    /// Impose `x[dof] = value` for every entry of `boundary_values`.
    ///
    /// Rows are replaced by a scaled identity and the matching columns are
    /// eliminated into the right-hand side, which keeps a symmetric positive
    /// definite system SPD. `solution` receives the prescribed values so it
    /// can serve as the initial guess of an iterative solve.
    pub fn apply_boundary_values(
        &mut self,
        boundary_values: &BTreeMap<usize, f64>,
        solution: &mut DVector<f64>,
    ) {
        if boundary_values.is_empty() {
            return;
        }

        let n = self.n_dofs();
        let (diag_sum, diag_count) = (0..n)
            .filter_map(|r| self.diagonal(r))
            .filter(|d| *d != 0.0)
            .fold((0.0, 0usize), |(s, c), d| (s + d.abs(), c + 1));
        let fallback_diagonal = if diag_count > 0 {
            diag_sum / diag_count as f64
        } else {
            1.0
        };

        for (&dof, &value) in boundary_values {
            solution[dof] = value;
        }

        for r in 0..n {
            let mut row = self.matrix.row_mut(r);
            let (cols, vals) = row.cols_and_values_mut();
            if let Some(&value) = boundary_values.get(&r) {
                let mut diag = fallback_diagonal;
                for (c, v) in cols.iter().zip(vals.iter_mut()) {
                    if *c == r && *v != 0.0 {
                        diag = *v;
                    }
                    *v = 0.0;
                }
                if let Ok(k) = cols.binary_search(&r) {
                    vals[k] = diag;
                }
                self.rhs[r] = diag * value;
            } else {
                for (c, v) in cols.iter().zip(vals.iter_mut()) {
                    if let Some(&value) = boundary_values.get(c) {
                        self.rhs[r] -= *v * value;
                        *v = 0.0;
                    }
                }
            }
        }
    }

    fn diagonal(&self, r: usize) -> Option<f64> {
        let row = self.matrix.row(r);
        row.col_indices()
            .binary_search(&r)
            .ok()
            .map(|k| row.values()[k])
    }
}

/// Map every dof on faces tagged `tag` to a constant value.
pub fn interpolate_boundary_values(mesh: &Mesh, tag: BoundaryId, value: f64) -> BTreeMap<usize, f64> {
    mesh.boundary_dofs(tag)
        .into_iter()
        .map(|dof| (dof, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::{RectangleTags, create_rectangle_mesh};
    use glam::DVec2;

    fn unit_mesh() -> Mesh {
        create_rectangle_mesh(
            DVec2::ZERO,
            DVec2::new(2.0, 1.0),
            2,
            1,
            RectangleTags::conductor(),
        )
    }

    #[test]
    fn pattern_couples_cell_neighbours_only() {
        let mesh = unit_mesh();
        let pattern = make_sparsity_pattern(&mesh);
        // Corner dof 0 touches one cell, the middle bottom dof 1 touches two.
        assert_eq!(pattern.row(0).nnz(), 4);
        assert_eq!(pattern.row(1).nnz(), 6);
        assert_eq!(pattern.nnz(), 4 * 4 + 2 * 6);
    }

    #[test]
    fn local_contributions_accumulate() {
        let mesh = unit_mesh();
        let mut system = SparseSystem::new(&mesh);
        let ones = CellMatrix::from_element(1.0);
        let rhs = CellVector::from_element(2.0);
        for cell in &mesh.cells {
            system.add_local(&cell.vertex_ids, &ones, &rhs);
        }
        assert_eq!(system.diagonal(1), Some(2.0));
        assert_eq!(system.diagonal(0), Some(1.0));
        assert_eq!(system.rhs[4], 4.0);
        system.reset();
        assert!(system.matrix.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn boundary_values_keep_symmetry() {
        let mesh = unit_mesh();
        let mut system = SparseSystem::new(&mesh);
        let local = CellMatrix::from_fn(|i, j| if i == j { 4.0 } else { -1.0 });
        for cell in &mesh.cells {
            system.add_local(&cell.vertex_ids, &local, &CellVector::zeros());
        }
        let mut solution = DVector::zeros(mesh.n_dofs());
        let bv = interpolate_boundary_values(&mesh, BoundaryId::Bottom, 5.0);
        system.apply_boundary_values(&bv, &mut solution);

        let dense = nalgebra::DMatrix::from_fn(6, 6, |i, j| {
            system.matrix.get_entry(i, j).map_or(0.0, |e| e.into_value())
        });
        assert_eq!(dense, dense.transpose());
        for dof in 0..3 {
            assert_eq!(solution[dof], 5.0);
            assert_eq!(system.rhs[dof], dense[(dof, dof)] * 5.0);
        }
        // Interior row picked up the eliminated coupling.
        assert_eq!(system.rhs[3], 10.0);
    }
}

//! Bilinear (Q1) Lagrange elements on quadrilaterals.
//!
//! Shape functions live on the reference square `[0,1]^2` with the vertex
//! ordering of [`Cell::vertex_ids`]. Cells are mapped isoparametrically, so
//! gradients are pushed forward with the inverse transposed Jacobian.

use super::mesh::{Cell, FACE_VERTICES, Mesh, VERTICES_PER_CELL};
use glam::{DMat2, DVec2};
use nalgebra::DVector;

pub const DOFS_PER_CELL: usize = VERTICES_PER_CELL;
pub const N_Q_POINTS: usize = 4;
pub const N_FACE_Q_POINTS: usize = 2;

/// Two-point Gauss rule on `[0, 1]`.
const GAUSS_POINTS: [f64; 2] = [0.211_324_865_405_187_1, 0.788_675_134_594_812_9];
const GAUSS_WEIGHT: f64 = 0.5;

/// Reference coordinates of the four cell vertices.
pub const REFERENCE_VERTICES: [DVec2; VERTICES_PER_CELL] = [
    DVec2::new(0.0, 0.0),
    DVec2::new(1.0, 0.0),
    DVec2::new(0.0, 1.0),
    DVec2::new(1.0, 1.0),
];

#[inline]
fn q1_values(xi: DVec2) -> [f64; DOFS_PER_CELL] {
    let (x, y) = (xi.x, xi.y);
    [
        (1.0 - x) * (1.0 - y),
        x * (1.0 - y),
        (1.0 - x) * y,
        x * y,
    ]
}

#[inline]
fn q1_gradients(xi: DVec2) -> [DVec2; DOFS_PER_CELL] {
    let (x, y) = (xi.x, xi.y);
    [
        DVec2::new(-(1.0 - y), -(1.0 - x)),
        DVec2::new(1.0 - y, -x),
        DVec2::new(-y, 1.0 - x),
        DVec2::new(y, x),
    ]
}

/// Shape values, real-space gradients and Jacobian determinant at a reference point.
pub fn mapped_shape_data(
    vertices: &[DVec2; VERTICES_PER_CELL],
    xi: DVec2,
) -> ([f64; DOFS_PER_CELL], [DVec2; DOFS_PER_CELL], f64) {
    let values = q1_values(xi);
    let ref_grads = q1_gradients(xi);

    let mut d_dxi = DVec2::ZERO;
    let mut d_deta = DVec2::ZERO;
    for (v, g) in vertices.iter().zip(&ref_grads) {
        d_dxi += *v * g.x;
        d_deta += *v * g.y;
    }
    let jacobian = DMat2::from_cols(d_dxi, d_deta);
    let det = jacobian.determinant();
    let inv_t = jacobian.inverse().transpose();

    (values, ref_grads.map(|g| inv_t * g), det)
}

/// Shape function data at the quadrature points of one cell.
#[derive(Clone, Debug)]
pub struct CellValues {
    pub dof_indices: [usize; DOFS_PER_CELL],
    pub shape_values: [[f64; DOFS_PER_CELL]; N_Q_POINTS],
    pub shape_grads: [[DVec2; DOFS_PER_CELL]; N_Q_POINTS],
    pub jxw: [f64; N_Q_POINTS],
}

impl CellValues {
    pub fn new(mesh: &Mesh, cell: &Cell) -> Self {
        let vertices = mesh.cell_vertices(cell);
        let mut shape_values = [[0.0; DOFS_PER_CELL]; N_Q_POINTS];
        let mut shape_grads = [[DVec2::ZERO; DOFS_PER_CELL]; N_Q_POINTS];
        let mut jxw = [0.0; N_Q_POINTS];

        let mut q = 0;
        for &eta in &GAUSS_POINTS {
            for &xi in &GAUSS_POINTS {
                let ref_point = DVec2::new(xi, eta);
                let (values, grads, det) = mapped_shape_data(&vertices, ref_point);
                shape_values[q] = values;
                shape_grads[q] = grads;
                jxw[q] = det.abs() * GAUSS_WEIGHT * GAUSS_WEIGHT;
                q += 1;
            }
        }

        Self {
            dof_indices: cell.vertex_ids,
            shape_values,
            shape_grads,
            jxw,
        }
    }

    /// Values of the nodal field `u` at the quadrature points.
    pub fn function_values(&self, u: &DVector<f64>) -> [f64; N_Q_POINTS] {
        std::array::from_fn(|q| {
            (0..DOFS_PER_CELL)
                .map(|i| u[self.dof_indices[i]] * self.shape_values[q][i])
                .sum()
        })
    }

    /// Gradients of the nodal field `u` at the quadrature points.
    pub fn function_gradients(&self, u: &DVector<f64>) -> [DVec2; N_Q_POINTS] {
        std::array::from_fn(|q| {
            (0..DOFS_PER_CELL)
                .map(|i| self.shape_grads[q][i] * u[self.dof_indices[i]])
                .sum()
        })
    }

    pub fn measure(&self) -> f64 {
        self.jxw.iter().sum()
    }
}

/// Shape function data at the quadrature points of one cell face.
#[derive(Clone, Debug)]
pub struct FaceValues {
    pub dof_indices: [usize; DOFS_PER_CELL],
    pub shape_values: [[f64; DOFS_PER_CELL]; N_FACE_Q_POINTS],
    pub jxw: [f64; N_FACE_Q_POINTS],
}

/// Reference coordinates of the point at parameter `s` along local face `face`.
fn face_reference_point(face: usize, s: f64) -> DVec2 {
    let [a, b] = FACE_VERTICES[face];
    REFERENCE_VERTICES[a].lerp(REFERENCE_VERTICES[b], s)
}

impl FaceValues {
    pub fn new(mesh: &Mesh, cell: &Cell, face: usize) -> Self {
        let (start, end) = mesh.face_endpoints(cell, face);
        let length = start.distance(end);

        let mut shape_values = [[0.0; DOFS_PER_CELL]; N_FACE_Q_POINTS];
        for (q, &s) in GAUSS_POINTS.iter().enumerate() {
            shape_values[q] = q1_values(face_reference_point(face, s));
        }

        Self {
            dof_indices: cell.vertex_ids,
            shape_values,
            jxw: [length * GAUSS_WEIGHT; N_FACE_Q_POINTS],
        }
    }

    pub fn function_values(&self, u: &DVector<f64>) -> [f64; N_FACE_Q_POINTS] {
        std::array::from_fn(|q| {
            (0..DOFS_PER_CELL)
                .map(|i| u[self.dof_indices[i]] * self.shape_values[q][i])
                .sum()
        })
    }
}

/// Gradient of the nodal field `u` at a reference point of `cell`.
pub fn gradient_at(mesh: &Mesh, cell: &Cell, u: &DVector<f64>, xi: DVec2) -> DVec2 {
    let vertices = mesh.cell_vertices(cell);
    let (_, grads, _) = mapped_shape_data(&vertices, xi);
    grads
        .iter()
        .zip(&cell.vertex_ids)
        .map(|(g, &dof)| *g * u[dof])
        .sum()
}

/// Gradient of `u` at the centre of a local face, evaluated from the cell side.
pub fn face_center_gradient(mesh: &Mesh, cell: &Cell, face: usize, u: &DVector<f64>) -> DVec2 {
    gradient_at(mesh, cell, u, face_reference_point(face, 0.5))
}

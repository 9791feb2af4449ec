//! Legacy ASCII VTK output of nodal fields on the quadrilateral mesh.

use crate::discretization::mesh::Mesh;
use glam::DVec2;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const VTK_QUAD: u8 = 9;

/// A nodal field to be written next to the mesh.
pub enum PointField<'a> {
    Scalar(&'a str, &'a [f64]),
    Vector(&'a str, &'a [DVec2]),
}

impl PointField<'_> {
    fn len(&self) -> usize {
        match self {
            PointField::Scalar(_, v) => v.len(),
            PointField::Vector(_, v) => v.len(),
        }
    }

    fn name(&self) -> &str {
        match self {
            PointField::Scalar(name, _) | PointField::Vector(name, _) => *name,
        }
    }
}

pub fn write_vtk<P: AsRef<Path>>(
    path: P,
    title: &str,
    mesh: &Mesh,
    fields: &[PointField<'_>],
) -> io::Result<()> {
    let n_points = mesh.vertices.len();
    if let Some(bad) = fields.iter().find(|f| f.len() != n_points) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "field `{}` has {} values for {} points",
                bad.name(),
                bad.len(),
                n_points
            ),
        ));
    }

    let mut w = BufWriter::new(File::create(path)?);

    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "{title}")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;

    writeln!(w, "POINTS {n_points} double")?;
    for v in &mesh.vertices {
        writeln!(w, "{:.10e} {:.10e} 0", v.x, v.y)?;
    }

    let n_cells = mesh.cells.len();
    writeln!(w, "CELLS {} {}", n_cells, n_cells * 5)?;
    for cell in &mesh.cells {
        // VTK walks the quad counter-clockwise.
        let [a, b, c, d] = cell.vertex_ids;
        writeln!(w, "4 {a} {b} {d} {c}")?;
    }
    writeln!(w, "CELL_TYPES {n_cells}")?;
    for _ in 0..n_cells {
        writeln!(w, "{VTK_QUAD}")?;
    }

    if !fields.is_empty() {
        writeln!(w, "POINT_DATA {n_points}")?;
    }
    for field in fields {
        match field {
            PointField::Scalar(name, values) => {
                writeln!(w, "SCALARS {name} double 1")?;
                writeln!(w, "LOOKUP_TABLE default")?;
                for v in *values {
                    writeln!(w, "{v:.10e}")?;
                }
            }
            PointField::Vector(name, values) => {
                writeln!(w, "VECTORS {name} double")?;
                for v in *values {
                    writeln!(w, "{:.10e} {:.10e} 0", v.x, v.y)?;
                }
            }
        }
    }

    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::{RectangleTags, create_rectangle_mesh};

    #[test]
    fn writes_points_cells_and_fields() {
        let mesh = create_rectangle_mesh(
            DVec2::ZERO,
            DVec2::new(1.0, 1.0),
            1,
            1,
            RectangleTags::conductor(),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vtk");
        let t = [1.0, 2.0, 3.0, 4.0];
        let e = [DVec2::X; 4];
        write_vtk(
            &path,
            "test",
            &mesh,
            &[
                PointField::Scalar("temperature", &t),
                PointField::Vector("field", &e),
            ],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("POINTS 4 double"));
        assert!(text.contains("4 0 1 3 2"));
        assert!(text.contains("SCALARS temperature double 1"));
        assert!(text.contains("VECTORS field double"));
    }

    #[test]
    fn rejects_field_of_wrong_length() {
        let mesh = create_rectangle_mesh(
            DVec2::ZERO,
            DVec2::new(1.0, 1.0),
            1,
            1,
            RectangleTags::conductor(),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = write_vtk(
            dir.path().join("bad.vtk"),
            "bad",
            &mesh,
            &[PointField::Scalar("t", &[1.0])],
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}

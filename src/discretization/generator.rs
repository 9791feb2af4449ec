use super::mesh::{BoundaryId, Cell, FACES_PER_CELL, Mesh};
use glam::DVec2;

/// Boundary tags applied to the four sides of a rectangle.
#[derive(Clone, Copy, Debug)]
pub struct RectangleTags {
    pub left: BoundaryId,
    pub right: BoundaryId,
    pub bottom: BoundaryId,
    pub top: BoundaryId,
}

impl RectangleTags {
    /// Conductor block: emitting surface on top, fixed bottom.
    pub fn conductor() -> Self {
        Self {
            left: BoundaryId::Side,
            right: BoundaryId::Side,
            bottom: BoundaryId::Bottom,
            top: BoundaryId::Surface,
        }
    }

    /// Vacuum block sitting on a conductor: interface at the bottom, anode on top.
    pub fn vacuum() -> Self {
        Self {
            left: BoundaryId::Side,
            right: BoundaryId::Side,
            bottom: BoundaryId::Surface,
            top: BoundaryId::Anode,
        }
    }
}

/// Create a structured quadrilateral mesh of `[origin, origin + size]`
/// with `nx` by `ny` cells.
pub fn create_rectangle_mesh(
    origin: DVec2,
    size: DVec2,
    nx: usize,
    ny: usize,
    tags: RectangleTags,
) -> Mesh {
    let dx = size.x / nx as f64;
    let dy = size.y / ny as f64;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            vertices.push(origin + DVec2::new(i as f64 * dx, j as f64 * dy));
        }
    }

    let vid = |i: usize, j: usize| j * (nx + 1) + i;
    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let mut boundary = [None; FACES_PER_CELL];
            if i == 0 {
                boundary[0] = Some(tags.left);
            }
            if i == nx - 1 {
                boundary[1] = Some(tags.right);
            }
            if j == 0 {
                boundary[2] = Some(tags.bottom);
            }
            if j == ny - 1 {
                boundary[3] = Some(tags.top);
            }
            cells.push(Cell {
                id: cells.len(),
                vertex_ids: [vid(i, j), vid(i + 1, j), vid(i, j + 1), vid(i + 1, j + 1)],
                boundary,
            });
        }
    }

    Mesh { vertices, cells }
}

/// Build the conductor mesh and an independently discretized vacuum mesh on top.
///
/// The vacuum cells are enumerated top-down, so cell indices of the two meshes
/// never line up and the interface can only be matched geometrically.
pub fn create_emitter_meshes(
    width: f64,
    conductor_height: f64,
    vacuum_height: f64,
    nx: usize,
    ny_conductor: usize,
    ny_vacuum: usize,
) -> (Mesh, Mesh) {
    let conductor = create_rectangle_mesh(
        DVec2::ZERO,
        DVec2::new(width, conductor_height),
        nx,
        ny_conductor,
        RectangleTags::conductor(),
    );
    let mut vacuum = create_rectangle_mesh(
        DVec2::new(0.0, conductor_height),
        DVec2::new(width, vacuum_height),
        nx,
        ny_vacuum,
        RectangleTags::vacuum(),
    );
    vacuum.cells.reverse();
    for (id, cell) in vacuum.cells.iter_mut().enumerate() {
        cell.id = id;
    }
    (conductor, vacuum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_counts_and_tags() {
        let mesh = create_rectangle_mesh(
            DVec2::ZERO,
            DVec2::new(4.0, 2.0),
            4,
            2,
            RectangleTags::conductor(),
        );
        assert_eq!(mesh.vertices.len(), 15);
        assert_eq!(mesh.cells.len(), 8);
        assert_eq!(mesh.count_boundary_faces(BoundaryId::Surface), 4);
        assert_eq!(mesh.count_boundary_faces(BoundaryId::Bottom), 4);
        assert_eq!(mesh.count_boundary_faces(BoundaryId::Side), 4);
    }

    #[test]
    fn emitter_meshes_share_the_interface() {
        let (conductor, vacuum) = create_emitter_meshes(10.0, 5.0, 20.0, 5, 3, 4);
        let mut c: Vec<DVec2> = conductor
            .boundary_faces(BoundaryId::Surface)
            .map(|k| conductor.face_centroid(&conductor.cells[k.cell], k.face))
            .collect();
        let mut v: Vec<DVec2> = vacuum
            .boundary_faces(BoundaryId::Surface)
            .map(|k| vacuum.face_centroid(&vacuum.cells[k.cell], k.face))
            .collect();
        c.sort_by(|a, b| a.x.total_cmp(&b.x));
        v.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(c.len(), v.len());
        for (a, b) in c.iter().zip(&v) {
            assert!(a.distance(*b) < 1e-12);
        }
    }
}

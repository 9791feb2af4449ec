use glam::DVec2;

pub const VERTICES_PER_CELL: usize = 4;
pub const FACES_PER_CELL: usize = 4;

/// Local vertex ids spanned by each local face.
/// Face 0 is xi = 0, face 1 is xi = 1, face 2 is eta = 0, face 3 is eta = 1.
pub const FACE_VERTICES: [[usize; 2]; FACES_PER_CELL] = [[0, 2], [1, 3], [0, 1], [2, 3]];

/// Marker distinguishing physically distinct boundary regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoundaryId {
    /// Conductor-vacuum interface, where emission happens.
    Surface,
    /// Bottom of the conductor, held at fixed potential and temperature.
    Bottom,
    /// Lateral walls (natural boundary).
    Side,
    /// Far end of the vacuum region, where the extraction voltage sits.
    Anode,
}

/// Identifies a boundary face as `(cell index, local face index)` within one mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey {
    pub cell: usize,
    pub face: usize,
}

impl FaceKey {
    pub fn new(cell: usize, face: usize) -> Self {
        Self { cell, face }
    }
}

/// The complete computational grid.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<DVec2>,
    pub cells: Vec<Cell>,
}

/// A single quadrilateral cell.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: usize,
    /// Vertex ids in lexicographic reference order: (0,0), (1,0), (0,1), (1,1).
    pub vertex_ids: [usize; VERTICES_PER_CELL],
    /// `None` for interior faces, the boundary tag otherwise.
    pub boundary: [Option<BoundaryId>; FACES_PER_CELL],
}

impl Cell {
    pub fn face_tag(&self, face: usize) -> Option<BoundaryId> {
        self.boundary[face]
    }
}

impl Mesh {
    /// One scalar degree of freedom per vertex.
    pub fn n_dofs(&self) -> usize {
        self.vertices.len()
    }

    pub fn cell_vertices(&self, cell: &Cell) -> [DVec2; VERTICES_PER_CELL] {
        cell.vertex_ids.map(|v| self.vertices[v])
    }

    pub fn face_endpoints(&self, cell: &Cell, face: usize) -> (DVec2, DVec2) {
        let [a, b] = FACE_VERTICES[face];
        (
            self.vertices[cell.vertex_ids[a]],
            self.vertices[cell.vertex_ids[b]],
        )
    }

    pub fn face_centroid(&self, cell: &Cell, face: usize) -> DVec2 {
        let (a, b) = self.face_endpoints(cell, face);
        (a + b) * 0.5
    }

    /// All faces carrying `tag`, ordered by cell index then local face index.
    ///
    /// This ordering is a stable contract: per-face value lists supplied by
    /// callers are matched against it.
    pub fn boundary_faces(&self, tag: BoundaryId) -> impl Iterator<Item = FaceKey> + '_ {
        self.cells.iter().flat_map(move |cell| {
            (0..FACES_PER_CELL)
                .filter(move |&f| cell.boundary[f] == Some(tag))
                .map(move |f| FaceKey::new(cell.id, f))
        })
    }

    pub fn count_boundary_faces(&self, tag: BoundaryId) -> usize {
        self.boundary_faces(tag).count()
    }

    /// Dof indices of every vertex lying on a face tagged `tag`.
    pub fn boundary_dofs(&self, tag: BoundaryId) -> Vec<usize> {
        let mut dofs: Vec<usize> = self
            .boundary_faces(tag)
            .flat_map(|key| {
                let cell = &self.cells[key.cell];
                FACE_VERTICES[key.face].map(|v| cell.vertex_ids[v])
            })
            .collect();
        dofs.sort_unstable();
        dofs.dedup();
        dofs
    }
}

//! Handoff of per-face boundary data between independently meshed regions.

use crate::discretization::fe::face_center_gradient;
use crate::discretization::mesh::{BoundaryId, FaceKey, Mesh};
use glam::DVec2;
use nalgebra::DVector;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("expected one value per surface face ({expected}), got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Per-face scalar values on one boundary of one mesh.
///
/// An empty map means "no override": lookups fall back to the next tier.
/// Faces that a geometric mapping failed to match are remembered so that
/// they can be skipped instead of tripping the coverage check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterfaceValues {
    values: BTreeMap<FaceKey, f64>,
    unmatched: BTreeSet<FaceKey>,
}

/// Outcome of looking a face up in an [`InterfaceValues`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup {
    /// The map is empty; use the fallback tier.
    Fallback,
    Value(f64),
    /// The face had no geometric partner; its contribution is absent.
    Unmatched,
}

impl InterfaceValues {
    pub fn new(values: BTreeMap<FaceKey, f64>) -> Self {
        Self {
            values,
            unmatched: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.unmatched.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &FaceKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FaceKey, &f64)> {
        self.values.iter()
    }

    pub fn unmatched(&self) -> &BTreeSet<FaceKey> {
        &self.unmatched
    }

    /// # Panics
    /// If the map is non-empty but neither holds `key` nor lists it as
    /// unmatched. That means the map was built for a different face set.
    pub fn lookup(&self, key: &FaceKey) -> Lookup {
        if self.is_empty() {
            return Lookup::Fallback;
        }
        if let Some(v) = self.values.get(key) {
            return Lookup::Value(*v);
        }
        if self.unmatched.contains(key) {
            return Lookup::Unmatched;
        }
        panic!(
            "boundary override covers {} faces but has no entry for {key:?}; \
             the value list and the mesh are out of sync",
            self.values.len()
        );
    }
}

/// A value attached to a boundary face centroid of the source mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    pub centroid: DVec2,
    pub value: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingReport {
    pub matched: usize,
    pub unmatched: Vec<FaceKey>,
}

impl MappingReport {
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Nearest-centroid matching of target boundary faces against source samples.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryMapper {
    pub epsilon: f64,
}

impl Default for BoundaryMapper {
    fn default() -> Self {
        Self { epsilon: 1e-9 }
    }
}

impl BoundaryMapper {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Assign every `tag` face of `target` the value of the first sample whose
    /// centroid lies within `epsilon` of the face centroid.
    pub fn map(
        &self,
        target: &Mesh,
        tag: BoundaryId,
        samples: &[SurfaceSample],
    ) -> (InterfaceValues, MappingReport) {
        let mut out = InterfaceValues::default();
        let mut report = MappingReport::default();

        for key in target.boundary_faces(tag) {
            let centre = target.face_centroid(&target.cells[key.cell], key.face);
            match samples
                .iter()
                .find(|s| s.centroid.distance(centre) < self.epsilon)
            {
                Some(sample) => {
                    out.values.insert(key, sample.value);
                    report.matched += 1;
                }
                None => {
                    out.unmatched.insert(key);
                    report.unmatched.push(key);
                }
            }
        }

        if report.is_complete() {
            debug!(faces = report.matched, "interface mapped");
        } else {
            warn!(
                matched = report.matched,
                unmatched = report.unmatched.len(),
                epsilon = self.epsilon,
                "probable mismatch between source and target meshes; unmatched faces are skipped"
            );
        }
        (out, report)
    }
}

/// `|grad u|` at the centre of every `tag` face of `mesh`.
pub fn sample_field_magnitude(
    mesh: &Mesh,
    potential: &DVector<f64>,
    tag: BoundaryId,
) -> Vec<SurfaceSample> {
    mesh.boundary_faces(tag)
        .map(|key| {
            let cell = &mesh.cells[key.cell];
            SurfaceSample {
                centroid: mesh.face_centroid(cell, key.face),
                value: face_center_gradient(mesh, cell, key.face, potential).length(),
            }
        })
        .collect()
}

/// Pair `values` with the `tag` faces of `mesh` in [`Mesh::boundary_faces`] order.
pub fn values_from_ordered(
    mesh: &Mesh,
    tag: BoundaryId,
    values: &[f64],
) -> Result<InterfaceValues, BoundaryError> {
    let expected = mesh.count_boundary_faces(tag);
    if values.len() != expected {
        return Err(BoundaryError::LengthMismatch {
            expected,
            got: values.len(),
        });
    }
    Ok(InterfaceValues::new(
        mesh.boundary_faces(tag).zip(values.iter().copied()).collect(),
    ))
}

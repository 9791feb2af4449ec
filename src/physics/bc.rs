use super::interface::{InterfaceValues, Lookup};
use super::quantities::PhysicalQuantities;
use crate::discretization::mesh::{BoundaryId, FaceKey, Mesh};
use crate::numerics::sparse::interpolate_boundary_values;
use std::collections::BTreeMap;

/// Fixed value on every dof of a tagged boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirichletBc {
    pub tag: BoundaryId,
    pub value: f64,
}

impl DirichletBc {
    pub fn new(tag: BoundaryId, value: f64) -> Self {
        Self { tag, value }
    }

    pub fn boundary_values(&self, mesh: &Mesh) -> BTreeMap<usize, f64> {
        interpolate_boundary_values(mesh, self.tag, self.value)
    }
}

/// Resolves field, emission current and Nottingham heat on the emitting surface.
///
/// The field comes from a per-face map when one is set, otherwise from the
/// uniform value. Emission current and Nottingham heat use their own override
/// maps when set and are computed from the field otherwise. `None` marks a
/// face whose field could not be mapped; it contributes nothing.
#[derive(Clone, Debug)]
pub struct BoundaryConditions {
    field: InterfaceValues,
    uniform_field: f64,
    emission_current: InterfaceValues,
    nottingham: InterfaceValues,
}

impl Default for BoundaryConditions {
    fn default() -> Self {
        Self {
            field: InterfaceValues::default(),
            uniform_field: 1.0,
            emission_current: InterfaceValues::default(),
            nottingham: InterfaceValues::default(),
        }
    }
}

impl BoundaryConditions {
    /// Replace the field map wholesale.
    pub fn set_field(&mut self, field: InterfaceValues) {
        self.field = field;
    }

    /// Switch to a uniform field, discarding any mapped one.
    pub fn set_uniform_field(&mut self, value: f64) {
        self.field = InterfaceValues::default();
        self.uniform_field = value;
    }

    pub fn set_emission(&mut self, currents: InterfaceValues, nottingham: InterfaceValues) {
        self.emission_current = currents;
        self.nottingham = nottingham;
    }

    pub fn field_map(&self) -> &InterfaceValues {
        &self.field
    }

    pub fn uniform_field(&self) -> f64 {
        self.uniform_field
    }

    pub fn electric_field(&self, key: &FaceKey) -> Option<f64> {
        match self.field.lookup(key) {
            Lookup::Fallback => Some(self.uniform_field),
            Lookup::Value(v) => Some(v),
            Lookup::Unmatched => None,
        }
    }

    pub fn emission_current(
        &self,
        key: &FaceKey,
        temperature: f64,
        pq: &PhysicalQuantities,
    ) -> Option<f64> {
        match self.emission_current.lookup(key) {
            Lookup::Fallback => self
                .electric_field(key)
                .map(|f| pq.emission_current(f, temperature)),
            Lookup::Value(v) => Some(v),
            Lookup::Unmatched => None,
        }
    }

    pub fn nottingham_heat(
        &self,
        key: &FaceKey,
        temperature: f64,
        pq: &PhysicalQuantities,
    ) -> Option<f64> {
        match self.nottingham.lookup(key) {
            Lookup::Fallback => self
                .electric_field(key)
                .map(|f| pq.nottingham_heat(f, temperature)),
            Lookup::Value(v) => Some(v),
            Lookup::Unmatched => None,
        }
    }
}

use std::collections::HashMap;

use crate::config::constant::COORDINATE_TOLERANCE;
use crate::domain::location::{Coordinates, Location};
use crate::geo;

/// Container for demand points, indexed by id (unique), by name
/// (one-to-many), and by coordinates (one-to-many within tolerance).
/// Iteration preserves insertion order.
#[derive(Debug, Clone, Default)]
pub struct LocationRegistry {
    locations: Vec<Location>,
    id_index: HashMap<String, usize>,
    name_index: HashMap<String, Vec<usize>>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_locations(items: impl IntoIterator<Item = Location>) -> Self {
        let mut registry = Self::new();
        for item in items {
            registry.add(item);
        }
        registry
    }

    /// Insert a location. Idempotent on id: re-adding an existing id is a
    /// no-op.
    pub fn add(&mut self, location: Location) {
        if self.id_index.contains_key(&location.id) {
            return;
        }
        let index = self.locations.len();
        self.id_index.insert(location.id.clone(), index);
        self.name_index
            .entry(location.name.clone())
            .or_default()
            .push(index);
        self.locations.push(location);
    }

    pub fn remove(&mut self, location_id: &str) {
        let Some(index) = self.id_index.remove(location_id) else {
            return;
        };
        self.locations.remove(index);
        self.rebuild_indexes();
    }

    fn rebuild_indexes(&mut self) {
        self.id_index.clear();
        self.name_index.clear();
        for (index, location) in self.locations.iter().enumerate() {
            self.id_index.insert(location.id.clone(), index);
            self.name_index
                .entry(location.name.clone())
                .or_default()
                .push(index);
        }
    }

    pub fn get_by_id(&self, location_id: &str) -> Option<&Location> {
        self.id_index.get(location_id).map(|&i| &self.locations[i])
    }

    pub fn get_by_id_mut(&mut self, location_id: &str) -> Option<&mut Location> {
        let index = *self.id_index.get(location_id)?;
        Some(&mut self.locations[index])
    }

    pub fn get_by_name(&self, name: &str) -> Vec<&Location> {
        self.name_index
            .get(name)
            .map(|indexes| indexes.iter().map(|&i| &self.locations[i]).collect())
            .unwrap_or_default()
    }

    pub fn get_by_coordinates(&self, coordinates: Coordinates, tolerance: f64) -> Vec<&Location> {
        self.locations
            .iter()
            .filter(|loc| geo::coordinates_match(loc.coordinates, coordinates, tolerance))
            .collect()
    }

    pub fn contains_id(&self, location_id: &str) -> bool {
        self.id_index.contains_key(location_id)
    }

    pub fn contains_coordinates(&self, coordinates: Coordinates) -> bool {
        !self
            .get_by_coordinates(coordinates, COORDINATE_TOLERANCE)
            .is_empty()
    }

    /// Absorb another registry; union by id, left side wins on conflicts.
    pub fn merge(&mut self, other: LocationRegistry) {
        for location in other.locations {
            self.add(location);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Location> {
        self.locations.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl<'a> IntoIterator for &'a LocationRegistry {
    type Item = &'a Location;
    type IntoIter = std::slice::Iter<'a, Location>;

    fn into_iter(self) -> Self::IntoIter {
        self.locations.iter()
    }
}

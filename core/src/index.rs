//! Name-to-id caches for locations and departments.
//!
//! # Design
//! Every forward map (name -> id) has a reverse map (id -> name) kept in step
//! on each insert and rename, so patches driven by a backend-returned id are
//! direct lookups and two names never map to the same id, even briefly.
//! Departments are scoped by location name; a reverse map from department id
//! to owning location lets a department rename find its entry without
//! scanning.

use std::collections::HashMap;

use crate::error::ApiError;

/// Bidirectional name <-> id map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex {
    by_name: HashMap<String, i64>,
    by_id: HashMap<i64, String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name -> id`. Any entry already holding the name or the id is
    /// replaced, so the most recently observed pairing wins.
    pub fn insert(&mut self, name: impl Into<String>, id: i64) {
        let name = name.into();
        if let Some(previous_id) = self.by_name.remove(&name) {
            self.by_id.remove(&previous_id);
        }
        if let Some(previous_name) = self.by_id.remove(&id) {
            self.by_name.remove(&previous_name);
        }
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, name);
    }

    /// Give `id` a new name. Returns the old name, or `None` if the id is
    /// unknown (nothing changes then).
    pub fn rename(&mut self, id: i64, new_name: impl Into<String>) -> Option<String> {
        let old_name = self.by_id.get(&id)?.clone();
        self.insert(new_name, id);
        Some(old_name)
    }

    pub fn id(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.by_name.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.by_id.keys().copied()
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for NameIndex {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut index = NameIndex::new();
        for (name, id) in iter {
            index.insert(name, id);
        }
        index
    }
}

/// Location name -> location id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationIndex(NameIndex);

impl LocationIndex {
    pub fn resolve(&self, name: &str) -> Result<i64, ApiError> {
        self.0
            .id(name)
            .ok_or_else(|| ApiError::NotFound(format!("location '{name}'")))
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.0.name(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter()
    }
}

/// Location name -> (department name -> department id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentIndex {
    by_location: HashMap<String, NameIndex>,
    location_of: HashMap<i64, String>,
}

impl DepartmentIndex {
    pub fn resolve(&self, location: &str, department: &str) -> Result<i64, ApiError> {
        let departments = self.by_location.get(location).ok_or_else(|| {
            ApiError::NotFound(format!("departments of location '{location}'"))
        })?;
        departments.id(department).ok_or_else(|| {
            ApiError::NotFound(format!("department '{department}' in location '{location}'"))
        })
    }

    /// Departments of one location.
    pub fn location(&self, location: &str) -> Option<&NameIndex> {
        self.by_location.get(location)
    }

    /// Name of the location owning department `id`.
    pub fn owner(&self, id: i64) -> Option<&str> {
        self.location_of.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }

    fn insert_location(&mut self, location: &str, departments: NameIndex) {
        self.remove_location(location);
        for id in departments.ids() {
            self.location_of.insert(id, location.to_string());
        }
        self.by_location.insert(location.to_string(), departments);
    }

    fn move_location(&mut self, old_name: &str, new_name: &str) {
        let departments = self.remove_location(old_name).unwrap_or_default();
        self.insert_location(new_name, departments);
    }

    /// Drop a location's departments from both maps.
    fn remove_location(&mut self, location: &str) -> Option<NameIndex> {
        let departments = self.by_location.remove(location)?;
        for id in departments.ids() {
            self.location_of.remove(&id);
        }
        Some(departments)
    }

    fn insert_department(&mut self, location: &str, name: &str, id: i64) {
        if let Some(previous_owner) = self.location_of.get(&id).cloned() {
            if previous_owner != location {
                if let Some(departments) = self.by_location.get_mut(&previous_owner) {
                    *departments = departments
                        .iter()
                        .filter(|(_, existing)| *existing != id)
                        .map(|(name, existing)| (name.to_string(), existing))
                        .collect();
                }
            }
        }
        let departments = self.by_location.entry(location.to_string()).or_default();
        if let Some(displaced) = departments.id(name) {
            self.location_of.remove(&displaced);
        }
        departments.insert(name, id);
        self.location_of.insert(id, location.to_string());
    }

    fn rename_department(&mut self, id: i64, new_name: &str) -> Option<(String, String)> {
        let location = self.location_of.get(&id)?.clone();
        let departments = self.by_location.get_mut(&location)?;
        if let Some(displaced) = departments.id(new_name).filter(|other| *other != id) {
            self.location_of.remove(&displaced);
        }
        let old_name = departments.rename(id, new_name)?;
        Some((location, old_name))
    }
}

/// The location and department caches of one session, patched together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    locations: LocationIndex,
    departments: DepartmentIndex,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locations(&self) -> &LocationIndex {
        &self.locations
    }

    pub fn departments(&self) -> &DepartmentIndex {
        &self.departments
    }

    pub fn location_id(&self, location: &str) -> Result<i64, ApiError> {
        self.locations.resolve(location)
    }

    pub fn department_id(&self, location: &str, department: &str) -> Result<i64, ApiError> {
        self.departments.resolve(location, department)
    }

    /// Register a location together with its full department listing.
    pub fn insert_location(&mut self, name: &str, id: i64, departments: NameIndex) {
        if let Some(previous) = self.locations.name(id).map(str::to_string) {
            if previous != name {
                self.departments.remove_location(&previous);
            }
        }
        self.locations.0.insert(name, id);
        self.departments.insert_location(name, departments);
    }

    /// A location was created: new entry plus an empty department map.
    pub fn location_created(&mut self, name: &str, id: i64) {
        self.insert_location(name, id, NameIndex::new());
    }

    /// Location `id` is now called `new_name`. Its departments move with it.
    /// Unknown ids are registered as new locations.
    pub fn location_renamed(&mut self, id: i64, new_name: &str) {
        match self.locations.0.rename(id, new_name) {
            Some(old_name) if old_name != new_name => {
                self.departments.move_location(&old_name, new_name);
            }
            Some(_) => {}
            None => self.location_created(new_name, id),
        }
    }

    /// A department was created under `location`.
    pub fn department_created(&mut self, location: &str, name: &str, id: i64) {
        self.departments.insert_department(location, name, id);
    }

    /// Department `id` is now called `new_name`, wherever it lives. Returns
    /// the owning location and old name, or `None` for an unknown id.
    pub fn department_renamed(&mut self, id: i64, new_name: &str) -> Option<(String, String)> {
        self.departments.rename_department(id, new_name)
    }
}

//! Registered components, keyed by id.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{read_json, write_json};
use crate::core::{ComponentKind, GhPushError, Registration};

/// `registrations.json` accessor.
#[derive(Debug, Clone)]
pub struct RegistrationStore {
    path: PathBuf,
}

impl RegistrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, Registration>> {
        read_json(&self.path)
    }

    /// All registrations ordered by id.
    pub fn list(&self) -> Result<Vec<Registration>> {
        Ok(self.load()?.into_values().collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Registration>> {
        Ok(self.load()?.remove(id))
    }

    /// Registration of `kind` using `install_slug`, if any.
    pub fn find_by_slug(&self, kind: ComponentKind, install_slug: &str) -> Result<Option<Registration>> {
        Ok(self
            .load()?
            .into_values()
            .find(|r| r.kind == kind && r.install_slug == install_slug))
    }

    /// Add a new registration. Fails when the id is taken.
    pub fn insert(&self, registration: Registration) -> Result<()> {
        let mut all = self.load()?;
        if all.contains_key(&registration.id) {
            return Err(GhPushError::InvalidInput {
                message: format!("component id '{}' is already registered", registration.id),
            }
            .into());
        }
        all.insert(registration.id.clone(), registration);
        write_json(&self.path, &all)
    }

    /// Replace an existing registration.
    pub fn update(&self, registration: Registration) -> Result<()> {
        let mut all = self.load()?;
        if !all.contains_key(&registration.id) {
            return Err(GhPushError::ComponentNotFound {
                id: registration.id,
                did_you_mean: None,
            }
            .into());
        }
        all.insert(registration.id.clone(), registration);
        write_json(&self.path, &all)
    }

    /// Remove and return a registration.
    pub fn remove(&self, id: &str) -> Result<Option<Registration>> {
        let mut all = self.load()?;
        let removed = all.remove(id);
        if removed.is_some() {
            write_json(&self.path, &all)?;
        }
        Ok(removed)
    }
}

//! Package repository abstraction.
//!
//! [`PackageRepository`] provides read-only access to one package
//! database. A [`Universe`](crate::Universe) is assembled from an ordered
//! list of them. [`InMemoryRepository`] is a simple implementation for
//! tests and demos.

use std::collections::HashMap;

use portage_atom::Cpn;

use crate::universe::PackageMetadata;

/// Read-only package database.
pub trait PackageRepository {
    /// Repository name, recorded on every version that does not name one.
    fn name(&self) -> &str;

    /// Return all distinct category/package names in the repository.
    fn all_packages(&self) -> Vec<Cpn>;

    /// Return every version available for the given category/package.
    fn versions_for(&self, cpn: &Cpn) -> Vec<PackageMetadata>;
}

/// In-memory repository backed by a `HashMap`.
pub struct InMemoryRepository {
    name: String,
    packages: HashMap<Cpn, Vec<PackageMetadata>>,
}

impl InMemoryRepository {
    /// Create an empty repository called `gentoo`.
    pub fn new() -> Self {
        Self::named("gentoo")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: HashMap::new(),
        }
    }

    /// Add a package version to the repository.
    pub fn add(&mut self, meta: PackageMetadata) {
        self.packages
            .entry(meta.cpv.cpn.clone())
            .or_default()
            .push(meta);
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageRepository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_packages(&self) -> Vec<Cpn> {
        self.packages.keys().cloned().collect()
    }

    fn versions_for(&self, cpn: &Cpn) -> Vec<PackageMetadata> {
        self.packages.get(cpn).cloned().unwrap_or_default()
    }
}

//! Ordered job lists handed to whatever executes the resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::orderer::EdgeKind;
use crate::resolvent::Resolvent;
use crate::universe::PackageId;

/// Hash of a job's descriptive string id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub fn from_string_id(string_id: &str) -> Self {
        JobId(xxh3_64(string_id.as_bytes()))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The job must run after `comes_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrow {
    pub comes_after: JobId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Run the package's pretend phase.
    Pretend { id: PackageId },
    /// Download sources.
    Fetch { id: PackageId },
    /// Build and merge, removing `replacing` as part of the same job.
    Install {
        id: PackageId,
        replacing: Vec<PackageId>,
    },
    Uninstall { ids: Vec<PackageId> },
    /// A suggestion that was not taken; informational only.
    Untaken { id: PackageId },
}

impl JobKind {
    fn prefix(&self) -> &'static str {
        match self {
            JobKind::Pretend { .. } => "p",
            JobKind::Fetch { .. } => "f",
            JobKind::Install { .. } => "i",
            JobKind::Uninstall { .. } => "u",
            JobKind::Untaken { .. } => "n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// `<kind letter>:<subject>`, unique within a resolution.
    pub string_id: String,
    pub kind: JobKind,
    pub resolvent: Resolvent,
    /// Human-readable summary, e.g. `install app-misc/foo-2:0::gentoo`.
    pub description: String,
    pub arrows: Vec<Arrow>,
}

impl Job {
    /// Build a job whose string id is the kind prefix followed by
    /// `subject`.
    pub fn new(kind: JobKind, resolvent: Resolvent, subject: &str, description: String) -> Self {
        let string_id = format!("{}:{subject}", kind.prefix());
        Self {
            id: JobId::from_string_id(&string_id),
            string_id,
            kind,
            resolvent,
            description,
            arrows: Vec::new(),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// An ordered, immutable list of jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobList(Vec<Job>);

impl JobList {
    pub fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.0.iter().find(|job| job.id == id)
    }

    /// Position of a job in the list.
    pub fn position(&self, id: JobId) -> Option<usize> {
        self.0.iter().position(|job| job.id == id)
    }

    /// Descriptions in order, mostly useful for display and tests.
    pub fn descriptions(&self) -> Vec<String> {
        self.0.iter().map(|job| job.description.clone()).collect()
    }
}

impl From<Vec<Job>> for JobList {
    fn from(jobs: Vec<Job>) -> Self {
        Self(jobs)
    }
}

impl<'a> IntoIterator for &'a JobList {
    type Item = &'a Job;
    type IntoIter = std::slice::Iter<'a, Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

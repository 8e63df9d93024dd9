//! Error types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraint::Constraint;
use crate::decision::UnsuitableCandidate;
use crate::orderer::RejectedEdge;
use crate::resolution::Transition;
use crate::resolvent::Resolvent;
use crate::universe::UniverseError;

/// A resolvent the resolver could not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub resolvent: Resolvent,
    /// Every constraint on the resolvent.
    pub constraints: Vec<Constraint>,
    /// Candidates that were considered, with what each one fails.
    pub unsuitable_candidates: Vec<UnsuitableCandidate>,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: could not find a candidate satisfying:",
            self.resolvent
        )?;
        for c in &self.constraints {
            write!(f, "\n    {c}")?;
        }
        for candidate in &self.unsuitable_candidates {
            write!(f, "\n  {} fails:", candidate.cpv)?;
            for c in &candidate.unmet_constraints {
                write!(f, "\n    {c}")?;
            }
            for mask in &candidate.masks {
                write!(f, "\n    {mask}")?;
            }
        }
        if self.unsuitable_candidates.is_empty() {
            f.write_str("\n  no candidates exist")?;
        }
        Ok(())
    }
}

fn lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that abort a resolution run.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Some resolvents have no acceptable decision.
    #[error("could not satisfy {} resolvent(s):\n{}", .failures.len(), lines(.failures))]
    Unsatisfiable { failures: Vec<ResolutionFailure> },

    /// A dependency cycle with no edge that may be demoted.
    #[error("irreducible dependency cycle between {}:\n{}", .members.join(", "), lines(.edges))]
    IrreducibleCycle {
        members: Vec<String>,
        edges: Vec<RejectedEdge>,
    },

    /// The decide loop or the restart loop ran past its cap.
    #[error("resolution did not converge after {iterations} iterations; last transitions:\n{}", lines(.transitions))]
    NonConvergence {
        iterations: usize,
        transitions: Vec<Transition>,
    },

    /// A target could not be parsed.
    #[error("invalid dependency specification {spec:?}: {message}")]
    InvalidSpec { spec: String, message: String },

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error("resolution cancelled")]
    Cancelled,
}

/// Errors loading a [`ResolverConfig`](crate::ResolverConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid resolver configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias using [`ResolverError`].
pub type Result<T> = std::result::Result<T, ResolverError>;

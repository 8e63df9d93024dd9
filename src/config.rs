//! Resolver configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! strict = true
//! replace_policy = "uninstall_after"
//! world = ["app-editors/vim", "dev-vcs/git"]
//!
//! [[demotion]]
//! kind = "post"
//! priority = 0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constraint::UseExisting;
use crate::error::ConfigError;
use crate::orderer::EdgeKind;
use crate::resolvent::DestinationType;

/// How an install that replaces installed versions is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// The install job removes what it replaces.
    #[default]
    Atomic,
    /// A separate uninstall job runs after the install.
    UninstallAfter,
    /// A separate uninstall job runs before the install.
    UninstallBefore,
}

/// Which slots an unslotted spec resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// The best slot if it is not installed, every installed slot otherwise.
    #[default]
    BestOrInstalled,
    /// Every installed slot, or the best slot if nothing is installed.
    InstalledOrBest,
    /// Every installed slot plus the best slot.
    All,
    /// Only the best slot.
    Best,
}

/// One row of the cycle-breaking table. Lower priorities are demoted
/// first; kinds without a row are never demoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemotionRule {
    pub kind: EdgeKind,
    pub priority: u32,
}

fn default_max_restarts() -> usize {
    64
}

fn default_iteration_cap_base() -> usize {
    1000
}

fn default_iteration_cap_factor() -> usize {
    8
}

fn default_transition_history() -> usize {
    32
}

fn default_demotion() -> Vec<DemotionRule> {
    vec![
        DemotionRule {
            kind: EdgeKind::Post,
            priority: 0,
        },
        DemotionRule {
            kind: EdgeKind::Run,
            priority: 1,
        },
        DemotionRule {
            kind: EdgeKind::WeakBlock,
            priority: 2,
        },
    ]
}

fn default_target_use_existing() -> UseExisting {
    UseExisting::IfSame
}

fn default_dependency_use_existing() -> UseExisting {
    UseExisting::IfPossible
}

fn default_true() -> bool {
    true
}

fn default_install_repository() -> String {
    "installed".into()
}

fn default_binary_repository() -> String {
    "binaries".into()
}

/// Knobs for a resolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Abort on the first taken resolvent that cannot be made.
    #[serde(default)]
    pub strict: bool,

    /// Fresh passes allowed before giving up.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Decide-loop cap is `base + factor * constraint count`.
    #[serde(default = "default_iteration_cap_base")]
    pub iteration_cap_base: usize,

    #[serde(default = "default_iteration_cap_factor")]
    pub iteration_cap_factor: usize,

    /// Decision changes kept for non-convergence reports.
    #[serde(default = "default_transition_history")]
    pub transition_history: usize,

    #[serde(default)]
    pub replace_policy: ReplacePolicy,

    /// Emit a fetch job ahead of every install.
    #[serde(default)]
    pub fetch_jobs: bool,

    #[serde(default = "default_demotion")]
    pub demotion: Vec<DemotionRule>,

    #[serde(default = "default_target_use_existing")]
    pub target_use_existing: UseExisting,

    #[serde(default = "default_dependency_use_existing")]
    pub dependency_use_existing: UseExisting,

    #[serde(default)]
    pub target_slots: SlotPolicy,

    #[serde(default)]
    pub dependency_slots: SlotPolicy,

    /// Allow removing installed packages that are blocked.
    #[serde(default = "default_true")]
    pub permit_uninstalls: bool,

    #[serde(default)]
    pub take_suggestions: bool,

    #[serde(default = "default_true")]
    pub take_recommendations: bool,

    /// Follow build dependencies of packages that stay installed.
    #[serde(default)]
    pub follow_installed_build_dependencies: bool,

    /// Where targets go.
    #[serde(default = "default_destination")]
    pub destination: DestinationType,

    /// Members of `@world`.
    #[serde(default)]
    pub world: Vec<String>,

    /// Repository name recorded on destinations that install to the root.
    #[serde(default = "default_install_repository")]
    pub install_repository: String,

    /// Repository name recorded on binary destinations.
    #[serde(default = "default_binary_repository")]
    pub binary_repository: String,
}

fn default_destination() -> DestinationType {
    DestinationType::InstallToRoot
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_restarts: default_max_restarts(),
            iteration_cap_base: default_iteration_cap_base(),
            iteration_cap_factor: default_iteration_cap_factor(),
            transition_history: default_transition_history(),
            replace_policy: ReplacePolicy::default(),
            fetch_jobs: false,
            demotion: default_demotion(),
            target_use_existing: default_target_use_existing(),
            dependency_use_existing: default_dependency_use_existing(),
            target_slots: SlotPolicy::default(),
            dependency_slots: SlotPolicy::default(),
            permit_uninstalls: true,
            take_suggestions: false,
            take_recommendations: true,
            follow_installed_build_dependencies: false,
            destination: default_destination(),
            world: Vec::new(),
            install_repository: default_install_repository(),
            binary_repository: default_binary_repository(),
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Decide-loop iteration cap for a table holding `constraints`.
    pub fn iteration_cap(&self, constraints: usize) -> usize {
        self.iteration_cap_base
            .saturating_add(self.iteration_cap_factor.saturating_mul(constraints))
    }
}

//! Turning decisions into ordered job lists.
//!
//! Every actionable decision becomes a node: an install for a taken
//! [`Decision::ChangesToMake`], an uninstall for a taken
//! [`Decision::Remove`], plus a separate uninstall for replaced versions
//! when the replace policy asks for one. Edges come from the reasons
//! recorded on constraints. Cycles are broken by demoting the weakest
//! edge according to the [`DemotionTable`], then the graph is linearised
//! with ties going to whichever resolvent was decided first.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DemotionRule, ReplacePolicy, ResolverConfig};
use crate::constraint::{BlockStrength, ConstraintSpec, Reason};
use crate::decision::Decision;
use crate::error::{ResolverError, Result};
use crate::job::{Arrow, Job, JobKind, JobList};
use crate::resolution::Resolution;
use crate::resolvent::Resolvent;
use crate::spec_tree::DepLabel;
use crate::universe::{PackageId, UniverseQuery};

/// Why one job has to come before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// The dependency is needed to build the dependent.
    Build,
    /// The dependency is needed when the dependent runs.
    Run,
    /// The dependency comes after the dependent.
    Post,
    /// The blocked package must be gone before the blocker is installed.
    StrongBlock,
    /// The blocked package goes away after the blocker is installed.
    WeakBlock,
    /// A separate uninstall of a replaced version.
    Replace,
    /// Sources are fetched before the install.
    Fetch,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Build => "build",
            EdgeKind::Run => "run",
            EdgeKind::Post => "post",
            EdgeKind::StrongBlock => "strong block",
            EdgeKind::WeakBlock => "weak block",
            EdgeKind::Replace => "replace",
            EdgeKind::Fetch => "fetch",
        };
        f.write_str(s)
    }
}

/// Which edge kinds may be dropped to break a cycle, lowest priority
/// first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemotionTable(BTreeMap<EdgeKind, u32>);

impl DemotionTable {
    pub fn new(rules: &[DemotionRule]) -> Self {
        Self(rules.iter().map(|r| (r.kind, r.priority)).collect())
    }

    /// `None` if edges of this kind are never demoted.
    pub fn priority(&self, kind: EdgeKind) -> Option<u32> {
        self.0.get(&kind).copied()
    }
}

/// An edge that was dropped to break a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleNote {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    /// Every job in the cycle.
    pub members: Vec<String>,
}

impl fmt::Display for CycleNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "demoted {} edge {} -> {} to break a cycle between {}",
            self.kind,
            self.from,
            self.to,
            self.members.join(", ")
        )
    }
}

/// An edge of an irreducible cycle, with why it could not be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub why: String,
}

impl fmt::Display for RejectedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {} -> {} ({}): {}", self.from, self.to, self.kind, self.why)
    }
}

/// Output of [`Orderer::order`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedJobs {
    pub pretend: JobList,
    pub execute: JobList,
    pub untaken: JobList,
    pub cycle_notes: Vec<CycleNote>,
}

#[derive(Debug)]
enum NodeKind {
    Install {
        id: PackageId,
        replacing: Vec<PackageId>,
    },
    Uninstall {
        ids: Vec<PackageId>,
    },
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    resolvent: Resolvent,
    /// Unique subject of the job's string id.
    subject: String,
    description: String,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    /// Runs first.
    from: usize,
    to: usize,
    kind: EdgeKind,
    active: bool,
}

/// Orders the decisions of a finished resolution.
pub struct Orderer<'a> {
    universe: &'a dyn UniverseQuery,
    config: &'a ResolverConfig,
    demotion: DemotionTable,
}

impl<'a> Orderer<'a> {
    pub fn new(universe: &'a dyn UniverseQuery, config: &'a ResolverConfig) -> Self {
        Self {
            universe,
            config,
            demotion: DemotionTable::new(&config.demotion),
        }
    }

    fn describe(&self, ids: &[PackageId]) -> Result<String> {
        let mut names = Vec::with_capacity(ids.len());
        for &id in ids {
            names.push(self.universe.package(id)?.to_string());
        }
        Ok(names.join(", "))
    }

    pub fn order(
        &self,
        resolutions: &BTreeMap<Resolvent, Resolution>,
        decision_order: &[Resolvent],
    ) -> Result<OrderedJobs> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();
        let mut installs: HashMap<&Resolvent, usize> = HashMap::new();
        let mut removals: HashMap<&Resolvent, usize> = HashMap::new();

        for resolvent in decision_order {
            let Some(resolution) = resolutions.get(resolvent) else {
                continue;
            };
            match &resolution.decision {
                Some(Decision::ChangesToMake {
                    origin_id,
                    taken: true,
                    destination,
                    ..
                }) => {
                    let replacing = destination
                        .as_ref()
                        .map(|d| d.replacing.clone())
                        .unwrap_or_default();
                    let mut description = format!("install {}", self.describe(&[*origin_id])?);
                    let atomic =
                        self.config.replace_policy == ReplacePolicy::Atomic || replacing.is_empty();
                    if atomic && !replacing.is_empty() {
                        description.push_str(&format!(" replacing {}", self.describe(&replacing)?));
                    }
                    let install = nodes.len();
                    nodes.push(Node {
                        kind: NodeKind::Install {
                            id: *origin_id,
                            replacing: if atomic { replacing.clone() } else { Vec::new() },
                        },
                        resolvent: resolvent.clone(),
                        subject: resolvent.to_string(),
                        description,
                    });
                    installs.insert(resolvent, install);

                    if !atomic {
                        let names = self.describe(&replacing)?;
                        let uninstall = nodes.len();
                        nodes.push(Node {
                            kind: NodeKind::Uninstall { ids: replacing },
                            resolvent: resolvent.clone(),
                            subject: names.clone(),
                            description: format!("uninstall {names}"),
                        });
                        let (from, to) = match self.config.replace_policy {
                            ReplacePolicy::UninstallBefore => (uninstall, install),
                            _ => (install, uninstall),
                        };
                        push_edge(&mut edges, from, to, EdgeKind::Replace);
                    }
                }
                Some(Decision::Remove { ids, taken: true }) => {
                    let names = self.describe(ids)?;
                    removals.insert(resolvent, nodes.len());
                    nodes.push(Node {
                        kind: NodeKind::Uninstall { ids: ids.clone() },
                        resolvent: resolvent.clone(),
                        subject: names.clone(),
                        description: format!("uninstall {names}"),
                    });
                }
                _ => {}
            }
        }

        for resolvent in decision_order {
            let Some(resolution) = resolutions.get(resolvent) else {
                continue;
            };
            for constraint in &resolution.constraints {
                if constraint.untaken {
                    continue;
                }
                let Reason::Dependency {
                    from_resolvent,
                    labels,
                    ..
                } = &constraint.reason
                else {
                    continue;
                };
                let Some(&dependent) = installs.get(from_resolvent) else {
                    continue;
                };
                match &constraint.spec {
                    ConstraintSpec::Package(_) => {
                        if !labels.is_empty() && labels.iter().all(|l| l.is_optional()) {
                            continue;
                        }
                        let Some(&dependency) = installs.get(resolvent) else {
                            continue;
                        };
                        match edge_kind(labels) {
                            EdgeKind::Post => {
                                push_edge(&mut edges, dependent, dependency, EdgeKind::Post)
                            }
                            kind => push_edge(&mut edges, dependency, dependent, kind),
                        }
                    }
                    ConstraintSpec::Block { strength, .. } => {
                        if let Some(&removal) = removals.get(resolvent) {
                            match strength {
                                BlockStrength::Strong => push_edge(
                                    &mut edges,
                                    removal,
                                    dependent,
                                    EdgeKind::StrongBlock,
                                ),
                                BlockStrength::Weak => push_edge(
                                    &mut edges,
                                    dependent,
                                    removal,
                                    EdgeKind::WeakBlock,
                                ),
                            }
                        } else if let (BlockStrength::Strong, Some(&upgrade)) =
                            (strength, installs.get(resolvent))
                        {
                            // The blocked version is replaced rather than removed.
                            push_edge(&mut edges, upgrade, dependent, EdgeKind::StrongBlock);
                        }
                    }
                }
            }
        }

        info!(jobs = nodes.len(), edges = edges.len(), "ordering jobs");
        let cycle_notes = self.break_cycles(&nodes, &mut edges)?;
        let order = linearise(&nodes, &edges)?;
        let jobs = self.emit(&nodes, &edges, &order, resolutions)?;
        Ok(OrderedJobs {
            cycle_notes,
            ..jobs
        })
    }

    /// Drop the weakest demotable edge of every strongly connected
    /// component until none is left.
    fn break_cycles(&self, nodes: &[Node], edges: &mut [Edge]) -> Result<Vec<CycleNote>> {
        let mut notes = Vec::new();
        loop {
            let mut graph = DiGraph::<usize, ()>::with_capacity(nodes.len(), edges.len());
            let indices: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();
            for edge in edges.iter().filter(|e| e.active) {
                graph.add_edge(indices[edge.from], indices[edge.to], ());
            }

            let mut demoted = false;
            for scc in tarjan_scc(&graph) {
                if scc.len() < 2 {
                    continue;
                }
                let members: BTreeSet<usize> = scc.iter().map(|&n| graph[n]).collect();
                let inside: Vec<usize> = edges
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| {
                        e.active && members.contains(&e.from) && members.contains(&e.to)
                    })
                    .map(|(i, _)| i)
                    .collect();
                let names: Vec<String> = members
                    .iter()
                    .map(|&n| nodes[n].description.clone())
                    .collect();

                let weakest = inside
                    .iter()
                    .filter_map(|&i| self.demotion.priority(edges[i].kind).map(|p| (p, i)))
                    .min();
                let Some((_, i)) = weakest else {
                    return Err(ResolverError::IrreducibleCycle {
                        members: names,
                        edges: inside
                            .iter()
                            .map(|&i| {
                                let edge = edges[i];
                                RejectedEdge {
                                    from: nodes[edge.from].description.clone(),
                                    to: nodes[edge.to].description.clone(),
                                    kind: edge.kind,
                                    why: format!("{} edges are never demoted", edge.kind),
                                }
                            })
                            .collect(),
                    });
                };

                edges[i].active = false;
                let edge = edges[i];
                let note = CycleNote {
                    from: nodes[edge.from].description.clone(),
                    to: nodes[edge.to].description.clone(),
                    kind: edge.kind,
                    members: names,
                };
                warn!("{note}");
                notes.push(note);
                demoted = true;
            }
            if !demoted {
                return Ok(notes);
            }
        }
    }

    fn emit(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        order: &[usize],
        resolutions: &BTreeMap<Resolvent, Resolution>,
    ) -> Result<OrderedJobs> {
        let mut jobs: Vec<Job> = nodes
            .iter()
            .map(|node| {
                let kind = match &node.kind {
                    NodeKind::Install { id, replacing } => JobKind::Install {
                        id: *id,
                        replacing: replacing.clone(),
                    },
                    NodeKind::Uninstall { ids } => JobKind::Uninstall { ids: ids.clone() },
                };
                Job::new(
                    kind,
                    node.resolvent.clone(),
                    &node.subject,
                    node.description.clone(),
                )
            })
            .collect();
        for edge in edges.iter().filter(|e| e.active) {
            let comes_after = jobs[edge.from].id;
            jobs[edge.to].arrows.push(Arrow {
                comes_after,
                kind: edge.kind,
            });
        }

        let mut fetches = Vec::new();
        let mut pretends = Vec::new();
        for &n in order {
            let node = &nodes[n];
            let NodeKind::Install { id, .. } = node.kind else {
                continue;
            };
            let name = self.describe(&[id])?;
            pretends.push(Job::new(
                JobKind::Pretend { id },
                node.resolvent.clone(),
                &node.subject,
                format!("pretend {name}"),
            ));
            if self.config.fetch_jobs {
                let fetch = Job::new(
                    JobKind::Fetch { id },
                    node.resolvent.clone(),
                    &node.subject,
                    format!("fetch {name}"),
                );
                jobs[n].arrows.push(Arrow {
                    comes_after: fetch.id,
                    kind: EdgeKind::Fetch,
                });
                fetches.push(fetch);
            }
        }

        let mut slots: Vec<Option<Job>> = jobs.into_iter().map(Some).collect();
        let mut execute = fetches;
        for &n in order {
            if let Some(job) = slots[n].take() {
                execute.push(job);
            }
        }

        let mut untaken = Vec::new();
        for (resolvent, resolution) in resolutions {
            if let Some(Decision::ChangesToMake {
                origin_id,
                taken: false,
                ..
            }) = &resolution.decision
            {
                untaken.push(Job::new(
                    JobKind::Untaken { id: *origin_id },
                    resolvent.clone(),
                    &resolvent.to_string(),
                    format!("untaken {}", self.describe(&[*origin_id])?),
                ));
            }
        }

        debug!(
            pretend = pretends.len(),
            execute = execute.len(),
            untaken = untaken.len(),
            "job lists built"
        );
        Ok(OrderedJobs {
            pretend: pretends.into(),
            execute: execute.into(),
            untaken: untaken.into(),
            cycle_notes: Vec::new(),
        })
    }
}

/// Build labels win over post, which wins over run.
fn edge_kind(labels: &[DepLabel]) -> EdgeKind {
    if labels.is_empty() || labels.iter().any(|l| l.is_build()) {
        EdgeKind::Build
    } else if labels.contains(&DepLabel::Post) {
        EdgeKind::Post
    } else {
        EdgeKind::Run
    }
}

fn push_edge(edges: &mut Vec<Edge>, from: usize, to: usize, kind: EdgeKind) {
    if from == to
        || edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.kind == kind)
    {
        return;
    }
    edges.push(Edge {
        from,
        to,
        kind,
        active: true,
    });
}

/// Kahn's algorithm over the active edges; among ready nodes the one
/// created first wins.
fn linearise(nodes: &[Node], edges: &[Edge]) -> Result<Vec<usize>> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in edges.iter().filter(|e| e.active) {
        indegree[edge.to] += 1;
        successors[edge.from].push(edge.to);
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&n| indegree[n] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &s in &successors[next] {
            indegree[s] -= 1;
            if indegree[s] == 0 {
                ready.insert(s);
            }
        }
    }

    if order.len() != nodes.len() {
        let members = (0..nodes.len())
            .filter(|&n| indegree[n] > 0)
            .map(|n| nodes[n].description.clone())
            .collect();
        return Err(ResolverError::IrreducibleCycle {
            members,
            edges: Vec::new(),
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintOrigin, UseExisting};
    use crate::decision::Destination;
    use crate::repository::InMemoryRepository;
    use crate::resolution::VisitState;
    use crate::resolvent::DestinationType;
    use crate::universe::{InstalledSet, PackageMetadata, Universe, UseConfig};
    use portage_atom::{Cpv, Dep};

    struct Table<'u> {
        universe: &'u Universe,
        resolutions: BTreeMap<Resolvent, Resolution>,
        order: Vec<Resolvent>,
    }

    impl<'u> Table<'u> {
        fn new(universe: &'u Universe) -> Self {
            Self {
                universe,
                resolutions: BTreeMap::new(),
                order: Vec::new(),
            }
        }

        fn find(&self, cpv: &str, installed: bool) -> PackageId {
            (0..self.universe.len() as u32)
                .map(PackageId)
                .find(|&id| {
                    let e = self.universe.package(id).unwrap();
                    e.meta.cpv.to_string() == cpv && e.is_installed() == installed
                })
                .unwrap()
        }

        fn decide(&mut self, cpv: &str, decision: Decision) -> Resolvent {
            let id = self.find(cpv, false);
            let meta = &self.universe.package(id).unwrap().meta;
            let resolvent = Resolvent::for_package(meta, DestinationType::InstallToRoot);
            let mut resolution = Resolution::new(resolvent.clone());
            resolution.decision = Some(decision);
            resolution.state = VisitState::Decided;
            self.resolutions.insert(resolvent.clone(), resolution);
            self.order.push(resolvent.clone());
            resolvent
        }

        fn install(&mut self, cpv: &str, replacing: &[&str]) -> Resolvent {
            let id = self.find(cpv, false);
            let replacing = replacing.iter().map(|c| self.find(c, true)).collect();
            self.decide(
                cpv,
                Decision::ChangesToMake {
                    origin_id: id,
                    best: true,
                    taken: true,
                    destination: Some(Destination {
                        repository: "installed".into(),
                        replacing,
                    }),
                },
            )
        }

        fn depend(&mut self, from: &Resolvent, on: &Resolvent, spec: &str, label: DepLabel) {
            let written = spec.to_string();
            let dep = Dep::parse(spec).unwrap();
            let spec = if dep.blocker.is_some() {
                ConstraintSpec::Block {
                    strength: BlockStrength::from(dep.blocker.as_ref().unwrap()),
                    dep,
                }
            } else {
                ConstraintSpec::Package(dep)
            };
            let from_id = self.resolutions[from]
                .decision
                .as_ref()
                .and_then(|d| d.chosen_id())
                .unwrap();
            let constraint = Constraint {
                spec,
                use_requirements: Vec::new(),
                origin: ConstraintOrigin::Dependency,
                mandatory: true,
                untaken: false,
                nothing_is_fine_too: false,
                use_existing: UseExisting::IfPossible,
                reason: Reason::Dependency {
                    from_id,
                    from_resolvent: from.clone(),
                    spec: written,
                    labels: vec![label],
                    already_met: false,
                },
            };
            self.resolutions
                .get_mut(on)
                .unwrap()
                .constraints
                .add(constraint);
        }

        fn order(&self, config: &ResolverConfig) -> Result<OrderedJobs> {
            Orderer::new(self.universe, config).order(&self.resolutions, &self.order)
        }
    }

    fn universe(installed: &[&str]) -> Universe {
        let mut repo = InMemoryRepository::new();
        for cpv in ["app-misc/foo-1", "app-misc/foo-2", "app-misc/bar-1", "app-misc/baz-1"] {
            repo.add(PackageMetadata::new(Cpv::parse(cpv).unwrap()));
        }
        let mut set = InstalledSet::new();
        for cpv in installed {
            set.add_favored(PackageMetadata::new(Cpv::parse(cpv).unwrap()));
        }
        Universe::with_installed(&repo, &UseConfig::default(), &set)
    }

    #[test]
    fn dependencies_come_first() {
        let universe = universe(&[]);
        let mut table = Table::new(&universe);
        let foo = table.install("app-misc/foo-2", &[]);
        let bar = table.install("app-misc/bar-1", &[]);
        table.depend(&foo, &bar, "app-misc/bar", DepLabel::Build);

        let jobs = table.order(&ResolverConfig::default()).unwrap();
        assert_eq!(
            jobs.execute.descriptions(),
            vec![
                "install app-misc/bar-1:0::gentoo",
                "install app-misc/foo-2:0::gentoo"
            ]
        );
        assert_eq!(
            jobs.pretend.descriptions(),
            vec![
                "pretend app-misc/bar-1:0::gentoo",
                "pretend app-misc/foo-2:0::gentoo"
            ]
        );
        let foo_job = jobs.execute.iter().nth(1).unwrap();
        assert_eq!(foo_job.arrows.len(), 1);
        assert_eq!(foo_job.arrows[0].kind, EdgeKind::Build);
        assert_eq!(jobs.execute.position(foo_job.arrows[0].comes_after), Some(0));
    }

    #[test]
    fn post_dependencies_come_after() {
        let universe = universe(&[]);
        let mut table = Table::new(&universe);
        let foo = table.install("app-misc/foo-2", &[]);
        let bar = table.install("app-misc/bar-1", &[]);
        table.depend(&bar, &foo, "app-misc/foo", DepLabel::Post);

        let jobs = table.order(&ResolverConfig::default()).unwrap();
        assert_eq!(
            jobs.execute.descriptions(),
            vec![
                "install app-misc/bar-1:0::gentoo",
                "install app-misc/foo-2:0::gentoo"
            ]
        );
    }

    #[test]
    fn run_edge_is_demoted_in_a_cycle() {
        let universe = universe(&[]);
        let mut table = Table::new(&universe);
        let foo = table.install("app-misc/foo-2", &[]);
        let bar = table.install("app-misc/bar-1", &[]);
        table.depend(&foo, &bar, "app-misc/bar", DepLabel::Build);
        table.depend(&bar, &foo, "app-misc/foo", DepLabel::Run);

        let jobs = table.order(&ResolverConfig::default()).unwrap();
        assert_eq!(jobs.cycle_notes.len(), 1);
        assert_eq!(jobs.cycle_notes[0].kind, EdgeKind::Run);
        assert_eq!(
            jobs.execute.descriptions(),
            vec![
                "install app-misc/bar-1:0::gentoo",
                "install app-misc/foo-2:0::gentoo"
            ]
        );
    }

    #[test]
    fn build_cycle_is_irreducible() {
        let universe = universe(&[]);
        let mut table = Table::new(&universe);
        let foo = table.install("app-misc/foo-2", &[]);
        let bar = table.install("app-misc/bar-1", &[]);
        table.depend(&foo, &bar, "app-misc/bar", DepLabel::Build);
        table.depend(&bar, &foo, "app-misc/foo", DepLabel::Build);

        let err = table.order(&ResolverConfig::default()).unwrap_err();
        let ResolverError::IrreducibleCycle { members, edges } = err else {
            panic!("expected a cycle error, got {err}");
        };
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| m.contains("app-misc/foo")));
        assert!(members.iter().any(|m| m.contains("app-misc/bar")));
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.why.contains("never demoted")));
    }

    #[test]
    fn replace_policies() {
        let universe = universe(&["app-misc/foo-1"]);
        let mut table = Table::new(&universe);
        table.install("app-misc/foo-2", &["app-misc/foo-1"]);

        let atomic = table.order(&ResolverConfig::default()).unwrap();
        assert_eq!(
            atomic.execute.descriptions(),
            vec!["install app-misc/foo-2:0::gentoo replacing app-misc/foo-1:0::installed"]
        );

        let after = ResolverConfig {
            replace_policy: ReplacePolicy::UninstallAfter,
            ..ResolverConfig::default()
        };
        assert_eq!(
            table.order(&after).unwrap().execute.descriptions(),
            vec![
                "install app-misc/foo-2:0::gentoo",
                "uninstall app-misc/foo-1:0::installed"
            ]
        );

        let before = ResolverConfig {
            replace_policy: ReplacePolicy::UninstallBefore,
            ..ResolverConfig::default()
        };
        let jobs = table.order(&before).unwrap();
        assert_eq!(
            jobs.execute.descriptions(),
            vec![
                "uninstall app-misc/foo-1:0::installed",
                "install app-misc/foo-2:0::gentoo"
            ]
        );
        assert_eq!(jobs.execute.iter().nth(1).unwrap().arrows[0].kind, EdgeKind::Replace);
    }

    #[test]
    fn strong_block_removal_runs_first() {
        let universe = universe(&["app-misc/baz-1"]);
        let mut table = Table::new(&universe);
        let foo = table.install("app-misc/foo-2", &[]);
        let installed_baz = table.find("app-misc/baz-1", true);
        let baz = table.decide(
            "app-misc/baz-1",
            Decision::Remove {
                ids: vec![installed_baz],
                taken: true,
            },
        );
        table.depend(&foo, &baz, "!!app-misc/baz", DepLabel::Run);

        let jobs = table.order(&ResolverConfig::default()).unwrap();
        assert_eq!(
            jobs.execute.descriptions(),
            vec![
                "uninstall app-misc/baz-1:0::installed",
                "install app-misc/foo-2:0::gentoo"
            ]
        );
        assert_eq!(jobs.pretend.len(), 1);
    }

    #[test]
    fn fetch_jobs_lead_the_list() {
        let universe = universe(&[]);
        let mut table = Table::new(&universe);
        table.install("app-misc/foo-2", &[]);
        let config = ResolverConfig {
            fetch_jobs: true,
            ..ResolverConfig::default()
        };
        let jobs = table.order(&config).unwrap();
        assert_eq!(
            jobs.execute.descriptions(),
            vec![
                "fetch app-misc/foo-2:0::gentoo",
                "install app-misc/foo-2:0::gentoo"
            ]
        );
        let install = jobs.execute.iter().nth(1).unwrap();
        assert_eq!(install.arrows[0].kind, EdgeKind::Fetch);
        assert_eq!(install.string_id, "i:app-misc/foo:0 -> /");
    }
}

//! Dependency specification trees.
//!
//! [`SpecTree`] is the resolver's view of a parsed dependency string. It is
//! built from [`portage_atom::DepEntry`] trees (one per PMS dependency
//! class) and walked with [`SpecTree::leaves`], which evaluates
//! USE-conditionals on the fly and yields package, blocker and any-of
//! leaves in document order.

use std::fmt;

use portage_atom::{Dep, DepEntry};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::universe::{DepClass, PackageDeps};

/// Dependency label, switching the meaning of the specs that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepLabel {
    Build,
    Run,
    Post,
    Install,
    Fetch,
    Test,
    CompileAgainst,
    Suggestion,
    Recommendation,
}

impl DepLabel {
    /// Labels that require the dependency before the dependent is built.
    pub fn is_build(self) -> bool {
        matches!(
            self,
            DepLabel::Build
                | DepLabel::Install
                | DepLabel::Fetch
                | DepLabel::Test
                | DepLabel::CompileAgainst
        )
    }

    /// Suggestions and recommendations are optional.
    pub fn is_optional(self) -> bool {
        matches!(self, DepLabel::Suggestion | DepLabel::Recommendation)
    }
}

impl From<DepClass> for DepLabel {
    fn from(class: DepClass) -> Self {
        match class {
            DepClass::Depend | DepClass::Bdepend => DepLabel::Build,
            DepClass::Rdepend => DepLabel::Run,
            DepClass::Pdepend => DepLabel::Post,
            DepClass::Idepend => DepLabel::Install,
        }
    }
}

impl fmt::Display for DepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepLabel::Build => "build",
            DepLabel::Run => "run",
            DepLabel::Post => "post",
            DepLabel::Install => "install",
            DepLabel::Fetch => "fetch",
            DepLabel::Test => "test",
            DepLabel::CompileAgainst => "compile-against",
            DepLabel::Suggestion => "suggestion",
            DepLabel::Recommendation => "recommendation",
        };
        f.write_str(s)
    }
}

/// Result of evaluating a USE-conditional guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    True,
    False,
    /// The flag is not known to the package. Treated as false.
    Indeterminate,
}

/// A node of a dependency tree.
#[derive(Debug, Clone)]
pub enum SpecTree {
    /// Nothing; always satisfied.
    Empty,
    /// Every child applies.
    AllOf(Vec<SpecTree>),
    /// At least one child must be satisfiable.
    AnyOf(Vec<SpecTree>),
    /// `flag? ( ... )` or `!flag? ( ... )`.
    Conditional {
        flag: String,
        negate: bool,
        children: Vec<SpecTree>,
    },
    /// A positive package atom.
    Package(Dep),
    /// A `!atom` or `!!atom` blocker.
    Block(Dep),
    /// Changes the labels of the following siblings.
    Labels(Vec<DepLabel>),
}

impl From<&DepEntry> for SpecTree {
    fn from(entry: &DepEntry) -> Self {
        match entry {
            DepEntry::Atom(dep) if dep.blocker.is_some() => SpecTree::Block(dep.clone()),
            DepEntry::Atom(dep) => SpecTree::Package(dep.clone()),
            DepEntry::AnyOf(children) | DepEntry::ExactlyOneOf(children) => {
                SpecTree::AnyOf(children.iter().map(SpecTree::from).collect())
            }
            // `?? ( )` never requires anything to be installed.
            DepEntry::AtMostOneOf(_) => SpecTree::Empty,
            DepEntry::UseConditional {
                flag,
                negate,
                children,
            } => SpecTree::Conditional {
                flag: flag.clone(),
                negate: *negate,
                children: children.iter().map(SpecTree::from).collect(),
            },
        }
    }
}

impl SpecTree {
    /// Build one tree from every dependency class of a package.
    ///
    /// Each class becomes its own group headed by the class's label, so
    /// labels never leak from `DEPEND` into `RDEPEND`.
    pub fn from_package_deps(deps: &PackageDeps) -> Self {
        let groups = deps
            .iter_classes()
            .map(|(class, entries)| {
                let mut children = Vec::with_capacity(entries.len() + 1);
                children.push(SpecTree::Labels(vec![DepLabel::from(class)]));
                children.extend(entries.iter().map(SpecTree::from));
                SpecTree::AllOf(children)
            })
            .collect::<Vec<_>>();
        if groups.is_empty() {
            SpecTree::Empty
        } else {
            SpecTree::AllOf(groups)
        }
    }

    /// Walk the tree, evaluating conditionals with `eval`.
    pub fn leaves<'a>(&'a self, eval: &'a dyn Fn(&str) -> Tristate) -> Leaves<'a> {
        Leaves::new(std::slice::from_ref(self), Vec::new(), eval)
    }
}

/// A leaf produced by [`Leaves`].
#[derive(Debug, Clone)]
pub enum Leaf<'a> {
    Package {
        dep: &'a Dep,
        labels: Vec<DepLabel>,
    },
    Block {
        dep: &'a Dep,
        labels: Vec<DepLabel>,
    },
    /// An any-of group, yielded whole so the caller can pick an alternative.
    AnyOf {
        children: &'a [SpecTree],
        labels: Vec<DepLabel>,
    },
}

struct Frame<'a> {
    nodes: std::slice::Iter<'a, SpecTree>,
    labels: Vec<DepLabel>,
}

/// Lazy, document-order walk over a [`SpecTree`].
pub struct Leaves<'a> {
    stack: Vec<Frame<'a>>,
    eval: &'a dyn Fn(&str) -> Tristate,
}

impl<'a> Leaves<'a> {
    /// Walk a sequence of sibling nodes starting with the given labels.
    pub fn new(
        nodes: &'a [SpecTree],
        labels: Vec<DepLabel>,
        eval: &'a dyn Fn(&str) -> Tristate,
    ) -> Self {
        Self {
            stack: vec![Frame {
                nodes: nodes.iter(),
                labels,
            }],
            eval,
        }
    }

    fn condition_holds(&self, flag: &str, negate: bool) -> bool {
        let enabled = match (self.eval)(flag) {
            Tristate::True => true,
            Tristate::False => false,
            Tristate::Indeterminate => {
                warn!(flag, "conditional on a flag the package does not know, treating as off");
                false
            }
        };
        enabled != negate
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = Leaf<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(node) = frame.nodes.next() else {
                self.stack.pop();
                continue;
            };
            let labels = frame.labels.clone();
            match node {
                SpecTree::Empty => {}
                SpecTree::Labels(new_labels) => frame.labels = new_labels.clone(),
                SpecTree::AllOf(children) => self.stack.push(Frame {
                    nodes: children.iter(),
                    labels,
                }),
                SpecTree::Conditional {
                    flag,
                    negate,
                    children,
                } => {
                    if self.condition_holds(flag, *negate) {
                        self.stack.push(Frame {
                            nodes: children.iter(),
                            labels,
                        });
                    }
                }
                SpecTree::Package(dep) => return Some(Leaf::Package { dep, labels }),
                SpecTree::Block(dep) => return Some(Leaf::Block { dep, labels }),
                SpecTree::AnyOf(children) => return Some(Leaf::AnyOf { children, labels }),
            }
        }
    }
}

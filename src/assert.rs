//! Structural check for field graphs, run once when a schema is registered.
//!
//! A graph is accepted when every node needed to build an initial value is
//! finite. Object fields and the default branch of a conditional are needed
//! eagerly: the initial value of the parent contains theirs. Array elements
//! and non-default branches are not (an array starts empty, an unselected
//! branch is never built), so recursion through them is allowed.
//!
//! The walk threads two pieces of identity-based state:
//!
//! - the *live chain*: nodes whose initial values are being built along the
//!   current eager path. Meeting one of them again is an infinite initial
//!   value. Arrays and non-default branches start a new, empty chain.
//! - the *seen* set: every container entered anywhere in the walk. A second
//!   visit that is not a live-chain hit is a benign revisit and stops there,
//!   which is what makes legal recursion terminate.
//!
//! The live chain is always consulted first.
//!
//! Accessors that keep fabricating fresh nodes defeat both checks and recurse
//! until the stack is exhausted.
use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

use indexmap::IndexSet;
use thiserror::Error;
use tracing::{debug, trace};

use crate::field::{FieldArena, FieldId, FieldNode};
use crate::path::FieldPath;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldAssertionError {
    #[error("The field at \"{path}\" is a field that is also its ancestor, this is not allowed because it would create an infinitely recursive structure. Introduce an array or conditional field to represent recursive structure.")]
    Cycle { path: FieldPath },

    #[error("Fields on an object field must not change over time but the field at \"{path}\" changes between accesses")]
    Unstable { path: FieldPath },

    #[error("The relationship field at \"{path}\"  has the listKey \"{list_key}\" but no list named \"{list_key}\" exists.")]
    UnknownList { path: FieldPath, list_key: String },

    #[error("The field at \"{path}\" refers to {id}, which has no field defined for it")]
    Dangling { path: FieldPath, id: FieldId },
}

impl FieldAssertionError {
    pub fn path(&self) -> &FieldPath {
        match self {
            FieldAssertionError::Cycle { path }
            | FieldAssertionError::Unstable { path }
            | FieldAssertionError::UnknownList { path, .. }
            | FieldAssertionError::Dangling { path, .. } => path,
        }
    }
}

/// Names of the lists a relationship field may point at.
pub trait KnownLists {
    fn has_list(&self, list_key: &str) -> bool;
}

impl<S: BuildHasher> KnownLists for HashSet<String, S> {
    fn has_list(&self, list_key: &str) -> bool { self.contains(list_key) }
}

impl KnownLists for BTreeSet<String> {
    fn has_list(&self, list_key: &str) -> bool { self.contains(list_key) }
}

impl<S: BuildHasher> KnownLists for IndexSet<String, S> {
    fn has_list(&self, list_key: &str) -> bool { self.contains(list_key) }
}

impl KnownLists for [&str] {
    fn has_list(&self, list_key: &str) -> bool { self.iter().any(|name| *name == list_key) }
}

impl<T: KnownLists + ?Sized> KnownLists for &T {
    fn has_list(&self, list_key: &str) -> bool { (**self).has_list(list_key) }
}

/// Nodes eagerly required by the initial value under construction.
#[derive(Clone, Copy)]
pub(crate) enum LiveChain<'a> {
    Empty,
    Link { field: FieldId, parent: &'a LiveChain<'a> },
}

struct Walk<'a, L: ?Sized> {
    arena: &'a FieldArena,
    lists: &'a L,
    seen: HashSet<FieldId>,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

/// Walks the graph under `root` and returns the first violation found.
///
/// Lazy accessors on object fields are invoked twice per key to confirm they
/// are stable; conditional branches are read once.
pub fn assert_valid_field<L>(arena: &FieldArena, root: FieldId, lists: &L) -> Result<(), FieldAssertionError>
where
    L: KnownLists + ?Sized,
{
    debug!(%root, arena_len = arena.len(), "validating field graph");
    let mut walk = Walk { arena, lists, seen: HashSet::new() };
    walk.visit(root, &LiveChain::Empty, &FieldPath::root())?;
    debug!(%root, containers = walk.seen.len(), "field graph accepted");
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'a> LiveChain<'a> {
    pub(crate) fn contains(&self, id: FieldId) -> bool {
        let mut link = self;
        loop {
            match link {
                LiveChain::Empty => return false,
                LiveChain::Link { field, parent } => {
                    if *field == id {
                        return true;
                    }
                    link = *parent;
                }
            }
        }
    }

    pub(crate) fn push(&'a self, field: FieldId) -> LiveChain<'a> {
        LiveChain::Link { field, parent: self }
    }
}

impl<'a, L: KnownLists + ?Sized> Walk<'a, L> {
    fn visit(&mut self, id: FieldId, live: &LiveChain<'_>, path: &FieldPath) -> Result<(), FieldAssertionError> {
        if live.contains(id) {
            return Err(FieldAssertionError::Cycle { path: path.clone() });
        }
        let node = self.arena.get(id).ok_or_else(|| FieldAssertionError::Dangling {
            path: path.clone(),
            id,
        })?;

        match &*node {
            FieldNode::Form(_) => Ok(()),
            FieldNode::Relationship(relationship) => {
                if self.lists.has_list(&relationship.list_key) {
                    Ok(())
                } else {
                    Err(FieldAssertionError::UnknownList {
                        path: path.clone(),
                        list_key: relationship.list_key.clone(),
                    })
                }
            }
            FieldNode::Object(object) => {
                if !self.enter(id, path) {
                    return Ok(());
                }
                let live = live.push(id);
                for (key, child) in object.fields() {
                    let child_path = path.child("object", Some(key));
                    let first = child.resolve(self.arena);
                    let second = child.resolve(self.arena);
                    if first != second {
                        return Err(FieldAssertionError::Unstable { path: child_path });
                    }
                    self.visit(first, &live, &child_path)?;
                }
                Ok(())
            }
            FieldNode::Array(array) => {
                if !self.enter(id, path) {
                    return Ok(());
                }
                self.visit(array.element, &LiveChain::Empty, &path.child("array", None))
            }
            FieldNode::Conditional(conditional) => {
                if !self.enter(id, path) {
                    return Ok(());
                }
                let default_key = conditional.default_key();
                let default_live = live.push(id);
                for (key, branch) in conditional.branches() {
                    let branch_path = path.child("conditional", Some(key));
                    let branch_id = branch.resolve(self.arena);
                    if key == default_key {
                        self.visit(branch_id, &default_live, &branch_path)?;
                    } else {
                        self.visit(branch_id, &LiveChain::Empty, &branch_path)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Marks a container as seen; `false` when it already was.
    fn enter(&mut self, id: FieldId, path: &FieldPath) -> bool {
        if self.seen.insert(id) {
            return true;
        }
        trace!(%id, %path, "revisit");
        false
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

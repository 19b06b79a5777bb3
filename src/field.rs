//! Field graph: an arena of schema nodes addressed by stable handles.
//!
//! Schemas are rooted directed graphs, not trees. A node may be reachable
//! along several paths and may reach itself. Identity is the [`FieldId`]
//! handle: two nodes built from identical parts are still different nodes.
//!
//! Children of object and conditional fields are [`ChildRef`]s, which are
//! either a fixed handle or a lazy accessor that is asked for its handle each
//! time the child is read. Accessors receive the arena and may allocate into
//! it, which is why the arena uses interior mutability and every builder
//! method takes `&self`.
pub mod form;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use thiserror::Error;

pub use form::{Discriminant, FormField, FormKind, RelationshipField, SelectOption};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Source of arena tags; every arena in the process gets its own.
static NEXT_ARENA: AtomicU32 = AtomicU32::new(0);

/// Handle to a node, valid only in the arena that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    arena: u32,
    index: usize,
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (arena {})", self.index, self.arena)
    }
}

pub type Accessor = Rc<dyn Fn(&FieldArena) -> FieldId>;

/// A child slot: fixed, or computed on every read.
#[derive(Clone)]
pub enum ChildRef {
    Field(FieldId),
    Lazy(Accessor),
}

#[derive(Debug, Clone)]
pub enum FieldNode {
    Form(FormField),
    Relationship(RelationshipField),
    Object(ObjectField),
    Array(ArrayField),
    Conditional(ConditionalField),
}

#[derive(Debug, Clone)]
pub struct ObjectField {
    fields: IndexMap<String, ChildRef>,
}

#[derive(Debug, Clone)]
pub struct ArrayField {
    pub element: FieldId,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConditionalField {
    discriminant: Discriminant,
    values: IndexMap<String, ChildRef>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldBuildError {
    #[error("duplicate key \"{key}\" in {kind} field")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("select default \"{default}\" is not one of the options {options:?}")]
    SelectDefaultNotAnOption { default: String, options: Vec<String> },

    #[error("conditional branch \"{key}\" is not a possible discriminant value (expected one of {domain:?})")]
    BranchOutsideDomain { key: String, domain: Vec<String> },

    #[error("the discriminant default \"{default}\" does not name a branch of the conditional field")]
    MissingDefaultBranch { default: String },

    #[error("{id} does not belong to this arena")]
    UnknownHandle { id: FieldId },

    #[error("{id} is already defined")]
    AlreadyDefined { id: FieldId },
}

/// Owner of every node in a schema graph.
pub struct FieldArena {
    tag: u32,
    slots: RefCell<Vec<Option<Rc<FieldNode>>>>,
}

// ————————————————————————————————————————————————————————————————————————————
// CHILD REFERENCES
// ————————————————————————————————————————————————————————————————————————————

impl ChildRef {
    pub fn lazy(accessor: impl Fn(&FieldArena) -> FieldId + 'static) -> Self {
        ChildRef::Lazy(Rc::new(accessor))
    }

    /// Lazy accessor that runs `init` on first read and returns the same
    /// handle ever after.
    pub fn memoized(init: impl Fn(&FieldArena) -> FieldId + 'static) -> Self {
        let cell = OnceCell::new();
        ChildRef::lazy(move |arena| *cell.get_or_init(|| init(arena)))
    }

    pub fn resolve(&self, arena: &FieldArena) -> FieldId {
        match self {
            ChildRef::Field(id) => *id,
            ChildRef::Lazy(accessor) => accessor(arena),
        }
    }
}

impl From<FieldId> for ChildRef {
    fn from(id: FieldId) -> Self { ChildRef::Field(id) }
}

impl fmt::Debug for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildRef::Field(id) => write!(f, "Field({id})"),
            ChildRef::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODES
// ————————————————————————————————————————————————————————————————————————————

impl FieldNode {
    /// Tag used for this node's segment in a [`crate::path::FieldPath`].
    pub fn kind(&self) -> &'static str {
        match self {
            FieldNode::Form(_) => "form",
            FieldNode::Relationship(_) => "relationship",
            FieldNode::Object(_) => "object",
            FieldNode::Array(_) => "array",
            FieldNode::Conditional(_) => "conditional",
        }
    }

    pub fn object<K, I>(fields: I) -> Result<Self, FieldBuildError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ChildRef)>,
    {
        let fields = collect_unique("object", fields)?;
        Ok(FieldNode::Object(ObjectField { fields }))
    }

    pub fn array(element: FieldId) -> Self {
        FieldNode::Array(ArrayField { element, label: None })
    }

    /// Builds a conditional, rejecting branch sets that the discriminant's
    /// default cannot select.
    pub fn conditional<K, I>(discriminant: Discriminant, values: I) -> Result<Self, FieldBuildError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ChildRef)>,
    {
        let values = collect_unique("conditional", values)?;
        let domain = discriminant.domain();
        if let Some(key) = values.keys().find(|k| !domain.contains(*k)) {
            return Err(FieldBuildError::BranchOutsideDomain { key: key.clone(), domain });
        }
        let default = discriminant.default_key();
        if !values.contains_key(&default) {
            return Err(FieldBuildError::MissingDefaultBranch { default });
        }
        Ok(FieldNode::Conditional(ConditionalField { discriminant, values }))
    }
}

impl ObjectField {
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ChildRef)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ConditionalField {
    pub fn discriminant(&self) -> &Discriminant { &self.discriminant }

    pub fn branches(&self) -> impl Iterator<Item = (&str, &ChildRef)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn default_key(&self) -> String { self.discriminant.default_key() }

    pub fn default_branch(&self) -> Option<&ChildRef> {
        self.values.get(&self.discriminant.default_key())
    }
}

fn collect_unique<K, I>(kind: &'static str, entries: I) -> Result<IndexMap<String, ChildRef>, FieldBuildError>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, ChildRef)>,
{
    let mut out = IndexMap::new();
    for (key, child) in entries {
        let key = key.into();
        if out.contains_key(&key) {
            return Err(FieldBuildError::DuplicateKey { kind, key });
        }
        out.insert(key, child);
    }
    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// ARENA
// ————————————————————————————————————————————————————————————————————————————

impl FieldArena {
    pub fn new() -> Self {
        Self {
            tag: NEXT_ARENA.fetch_add(1, Ordering::Relaxed),
            slots: RefCell::new(Vec::new()),
        }
    }

    pub fn insert(&self, node: FieldNode) -> FieldId {
        let mut slots = self.slots.borrow_mut();
        slots.push(Some(Rc::new(node)));
        FieldId { arena: self.tag, index: slots.len() - 1 }
    }

    /// Slot index for `id`, or `None` when another arena issued it.
    fn slot_of(&self, id: FieldId) -> Option<usize> {
        (id.arena == self.tag).then_some(id.index)
    }

    /// Allocate a handle now and supply its node later with [`Self::define`].
    /// This is how a node gets to hold its own handle in an eager slot.
    pub fn reserve(&self) -> FieldId {
        let mut slots = self.slots.borrow_mut();
        slots.push(None);
        FieldId { arena: self.tag, index: slots.len() - 1 }
    }

    pub fn define(&self, id: FieldId, node: FieldNode) -> Result<(), FieldBuildError> {
        let mut slots = self.slots.borrow_mut();
        match self.slot_of(id).and_then(|index| slots.get_mut(index)) {
            None => Err(FieldBuildError::UnknownHandle { id }),
            Some(slot) if slot.is_some() => Err(FieldBuildError::AlreadyDefined { id }),
            Some(slot) => {
                *slot = Some(Rc::new(node));
                Ok(())
            }
        }
    }

    /// `None` for foreign handles and for reserved handles never defined.
    pub fn get(&self, id: FieldId) -> Option<Rc<FieldNode>> {
        let index = self.slot_of(id)?;
        self.slots.borrow().get(index).cloned().flatten()
    }

    pub fn len(&self) -> usize { self.slots.borrow().len() }

    pub fn is_empty(&self) -> bool { self.slots.borrow().is_empty() }

    pub fn form(&self, field: FormField) -> FieldId {
        self.insert(FieldNode::Form(field))
    }

    pub fn empty(&self) -> FieldId {
        self.form(FormField::empty())
    }

    pub fn relationship(&self, list_key: impl Into<String>, label: impl Into<String>) -> FieldId {
        self.insert(FieldNode::Relationship(RelationshipField::new(list_key, label)))
    }

    pub fn object<K, I>(&self, fields: I) -> Result<FieldId, FieldBuildError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ChildRef)>,
    {
        Ok(self.insert(FieldNode::object(fields)?))
    }

    pub fn array(&self, element: FieldId) -> FieldId {
        self.insert(FieldNode::array(element))
    }

    pub fn conditional<K, I>(&self, discriminant: Discriminant, values: I) -> Result<FieldId, FieldBuildError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ChildRef)>,
    {
        Ok(self.insert(FieldNode::conditional(discriminant, values)?))
    }
}

impl Default for FieldArena {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for FieldArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArena")
            .field("tag", &self.tag)
            .field("len", &self.len())
            .finish()
    }
}

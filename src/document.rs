//! JSON schema documents: field graphs authored outside of Rust.
//!
//! A document names its reusable fields under `definitions` and points at
//! them with `{ "kind": "ref", "to": "<name>" }`. Each definition becomes
//! exactly one node, so every ref to the same name shares one identity. That
//! is how documents express both sharing and recursion.
//!
//! ```json
//! {
//!   "lists": ["Post"],
//!   "definitions": {
//!     "Tree": { "kind": "object", "fields": {
//!       "label": { "kind": "text" },
//!       "children": { "kind": "array", "element": { "kind": "ref", "to": "Tree" } }
//!     } }
//!   },
//!   "root": { "kind": "ref", "to": "Tree" }
//! }
//! ```
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::assert::{FieldAssertionError, assert_valid_field};
use crate::field::{
    ArrayField, ChildRef, Discriminant, FieldArena, FieldBuildError, FieldId, FieldNode, FormField,
    RelationshipField, SelectOption,
};
use crate::initial::{InitialValueError, initial_value};
use crate::path_de::{ParseError, from_slice_with_path, from_str_with_path};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Lists relationship fields in this document may point at.
    #[serde(default)]
    pub lists: IndexSet<String>,
    #[serde(default)]
    pub definitions: IndexMap<String, FieldDef>,
    pub root: FieldDef,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum FieldDef {
    Empty,
    Text {
        #[serde(default)]
        label: String,
        #[serde(default)]
        default: String,
    },
    Url {
        #[serde(default)]
        label: String,
        #[serde(default)]
        default: String,
    },
    Integer {
        #[serde(default)]
        label: String,
        #[serde(default)]
        default: i64,
    },
    Checkbox {
        #[serde(default)]
        label: String,
        #[serde(default)]
        default: bool,
    },
    Select {
        #[serde(default)]
        label: String,
        options: Vec<SelectOption>,
        default: String,
    },
    Relationship {
        #[serde(default)]
        label: String,
        list_key: String,
        #[serde(default)]
        many: bool,
    },
    Object {
        fields: IndexMap<String, FieldDef>,
    },
    Array {
        element: Box<FieldDef>,
        #[serde(default)]
        label: Option<String>,
    },
    Conditional {
        discriminant: DiscriminantDef,
        values: IndexMap<String, FieldDef>,
    },
    Ref {
        to: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DiscriminantDef {
    Checkbox {
        #[serde(default)]
        label: String,
        #[serde(default)]
        default: bool,
    },
    Select {
        #[serde(default)]
        label: String,
        options: Vec<SelectOption>,
        default: String,
    },
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{at}: no definition named \"{name}\"")]
    UnknownReference { at: String, name: String },

    #[error("{at}: a definition must describe a field, not refer to another definition")]
    AliasDefinition { at: String },

    #[error("{at}: {source}")]
    Build { at: String, source: FieldBuildError },
}

/// A document lowered into an arena, ready to check.
#[derive(Debug)]
pub struct LoadedDocument {
    pub arena: FieldArena,
    pub root: FieldId,
    pub lists: IndexSet<String>,
}

struct Lowering<'a> {
    arena: &'a FieldArena,
    names: IndexMap<String, FieldId>,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

pub fn load_document(path: &Path) -> Result<LoadedDocument, DocumentError> {
    let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = from_slice_with_path::<SchemaDocument>(&bytes)?;
    debug!(path = %path.display(), definitions = document.definitions.len(), "parsed schema document");
    lower_document(document)
}

pub fn parse_document(src: &str) -> Result<LoadedDocument, DocumentError> {
    lower_document(from_str_with_path::<SchemaDocument>(src)?)
}

/// Every definition is reserved before any is built, so refs may point
/// forward, backward, or at the definition they appear in.
pub fn lower_document(document: SchemaDocument) -> Result<LoadedDocument, DocumentError> {
    let arena = FieldArena::new();
    let root = {
        let names = document
            .definitions
            .keys()
            .map(|name| (name.clone(), arena.reserve()))
            .collect::<IndexMap<_, _>>();
        let lowering = Lowering { arena: &arena, names };
        for (name, def) in &document.definitions {
            let at = format!("definitions.{name}");
            let id = lowering.names[name];
            let node = lowering.node(def, &at)?;
            arena
                .define(id, node)
                .map_err(|source| DocumentError::Build { at: at.clone(), source })?;
        }
        lowering.field(&document.root, "root")?
    };
    Ok(LoadedDocument { arena, root, lists: document.lists })
}

// ————————————————————————————————————————————————————————————————————————————
// LOADED DOCUMENTS
// ————————————————————————————————————————————————————————————————————————————

impl LoadedDocument {
    /// Document lists plus any supplied by the caller.
    pub fn known_lists<I, S>(&self, extra: I) -> IndexSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lists = self.lists.clone();
        lists.extend(extra.into_iter().map(Into::into));
        lists
    }

    pub fn validate<I, S>(&self, extra_lists: I) -> Result<(), FieldAssertionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lists = self.known_lists(extra_lists);
        assert_valid_field(&self.arena, self.root, &lists)
    }

    pub fn initial_value(&self) -> Result<Value, InitialValueError> {
        initial_value(&self.arena, self.root)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LOWERING
// ————————————————————————————————————————————————————————————————————————————

impl Lowering<'_> {
    fn field(&self, def: &FieldDef, at: &str) -> Result<FieldId, DocumentError> {
        if let FieldDef::Ref { to } = def {
            return self.names.get(to).copied().ok_or_else(|| DocumentError::UnknownReference {
                at: at.to_string(),
                name: to.clone(),
            });
        }
        Ok(self.arena.insert(self.node(def, at)?))
    }

    fn child(&self, def: &FieldDef, at: &str) -> Result<ChildRef, DocumentError> {
        self.field(def, at).map(ChildRef::from)
    }

    fn node(&self, def: &FieldDef, at: &str) -> Result<FieldNode, DocumentError> {
        let build = |source| DocumentError::Build { at: at.to_string(), source };
        let node = match def {
            FieldDef::Empty => FieldNode::Form(FormField::empty()),
            FieldDef::Text { label, default } => FieldNode::Form(FormField::text(label, default)),
            FieldDef::Url { label, default } => FieldNode::Form(FormField::url(label, default)),
            FieldDef::Integer { label, default } => FieldNode::Form(FormField::integer(label, *default)),
            FieldDef::Checkbox { label, default } => FieldNode::Form(FormField::checkbox(label, *default)),
            FieldDef::Select { label, options, default } => {
                FieldNode::Form(FormField::select(label, options.clone(), default).map_err(build)?)
            }
            FieldDef::Relationship { label, list_key, many } => {
                FieldNode::Relationship(RelationshipField::new(list_key, label).many(*many))
            }
            FieldDef::Object { fields } => {
                let mut children = Vec::with_capacity(fields.len());
                for (key, def) in fields {
                    children.push((key.clone(), self.child(def, &format!("{at}.fields.{key}"))?));
                }
                FieldNode::object(children).map_err(build)?
            }
            FieldDef::Array { element, label } => {
                let element = self.field(element, &format!("{at}.element"))?;
                FieldNode::Array(ArrayField { element, label: label.clone() })
            }
            FieldDef::Conditional { discriminant, values } => {
                let discriminant = match discriminant {
                    DiscriminantDef::Checkbox { label, default } => Discriminant::checkbox(label, *default),
                    DiscriminantDef::Select { label, options, default } => {
                        Discriminant::select(label, options.clone(), default).map_err(build)?
                    }
                };
                let mut branches = Vec::with_capacity(values.len());
                for (key, def) in values {
                    branches.push((key.clone(), self.child(def, &format!("{at}.values.{key}"))?));
                }
                FieldNode::conditional(discriminant, branches).map_err(build)?
            }
            FieldDef::Ref { .. } => {
                return Err(DocumentError::AliasDefinition { at: at.to_string() });
            }
        };
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recursive_tree_document_validates() {
        let doc = parse_document(
            r#"{
                "definitions": {
                    "Tree": { "kind": "object", "fields": {
                        "label": { "kind": "text", "default": "node" },
                        "children": { "kind": "array", "element": { "kind": "ref", "to": "Tree" } }
                    } }
                },
                "root": { "kind": "ref", "to": "Tree" }
            }"#,
        )
        .unwrap();
        doc.validate(Vec::<String>::new()).unwrap();
        assert_eq!(doc.initial_value().unwrap(), json!({ "label": "node", "children": [] }));
    }

    #[test]
    fn refs_share_one_node() {
        let doc = parse_document(
            r#"{
                "definitions": { "Leaf": { "kind": "integer", "default": 1 } },
                "root": { "kind": "object", "fields": {
                    "a": { "kind": "ref", "to": "Leaf" },
                    "b": { "kind": "ref", "to": "Leaf" }
                } }
            }"#,
        )
        .unwrap();
        let node = doc.arena.get(doc.root).unwrap();
        let FieldNode::Object(object) = &*node else { panic!("root is not an object") };
        let ids: Vec<FieldId> = object.fields().map(|(_, c)| c.resolve(&doc.arena)).collect();
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn self_containing_definition_is_a_cycle() {
        let doc = parse_document(
            r#"{
                "definitions": { "Loop": { "kind": "object", "fields": { "x": { "kind": "ref", "to": "Loop" } } } },
                "root": { "kind": "array", "element": { "kind": "ref", "to": "Loop" } }
            }"#,
        )
        .unwrap();
        let err = doc.validate(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.path().to_string(), "array.object.x");
    }

    #[test]
    fn document_lists_merge_with_extra_lists() {
        let doc = parse_document(
            r#"{
                "lists": ["User"],
                "root": { "kind": "object", "fields": {
                    "author": { "kind": "relationship", "list_key": "User" },
                    "post": { "kind": "relationship", "list_key": "Post", "many": true }
                } }
            }"#,
        )
        .unwrap();
        let err = doc.validate(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, FieldAssertionError::UnknownList { ref list_key, .. } if list_key == "Post"));
        doc.validate(["Post"]).unwrap();
    }

    #[test]
    fn unknown_reference_is_reported_with_location() {
        let err = parse_document(
            r#"{ "root": { "kind": "object", "fields": { "a": { "kind": "ref", "to": "Nope" } } } }"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "root.fields.a: no definition named \"Nope\"");
    }

    #[test]
    fn alias_definition_is_rejected() {
        let err = parse_document(
            r#"{
                "definitions": { "A": { "kind": "ref", "to": "B" }, "B": { "kind": "empty" } },
                "root": { "kind": "ref", "to": "A" }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::AliasDefinition { ref at } if at == "definitions.A"));
    }

    #[test]
    fn conditional_without_default_branch_fails_to_build() {
        let err = parse_document(
            r#"{ "root": {
                "kind": "conditional",
                "discriminant": { "kind": "checkbox", "default": false },
                "values": { "true": { "kind": "empty" } }
            } }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Build { source: FieldBuildError::MissingDefaultBranch { .. }, .. }
        ));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let err = parse_document(r#"{ "root": { "kind": "color" } }"#).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }
}

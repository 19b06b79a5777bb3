//! Initial values: what an editor is pre-populated with before any input.
//!
//! Only the eager part of the graph is expanded. Arrays start empty and only
//! the default branch of a conditional is built, so a graph accepted by
//! [`crate::assert::assert_valid_field`] produces a finite value. The eager
//! chain is still tracked here so that a cyclic graph is reported instead of
//! overflowing the stack.
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::assert::LiveChain;
use crate::field::{FieldArena, FieldId, FieldNode};
use crate::path::FieldPath;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitialValueError {
    #[error("the initial value of the field at \"{path}\" contains itself")]
    Cycle { path: FieldPath },

    #[error("the field at \"{path}\" refers to {id}, which has no field defined for it")]
    Dangling { path: FieldPath, id: FieldId },

    #[error("the conditional field at \"{path}\" has no branch for its default \"{default}\"")]
    MissingDefaultBranch { path: FieldPath, default: String },
}

pub fn initial_value(arena: &FieldArena, root: FieldId) -> Result<Value, InitialValueError> {
    let value = build(arena, root, &LiveChain::Empty, &FieldPath::root())?;
    debug!(%root, "built initial value");
    Ok(value)
}

fn build(arena: &FieldArena, id: FieldId, live: &LiveChain<'_>, path: &FieldPath) -> Result<Value, InitialValueError> {
    if live.contains(id) {
        return Err(InitialValueError::Cycle { path: path.clone() });
    }
    let node = arena
        .get(id)
        .ok_or_else(|| InitialValueError::Dangling { path: path.clone(), id })?;

    match &*node {
        FieldNode::Form(form) => Ok(form.default.clone()),
        FieldNode::Relationship(relationship) => {
            if relationship.many {
                Ok(Value::Array(Vec::new()))
            } else {
                Ok(Value::Null)
            }
        }
        FieldNode::Array(_) => Ok(Value::Array(Vec::new())),
        FieldNode::Object(object) => {
            let live = live.push(id);
            let mut out = Map::new();
            for (key, child) in object.fields() {
                let child_path = path.child("object", Some(key));
                let value = build(arena, child.resolve(arena), &live, &child_path)?;
                out.insert(key.to_string(), value);
            }
            Ok(Value::Object(out))
        }
        FieldNode::Conditional(conditional) => {
            let default = conditional.default_key();
            let branch = conditional.default_branch().ok_or_else(|| {
                InitialValueError::MissingDefaultBranch { path: path.clone(), default: default.clone() }
            })?;
            let live = live.push(id);
            let branch_path = path.child("conditional", Some(default.as_str()));
            let value = build(arena, branch.resolve(arena), &live, &branch_path)?;
            let mut out = Map::new();
            out.insert("discriminant".to_string(), conditional.discriminant().default_value());
            out.insert("value".to_string(), value);
            Ok(Value::Object(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ChildRef, Discriminant, FormField, RelationshipField, SelectOption};
    use serde_json::json;

    #[test]
    fn leaves_and_containers() {
        let arena = FieldArena::new();
        let title = arena.form(FormField::text("Title", "Untitled"));
        let count = arena.form(FormField::integer("Count", 3));
        let authors = arena.insert(FieldNode::Relationship(RelationshipField::new("User", "Authors").many(true)));
        let cover = arena.relationship("Image", "Cover");
        let tags = arena.array(title);
        let root = arena
            .object([
                ("title", ChildRef::from(title)),
                ("count", ChildRef::from(count)),
                ("authors", ChildRef::from(authors)),
                ("cover", ChildRef::from(cover)),
                ("tags", ChildRef::from(tags)),
            ])
            .unwrap();
        let value = initial_value(&arena, root).unwrap();
        assert_eq!(
            value,
            json!({ "title": "Untitled", "count": 3, "authors": [], "cover": null, "tags": [] })
        );
    }

    #[test]
    fn conditional_builds_only_its_default_branch() {
        let arena = FieldArena::new();
        let image = arena.form(FormField::url("Src", "https://example.com/a.png"));
        let quote = arena.form(FormField::text("Quote", ""));
        let kind = Discriminant::select(
            "Kind",
            vec![SelectOption::new("Image", "image"), SelectOption::new("Quote", "quote")],
            "quote",
        )
        .unwrap();
        let root = arena
            .conditional(kind, [("image", ChildRef::from(image)), ("quote", ChildRef::from(quote))])
            .unwrap();
        let value = initial_value(&arena, root).unwrap();
        assert_eq!(value, json!({ "discriminant": "quote", "value": "" }));
    }

    #[test]
    fn recursive_tree_through_array_is_finite() {
        let arena = FieldArena::new();
        let node = arena.reserve();
        let children = arena.array(node);
        let label = arena.form(FormField::text("Label", "root"));
        let object = FieldNode::object([("label", ChildRef::from(label)), ("children", ChildRef::from(children))]).unwrap();
        arena.define(node, object).unwrap();

        let value = initial_value(&arena, node).unwrap();
        assert_eq!(value, json!({ "label": "root", "children": [] }));
    }

    #[test]
    fn eager_cycle_is_an_error_not_an_overflow() {
        let arena = FieldArena::new();
        let object = arena.reserve();
        arena
            .define(object, FieldNode::object([("x", ChildRef::from(object))]).unwrap())
            .unwrap();
        let err = initial_value(&arena, object).unwrap_err();
        assert_eq!(err, InitialValueError::Cycle { path: FieldPath::root().child("object", Some("x")) });
    }

    #[test]
    fn non_default_recursion_is_not_expanded() {
        let arena = FieldArena::new();
        let empty = arena.empty();
        let conditional = arena.reserve();
        let node = FieldNode::conditional(
            Discriminant::checkbox("More", false),
            [("true", ChildRef::from(conditional)), ("false", ChildRef::from(empty))],
        )
        .unwrap();
        arena.define(conditional, node).unwrap();
        let value = initial_value(&arena, conditional).unwrap();
        assert_eq!(value, json!({ "discriminant": false, "value": null }));
    }

    #[test]
    fn cycle_hidden_by_an_earlier_revisit_is_still_reported() {
        // conditional { true: X, false: X }, X = object { a: <conditional> }.
        // The non-default branch marks X as seen first, so the structural
        // check never re-enters X along the default branch.
        let arena = FieldArena::new();
        let conditional = arena.reserve();
        let shared = arena.object([("a", ChildRef::from(conditional))]).unwrap();
        let node = FieldNode::conditional(
            Discriminant::checkbox("", false),
            [("true", ChildRef::from(shared)), ("false", ChildRef::from(shared))],
        )
        .unwrap();
        arena.define(conditional, node).unwrap();

        let lists: [&str; 0] = [];
        crate::assert::assert_valid_field(&arena, conditional, &lists[..]).unwrap();
        let err = initial_value(&arena, conditional).unwrap_err();
        assert_eq!(err.to_string(), "the initial value of the field at \"conditional.false.object.a\" contains itself");
    }
}

//! Structural validation for recursive field schemas.
//!
//! A schema is a graph of [`field::FieldNode`]s held in a [`field::FieldArena`].
//! [`assert::assert_valid_field`] accepts it only if the part needed to build
//! its [`initial::initial_value`] is finite, while still allowing recursion
//! through arrays and non-default conditional branches.
pub mod assert;
pub mod cli;
pub mod document;
pub mod field;
pub mod initial;
pub mod path;
pub mod path_de;

pub use assert::{FieldAssertionError, KnownLists, assert_valid_field};
pub use field::{ChildRef, FieldArena, FieldId, FieldNode};
pub use initial::initial_value;
pub use path::FieldPath;

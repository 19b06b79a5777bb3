use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::FieldBuildError;

// ————————————————————————————————————————————————————————————————————————————
// LEAF FIELDS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Empty,
    Text,
    Url,
    Integer,
    Checkbox,
    Select(Vec<SelectOption>),
}

/// Leaf carrying an editor kind and the value it starts out with.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub label: Option<String>,
    pub kind: FormKind,
    pub default: Value,
}

impl FormField {
    pub fn empty() -> Self {
        Self { label: None, kind: FormKind::Empty, default: Value::Null }
    }
    pub fn text(label: impl Into<String>, default: impl Into<String>) -> Self {
        Self { label: Some(label.into()), kind: FormKind::Text, default: Value::String(default.into()) }
    }
    pub fn url(label: impl Into<String>, default: impl Into<String>) -> Self {
        Self { label: Some(label.into()), kind: FormKind::Url, default: Value::String(default.into()) }
    }
    pub fn integer(label: impl Into<String>, default: i64) -> Self {
        Self { label: Some(label.into()), kind: FormKind::Integer, default: Value::from(default) }
    }
    pub fn checkbox(label: impl Into<String>, default: bool) -> Self {
        Self { label: Some(label.into()), kind: FormKind::Checkbox, default: Value::Bool(default) }
    }
    pub fn select(
        label: impl Into<String>,
        options: Vec<SelectOption>,
        default: impl Into<String>,
    ) -> Result<Self, FieldBuildError> {
        let default = default.into();
        check_select_default(&options, &default)?;
        Ok(Self {
            label: Some(label.into()),
            kind: FormKind::Select(options),
            default: Value::String(default),
        })
    }
}

/// Leaf pointing at an externally registered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipField {
    pub list_key: String,
    pub label: String,
    pub many: bool,
}

impl RelationshipField {
    pub fn new(list_key: impl Into<String>, label: impl Into<String>) -> Self {
        Self { list_key: list_key.into(), label: label.into(), many: false }
    }
    pub fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DISCRIMINANT
// ————————————————————————————————————————————————————————————————————————————

/// The small-domain form field that picks a conditional's branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Discriminant {
    Checkbox { label: String, default: bool },
    Select { label: String, options: Vec<SelectOption>, default: String },
}

impl Discriminant {
    pub fn checkbox(label: impl Into<String>, default: bool) -> Self {
        Discriminant::Checkbox { label: label.into(), default }
    }

    pub fn select(
        label: impl Into<String>,
        options: Vec<SelectOption>,
        default: impl Into<String>,
    ) -> Result<Self, FieldBuildError> {
        let default = default.into();
        check_select_default(&options, &default)?;
        Ok(Discriminant::Select { label: label.into(), options, default })
    }

    /// Branch key selected when nothing has been chosen yet.
    pub fn default_key(&self) -> String {
        match self {
            Discriminant::Checkbox { default, .. } => default.to_string(),
            Discriminant::Select { default, .. } => default.clone(),
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            Discriminant::Checkbox { default, .. } => Value::Bool(*default),
            Discriminant::Select { default, .. } => Value::String(default.clone()),
        }
    }

    /// Every key a branch may be registered under.
    pub fn domain(&self) -> Vec<String> {
        match self {
            Discriminant::Checkbox { .. } => vec!["true".to_string(), "false".to_string()],
            Discriminant::Select { options, .. } => {
                options.iter().map(|o| o.value.clone()).collect()
            }
        }
    }
}

fn check_select_default(options: &[SelectOption], default: &str) -> Result<(), FieldBuildError> {
    if options.iter().any(|o| o.value == default) {
        return Ok(());
    }
    Err(FieldBuildError::SelectDefaultNotAnOption {
        default: default.to_string(),
        options: options.iter().map(|o| o.value.clone()).collect(),
    })
}

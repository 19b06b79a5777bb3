//! Dotted locations inside a field graph.
//!
//! A path is the list of kind tags and keys walked from the root, e.g.
//! `array.object.x` or `conditional.false`. The root itself is the empty path.
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn root() -> Self { Self::default() }

    /// Extend with a kind tag and, for keyed containers, the key.
    pub fn child(&self, tag: &str, key: Option<&str>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(tag.to_string());
        if let Some(key) = key {
            segments.push(key.to_string());
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[String] { &self.segments }

    pub fn is_root(&self) -> bool { self.segments.is_empty() }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

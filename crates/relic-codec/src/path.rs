//! Schema paths for error and warning locations.

use std::fmt;

/// One step from a node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A named record field.
    Field(String),
    /// An array element or tuple position.
    Index(usize),
}

/// The sequence of field names and indices from the schema root to a node.
///
/// Displayed as `$.players[2].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SchemaPath(Vec<PathSegment>);

impl SchemaPath {
    /// The path of the schema root.
    pub fn root() -> Self {
        Self::default()
    }

    /// The segments from root to leaf.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a new path extended by a field name.
    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.into()));
        Self(segments)
    }

    /// Return a new path extended by an index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A borrowed, stack-allocated path used while walking a schema.
///
/// Each recursive call links a new frame to its parent, so no allocation
/// happens unless an error or warning needs an owned [`SchemaPath`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum Trail<'a> {
    Root,
    Field(&'a Trail<'a>, &'a str),
    Index(&'a Trail<'a>, usize),
}

impl Trail<'_> {
    pub(crate) fn to_path(&self) -> SchemaPath {
        let mut segments = Vec::new();
        let mut current = self;
        loop {
            match current {
                Trail::Root => break,
                Trail::Field(parent, name) => {
                    segments.push(PathSegment::Field((*name).to_string()));
                    current = parent;
                }
                Trail::Index(parent, index) => {
                    segments.push(PathSegment::Index(*index));
                    current = parent;
                }
            }
        }
        segments.reverse();
        SchemaPath(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let path = SchemaPath::root().field("players").index(2).field("name");
        assert_eq!(path.to_string(), "$.players[2].name");
        assert_eq!(SchemaPath::root().to_string(), "$");
    }

    #[test]
    fn test_trail_to_path() {
        let root = Trail::Root;
        let field = Trail::Field(&root, "tiles");
        let index = Trail::Index(&field, 7);
        let leaf = Trail::Field(&index, "height");

        assert_eq!(
            leaf.to_path(),
            SchemaPath::root().field("tiles").index(7).field("height")
        );
    }
}

//! The nested document built for every row and submitted as process input.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Scalar(Value),
    Map(Document),
    List(Vec<Node>),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Map(_) => "map",
            Node::List(_) => "list",
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Scalar(value)
    }
}

/// The key already holds a node of another kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub found: &'static str,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Node>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Sets `key`, replacing whatever was there.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        self.0.insert(key.into(), node.into())
    }

    /// Returns the nested map under `key`, creating it when absent.
    pub fn entry_map(&mut self, key: &str) -> Result<&mut Document, Collision> {
        match self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Node::Map(Document::new()))
        {
            Node::Map(map) => Ok(map),
            other => Err(Collision { found: other.kind() }),
        }
    }

    /// Returns the list under `key`, creating it when absent.
    pub fn entry_list(&mut self, key: &str) -> Result<&mut Vec<Node>, Collision> {
        match self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Node::List(Vec::new()))
        {
            Node::List(list) => Ok(list),
            other => Err(Collision { found: other.kind() }),
        }
    }

    /// Walks `path` from this map, creating nested maps along the way.
    ///
    /// On collision returns the offending segment; nothing already present is
    /// overwritten, though maps created before the collision stay.
    pub fn walk_mut<'a>(
        &'a mut self,
        path: &[String],
    ) -> Result<&'a mut Document, (String, Collision)> {
        let mut current = self;
        for segment in path {
            current = current
                .entry_map(segment)
                .map_err(|collision| (segment.clone(), collision))?;
        }
        Ok(current)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl FromIterator<(String, Node)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        Document(iter.into_iter().collect())
    }
}

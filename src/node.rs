use crate::{
    document::{self, Attributes, Document},
    error::Result,
};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

pub const DEFAULT_ID_LENGTH: usize = 16;
pub const DEFAULT_ID_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Attribute key of the nested parameter map.
pub const PROPERTIES: &str = "properties";
/// Attribute naming the role tree a node anchors.
pub const ROLE_ATTRIBUTE: &str = "role";
/// Property stamped on the nodes of a role subtree.
pub const ROLE_PROPERTY: &str = "ROLE";

static DEFAULT_ALPHABET_CHARS: Lazy<Vec<char>> = Lazy::new(|| DEFAULT_ID_ALPHABET.chars().collect());

static EMPTY_PROPERTIES: Lazy<Attributes> = Lazy::new(Map::new);

/// A single behavior tree vertex. Children are referenced by id and owned
/// by the enclosing [`crate::Tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    /// Name of the node type, e.g. `Sequence` or `HasBall`
    pub title: String,
    pub attributes: Attributes,
    pub children: Vec<String>,
}

impl Node {
    /// Creates a node without attributes or children and a generated id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(title, Self::generate_default_id())
    }

    pub fn with_id(title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            attributes: Map::new(),
            children: vec![],
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_children<S: Into<String>>(mut self, children: impl IntoIterator<Item = S>) -> Self {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn generate_id(length: usize, alphabet: &str) -> String {
        let chars: Vec<char> = alphabet.chars().collect();
        Self::generate_from(length, &chars)
    }

    pub fn generate_default_id() -> String {
        Self::generate_from(DEFAULT_ID_LENGTH, &DEFAULT_ALPHABET_CHARS)
    }

    fn generate_from(length: usize, chars: &[char]) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .filter_map(|_| chars.choose(&mut rng))
            .collect()
    }

    pub fn add_child(&mut self, id: impl Into<String>) {
        self.children.push(id.into());
    }

    /// Removes every occurrence of `id`; absent ids are ignored.
    pub fn remove_child(&mut self, id: &str) {
        self.children.retain(|child| child != id);
    }

    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) {
        self.attributes.shift_remove(key);
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let entry = self
            .attributes
            .entry(PROPERTIES)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(properties) = entry {
            properties.insert(key.into(), value.into());
        }
    }

    /// Replaces the property map. An empty map removes the `properties`
    /// attribute altogether.
    pub fn update_properties(&mut self, properties: Attributes) {
        if properties.is_empty() {
            self.attributes.shift_remove(PROPERTIES);
        } else {
            self.attributes
                .insert(PROPERTIES.to_owned(), Value::Object(properties));
        }
    }

    pub fn remove_property(&mut self, key: &str) {
        if let Some(Value::Object(properties)) = self.attributes.get_mut(PROPERTIES) {
            properties.shift_remove(key);
        }
    }

    pub fn properties(&self) -> &Attributes {
        match self.attributes.get(PROPERTIES) {
            Some(Value::Object(properties)) => properties,
            _ => &EMPTY_PROPERTIES,
        }
    }

    pub fn has_properties(&self) -> bool {
        self.attributes.contains_key(PROPERTIES)
    }

    /// The role tree this node anchors, if any.
    pub fn role(&self) -> Option<&str> {
        self.attributes.get(ROLE_ATTRIBUTE).and_then(Value::as_str)
    }

    pub fn is_role_anchor(&self) -> bool {
        self.attributes.contains_key(ROLE_ATTRIBUTE)
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        let map = document::object(doc, "node")?;
        let id = document::required_str(map, "id")?;
        let title = document::required_str(map, "title")?;
        let attributes = match map.get("attributes") {
            None => Map::new(),
            Some(value) => document::object(value, "\"attributes\"")?.clone(),
        };
        let children = document::optional_strings(map, "children")?;
        Ok(Self {
            id: id.to_owned(),
            title: title.to_owned(),
            attributes,
            children,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut map = Map::new();
        map.insert("id".to_owned(), Value::from(self.id.as_str()));
        map.insert("title".to_owned(), Value::from(self.title.as_str()));
        if !self.attributes.is_empty() {
            map.insert(
                "attributes".to_owned(),
                Value::Object(self.attributes.clone()),
            );
        }
        if !self.children.is_empty() {
            map.insert("children".to_owned(), Value::from(self.children.clone()));
        }
        Value::Object(map)
    }
}

impl Display for Node {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "{}", self.to_document())
    }
}

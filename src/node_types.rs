mod table;

use crate::{
    error::{Error, Result},
    node::{Node, PROPERTIES},
    settings::Settings,
};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

pub const DECORATORS: &str = "decorators";
pub const COMPOSITES: &str = "composites";

/// A node type and the parameter names a node of that type carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeType {
    pub name: String,
    pub attributes: Vec<String>,
}

impl NodeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: vec![],
        }
    }

    pub fn with_attributes<S: Into<String>>(
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a type from a raw definition row; see
    /// [`NodeTypes::check_node_type_validity`].
    pub fn from_values(definition: &[Value]) -> Result<Self> {
        NodeTypes::check_node_type_validity(definition)?;
        let mut fields = definition.iter().map(|field| match field {
            Value::String(s) => Ok(s.clone()),
            other => Err(Error::InvalidNodeType(format!(
                "parameter {} is not a string",
                other
            ))),
        });
        let name = fields.next().unwrap_or_else(|| Ok(String::new()))?;
        Ok(Self {
            name,
            attributes: fields.collect::<Result<_>>()?,
        })
    }

    fn row(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.attributes.iter().map(String::as_str))
    }
}

/// Catalogue of legal node types, grouped by category (`composites`,
/// `decorators`, `conditions`, ...).
#[derive(Debug, Clone, Default)]
pub struct NodeTypes {
    pub node_types: BTreeMap<String, Vec<NodeType>>,
    path: Option<PathBuf>,
    extension: Option<String>,
}

impl PartialEq for NodeTypes {
    fn eq(&self, other: &Self) -> bool {
        self.node_types == other.node_types
    }
}

impl NodeTypes {
    pub fn new(node_types: BTreeMap<String, Vec<NodeType>>) -> Self {
        Self {
            node_types,
            path: None,
            extension: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::load(&settings.node_types_folder, settings)
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::load(dir, &Settings::default())
    }

    /// Reads one table per category from `dir`. Hidden entries, files with
    /// another extension and tables that do not parse are skipped.
    #[instrument(skip(settings))]
    pub fn load(dir: &Path, settings: &Settings) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        let mut node_types = BTreeMap::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(category) = settings.visible_stem(entry.path(), &settings.node_types_extension)
            else {
                debug!("skipping {}", entry.path().display());
                continue;
            };
            let types = match read_table(entry.path()) {
                Ok(types) => types,
                Err(e) => {
                    warn!("skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            debug!("{} node types in category {}", types.len(), category);
            node_types.insert(category.to_owned(), types);
        }
        Ok(Self {
            node_types,
            path: Some(dir.to_owned()),
            extension: Some(settings.node_types_extension.clone()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes every category back as a table. Without `destination` the
    /// directory the catalogue was loaded from is used.
    pub fn write(&mut self, destination: Option<&Path>) -> Result<()> {
        let dir = destination
            .map(Path::to_owned)
            .or_else(|| self.path.clone())
            .ok_or(Error::NoPath)?;
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let extension = self.extension.as_deref().unwrap_or("csv");
        for (category, types) in &self.node_types {
            let path = dir.join(format!("{}.{}", category, extension));
            let mut contents = String::new();
            for node_type in types {
                contents.push_str(&table::format_row(node_type.row()));
                contents.push('\n');
            }
            std::fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
        }
        info!("wrote {} node type tables to {}", self.node_types.len(), dir.display());
        self.path = Some(dir);
        Ok(())
    }

    /// A definition is valid when it is non-empty and starts with a string.
    pub fn check_node_type_validity(definition: &[Value]) -> Result<()> {
        match definition.first() {
            None => Err(Error::InvalidNodeType("empty definition".to_owned())),
            Some(Value::String(_)) => Ok(()),
            Some(other) => Err(Error::InvalidNodeType(format!(
                "type name {} is not a string",
                other
            ))),
        }
    }

    /// A node titled after the type, with one placeholder property per
    /// parameter whose value is the parameter name itself.
    pub fn create_node_from_node_type(node_type: &NodeType) -> Node {
        let mut node = Node::new(node_type.name.as_str());
        if !node_type.attributes.is_empty() {
            let properties: Map<String, Value> = node_type
                .attributes
                .iter()
                .map(|attribute| (attribute.clone(), Value::from(attribute.as_str())))
                .collect();
            node.add_attribute(PROPERTIES, Value::Object(properties));
        }
        node
    }

    pub fn add_node_type(&mut self, category: &str, node_type: NodeType) {
        self.node_types
            .entry(category.to_owned())
            .or_default()
            .push(node_type);
    }

    pub fn remove_node_type(&mut self, category: &str, names: &[&str]) {
        if let Some(types) = self.node_types.get_mut(category) {
            types.retain(|node_type| !names.contains(&node_type.name.as_str()));
        }
    }

    /// Replaces the first type named in `old_names` with `node_type` and
    /// drops the other matches. Missing categories are left alone.
    pub fn update_node_type(&mut self, category: &str, old_names: &[&str], node_type: NodeType) {
        let Some(types) = self.node_types.get_mut(category) else {
            return;
        };
        let Some(position) = types
            .iter()
            .position(|t| old_names.contains(&t.name.as_str()))
        else {
            return;
        };
        types[position] = node_type;
        let mut index = 0;
        types.retain(|t| {
            let keep = index == position || !old_names.contains(&t.name.as_str());
            index += 1;
            keep
        });
    }

    pub fn add_category(&mut self, name: &str) {
        self.node_types.entry(name.to_owned()).or_default();
    }

    pub fn remove_category(&mut self, name: &str) {
        self.node_types.remove(name);
    }

    pub fn get_node_type_by_name(&self, name: &str) -> Vec<(&str, &NodeType)> {
        self.node_types
            .iter()
            .flat_map(|(category, types)| {
                types
                    .iter()
                    .filter(move |t| t.name == name)
                    .map(move |t| (category.as_str(), t))
            })
            .collect()
    }

    pub fn get_node_type_by_node(&self, node: &Node) -> Vec<(&str, &NodeType)> {
        self.get_node_type_by_name(&node.title)
    }

    fn in_category(&self, category: &str, title: &str) -> bool {
        self.node_types
            .get(category)
            .map_or(false, |types| types.iter().any(|t| t.name == title))
    }

    pub fn is_decorator(&self, title: &str) -> bool {
        self.in_category(DECORATORS, title)
    }

    pub fn is_composite(&self, title: &str) -> bool {
        self.in_category(COMPOSITES, title)
    }
}

impl Display for NodeTypes {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        for (category, types) in &self.node_types {
            writeln!(fmt, "[{}]", category)?;
            for node_type in types {
                writeln!(fmt, "{}", table::format_row(node_type.row()))?;
            }
        }
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<Vec<NodeType>> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut types = vec![];
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let table_error = |message: String| Error::Table {
            path: path.to_owned(),
            line: index + 1,
            message,
        };
        let (_, mut fields) = table::row(line).map_err(|e| table_error(e.to_string()))?;
        let name = fields.remove(0);
        if name.is_empty() {
            return Err(table_error("missing type name".to_owned()));
        }
        fields.retain(|field| !field.is_empty());
        types.push(NodeType {
            name,
            attributes: fields,
        });
    }
    Ok(types)
}

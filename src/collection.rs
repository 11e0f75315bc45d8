use crate::{
    document::{read_json, write_json},
    error::{Error, Result},
    node_types::NodeTypes,
    settings::{LoadVerification, Settings},
    tree::Tree,
    verification::{Verification, Violation},
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

pub const ROLES: &str = "roles";
pub const STRATEGIES: &str = "strategies";
pub const TACTICS: &str = "tactics";
pub const KEEPER: &str = "keeper";

/// Categories present in every loaded collection, even without a directory.
pub const DEFAULT_CATEGORIES: [&str; 4] = [ROLES, STRATEGIES, TACTICS, KEEPER];

/// Registry of trees by category and file name.
#[derive(Debug, Clone)]
pub struct Collection {
    pub collection: BTreeMap<String, BTreeMap<String, Tree>>,
    /// Directory the collection was loaded from or last written to
    pub path: Option<PathBuf>,
    node_types: Option<NodeTypes>,
    settings: Settings,
}

impl Default for Collection {
    fn default() -> Self {
        let mut ret = Self::new(BTreeMap::new());
        ret.ensure_default_categories();
        ret
    }
}

/// Only the registered trees are compared.
impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
    }
}

impl Collection {
    pub fn new(collection: BTreeMap<String, BTreeMap<String, Tree>>) -> Self {
        Self {
            collection,
            path: None,
            node_types: None,
            settings: Settings::default(),
        }
    }

    pub fn with_node_types(mut self, node_types: NodeTypes) -> Self {
        self.node_types = Some(node_types);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn node_types(&self) -> Option<&NodeTypes> {
        self.node_types.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn from_path(dir: &Path) -> Result<Self> {
        Self::load(dir, &Settings::default())
    }

    pub fn load(dir: &Path, settings: &Settings) -> Result<Self> {
        let mut ret = Self::default().with_settings(settings.clone());
        ret.build_collection(dir)?;
        Ok(ret)
    }

    /// Loads the node types and the trees from the folders named in
    /// `settings`. Arity checks are skipped when the node types cannot be
    /// read.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut ret = Self::default().with_settings(settings.clone());
        match NodeTypes::from_settings(settings) {
            Ok(node_types) => ret.node_types = Some(node_types),
            Err(e) => warn!("node types unavailable: {}", e),
        }
        ret.build_collection(&settings.json_folder)?;
        Ok(ret)
    }

    pub fn jsons_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Adds every tree found in `dir/<category>/<file>` to this collection.
    /// Hidden entries, files with another extension and trees that do not
    /// parse or verify are skipped.
    #[instrument(skip(self))]
    pub fn build_collection(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(Error::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        let mut loaded = vec![];
        for category_entry in walk_level(dir) {
            if !category_entry.file_type().is_dir() {
                continue;
            }
            let Some(category) = category_entry.file_name().to_str() else {
                continue;
            };
            if self.settings.is_hidden(category) {
                debug!("skipping hidden category {}", category);
                continue;
            }
            let trees = self.collection.entry(category.to_owned()).or_default();
            for file_entry in walk_level(category_entry.path()) {
                let path = file_entry.path();
                if !file_entry.file_type().is_file()
                    || self
                        .settings
                        .visible_stem(path, &self.settings.tree_extension)
                        .is_none()
                {
                    debug!("skipping {}", path.display());
                    continue;
                }
                let Some(file_name) = file_entry.file_name().to_str() else {
                    continue;
                };
                match read_json(path).and_then(|doc| Tree::from_document(&doc)) {
                    Ok(tree) => {
                        trees.insert(file_name.to_owned(), tree);
                        loaded.push((category.to_owned(), file_name.to_owned()));
                    }
                    Err(e) => warn!("skipping {}: {}", path.display(), e),
                }
            }
        }
        self.drop_unverified(&loaded);
        self.ensure_default_categories();
        info!("loaded {} trees from {}", loaded.len(), dir.display());
        self.path = Some(dir.to_owned());
        Ok(())
    }

    fn drop_unverified(&mut self, loaded: &[(String, String)]) {
        let level = self.settings.load_verification;
        if level == LoadVerification::None {
            return;
        }
        let rejected: Vec<&(String, String)> = loaded
            .iter()
            .filter(|(category, file)| {
                let Some(tree) = self.collection.get(category).and_then(|trees| trees.get(file))
                else {
                    return false;
                };
                let violations = match level {
                    LoadVerification::Full => self.verify_tree(tree, Some(category.as_str())),
                    _ => Verification::structural(tree),
                };
                for violation in &violations {
                    warn!("{}/{}: {}", category, file, violation);
                }
                !violations.is_empty()
            })
            .collect();
        for (category, file) in rejected {
            self.remove_tree(category, file);
        }
    }

    fn ensure_default_categories(&mut self) {
        for category in DEFAULT_CATEGORIES {
            self.collection.entry(category.to_owned()).or_default();
        }
    }

    /// Writes every tree to `dir/<category>/<file>`, by default into the
    /// directory the collection came from. Files are written independently;
    /// failures are collected into [`Error::PartialWrite`].
    #[instrument(skip(self))]
    pub fn write_collection(&mut self, dir: Option<&Path>) -> Result<()> {
        let dir = dir
            .map(Path::to_owned)
            .or_else(|| self.path.clone())
            .ok_or(Error::NoPath)?;
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let mut failures = vec![];
        for (category, trees) in &self.collection {
            let category_dir = dir.join(category);
            if let Err(e) = std::fs::create_dir_all(&category_dir) {
                failures.push((category_dir, e.to_string()));
                continue;
            }
            for (file, tree) in trees {
                let path = category_dir.join(file);
                if let Err(e) = write_json(&path, &tree.to_document()) {
                    warn!("{}", e);
                    failures.push((path, e.to_string()));
                }
            }
        }
        if !failures.is_empty() {
            return Err(Error::PartialWrite(failures));
        }
        info!("wrote collection to {}", dir.display());
        self.path = Some(dir);
        Ok(())
    }

    /// Writes a single tree. With `verify` the tree is checked first and
    /// the violations are returned instead of writing an invalid tree.
    pub fn write_tree(&self, tree: &Tree, path: &Path, verify: bool) -> Result<Vec<Violation>> {
        if verify {
            let violations = self.verify_tree(tree, None);
            if !violations.is_empty() {
                return Ok(violations);
            }
        }
        write_json(path, &tree.to_document())?;
        Ok(vec![])
    }

    pub fn add_tree(&mut self, category: &str, file_name: &str, tree: Tree) {
        self.collection
            .entry(category.to_owned())
            .or_default()
            .insert(file_name.to_owned(), tree);
    }

    pub fn remove_tree(&mut self, category: &str, file_name: &str) {
        if let Some(trees) = self.collection.get_mut(category) {
            trees.remove(file_name);
        }
    }

    pub fn remove_tree_by_name(&mut self, category: &str, tree_name: &str) {
        if let Some(trees) = self.collection.get_mut(category) {
            trees.retain(|_, tree| tree.name != tree_name);
        }
    }

    pub fn get_tree_by_name(&self, tree_name: &str) -> Option<&Tree> {
        self.collection
            .values()
            .flat_map(|trees| trees.values())
            .find(|tree| tree.name == tree_name)
    }

    pub fn get_tree_by_name_mut(&mut self, tree_name: &str) -> Option<&mut Tree> {
        self.collection
            .values_mut()
            .flat_map(|trees| trees.values_mut())
            .find(|tree| tree.name == tree_name)
    }

    /// The tree of the roles category called `role`.
    pub fn get_role_tree(&self, role: &str) -> Option<&Tree> {
        self.collection
            .get(ROLES)?
            .values()
            .find(|tree| tree.name == role)
    }

    fn get_role_tree_mut(&mut self, role: &str) -> Option<&mut Tree> {
        self.collection
            .get_mut(ROLES)?
            .values_mut()
            .find(|tree| tree.name == role)
    }

    pub fn categories_and_filenames(&self) -> BTreeMap<String, Vec<String>> {
        self.collection
            .iter()
            .map(|(category, trees)| (category.clone(), trees.keys().cloned().collect()))
            .collect()
    }

    /// `(root id, root title)` of every tree in `category`.
    pub fn get_root_nodes_by_category(&self, category: &str) -> Vec<(&str, &str)> {
        self.collection
            .get(category)
            .into_iter()
            .flat_map(|trees| trees.values())
            .filter_map(|tree| {
                tree.root_node()
                    .map(|root| (root.id.as_str(), root.title.as_str()))
            })
            .collect()
    }

    pub fn get_category_from_node(&self, node_id: &str) -> Option<&str> {
        self.collection
            .iter()
            .find(|(_, trees)| trees.values().any(|tree| tree.nodes.contains_key(node_id)))
            .map(|(category, _)| category.as_str())
    }

    fn infer_category(&self, tree: &Tree) -> Option<&str> {
        self.collection
            .iter()
            .find(|(_, trees)| trees.values().any(|t| t.name == tree.name))
            .map(|(category, _)| category.as_str())
            .or_else(|| self.get_category_from_node(&tree.root))
    }

    /// Runs every check of [`Verification`] with this collection as context.
    /// Without `category` it is inferred from where the tree is registered.
    pub fn verify_tree(&self, tree: &Tree, category: Option<&str>) -> Vec<Violation> {
        let category = category.or_else(|| self.infer_category(tree));
        Verification::verify(tree, category, self, self.node_types.as_ref())
    }

    /// Copies an edited role subtree of `source` into every other tree that
    /// references the same role.
    ///
    /// When `source` is itself a role definition its whole tree is the
    /// template. Otherwise the role node at or above `changed_node` (the
    /// root by default) provides the role name and its first child subtree
    /// becomes the template, which also rewrites the role definition.
    /// Nothing happens when no role node is found or it has no children.
    /// New ids follow the id length and alphabet of [`Collection::settings`].
    pub fn update_subtrees_in_collection(&mut self, source: &Tree, changed_node: Option<&str>) {
        let changed_node = changed_node.unwrap_or(&source.root);
        let settings = self.settings.clone();
        let generate = || settings.generate_id();
        let (role, template) = if self.get_role_tree(&source.name).is_some() {
            if source.root_node().is_none() {
                return;
            }
            (source.name.clone(), source.root.clone())
        } else {
            let Some(anchor) = source.find_role_subtree_node_at_or_above(changed_node) else {
                debug!("{} is not part of a role subtree", changed_node);
                return;
            };
            let Some(role) = anchor.role() else {
                return;
            };
            let Some(top) = anchor
                .children
                .first()
                .filter(|top| source.nodes.contains_key(*top))
            else {
                debug!("role node {} has no subtree", anchor.id);
                return;
            };
            if let Some(definition) = self.get_role_tree_mut(role) {
                let root = definition.root.clone();
                definition.update_subtree_with(source, &root, Some(top.as_str()), generate);
            }
            (role.to_owned(), top.clone())
        };

        for trees in self.collection.values_mut() {
            for tree in trees.values_mut().filter(|tree| tree.name != source.name) {
                let anchors: Vec<String> = tree
                    .find_role_subtree_nodes_if_exist(&role)
                    .iter()
                    .map(|anchor| anchor.id.clone())
                    .collect();
                for anchor in &anchors {
                    tree.replace_role_subtree_with(source, anchor, Some(template.as_str()), generate);
                }
                if !anchors.is_empty() {
                    debug!("updated {} role nodes of {} in {}", anchors.len(), role, tree.name);
                }
            }
        }
    }
}

fn walk_level(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
}

#[cfg(test)]
mod test;

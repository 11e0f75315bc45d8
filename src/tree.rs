use crate::{
    document::{self, Document},
    error::{Error, Result},
    node::{Node, ROLE_PROPERTY},
};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display, Formatter},
};
use tracing::debug;

const FRESH_ID_ATTEMPTS: usize = 64;

/// How [`Tree::find_role_subtree_nodes_below_node`] treats nested anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleScan {
    /// Report an anchor but do not look inside its role subtree.
    #[default]
    StopAtAnchors,
    /// Keep scanning below every anchor.
    Descend,
}

/// A behavior tree: an arena of nodes keyed by id plus the id of the root.
///
/// Children are plain id references, so dangling ids and cycles can be
/// represented while a tree is being edited. None of the mutating methods
/// reject such trees; [`crate::Verification`] reports them instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub name: String,
    pub title: String,
    pub nodes: IndexMap<String, Node>,
    /// Id of the entry node, empty when the tree has no root
    pub root: String,
}

impl Tree {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<String>,
        nodes: impl IntoIterator<Item = Node>,
    ) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            nodes: nodes.into_iter().map(|node| (node.id.clone(), node)).collect(),
            root: root.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.get(&self.root)
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        let top = document::object(doc, "tree document")?;
        let data = document::object(document::required(top, "data")?, "\"data\"")?;
        let name = document::required_str(data, "name")?;
        let title = document::required_str(data, "title")?;
        let trees = document::required_array(data, "trees")?;
        let [entry] = trees.as_slice() else {
            return Err(Error::InvalidFormat(format!(
                "expected exactly one entry in \"trees\", found {}",
                trees.len()
            )));
        };
        let entry = document::object(entry, "tree entry")?;
        let raw_nodes = document::required_array(entry, "nodes")?;
        if raw_nodes.is_empty() {
            return Err(Error::InvalidFormat("tree has no nodes".to_owned()));
        }
        let root = document::required_str(entry, "root")?;
        let mut nodes = IndexMap::with_capacity(raw_nodes.len());
        for raw in raw_nodes {
            let node = Node::from_document(raw)?;
            if nodes.contains_key(&node.id) {
                return Err(Error::InvalidFormat(format!("duplicate node id {:?}", node.id)));
            }
            nodes.insert(node.id.clone(), node);
        }
        Ok(Self {
            name: name.to_owned(),
            title: title.to_owned(),
            nodes,
            root: root.to_owned(),
        })
    }

    pub fn to_document(&self) -> Document {
        let nodes: Vec<Value> = self.nodes.values().map(Node::to_document).collect();
        json!({
            "data": {
                "name": self.name,
                "title": self.title,
                "trees": [{
                    "nodes": nodes,
                    "root": self.root,
                }],
            }
        })
    }

    /// Inserts `node`, replacing any node with the same id.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove_node(&mut self, node: &Node) -> bool {
        self.remove_node_by_id(&node.id)
    }

    pub fn remove_node_by_id(&mut self, id: &str) -> bool {
        if self.nodes.shift_remove(id).is_none() {
            return false;
        }
        if self.root == id {
            self.root.clear();
        }
        true
    }

    /// Removes `id` and everything below it. Nothing is removed when `id`
    /// is unknown or the subtree references a node that does not exist.
    pub fn remove_node_and_children_by_id(&mut self, id: &str) -> bool {
        if !self.nodes.contains_key(id) {
            return false;
        }
        let mut visited = HashSet::from([id.to_owned()]);
        let mut stack = vec![id.to_owned()];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            for child in &node.children {
                if visited.insert(child.clone()) {
                    stack.push(child.clone());
                }
            }
        }
        for removed in &visited {
            self.nodes.shift_remove(removed);
        }
        if visited.contains(&self.root) {
            self.root.clear();
        }
        true
    }

    /// Ids reachable from `id` in depth-first pre-order, `id` first. Each id
    /// is reported once; ids that do not resolve are skipped.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut ids = vec![];
        if !self.nodes.contains_key(id) {
            return ids;
        }
        let mut visited = HashSet::from([id]);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            ids.push(current.to_owned());
            for child in node.children.iter().rev() {
                if visited.insert(child.as_str()) {
                    stack.push(child.as_str());
                }
            }
        }
        ids
    }

    /// Copies the subtree of `other` rooted at `child_id` (its root by
    /// default) under `parent_id`, keeping the ids of `other`.
    pub fn add_subtree(&mut self, other: &Tree, parent_id: &str, child_id: Option<&str>) {
        self.add_subtree_with(other, parent_id, child_id, str::to_owned);
    }

    /// Like [`Tree::add_subtree`], renaming every copied id through `remap`.
    pub fn add_subtree_with(
        &mut self,
        other: &Tree,
        parent_id: &str,
        child_id: Option<&str>,
        mut remap: impl FnMut(&str) -> String,
    ) {
        let child_id = child_id.unwrap_or(&other.root);
        if !self.nodes.contains_key(parent_id) || !other.nodes.contains_key(child_id) {
            return;
        }
        let ids = other.subtree_ids(child_id);
        let mapping: HashMap<String, String> =
            ids.iter().map(|id| (id.clone(), remap(id))).collect();
        self.graft(other, &ids, &mapping);
        if let (Some(parent), Some(new_child)) =
            (self.nodes.get_mut(parent_id), mapping.get(child_id))
        {
            parent.add_child(new_child.as_str());
        }
    }

    /// Replaces the subtree at `target_id` with a copy of the subtree of
    /// `other` at `source_id`. The copied top node takes over `target_id`,
    /// every node below it gets a freshly generated id.
    pub fn update_subtree(&mut self, other: &Tree, target_id: &str, source_id: Option<&str>) {
        self.update_subtree_with(other, target_id, source_id, Node::generate_default_id);
    }

    /// Like [`Tree::update_subtree`], drawing new ids from `generate`.
    pub fn update_subtree_with(
        &mut self,
        other: &Tree,
        target_id: &str,
        source_id: Option<&str>,
        mut generate: impl FnMut() -> String,
    ) {
        let source_id = source_id.unwrap_or(&other.root);
        if !self.nodes.contains_key(target_id) || !other.nodes.contains_key(source_id) {
            return;
        }
        let ids = other.subtree_ids(source_id);
        self.remove_subtree(target_id);
        let mut mapping = HashMap::from([(source_id.to_owned(), target_id.to_owned())]);
        for id in &ids[1..] {
            let fresh = self.fresh_id(&mapping, &mut generate);
            mapping.insert(id.clone(), fresh);
        }
        debug!(
            "replacing subtree {} of {} with {} nodes of {}",
            target_id,
            self.name,
            ids.len(),
            other.name
        );
        self.graft(other, &ids, &mapping);
    }

    /// Makes a fresh-id copy of the subtree of `other` at `source_id` the
    /// only child of `anchor_id`. The anchor itself is left as it is.
    pub fn replace_role_subtree(&mut self, other: &Tree, anchor_id: &str, source_id: Option<&str>) {
        self.replace_role_subtree_with(other, anchor_id, source_id, Node::generate_default_id);
    }

    pub fn replace_role_subtree_with(
        &mut self,
        other: &Tree,
        anchor_id: &str,
        source_id: Option<&str>,
        mut generate: impl FnMut() -> String,
    ) {
        let source_id = source_id.unwrap_or(&other.root);
        if !self.nodes.contains_key(anchor_id) || !other.nodes.contains_key(source_id) {
            return;
        }
        let ids = other.subtree_ids(source_id);
        self.remove_subtree(anchor_id);
        let mut mapping = HashMap::new();
        for id in &ids {
            let fresh = self.fresh_id(&mapping, &mut generate);
            mapping.insert(id.clone(), fresh);
        }
        self.graft(other, &ids, &mapping);
        if let (Some(anchor), Some(top)) = (self.nodes.get_mut(anchor_id), mapping.get(source_id)) {
            anchor.add_child(top.as_str());
        }
    }

    /// Inserts copies of `other`'s nodes `ids`, renamed through `mapping`.
    /// Children outside of `mapping` are dropped from the copies.
    fn graft(&mut self, other: &Tree, ids: &[String], mapping: &HashMap<String, String>) {
        for id in ids {
            let (Some(source), Some(new_id)) = (other.nodes.get(id), mapping.get(id)) else {
                continue;
            };
            let mut node = source.clone();
            node.id = new_id.clone();
            node.children = source
                .children
                .iter()
                .filter_map(|child| mapping.get(child).cloned())
                .collect();
            self.add_node(node);
        }
    }

    /// An id from `generate` that is neither in the tree nor in `taken`.
    /// Falls back to the default generator when `generate` keeps colliding.
    fn fresh_id(
        &self,
        taken: &HashMap<String, String>,
        generate: &mut impl FnMut() -> String,
    ) -> String {
        let is_free = |id: &str| {
            !id.is_empty() && !self.nodes.contains_key(id) && !taken.values().any(|used| used == id)
        };
        for _ in 0..FRESH_ID_ATTEMPTS {
            let id = generate();
            if is_free(&id) {
                return id;
            }
        }
        loop {
            let id = Node::generate_default_id();
            if is_free(&id) {
                return id;
            }
        }
    }

    /// Removes every node below `id` and clears its children; `id` stays.
    pub fn remove_subtree(&mut self, id: &str) {
        let below = self.subtree_ids(id);
        if below.is_empty() {
            return;
        }
        for removed in below.iter().skip(1) {
            self.nodes.shift_remove(removed);
            if self.root == *removed {
                self.root.clear();
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.children.clear();
        }
    }

    /// Stamps `ROLE = role` on every node below `id`.
    pub fn propagate_role(&mut self, id: &str, role: &str) {
        for below in self.subtree_ids(id).iter().skip(1) {
            if let Some(node) = self.nodes.get_mut(below) {
                node.add_property(ROLE_PROPERTY, role);
            }
        }
    }

    pub fn remove_propagation(&mut self, id: &str) {
        for below in self.subtree_ids(id).iter().skip(1) {
            if let Some(node) = self.nodes.get_mut(below) {
                node.remove_property(ROLE_PROPERTY);
            }
        }
    }

    pub fn find_parent_node_if_exists(&self, id: &str) -> Option<&Node> {
        if id == self.root {
            return None;
        }
        self.nodes
            .values()
            .find(|node| node.children.iter().any(|child| child == id))
    }

    /// Nearest ancestor of `id` carrying a `role` attribute.
    pub fn find_role_subtree_node_above_node(&self, id: &str) -> Option<&Node> {
        let mut visited = HashSet::from([id]);
        let mut parent = self.find_parent_node_if_exists(id);
        while let Some(node) = parent {
            if node.is_role_anchor() {
                return Some(node);
            }
            if !visited.insert(node.id.as_str()) {
                return None;
            }
            parent = self.find_parent_node_if_exists(&node.id);
        }
        None
    }

    /// `id` itself when it is an anchor, otherwise the nearest anchor above.
    pub fn find_role_subtree_node_at_or_above(&self, id: &str) -> Option<&Node> {
        match self.nodes.get(id) {
            Some(node) if node.is_role_anchor() => Some(node),
            Some(_) => self.find_role_subtree_node_above_node(id),
            None => None,
        }
    }

    /// Role anchors found in the subtree of `id`, `id` included.
    pub fn find_role_subtree_nodes_below_node(&self, id: &str, scan: RoleScan) -> Vec<&Node> {
        let mut anchors = vec![];
        let mut visited = HashSet::from([id]);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if node.is_role_anchor() {
                anchors.push(node);
                if scan == RoleScan::StopAtAnchors && current != id {
                    continue;
                }
            }
            for child in node.children.iter().rev() {
                if visited.insert(child.as_str()) {
                    stack.push(child.as_str());
                }
            }
        }
        anchors
    }

    /// Every anchor whose `role` attribute is `role_name`. An anchor's role
    /// subtree hangs off its first child; see [`Tree::role_subtree_nodes`].
    pub fn find_role_subtree_nodes_if_exist(&self, role_name: &str) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.role() == Some(role_name))
            .collect()
    }

    pub fn role_subtree_nodes(&self, anchor_id: &str) -> Vec<&Node> {
        let Some(top) = self
            .nodes
            .get(anchor_id)
            .and_then(|anchor| anchor.children.first())
        else {
            return vec![];
        };
        self.subtree_ids(top)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }
}

impl Display for Tree {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "{}", self.to_document())
    }
}

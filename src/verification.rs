//! Structural and semantic checks of a [`Tree`].
//!
//! Nothing here mutates or fails: every check returns the list of
//! [`Violation`]s it found, and an empty list means the tree passed.

use crate::{
    collection::{Collection, ROLES, STRATEGIES, TACTICS},
    node::{Node, ROLE_PROPERTY},
    node_types::NodeTypes,
    tree::Tree,
};
use once_cell::sync::Lazy;
use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display, Formatter},
};

/// Composites that need more than one child to make sense.
static COMPOSITE_MINIMUMS: Lazy<HashMap<&'static str, usize>> =
    Lazy::new(|| HashMap::from([("ParallelSequence", 2)]));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `from` lists `to` as a child although `to` is already on the path
    /// from the root to `from`.
    Cycle { from: String, to: String },
    Unconnected { id: String, title: String },
    MissingRoot,
    RootNotFound { root: String },
    DanglingChild { parent: String, child: String },
    DecoratorArity { id: String, title: String, children: usize },
    CompositeArity {
        id: String,
        title: String,
        children: usize,
        minimum: usize,
    },
    UnknownRole { id: String, role: String },
    RoleSubtreeMissing { id: String, role: String },
    RoleMismatch { id: String, role: String, reason: String },
    /// A tree embeds a tree of the same or a higher category.
    ForbiddenSubtree {
        id: String,
        title: String,
        category: String,
    },
}

impl Display for Violation {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match self {
            Self::Cycle { from, to } => write!(fmt, "cycle: {} points back to {}", from, to),
            Self::Unconnected { id, title } => {
                write!(fmt, "node {} ({}) is not connected to the root", id, title)
            }
            Self::MissingRoot => write!(fmt, "the tree has no root"),
            Self::RootNotFound { root } => write!(fmt, "root {} is not a node of the tree", root),
            Self::DanglingChild { parent, child } => {
                write!(fmt, "node {} references missing child {}", parent, child)
            }
            Self::DecoratorArity {
                id,
                title,
                children,
            } => write!(
                fmt,
                "decorator {} ({}) needs exactly one child, has {}",
                id, title, children
            ),
            Self::CompositeArity {
                id,
                title,
                children,
                minimum,
            } => write!(
                fmt,
                "composite {} ({}) needs at least {} children, has {}",
                id, title, minimum, children
            ),
            Self::UnknownRole { id, role } => {
                write!(fmt, "node {} refers to unknown role {:?}", id, role)
            }
            Self::RoleSubtreeMissing { id, role } => {
                write!(fmt, "role node {} has no subtree for {}", id, role)
            }
            Self::RoleMismatch { id, role, reason } => {
                write!(fmt, "role node {} differs from {}: {}", id, role, reason)
            }
            Self::ForbiddenSubtree {
                id,
                title,
                category,
            } => write!(
                fmt,
                "node {} ({}) cannot be used inside a tree of {}",
                id, title, category
            ),
        }
    }
}

/// The nodes between the root and the node being visited, kept on the call
/// stack.
struct PathStack<'a, 'p> {
    id: &'a str,
    parent: Option<&'p PathStack<'a, 'p>>,
}

impl<'a, 'p> PathStack<'a, 'p> {
    fn contains(&self, id: &str) -> bool {
        if self.id == id {
            true
        } else if let Some(parent) = self.parent {
            parent.contains(id)
        } else {
            false
        }
    }
}

fn category_rank(category: &str) -> Option<u8> {
    match category {
        STRATEGIES => Some(3),
        TACTICS => Some(2),
        ROLES => Some(1),
        _ => None,
    }
}

pub struct Verification;

impl Verification {
    /// Depth-first search from the root. `seen` collects every visited id
    /// so a node reached along a second path is not flagged twice.
    pub fn contains_cycles(tree: &Tree, seen: &mut HashSet<String>) -> Vec<Violation> {
        let mut violations = vec![];
        if tree.nodes.contains_key(&tree.root) {
            let top = PathStack {
                id: &tree.root,
                parent: None,
            };
            Self::visit(tree, &top, seen, &mut violations);
        }
        violations
    }

    fn visit(
        tree: &Tree,
        path: &PathStack,
        seen: &mut HashSet<String>,
        violations: &mut Vec<Violation>,
    ) {
        seen.insert(path.id.to_owned());
        let Some(node) = tree.nodes.get(path.id) else {
            return;
        };
        for child in &node.children {
            if path.contains(child) {
                violations.push(Violation::Cycle {
                    from: node.id.clone(),
                    to: child.clone(),
                });
            } else if !seen.contains(child) && tree.nodes.contains_key(child) {
                let next = PathStack {
                    id: child,
                    parent: Some(path),
                };
                Self::visit(tree, &next, seen, violations);
            }
        }
    }

    /// Every node reachable from `start` once, safe against cycles and
    /// dangling ids.
    pub fn walk_tree<'t>(tree: &'t Tree, start: &str) -> Vec<&'t Node> {
        tree.subtree_ids(start)
            .iter()
            .filter_map(|id| tree.nodes.get(id))
            .collect()
    }

    pub fn has_unconnected_nodes(tree: &Tree) -> Vec<Violation> {
        let reachable: HashSet<String> = tree.subtree_ids(&tree.root).into_iter().collect();
        tree.nodes
            .values()
            .filter(|node| !reachable.contains(&node.id))
            .map(|node| Violation::Unconnected {
                id: node.id.clone(),
                title: node.title.clone(),
            })
            .collect()
    }

    pub fn check_root(tree: &Tree) -> Vec<Violation> {
        if tree.root.is_empty() {
            vec![Violation::MissingRoot]
        } else if !tree.nodes.contains_key(&tree.root) {
            vec![Violation::RootNotFound {
                root: tree.root.clone(),
            }]
        } else {
            vec![]
        }
    }

    pub fn dangling_children(tree: &Tree) -> Vec<Violation> {
        tree.nodes
            .values()
            .flat_map(|node| {
                node.children
                    .iter()
                    .filter(|child| !tree.nodes.contains_key(*child))
                    .map(move |child| Violation::DanglingChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    })
            })
            .collect()
    }

    /// Root, dangling children, cycles and connectivity.
    pub fn structural(tree: &Tree) -> Vec<Violation> {
        let mut violations = Self::check_root(tree);
        violations.extend(Self::dangling_children(tree));
        violations.extend(Self::contains_cycles(tree, &mut HashSet::new()));
        violations.extend(Self::has_unconnected_nodes(tree));
        violations
    }

    pub fn check_arity(tree: &Tree, node_types: &NodeTypes) -> Vec<Violation> {
        let mut violations = vec![];
        for node in tree.nodes.values() {
            let children = node.children.len();
            if node_types.is_decorator(&node.title) && children != 1 {
                violations.push(Violation::DecoratorArity {
                    id: node.id.clone(),
                    title: node.title.clone(),
                    children,
                });
            }
            if node_types.is_composite(&node.title) {
                let minimum = COMPOSITE_MINIMUMS
                    .get(node.title.as_str())
                    .copied()
                    .unwrap_or(1);
                if children < minimum {
                    violations.push(Violation::CompositeArity {
                        id: node.id.clone(),
                        title: node.title.clone(),
                        children,
                        minimum,
                    });
                }
            }
        }
        violations
    }

    /// Trees are ranked strategies > tactics > roles and may only embed
    /// trees of a lower rank. Role nodes cannot appear inside a role.
    pub fn check_nesting(tree: &Tree, category: &str, collection: &Collection) -> Vec<Violation> {
        let Some(rank) = category_rank(category) else {
            return vec![];
        };
        let embedded: HashSet<&str> = collection
            .collection
            .iter()
            .filter(|(other, _)| category_rank(other).map_or(false, |r| r >= rank))
            .flat_map(|(_, trees)| trees.values().map(|t| t.name.as_str()))
            .collect();
        tree.nodes
            .values()
            .filter(|node| node.id != tree.root)
            .filter(|node| {
                embedded.contains(node.title.as_str()) || (category == ROLES && node.is_role_anchor())
            })
            .map(|node| Violation::ForbiddenSubtree {
                id: node.id.clone(),
                title: node.title.clone(),
                category: category.to_owned(),
            })
            .collect()
    }

    /// Every role node must name a tree of the roles category and carry a
    /// copy of that tree as its first child.
    pub fn check_roles(tree: &Tree, category: Option<&str>, collection: &Collection) -> Vec<Violation> {
        let mut violations = vec![];
        for anchor in tree.nodes.values().filter(|node| node.is_role_anchor()) {
            if category == Some(ROLES) {
                continue;
            }
            let Some(role) = anchor.role() else {
                violations.push(Violation::UnknownRole {
                    id: anchor.id.clone(),
                    role: anchor
                        .attributes
                        .get(crate::node::ROLE_ATTRIBUTE)
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                });
                continue;
            };
            let Some(role_tree) = collection.get_role_tree(role) else {
                violations.push(Violation::UnknownRole {
                    id: anchor.id.clone(),
                    role: role.to_owned(),
                });
                continue;
            };
            let Some(top) = anchor
                .children
                .first()
                .filter(|top| tree.nodes.contains_key(*top))
            else {
                violations.push(Violation::RoleSubtreeMissing {
                    id: anchor.id.clone(),
                    role: role.to_owned(),
                });
                continue;
            };
            let mut visited = HashSet::new();
            if let Some(reason) = compare_subtree(tree, top, role_tree, &role_tree.root, &mut visited)
            {
                violations.push(Violation::RoleMismatch {
                    id: anchor.id.clone(),
                    role: role.to_owned(),
                    reason,
                });
            }
        }
        violations
    }

    /// All checks; arity needs `node_types`, role and nesting checks use
    /// `collection`.
    pub fn verify(
        tree: &Tree,
        category: Option<&str>,
        collection: &Collection,
        node_types: Option<&NodeTypes>,
    ) -> Vec<Violation> {
        let mut violations = Self::structural(tree);
        if let Some(node_types) = node_types {
            violations.extend(Self::check_arity(tree, node_types));
        }
        violations.extend(Self::check_roles(tree, category, collection));
        if let Some(category) = category {
            violations.extend(Self::check_nesting(tree, category, collection));
        }
        violations
    }
}

/// First difference between the instance subtree at `id` and the template
/// subtree at `template_id`, compared node for node.
fn compare_subtree<'a>(
    tree: &'a Tree,
    id: &'a str,
    template: &'a Tree,
    template_id: &'a str,
    visited: &mut HashSet<(&'a str, &'a str)>,
) -> Option<String> {
    let (Some(node), Some(expected)) = (tree.nodes.get(id), template.nodes.get(template_id)) else {
        return None;
    };
    if !visited.insert((id, template_id)) {
        return None;
    }
    if node.title != expected.title {
        return Some(format!(
            "node {} is {:?}, expected {:?}",
            node.id, node.title, expected.title
        ));
    }
    if expected.has_properties() && !node.has_properties() {
        return Some(format!("node {} has no properties", node.id));
    }
    let properties = node.properties();
    for (key, value) in expected.properties() {
        if key != ROLE_PROPERTY && properties.get(key) != Some(value) {
            return Some(format!("property {:?} of node {} differs", key, node.id));
        }
    }
    if node.children.len() != expected.children.len() {
        return Some(format!(
            "node {} has {} children, expected {}",
            node.id,
            node.children.len(),
            expected.children.len()
        ));
    }
    node.children
        .iter()
        .zip(&expected.children)
        .find_map(|(child, expected_child)| {
            compare_subtree(tree, child, template, expected_child, visited)
        })
}

//! # bt-forest
//!
//! A data model for collections of behavior trees, the checks that keep them
//! consistent, and the machinery that keeps shared role subtrees in sync.
//!
//!
//! ## Overview
//!
//! Trees are stored as JSON documents, one file per tree, in a directory
//! with one subdirectory per category:
//!
//! ```text
//! jsons/
//!   roles/EnterFormationRole.json
//!   tactics/EnterFormationTactic.json
//!   strategies/DemoTeamTwenteStrategy.json
//!   keeper/KeeperStrategy.json
//! ```
//!
//! The legal node types live next to them as comma separated tables, one
//! file per type category (`composites.csv`, `decorators.csv`, ...).
//!
//! A [`Tree`] is an arena of [`Node`]s keyed by id. Children are id
//! references, so a tree being edited may contain dangling ids or cycles;
//! [`Verification`] reports those instead of the mutators rejecting them.
//!
//!
//! ## How it looks like
//!
//! ```rust
//! use bt_forest::{Collection, Node, Tree, ROLES};
//!
//! let role = Tree::new(
//!     "Assister",
//!     "r0",
//!     vec![
//!         Node::with_id("Sequence", "r0").with_children(["r1"]),
//!         Node::with_id("Kick", "r1"),
//!     ],
//! );
//!
//! let mut collection = Collection::default();
//! collection.add_tree(ROLES, "Assister.json", role.clone());
//! assert!(collection.verify_tree(&role, None).is_empty());
//! ```
//!
//!
//! ## Role subtrees
//!
//! A node carrying a `role` attribute is a role node. Its first child is the
//! top of a copy of the tree of the roles category with that name. When
//! such a copy is edited, [`Collection::update_subtrees_in_collection`]
//! rewrites the role definition and every other copy across the collection.
//! Copies always get freshly generated node ids.
//!
//!
//! ## Configuration
//!
//! Folder names, file extensions, id generation and the checks applied while
//! loading are fields of [`Settings`], which can be read from YAML:
//!
//! ```rust
//! use bt_forest::{LoadVerification, Settings};
//!
//! let settings = Settings::from_yaml_str("json_folder: trees\nload_verification: full\n").unwrap();
//! assert_eq!(settings.load_verification, LoadVerification::Full);
//! assert_eq!(settings.tree_extension, "json");
//! ```

mod collection;
mod document;
pub mod error;
mod node;
mod node_types;
mod settings;
mod tree;
mod verification;

pub use crate::collection::{Collection, DEFAULT_CATEGORIES, KEEPER, ROLES, STRATEGIES, TACTICS};
pub use crate::document::{read_json, write_json, Attributes, Document};
pub use crate::error::{Error, Result};
pub use crate::node::{
    Node, DEFAULT_ID_ALPHABET, DEFAULT_ID_LENGTH, PROPERTIES, ROLE_ATTRIBUTE, ROLE_PROPERTY,
};
pub use crate::node_types::{NodeType, NodeTypes, COMPOSITES, DECORATORS};
pub use crate::settings::{LoadVerification, Settings};
pub use crate::tree::{RoleScan, Tree};
pub use crate::verification::{Verification, Violation};

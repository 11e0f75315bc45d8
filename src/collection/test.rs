use super::*;
use crate::{
    node::{Node, PROPERTIES, ROLE_ATTRIBUTE},
    node_types::NodeType,
};
use serde_json::json;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/collection")
}

fn node(id: &str, title: &str, children: &[&str]) -> Node {
    Node::with_id(title, id).with_children(children.iter().copied())
}

fn anchor(id: &str, role: &str, children: &[&str]) -> Node {
    let mut anchor = node(id, "Role", children);
    anchor.add_attribute(ROLE_ATTRIBUTE, role);
    anchor
}

/// `EnterFormationRole`: Sequence -> EnterFormation.
fn role_tree() -> Tree {
    let mut leaf = node("efr1", "EnterFormation", &[]);
    leaf.add_attribute(PROPERTIES, json!({"formation": "default"}));
    Tree::new(
        "EnterFormationRole",
        "efr0",
        vec![node("efr0", "Sequence", &["efr1"]), leaf],
    )
}

/// A tactic with one copy of `EnterFormationRole` below anchor `prefix`a.
fn tactic(name: &str, prefix: &str) -> Tree {
    let id = |suffix: &str| format!("{}{}", prefix, suffix);
    let mut leaf = node(&id("f"), "EnterFormation", &[]);
    leaf.add_attribute(PROPERTIES, json!({"formation": "default"}));
    Tree::new(
        name,
        id("root"),
        vec![
            node(&id("root"), "Sequence", &[id("a").as_str()]),
            anchor(&id("a"), "EnterFormationRole", &[id("s").as_str()]),
            node(&id("s"), "Sequence", &[id("f").as_str()]),
            leaf,
        ],
    )
}

fn formation_collection() -> Collection {
    let mut collection = Collection::default();
    collection.add_tree(ROLES, "EnterFormationRole.json", role_tree());
    collection.add_tree(TACTICS, "FirstTactic.json", tactic("FirstTactic", "x"));
    collection.add_tree(TACTICS, "SecondTactic.json", tactic("SecondTactic", "y"));
    collection
}

fn titles_below(tree: &Tree, anchor_id: &str) -> Vec<String> {
    tree.role_subtree_nodes(anchor_id)
        .iter()
        .map(|node| node.title.clone())
        .collect()
}

#[test]
fn test_default_categories() {
    let collection = Collection::default();
    let categories: Vec<_> = collection.collection.keys().map(String::as_str).collect();
    assert_eq!(categories, ["keeper", "roles", "strategies", "tactics"]);
    assert!(collection.path.is_none());
    assert!(Collection::new(BTreeMap::new()).collection.is_empty());
}

#[test]
fn test_build_collection() {
    let collection = Collection::from_path(&data_dir()).unwrap();
    assert_eq!(collection.jsons_path(), Some(data_dir().as_path()));

    let listing = collection.categories_and_filenames();
    assert_eq!(
        listing,
        BTreeMap::from([
            ("keeper".to_owned(), vec![]),
            ("roles".to_owned(), vec!["Assister.json".to_owned()]),
            ("strategies".to_owned(), vec!["AttackStrategy.json".to_owned()]),
            ("tactics".to_owned(), vec!["Attactic.json".to_owned()]),
        ])
    );
}

#[test]
fn test_build_collection_without_verification() {
    let settings = Settings::default().with_load_verification(LoadVerification::None);
    let collection = Collection::load(&data_dir(), &settings).unwrap();
    assert!(collection.get_tree_by_name("Cyclic").is_some());

    let settings = Settings::default().with_load_verification(LoadVerification::Full);
    let collection = Collection::load(&data_dir(), &settings).unwrap();
    assert!(collection.get_tree_by_name("Cyclic").is_none());
    assert!(collection.get_tree_by_name("Attactic").is_some());
}

#[test]
fn test_build_collection_missing_dir() {
    let missing = data_dir().join("does_not_exist");
    assert!(matches!(Collection::from_path(&missing), Err(Error::Io { .. })));
}

#[test]
fn test_get_root_nodes_by_category() {
    let collection = Collection::from_path(&data_dir()).unwrap();
    assert_eq!(
        collection.get_root_nodes_by_category(STRATEGIES),
        vec![("ydjw9of7ndf88", "AttackStrategy")]
    );
    assert_eq!(
        collection.get_root_nodes_by_category(TACTICS),
        vec![("57mrxn20qviax5qc", "Attactic")]
    );
    assert_eq!(
        collection.get_root_nodes_by_category(ROLES),
        vec![("sx6fvrxlaoudhmmq9", "Assister")]
    );
    assert!(collection.get_root_nodes_by_category(KEEPER).is_empty());
    assert!(collection.get_root_nodes_by_category("unknown").is_empty());
}

#[test]
fn test_get_category_from_node() {
    let collection = Collection::from_path(&data_dir()).unwrap();
    assert_eq!(collection.get_category_from_node("ydjw9of7ndf88"), Some(STRATEGIES));
    assert_eq!(collection.get_category_from_node("t3x"), Some(TACTICS));
    assert_eq!(collection.get_category_from_node("missing"), None);
}

#[test]
fn test_add_and_remove_tree() {
    let mut collection = Collection::default();
    collection.add_tree(ROLES, "EnterFormationRole.json", role_tree());
    collection.add_tree("custom", "Other.json", tactic("Other", "o"));
    assert_eq!(
        collection.get_tree_by_name("EnterFormationRole"),
        Some(&role_tree())
    );
    assert!(collection.get_role_tree("EnterFormationRole").is_some());
    assert!(collection.get_role_tree("Other").is_none());
    assert!(collection.collection.contains_key("custom"));

    collection.remove_tree(ROLES, "EnterFormationRole.json");
    assert!(collection.get_tree_by_name("EnterFormationRole").is_none());
    collection.remove_tree("unknown", "Other.json");

    collection.remove_tree_by_name("custom", "Other");
    assert!(collection.collection["custom"].is_empty());
}

#[test]
fn test_get_tree_by_name_mut() {
    let mut collection = formation_collection();
    collection
        .get_tree_by_name_mut("FirstTactic")
        .unwrap()
        .title = "Renamed".to_owned();
    assert_eq!(collection.get_tree_by_name("FirstTactic").unwrap().title, "Renamed");
    assert!(collection.get_tree_by_name_mut("Missing").is_none());
}

#[test]
fn test_equality_ignores_path() {
    let mut loaded = Collection::from_path(&data_dir()).unwrap();
    let mut other = Collection::new(loaded.collection.clone());
    assert_eq!(loaded, other);
    other.remove_tree(ROLES, "Assister.json");
    assert_ne!(loaded, other);
    loaded.path = None;
    assert_ne!(loaded, other);
}

#[test]
fn test_verify_tree() {
    let collection = formation_collection();
    for name in ["EnterFormationRole", "FirstTactic", "SecondTactic"] {
        let tree = collection.get_tree_by_name(name).unwrap();
        assert!(collection.verify_tree(tree, None).is_empty());
    }

    let mut broken = tactic("FirstTactic", "x");
    broken.nodes.get_mut("xf").unwrap().title = "Kick".to_owned();
    let violations = collection.verify_tree(&broken, None);
    assert_eq!(violations.len(), 1);
    assert!(matches!(violations[0], Violation::RoleMismatch { .. }));
}

#[test]
fn test_verify_tree_with_node_types() {
    let mut node_types = NodeTypes::default();
    node_types.add_node_type("composites", NodeType::new("ParallelSequence"));
    let collection = formation_collection().with_node_types(node_types);
    let tree = Tree::new(
        "Parallel",
        "p",
        vec![node("p", "ParallelSequence", &["k"]), node("k", "Kick", &[])],
    );
    assert_eq!(collection.verify_tree(&tree, Some(TACTICS)).len(), 1);
    assert!(formation_collection().verify_tree(&tree, Some(TACTICS)).is_empty());
}

#[test]
fn test_write_collection() {
    let mut collection = formation_collection();
    assert!(matches!(collection.write_collection(None), Err(Error::NoPath)));

    let dir = tempfile::tempdir().unwrap();
    collection.write_collection(Some(dir.path())).unwrap();
    assert_eq!(collection.jsons_path(), Some(dir.path()));
    assert!(dir.path().join("tactics/FirstTactic.json").is_file());
    assert!(dir.path().join("keeper").is_dir());

    let reloaded = Collection::from_path(dir.path()).unwrap();
    assert_eq!(reloaded, collection);

    collection.remove_tree(TACTICS, "SecondTactic.json");
    collection.write_collection(None).unwrap();
    // Trees removed from the registry are not deleted from disk.
    assert!(dir.path().join("tactics/SecondTactic.json").is_file());
}

#[test]
fn test_write_tree() {
    let collection = formation_collection();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("FirstTactic.json");
    let tree = tactic("FirstTactic", "x");
    assert!(collection.write_tree(&tree, &path, true).unwrap().is_empty());
    assert_eq!(
        Tree::from_document(&read_json(&path).unwrap()).unwrap(),
        tree
    );

    let mut cyclic = tree.clone();
    cyclic.nodes.get_mut("xf").unwrap().add_child("xroot");
    let path = dir.path().join("Cyclic.json");
    assert!(!collection.write_tree(&cyclic, &path, true).unwrap().is_empty());
    assert!(!path.exists());
    assert!(collection.write_tree(&cyclic, &path, false).unwrap().is_empty());
    assert!(path.exists());
}

#[test]
fn test_update_from_role_definition() {
    let mut collection = formation_collection();
    let mut role = role_tree();
    role.nodes.get_mut("efr1").unwrap().title = "LeaveFormation".to_owned();
    role.add_node(Node::with_id("HasBall", "efr2"));
    role.nodes.get_mut("efr0").unwrap().add_child("efr2");
    collection.add_tree(ROLES, "EnterFormationRole.json", role.clone());
    collection.update_subtrees_in_collection(&role, None);

    for (name, prefix) in [("FirstTactic", "x"), ("SecondTactic", "y")] {
        let tactic = collection.get_tree_by_name(name).unwrap();
        let anchor_id = format!("{}a", prefix);
        assert_eq!(
            tactic.find_role_subtree_nodes_if_exist("EnterFormationRole")[0].id,
            anchor_id
        );
        assert_eq!(
            titles_below(tactic, &anchor_id),
            ["Sequence", "LeaveFormation", "HasBall"]
        );
        assert_eq!(tactic.nodes.len(), 5);
        assert!(tactic.nodes.contains_key(&format!("{}root", prefix)));
        for copied in tactic.role_subtree_nodes(&anchor_id) {
            assert!(!role.nodes.contains_key(&copied.id));
        }
        assert!(collection.verify_tree(tactic, None).is_empty());
    }
    // The edited definition itself is not touched.
    assert_eq!(collection.get_role_tree("EnterFormationRole"), Some(&role));
}

#[test]
fn test_update_from_role_instance() {
    let mut collection = formation_collection();
    let mut source = tactic("FirstTactic", "x");
    source.nodes.get_mut("xs").unwrap().title = "TestChange".to_owned();
    collection.update_subtrees_in_collection(&source, Some("xs"));

    let role = collection.get_role_tree("EnterFormationRole").unwrap();
    assert_eq!(role.root, "efr0");
    assert_eq!(role.root_node().unwrap().title, "TestChange");
    assert_eq!(role.nodes.len(), 2);

    let second = collection.get_tree_by_name("SecondTactic").unwrap();
    assert!(second.nodes.contains_key("ya"));
    assert!(!second.nodes.contains_key("ys"));
    assert_eq!(titles_below(second, "ya"), ["TestChange", "EnterFormation"]);
    for id in &second.nodes["ya"].children {
        assert!(!source.nodes.contains_key(id));
    }
}

#[test]
fn test_update_from_anchor_with_default_node() {
    let mut collection = formation_collection();
    let mut source = tactic("FirstTactic", "x");
    source.nodes.get_mut("xf").unwrap().title = "Changed".to_owned();
    source.root = "xa".to_owned();
    collection.update_subtrees_in_collection(&source, None);

    let second = collection.get_tree_by_name("SecondTactic").unwrap();
    assert_eq!(titles_below(second, "ya"), ["Sequence", "Changed"]);
}

#[test]
fn test_update_outside_role_subtree() {
    let expected = formation_collection();
    let mut collection = formation_collection();
    let mut source = tactic("FirstTactic", "x");
    source.nodes.get_mut("xroot").unwrap().title = "Selector".to_owned();
    collection.update_subtrees_in_collection(&source, Some("xroot"));
    assert_eq!(collection, expected);

    collection.update_subtrees_in_collection(&source, Some("missing"));
    assert_eq!(collection, expected);
}

#[test]
fn test_update_from_empty_anchor() {
    let expected = formation_collection();
    let mut collection = formation_collection();
    let source = Tree::new(
        "ThirdTactic",
        "z",
        vec![
            node("z", "Sequence", &["za"]),
            anchor("za", "EnterFormationRole", &[]),
        ],
    );
    collection.update_subtrees_in_collection(&source, Some("za"));
    assert_eq!(collection, expected);
}

#[test]
fn test_update_uses_settings_for_ids() {
    let settings = Settings::from_yaml_str("id_length: 6\nid_alphabet: xyz\n").unwrap();
    let mut collection = formation_collection().with_settings(settings);
    let role = role_tree();
    collection.update_subtrees_in_collection(&role, None);

    for name in ["FirstTactic", "SecondTactic"] {
        let tactic = collection.get_tree_by_name(name).unwrap();
        let anchor_id = tactic.find_role_subtree_nodes_if_exist("EnterFormationRole")[0]
            .id
            .clone();
        let copied = tactic.role_subtree_nodes(&anchor_id);
        assert_eq!(copied.len(), 2);
        for node in copied {
            assert_eq!(node.id.len(), 6);
            assert!(node.id.chars().all(|c| "xyz".contains(c)));
        }
    }

    let mut source = tactic("FirstTactic", "x");
    source.nodes.get_mut("xs").unwrap().title = "TestChange".to_owned();
    collection.update_subtrees_in_collection(&source, Some("xs"));
    let definition = collection.get_role_tree("EnterFormationRole").unwrap();
    assert_eq!(definition.root, "efr0");
    let below: Vec<_> = definition.nodes.keys().filter(|id| *id != "efr0").collect();
    assert_eq!(below.len(), 1);
    assert_eq!(below[0].len(), 6);
}

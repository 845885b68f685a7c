mod common;

use common::*;
use openehr_rules::*;

#[test]
fn test_every_resolved_path_finds_exactly_its_own_node() {
    let tree = readings(&[(120.0, 80.0), (118.0, 79.0), (121.0, 82.0)]);

    let magnitudes = tree
        .resolve("/data[id2]/events[id3]/data[id4]/items/value/magnitude")
        .unwrap();
    assert_eq!(magnitudes.len(), 6);

    for found in &magnitudes {
        let again = tree.find_single(&found.path).unwrap().unwrap();
        assert_eq!(again.node, found.node);
        assert_eq!(again.path, found.path);
    }
}

#[test]
fn test_repeated_node_ids_get_occurrence_indices() {
    let tree = readings(&[(120.0, 80.0), (118.0, 79.0)]);

    let events = tree.resolve("/data[id2]/events[id3]").unwrap();
    let paths: Vec<String> = events.iter().map(ResolvedMatch::path_string).collect();
    assert_eq!(
        paths,
        vec!["/data[id2]/events[id3, 1]", "/data[id2]/events[id3, 2]"]
    );

    let second = tree
        .resolve("/data[id2]/events[id3, 2]/data[id4]/items[id5]/value/magnitude")
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(tree.primitive(second[0].node), Some(&PrimitiveValue::Real(118.0)));
}

#[test]
fn test_unique_node_ids_stay_unindexed() {
    let tree = readings(&[(120.0, 80.0)]);
    let found = tree
        .resolve(&item_path("items[id6]/value/magnitude"))
        .unwrap();
    assert_eq!(
        found[0].path_string(),
        "/data[id2]/events[id3]/data[id4]/items[id6]/value/magnitude"
    );
}

#[test]
fn test_absent_paths_resolve_to_nothing() {
    let tree = readings(&[(120.0, 80.0)]);
    assert!(tree.resolve(&item_path("items[id9]/value/value")).unwrap().is_empty());
    assert!(tree.resolve("/data[id2]/events[id3, 4]").unwrap().is_empty());
    assert!(tree.resolve("/protocol").unwrap().is_empty());
}

#[test]
fn test_find_single_reports_every_candidate() {
    let tree = readings(&[(120.0, 80.0), (118.0, 79.0)]);
    let error = tree
        .find_single(&"/data[id2]/events[id3]".parse().unwrap())
        .unwrap_err();
    match error {
        PathError::Multiplicity { matches, .. } => assert_eq!(matches.len(), 2),
        other => panic!("expected a multiplicity error, got {other:?}"),
    }
}

#[test]
fn test_most_specific_path_stops_at_the_first_gap() {
    let tree = readings(&[(120.0, 80.0)]);
    let query: ArchetypePath = item_path("items[id9]/value/value").parse().unwrap();
    let specific = tree.most_specific_path(tree.root(), &ArchetypePath::root(), &query);
    assert_eq!(
        specific.to_string(),
        "/data[id2]/events[id3]/data[id4]/items[id9]/value/value"
    );

    let ambiguous = readings(&[(120.0, 80.0), (118.0, 79.0)]);
    let specific = ambiguous.most_specific_path(ambiguous.root(), &ArchetypePath::root(), &query);
    assert_eq!(
        specific.to_string(),
        "/data[id2]/events[id3]/data[id4]/items[id9]/value/value"
    );
}

#[test]
fn test_find_or_construct_builds_from_the_archetype() {
    let archetype = blood_pressure_archetype();
    let model = model();
    let mut tree = readings(&[(120.0, 80.0)]);
    let before = tree.len();

    let target: ArchetypePath = item_path("items[id9]/value").parse().unwrap();
    let built = tree
        .find_or_construct(&target, &archetype, &model, &DefaultObjectConstructor)
        .unwrap();
    assert_eq!(tree.type_name(built.node), Some("DV_TEXT"));
    assert_eq!(tree.len(), before + 2);

    let again = tree
        .find_or_construct(&target, &archetype, &model, &DefaultObjectConstructor)
        .unwrap();
    assert_eq!(again.node, built.node);
    assert_eq!(tree.len(), before + 2);
}

#[test]
fn test_find_or_construct_refuses_ambiguous_prefixes() {
    let archetype = blood_pressure_archetype();
    let model = model();
    let mut tree = readings(&[(120.0, 80.0), (118.0, 79.0)]);
    let target: ArchetypePath = item_path("items[id9]").parse().unwrap();
    assert!(matches!(
        tree.find_or_construct(&target, &archetype, &model, &DefaultObjectConstructor),
        Err(PathError::Multiplicity { .. })
    ));
}

#[test]
fn test_json_round_trip_keeps_the_tree() {
    let json = observation(vec![
        event(vec![quantity("id5", 120.0), coded("id7", "at1")]),
        reading(118.0, 79.0),
    ]);
    let tree = tree(json);
    assert_eq!(tree.to_json()["data"]["events"][1]["data"]["items"][0]["value"]["magnitude"], 118.0);

    let reloaded = RmTree::from_json(&tree.to_json(), &model()).unwrap();
    assert_eq!(reloaded.len(), tree.len());
    assert_eq!(
        string_at(&reloaded, "/data[id2]/events[id3, 1]/data[id4]/items[id7]/value/defining_code/code_string")
            .as_deref(),
        Some("at1")
    );
}

#[test]
fn test_malformed_paths_are_rejected() {
    let tree = readings(&[(120.0, 80.0)]);
    assert!(matches!(tree.resolve("/data[id2"), Err(PathError::Malformed { .. })));
    assert!(matches!(tree.resolve(""), Err(PathError::Malformed { .. })));
}

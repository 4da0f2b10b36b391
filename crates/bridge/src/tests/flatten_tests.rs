use std::sync::Arc;

use controller::{
    fake::{cue, group, FakeController},
    ChannelError,
};

use super::*;

fn show() -> Vec<CueNode> {
    vec![
        cue("a", "1", "A"),
        group("b", "2", "B", vec![cue("b1", "2.1", "B1"), cue("b2", "2.2", "B2")]),
        cue("c", "3", "C"),
    ]
}

#[test]
fn flattens_groups_in_traversal_order() {
    let cues = flatten_tree(&show(), 2);
    let ids: Vec<_> = cues.iter().map(|cue| cue.id.as_str()).collect();
    let depths: Vec<_> = cues.iter().map(|cue| cue.depth).collect();
    assert_eq!(ids, ["a", "b", "b1", "b2", "c"]);
    assert_eq!(depths, [0, 0, 1, 1, 0]);
    assert_eq!(cues[2].position, CuePath(vec![2, 1]));
}

#[test]
fn nested_names_are_prefixed_for_display_only() {
    let tree = vec![group(
        "g",
        "",
        "Outer",
        vec![group("h", "", "Inner", vec![cue("x", "", "Deep")])],
    )];
    let cues = flatten_tree(&tree, 2);
    let deep = cues.iter().find(|cue| cue.id == "x").expect("deep cue");
    assert_eq!(deep.depth, 2);
    assert_eq!(deep.display_name, "--> --> Deep");
    assert_eq!(deep.original_name, "Deep");
    assert_eq!(deep.number, NO_NUMBER);
}

#[test]
fn unnamed_cues_get_a_placeholder_name() {
    let cues = flatten_tree(&[cue("x", "9", "")], 2);
    assert_eq!(cues[0].original_name, UNNAMED);
    assert_eq!(cues[0].display_name, UNNAMED);
}

#[test]
fn groups_below_the_depth_limit_are_not_descended() {
    let tree = vec![group(
        "g1",
        "1",
        "L0",
        vec![group(
            "g2",
            "",
            "L1",
            vec![group("g3", "", "L2", vec![cue("deep", "", "L3")])],
        )],
    )];
    let ids: Vec<_> = flatten_tree(&tree, 2).into_iter().map(|cue| cue.id).collect();
    assert_eq!(ids, ["g1", "g2", "g3"]);

    let ids: Vec<_> = flatten_tree(&tree, 3).into_iter().map(|cue| cue.id).collect();
    assert_eq!(ids, ["g1", "g2", "g3", "deep"]);
}

#[test]
fn large_groups_keep_strictly_increasing_positions() {
    let children: Vec<_> = (1..=150)
        .map(|n| cue(&format!("c{n}"), &n.to_string(), "child"))
        .collect();
    let tree = vec![group("g", "1", "Big", children), cue("after", "2", "After")];
    let cues = flatten_tree(&tree, 2);
    assert_eq!(cues.len(), 152);
    assert!(cues.windows(2).all(|pair| pair[0].position < pair[1].position));
}

#[test]
fn cues_without_id_are_dropped_but_their_children_kept() {
    let tree = vec![group("", "1", "Anonymous", vec![cue("kid", "1.1", "Kid")])];
    let cues = flatten_tree(&tree, 2);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].id, "kid");
    assert_eq!(cues[0].depth, 1);
}

#[tokio::test]
async fn failed_fetch_yields_empty_list() {
    let fake = Arc::new(FakeController::new().with_tree(show()));
    fake.fail_on("cue_tree", ChannelError::Script("boom".into()));
    let serializer = CommandSerializer::new(fake);
    let cues = flatten(&serializer, &WorkspaceScope::Front, 2).await;
    assert!(cues.is_empty());
}

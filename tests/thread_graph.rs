// tests/thread_graph.rs
mod util;

use threadloom::{
    PostId, ThreadGraphBuilder,
    core::thread::{HeadRule, ReplyEdge, label_heads},
};
use util::post;

fn render_edges(edges: &[(PostId, PostId, ReplyEdge)]) -> String
{
    edges
        .iter()
        .map(|(a, b, w)| format!("{a} -> {b} ({w})"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn replies_wire_to_earlier_posts_or_the_head()
{
    let posts = vec![
        post(10000001, "general", 0, "opening"),
        post(10000002, "general", 1, ">>10000001 agreed"),
        post(10000003, "general", 2, ">>10000002 >>10000001 >>10000002 both"),
        post(10000004, "general", 3, ">>99999999 nothing here"),
        post(10000005, "general", 4, ">>10000006 from the future"),
        post(10000006, "general", 5, ">>10000006 talking to myself"),
        post(20000001, "other", 0, "another thread"),
        post(20000002, "other", 1, ">>10000001 across threads"),
    ];

    let graphs = ThreadGraphBuilder::new(HeadRule::Earliest)
        .build(&posts)
        .expect("build");
    assert_eq!(graphs.len(), 2);

    let general = &graphs["general"];
    assert_eq!(general.head(), PostId(10000001));
    assert_eq!(general.node_count(), 6);
    assert_eq!(general.component_count(), 1);

    insta::assert_snapshot!(render_edges(&general.edges()), @r"
    10000002 -> 10000001 (ref)
    10000003 -> 10000002 (ref)
    10000003 -> 10000001 (ref)
    10000004 -> 10000001 (head)
    10000005 -> 10000001 (head)
    10000006 -> 10000001 (head)
    ");

    let other = &graphs["other"];
    assert_eq!(other.head(), PostId(20000001));
    assert_eq!(other.replies_to(PostId(20000002)), vec![PostId(20000001)]);
}

#[test]
fn every_reply_has_an_outgoing_edge_and_the_head_has_none()
{
    let posts: Vec<_> = (0..12u32)
        .map(|i| {
            let content = if i % 3 == 0 { "no quote".to_string() } else { format!(">>{}", 40000000 + i - 1) };
            post(40000000 + u64::from(i), "busy", i, &content)
        })
        .collect();

    let graphs = ThreadGraphBuilder::default()
        .build(&posts)
        .expect("build");
    let g = &graphs["busy"];

    assert_eq!(g.out_degree(g.head()), 0);
    for p in posts
        .iter()
        .filter(|p| p.id != g.head())
    {
        assert!(g.out_degree(p.id) >= 1, "{} has no outgoing edge", p.id);
    }
    assert_eq!(g.component_count(), 1);
}

#[test]
fn subject_id_rule_picks_the_named_post()
{
    let posts = vec![
        post(12345677, "12345678", 0, "early bird"),
        post(12345678, "12345678", 1, "the actual opener"),
        post(12345679, "12345678", 2, ">>12345677 hi"),
    ];

    let graphs = ThreadGraphBuilder::new(HeadRule::SubjectId)
        .build(&posts)
        .expect("build");
    let g = &graphs["12345678"];

    assert_eq!(g.head(), PostId(12345678));
    insta::assert_snapshot!(render_edges(&g.edges()), @r"
    12345677 -> 12345678 (head)
    12345679 -> 12345677 (ref)
    ");
}

#[test]
fn subject_id_rule_without_a_matching_post_fails()
{
    let posts = vec![post(10000001, "general", 0, "hello")];
    let err = ThreadGraphBuilder::new(HeadRule::SubjectId)
        .build(&posts)
        .expect_err("no head");
    assert!(err.to_string().contains("general"));
}

#[test]
fn dot_output_has_one_arrow_per_edge()
{
    let posts = vec![
        post(10000001, "general", 0, "opening"),
        post(10000002, "general", 1, ">>10000001 yes"),
        post(10000003, "general", 2, "no"),
    ];
    let graphs = ThreadGraphBuilder::default()
        .build(&posts)
        .expect("build");
    let g = &graphs["general"];

    let dot = g.to_dot();
    assert!(dot.starts_with("digraph"));
    assert_eq!(dot.matches("->").count(), g.edge_count());
    assert!(dot.contains("10000003"));
}

#[test]
fn heads_are_flagged_in_corpus_order()
{
    let posts = vec![
        post(10000002, "general", 5, "late"),
        post(20000001, "other", 0, "solo"),
        post(10000001, "general", 1, "first"),
    ];
    assert_eq!(label_heads(&posts), vec![false, true, true]);
}

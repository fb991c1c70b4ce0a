use placement_artifact::{current_parts, first_heading, parse, Artifact, DocumentShape};
use placement_graph::TaskId;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn render(blocks: &[(String, String)]) -> String {
    blocks
        .iter()
        .map(|(id, body)| format!("<artifact id=\"{id}\">\n{body}\n</artifact>\n"))
        .collect()
}

proptest! {
    #[test]
    fn prop_parse_never_panics(text in "\\PC{0,200}") {
        let outcome = parse(&text);
        if text.trim().is_empty() {
            prop_assert_eq!(outcome.shape, DocumentShape::Empty);
        }
    }

    #[test]
    fn prop_wrapper_does_not_change_blocks(
        blocks in proptest::collection::vec(("[A-Za-z ]{1,12}", "[a-z ,.]{0,40}"), 1..6)
    ) {
        let plain = render(&blocks);
        let wrapped = format!("<artifacts>\n{plain}</artifacts>");

        let a = parse(&plain);
        let b = parse(&wrapped);
        prop_assert_eq!(a.shape, DocumentShape::Tagged);
        prop_assert_eq!(b.shape, DocumentShape::Wrapped);
        prop_assert_eq!(a.blocks.len(), blocks.len());
        prop_assert_eq!(a.blocks, b.blocks);
    }
}

#[test]
fn multi_part_output_reads_in_order() {
    let producer = TaskId::from("carrier-emails");
    let parts = current_parts(vec![
        Artifact::new(
            producer.clone(),
            "emails 2/2",
            "<artifact id=\"Beta Mutual\">Hi Beta</artifact>",
        )
        .with_id("p2")
        .part(1, 2),
        Artifact::new(
            producer,
            "emails 1/2",
            "<artifact id=\"Acme Insurance\">Hi Acme</artifact>",
        )
        .with_id("p1")
        .part(0, 2),
    ]);

    let recipients: Vec<String> = parts
        .parts
        .iter()
        .flat_map(|a| parse(&a.content).blocks)
        .filter_map(|b| b.id)
        .collect();
    assert_eq!(recipients, vec!["Acme Insurance", "Beta Mutual"]);
}

#[test]
fn bare_body_exposes_heading() {
    let outcome = parse("# Gamma Re\n\nPlease find the submission attached.");
    assert_eq!(outcome.shape, DocumentShape::Bare);
    assert_eq!(
        first_heading(&outcome.blocks[0].body).as_deref(),
        Some("Gamma Re")
    );
}

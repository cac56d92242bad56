use onramp_render::{link_placeholder, render, BlockKind, LayoutConfig};

#[test]
fn test_every_link_gets_a_region() {
    let md = "## [Setup guide](knowledge.hubspot.com/setup)\n\
**Read [pipelines](https://example.com/p) first**\n\
- See [sequences](example.com/s) and [quotes](mailto:help@example.com)\n\
**Unclosed bold with [a link](example.com/u)\n";
    let doc = render(md, &LayoutConfig::default());

    assert_eq!(doc.links.len(), 5);
    let urls: Vec<&str> = doc.links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://knowledge.hubspot.com/setup",
            "https://example.com/p",
            "https://example.com/s",
            "mailto:help@example.com",
            "https://example.com/u",
        ]
    );
    for (i, link) in doc.links.iter().enumerate() {
        assert_eq!(link.index, i);
        let placeholder = link_placeholder(i);
        assert!(doc.lines().any(|l| l.text().contains(&placeholder)));
    }
}

#[test]
fn test_long_plans_paginate() {
    let md: String = (1..=120).map(|i| format!("- Task number {i}\n")).collect();
    let layout = LayoutConfig::default();
    let doc = render(&md, &layout);

    assert!(doc.pages.len() > 1);
    for (i, page) in doc.pages.iter().enumerate() {
        assert_eq!(page.number, i + 1);
        for line in &page.lines {
            assert!(line.y >= layout.margin_top);
            assert!(line.y + layout.line_heights.for_kind(line.kind) <= layout.page_height - layout.margin_bottom);
        }
    }
    assert_eq!(doc.lines().filter(|l| l.kind == BlockKind::ListItem).count(), 120);
}

#[test]
fn test_page_never_starts_with_spacer() {
    let md: String = (1..=80).map(|i| format!("Paragraph {i}\n\n")).collect();
    let doc = render(&md, &LayoutConfig::default());
    for page in &doc.pages {
        assert_ne!(page.lines.first().map(|l| l.kind), Some(BlockKind::Spacer));
    }
}

//! Plan-to-document rendering.
//!
//! Turns normalized plan markdown into a paginated document model: styled
//! lines placed on pages with a running vertical cursor, plus a side list
//! of link regions for the PDF backend to make clickable. Wrapping is
//! character-count based; no font metrics are involved.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Subheading,
    ListItem,
    Label,
    Paragraph,
    Spacer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineHeights {
    pub heading: f32,
    pub subheading: f32,
    pub list_item: f32,
    pub label: f32,
    pub paragraph: f32,
    pub spacer: f32,
}

impl Default for LineHeights {
    fn default() -> Self {
        Self {
            heading: 22.0,
            subheading: 18.0,
            list_item: 16.0,
            label: 18.0,
            paragraph: 16.0,
            spacer: 8.0,
        }
    }
}

impl LineHeights {
    pub fn for_kind(&self, kind: BlockKind) -> f32 {
        match kind {
            BlockKind::Heading => self.heading,
            BlockKind::Subheading => self.subheading,
            BlockKind::ListItem => self.list_item,
            BlockKind::Label => self.label,
            BlockKind::Paragraph => self.paragraph,
            BlockKind::Spacer => self.spacer,
        }
    }
}

/// Page geometry in points. Defaults to A4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub max_chars_per_line: usize,
    /// Average glyph advance used to position link regions.
    pub char_width: f32,
    pub list_indent: f32,
    pub line_heights: LineHeights,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin_top: 50.0,
            margin_bottom: 80.0,
            margin_left: 50.0,
            margin_right: 50.0,
            max_chars_per_line: 90,
            char_width: 5.5,
            list_indent: 12.0,
            line_heights: LineHeights::default(),
        }
    }
}

/// Shortest line width ever used for wrapping, whatever the config says.
const MIN_CHARS_PER_LINE: usize = 10;

/// Lines ending in `:` shorter than this render as labels.
const LABEL_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub text: String,
    pub bold: bool,
    /// Index into `Document::links` when this span is a link placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub kind: BlockKind,
    pub x: f32,
    pub y: f32,
    /// Bullet or number shown before the first line of a list item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub spans: Vec<Span>,
}

impl Line {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub number: usize,
    pub lines: Vec<Line>,
}

/// Clickable region for an extracted `[text](url)` link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRegion {
    pub index: usize,
    pub text: String,
    pub url: String,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub page_width: f32,
    pub page_height: f32,
    pub pages: Vec<Page>,
    pub links: Vec<LinkRegion>,
}

impl Document {
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.pages.iter().flat_map(|p| p.lines.iter())
    }
}

/// Placeholder token standing in for link `index` in the text stream.
pub fn link_placeholder(index: usize) -> String {
    format!("{{{{link:{index}}}}}")
}

#[derive(Debug, Clone, PartialEq)]
enum Inline {
    Text { text: String, bold: bool },
    Link { text: String, url: String, bold: bool },
}

struct InlinePatterns {
    bold: Regex,
    link: Regex,
    list: Regex,
}

fn inline_patterns() -> Option<&'static InlinePatterns> {
    static PATTERNS: OnceLock<Option<InlinePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(InlinePatterns {
                bold: Regex::new(r"\*\*([^*]+)\*\*").ok()?,
                link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").ok()?,
                list: Regex::new(r"^([•\-*]|[0-9]+\.)\s+(.+)$").ok()?,
            })
        })
        .as_ref()
}

/// Prefix `https://` when a link target has no scheme.
pub fn normalize_url(raw: &str) -> String {
    let url = raw.trim();
    let lower = url.to_lowercase();
    if url.is_empty() || lower.contains("://") || lower.starts_with("mailto:") || lower.starts_with("tel:") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn parse_links(text: &str, bold: bool, out: &mut Vec<Inline>) {
    let Some(p) = inline_patterns() else {
        out.push(Inline::Text { text: text.to_string(), bold });
        return;
    };
    let mut last = 0;
    for caps in p.link.captures_iter(text) {
        let (Some(m), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if m.start() > last {
            out.push(Inline::Text { text: text[last..m.start()].to_string(), bold });
        }
        out.push(Inline::Link {
            text: label.as_str().replace("**", ""),
            url: normalize_url(url.as_str()),
            bold,
        });
        last = m.end();
    }
    if last < text.len() {
        out.push(Inline::Text { text: text[last..].to_string(), bold });
    }
}

/// Split a line into bold runs and links.
///
/// A line opening with `**` that never closes is bold to the end. Links
/// inside bold runs are still extracted.
fn parse_inline(text: &str, force_bold: bool) -> Vec<Inline> {
    let mut out = Vec::new();
    if let Some(rest) = text.strip_prefix("**") {
        if !rest.contains("**") {
            parse_links(rest, true, &mut out);
            return out;
        }
    }
    let Some(p) = inline_patterns() else {
        parse_links(text, force_bold, &mut out);
        return out;
    };

    let mut remaining = text;
    while !remaining.is_empty() {
        let bold = p
            .bold
            .captures(remaining)
            .and_then(|c| Some((c.get(0)?, c.get(1)?)));
        let link = p.link.find(remaining);

        match bold {
            Some((whole, inner)) if link.is_none_or(|l| whole.start() < l.start()) => {
                if whole.start() > 0 {
                    parse_links(&remaining[..whole.start()], force_bold, &mut out);
                }
                parse_links(inner.as_str(), true, &mut out);
                remaining = &remaining[whole.end()..];
            }
            _ => match link {
                Some(l) => {
                    parse_links(&remaining[..l.end()], force_bold, &mut out);
                    remaining = &remaining[l.end()..];
                }
                None => {
                    parse_links(remaining, force_bold, &mut out);
                    break;
                }
            },
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    bold: bool,
    url: Option<String>,
    space_before: bool,
}

impl Token {
    fn len(&self) -> usize {
        self.text.chars().count()
    }
}

fn tokenize(inlines: Vec<Inline>, max_chars: usize) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut pending_space = false;

    for inline in inlines {
        match inline {
            Inline::Text { text, bold } => {
                if text.starts_with(char::is_whitespace) {
                    pending_space = true;
                }
                let mut had_words = false;
                for word in text.split_whitespace() {
                    had_words = true;
                    let chars: Vec<char> = word.chars().collect();
                    for (i, chunk) in chars.chunks(max_chars).enumerate() {
                        tokens.push(Token {
                            text: chunk.iter().collect(),
                            bold,
                            url: None,
                            space_before: i == 0 && pending_space,
                        });
                    }
                    pending_space = true;
                }
                if had_words {
                    pending_space = text.ends_with(char::is_whitespace);
                }
            }
            Inline::Link { text, url, bold } => {
                tokens.push(Token {
                    text,
                    bold,
                    url: Some(url),
                    space_before: pending_space,
                });
                pending_space = false;
            }
        }
    }
    tokens
}

/// Greedy word wrap; the first token of each line drops its leading space.
fn wrap(tokens: Vec<Token>, max_chars: usize) -> Vec<Vec<Token>> {
    let mut lines = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut width = 0;
    for mut token in tokens {
        let gap = usize::from(!current.is_empty() && token.space_before);
        if !current.is_empty() && width + gap + token.len() > max_chars {
            lines.push(std::mem::take(&mut current));
            width = 0;
        }
        if current.is_empty() {
            token.space_before = false;
        }
        width += usize::from(token.space_before) + token.len();
        current.push(token);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn classify(trimmed: &str) -> (BlockKind, String, Option<String>) {
    if trimmed.is_empty() {
        return (BlockKind::Spacer, String::new(), None);
    }
    // only `##` and `###` are plan headings; other levels stay as text
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 2 || hashes == 3 {
        let rest = &trimmed[hashes..];
        if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
            let kind = if hashes == 2 {
                BlockKind::Heading
            } else {
                BlockKind::Subheading
            };
            return (kind, rest.trim().to_string(), None);
        }
    }
    if let Some(caps) = inline_patterns().and_then(|p| p.list.captures(trimmed)) {
        if let (Some(marker), Some(body)) = (caps.get(1), caps.get(2)) {
            let marker = match marker.as_str() {
                "-" | "*" | "•" => "•".to_string(),
                numbered => numbered.to_string(),
            };
            return (BlockKind::ListItem, body.as_str().to_string(), Some(marker));
        }
    }
    if trimmed.ends_with(':') && trimmed.chars().count() < LABEL_MAX_CHARS {
        return (BlockKind::Label, trimmed.to_string(), None);
    }
    (BlockKind::Paragraph, trimmed.to_string(), None)
}

struct Renderer<'a> {
    layout: &'a LayoutConfig,
    pages: Vec<Page>,
    links: Vec<LinkRegion>,
    y: f32,
}

impl<'a> Renderer<'a> {
    fn new(layout: &'a LayoutConfig) -> Self {
        Self {
            layout,
            pages: vec![Page {
                number: 1,
                lines: Vec::new(),
            }],
            links: Vec::new(),
            y: layout.margin_top,
        }
    }

    fn bottom(&self) -> f32 {
        self.layout.page_height - self.layout.margin_bottom
    }

    fn current_page_is_empty(&self) -> bool {
        self.pages.last().is_none_or(|p| p.lines.is_empty())
    }

    /// Move the cursor down by `height`, starting a new page first if the
    /// line would cross the bottom margin. Returns the line's y.
    fn advance(&mut self, height: f32) -> f32 {
        if self.y + height > self.bottom() && !self.current_page_is_empty() {
            let number = self.pages.len() + 1;
            self.pages.push(Page {
                number,
                lines: Vec::new(),
            });
            self.y = self.layout.margin_top;
        }
        let y = self.y;
        self.y += height;
        y
    }

    fn push_line(&mut self, line: Line) {
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(line);
        }
    }

    fn spacer(&mut self) {
        let height = self.layout.line_heights.spacer;
        // A spacer never opens a page; the break already separates blocks.
        if self.current_page_is_empty() || self.y + height > self.bottom() {
            return;
        }
        let y = self.advance(height);
        self.push_line(Line {
            kind: BlockKind::Spacer,
            x: self.layout.margin_left,
            y,
            marker: None,
            spans: Vec::new(),
        });
    }

    fn block(&mut self, kind: BlockKind, text: &str, marker: Option<String>) {
        let layout = self.layout;
        let (x, max_chars) = if kind == BlockKind::ListItem {
            let indent_chars = (layout.list_indent / layout.char_width).round() as usize;
            (
                layout.margin_left + layout.list_indent,
                layout.max_chars_per_line.saturating_sub(indent_chars),
            )
        } else {
            (layout.margin_left, layout.max_chars_per_line)
        };
        let max_chars = max_chars.max(MIN_CHARS_PER_LINE);
        let force_bold = matches!(kind, BlockKind::Heading | BlockKind::Subheading | BlockKind::Label);

        let tokens = tokenize(parse_inline(text, force_bold), max_chars);
        let height = layout.line_heights.for_kind(kind);
        let mut marker = marker;

        for tokens in wrap(tokens, max_chars) {
            let y = self.advance(height);
            let page = self.pages.len();
            let spans = self.layout_spans(tokens, x, y, page);
            self.push_line(Line {
                kind,
                x,
                y,
                marker: marker.take(),
                spans,
            });
        }
    }

    fn layout_spans(&mut self, tokens: Vec<Token>, x: f32, y: f32, page: usize) -> Vec<Span> {
        let cw = self.layout.char_width;
        let mut spans: Vec<Span> = Vec::new();
        let mut col = 0usize;

        for token in tokens {
            let space = if token.space_before { " " } else { "" };
            col += space.len();
            let len = token.len();
            match token.url {
                Some(url) => {
                    if !space.is_empty() {
                        push_text(&mut spans, space, token.bold);
                    }
                    let index = self.links.len();
                    self.links.push(LinkRegion {
                        index,
                        text: token.text,
                        url,
                        page,
                        x: x + col as f32 * cw,
                        y,
                        width: len as f32 * cw,
                    });
                    spans.push(Span {
                        text: link_placeholder(index),
                        bold: token.bold,
                        link: Some(index),
                    });
                }
                None => push_text(&mut spans, &format!("{space}{}", token.text), token.bold),
            }
            col += len;
        }
        spans
    }

    fn finish(self) -> Document {
        Document {
            page_width: self.layout.page_width,
            page_height: self.layout.page_height,
            pages: self.pages,
            links: self.links,
        }
    }
}

fn push_text(spans: &mut Vec<Span>, text: &str, bold: bool) {
    if let Some(last) = spans.last_mut() {
        if last.link.is_none() && last.bold == bold {
            last.text.push_str(text);
            return;
        }
    }
    spans.push(Span {
        text: text.to_string(),
        bold,
        link: None,
    });
}

/// Lay out plan markdown on pages.
pub fn render(markdown: &str, layout: &LayoutConfig) -> Document {
    let mut renderer = Renderer::new(layout);
    for line in markdown.trim().lines() {
        let (kind, text, marker) = classify(line.trim());
        match kind {
            BlockKind::Spacer => renderer.spacer(),
            _ => renderer.block(kind, &text, marker),
        }
    }
    let doc = renderer.finish();
    debug!(pages = doc.pages.len(), links = doc.links.len(), "document rendered");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> LayoutConfig {
        LayoutConfig {
            page_height: 200.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            max_chars_per_line: 20,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn test_classify_blocks() {
        assert_eq!(classify("## Sales Hub").0, BlockKind::Heading);
        assert_eq!(classify("### Pipeline").0, BlockKind::Subheading);
        assert_eq!(classify("#### Detail").0, BlockKind::Paragraph);
        assert_eq!(classify("#### Detail").1, "#### Detail");
        assert_eq!(classify("# Acme Implementation Plan").0, BlockKind::Paragraph);
        assert_eq!(classify("- item").2.as_deref(), Some("•"));
        assert_eq!(classify("3. third").2.as_deref(), Some("3."));
        assert_eq!(classify("Deal stages:").0, BlockKind::Label);
        assert_eq!(classify("**Bold** opener").0, BlockKind::Paragraph);
        assert_eq!(classify("##").0, BlockKind::Paragraph);
        assert_eq!(classify("").0, BlockKind::Spacer);
    }

    #[test]
    fn test_inline_bold_and_links() {
        let parts = parse_inline("See **the guide** at [Docs](docs.example.com) now", false);
        assert_eq!(
            parts,
            vec![
                Inline::Text { text: "See ".into(), bold: false },
                Inline::Text { text: "the guide".into(), bold: true },
                Inline::Text { text: " at ".into(), bold: false },
                Inline::Link {
                    text: "Docs".into(),
                    url: "https://docs.example.com".into(),
                    bold: false
                },
                Inline::Text { text: " now".into(), bold: false },
            ]
        );
    }

    #[test]
    fn test_unclosed_bold_runs_to_end_of_line() {
        let parts = parse_inline("**Heads up: read [this](https://x.io)", false);
        assert_eq!(
            parts,
            vec![
                Inline::Text { text: "Heads up: read ".into(), bold: true },
                Inline::Link { text: "this".into(), url: "https://x.io".into(), bold: true },
            ]
        );
    }

    #[test]
    fn test_link_inside_bold_is_kept() {
        let doc = render("**Read [the docs](example.com) first**", &LayoutConfig::default());
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.links[0].url, "https://example.com");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url(" knowledge.hubspot.com "), "https://knowledge.hubspot.com");
        assert_eq!(normalize_url("HTTP://a.b"), "HTTP://a.b");
        assert_eq!(normalize_url("mailto:help@example.com"), "mailto:help@example.com");
    }

    #[test]
    fn test_wrapping_and_hard_split() {
        let doc = render("alpha beta gamma delta epsilon", &small_layout());
        let lines: Vec<String> = doc.lines().map(Line::text).collect();
        assert_eq!(lines, vec!["alpha beta gamma", "delta epsilon"]);

        let doc = render(&"x".repeat(45), &small_layout());
        let lens: Vec<usize> = doc.lines().map(|l| l.text().len()).collect();
        assert_eq!(lens, vec![20, 20, 5]);
    }

    #[test]
    fn test_list_items_are_indented_with_marker_on_first_line() {
        let layout = small_layout();
        let doc = render("- one two three four five six", &layout);
        let lines: Vec<&Line> = doc.lines().collect();
        assert!(lines.len() > 1);
        assert_eq!(lines[0].marker.as_deref(), Some("•"));
        assert!(lines[1].marker.is_none());
        assert_eq!(lines[0].x, layout.margin_left + layout.list_indent);
    }

    #[test]
    fn test_page_break_when_cursor_passes_bottom() {
        let layout = small_layout();
        // 160pt of usable height fits ten 16pt paragraph lines.
        let text: Vec<String> = (0..25).map(|i| format!("line {i}")).collect();
        let doc = render(&text.join("\n"), &layout);
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[0].lines.len(), 10);
        assert_eq!(doc.pages[1].lines[0].y, layout.margin_top);
        assert_eq!(doc.pages[2].number, 3);
        for line in doc.lines() {
            assert!(line.y + layout.line_heights.paragraph <= layout.page_height - layout.margin_bottom);
        }
    }

    #[test]
    fn test_link_placeholder_position() {
        let layout = LayoutConfig::default();
        let doc = render("Open [Pipelines](https://h.io/p) today", &layout);
        let line = doc.lines().next().unwrap();
        assert_eq!(line.text(), "Open {{link:0}} today");
        let link = &doc.links[0];
        assert_eq!(link.index, 0);
        assert_eq!(link.page, 1);
        assert_eq!(link.x, layout.margin_left + 5.0 * layout.char_width);
        assert_eq!(link.width, 9.0 * layout.char_width);
        assert_eq!(link.y, line.y);
    }

    #[test]
    fn test_spacers_skipped_at_page_top() {
        let doc = render("\n\nHello\n\nWorld", &LayoutConfig::default());
        let kinds: Vec<BlockKind> = doc.lines().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![BlockKind::Paragraph, BlockKind::Spacer, BlockKind::Paragraph]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let doc = render("## Title", &LayoutConfig::default());
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["pageWidth"], 595.0);
        assert_eq!(v["pages"][0]["lines"][0]["kind"], "heading");
        assert_eq!(v["pages"][0]["lines"][0]["spans"][0]["bold"], true);
    }
}

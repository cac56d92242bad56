//! Markdown repair for model-written plans.
//!
//! Streaming output regularly arrives with words glued together, bullets
//! split from their text and the brand name broken across lines. The
//! normalizer patches those known failure modes with an ordered list of
//! named passes; each pass is a list of regex rewrite rules applied in
//! turn. The same function feeds chat display and document export.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::trace;

/// Accept or reject a candidate match given its captures and the text that
/// follows it. Stands in for look-ahead, which `regex` does not support.
type Guard = fn(&Captures<'_>, &str) -> bool;

pub struct Rule {
    pub name: &'static str,
    re: Regex,
    template: &'static str,
    guard: Option<Guard>,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, template: &'static str) -> Option<Self> {
        Regex::new(pattern).ok().map(|re| Self {
            name,
            re,
            template,
            guard: None,
        })
    }

    fn guarded(
        name: &'static str,
        pattern: &str,
        template: &'static str,
        guard: Guard,
    ) -> Option<Self> {
        Self::new(name, pattern, template).map(|r| Self {
            guard: Some(guard),
            ..r
        })
    }

    pub fn apply(&self, text: &str) -> String {
        match self.guard {
            None => self.re.replace_all(text, self.template).into_owned(),
            Some(guard) => self.replace_guarded(text, guard),
        }
    }

    /// Like `replace_all`, but a rejected candidate is retried one character
    /// later instead of being skipped whole.
    fn replace_guarded(&self, text: &str, guard: Guard) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut pos = 0;
        while pos <= text.len() {
            let Some(caps) = self.re.captures_at(text, pos) else {
                break;
            };
            let Some(m) = caps.get(0) else {
                break;
            };
            if guard(&caps, &text[m.end()..]) {
                out.push_str(&text[last..m.start()]);
                caps.expand(self.template, &mut out);
                last = m.end();
                pos = if m.is_empty() {
                    next_char_boundary(text, m.end())
                } else {
                    m.end()
                };
            } else {
                pos = next_char_boundary(text, m.start());
            }
        }
        out.push_str(&text[last..]);
        out
    }
}

fn next_char_boundary(text: &str, i: usize) -> usize {
    text[i..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| i + c.len_utf8())
}

pub struct Pass {
    pub name: &'static str,
    pub rules: Vec<Rule>,
}

impl Pass {
    fn new(name: &'static str, rules: impl IntoIterator<Item = Option<Rule>>) -> Self {
        Self {
            name,
            rules: rules.into_iter().flatten().collect(),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }
}

/// True when the text after a bare bullet continues with list content on a
/// following line, so the bullet should be joined rather than dropped.
fn bullet_has_continuation(_: &Captures<'_>, after: &str) -> bool {
    after
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '*' || c == '[')
}

fn bullet_is_bare(caps: &Captures<'_>, after: &str) -> bool {
    !bullet_has_continuation(caps, after)
}

/// `Hub` glued to a word that is not `Spot`.
fn hub_not_brand(caps: &Captures<'_>, after: &str) -> bool {
    let tail = format!("{}{}", &caps[1], after);
    !tail
        .get(..4)
        .is_some_and(|s| s.eq_ignore_ascii_case("spot"))
}

const BOLD_SECTION_WORDS: &[&str] = &[
    "Where",
    "Helpful",
    "Properties",
    "Automations",
    "Campaign",
    "Persona",
    "Technical",
];

fn starts_bold_section(_: &Captures<'_>, after: &str) -> bool {
    BOLD_SECTION_WORDS.iter().any(|w| after.starts_with(w))
}

const BRAND: &str = r"(?i)Hub\s+Spot";

fn build_passes() -> Vec<Pass> {
    vec![
        Pass::new("brand", [Rule::new("brand_split", BRAND, "HubSpot")]),
        Pass::new(
            "empty_elements",
            [
                Rule::new("empty_heading", r"(?m)^#{1,6}[ \t]*$", ""),
                Rule::guarded("bare_bullet", r"(?m)^[-*][ \t]*$", "", bullet_is_bare),
            ],
        ),
        Pass::new(
            "list_join",
            [
                Rule::new("bullet_join", r"(?m)^([-*])[ \t]*\n\s*([A-Za-z*\[])", "$1 $2"),
                Rule::new("number_join", r"(?m)^([0-9]+\.)[ \t]*\n\s*([A-Za-z*\[])", "$1 $2"),
            ],
        ),
        Pass::new(
            "glued_text",
            [
                Rule::new(
                    "heading_glued",
                    r"(?m)^(#{1,6}[ \t]+.+?)([a-zA-Z])([A-Z][a-z])",
                    "$1$2\n\n$3",
                ),
                Rule::guarded("hub_glued", r"(?i)Hub([a-z]{2})", "Hub\n\n$1", hub_not_brand),
                Rule::new(
                    "step_glued",
                    r"(Stage|Step|Process|Setup|Automation)([A-Z][a-z])",
                    "$1\n\n$2",
                ),
                Rule::new(
                    "section_glued",
                    r"([a-z])((?:Proposal|Discovery|Follow|Deal|Closed|Marketing|Sales|Service|Technical|Buyer|Lead|Account)\s+[A-Z])",
                    "$1\n\n$2",
                ),
                Rule::new("bold_glued", r"([a-z])\*\*([A-Z][a-z])", "$1\n\n**$2"),
                Rule::new(
                    "keyword_glued",
                    r"([a-z])(Deal|Step|Stage|Section|Properties|Automations|Where|Helpful|Campaign|Persona|Technical|Tracking|Privacy|Buyer|Lead|Forms|Chatbots)([:\s])",
                    "$1\n\n$2$3",
                ),
                Rule::new(
                    "phrase_glued",
                    r"([a-z])((?:Proposal|Where|Helpful|Properties|Automations|The trigger|A deal|Here are|Some of|Our initial)[^a-z])",
                    "$1\n\n$2",
                ),
            ],
        ),
        Pass::new(
            "bold_labels",
            [
                Rule::new("bold_colon_next_line", r"(\*\*[^*\n]+\*\*)[ \t]*\n\s*(:)", "$1$2"),
                Rule::new(
                    "bold_label_next_line",
                    r"(\*\*[^*\n]+:\*\*)[ \t]*\n\s*([A-Za-z0-9])",
                    "$1 $2",
                ),
                Rule::new("bold_label_glued", r"(\*\*[^*\n]+:\*\*)([A-Za-z])", "$1 $2"),
                Rule::new("bold_label_bullet", r"(\*\*[^*\n]+:\*\*)- ([A-Za-z])", "$1\n\n- $2"),
                Rule::new(
                    "feature_bullet",
                    r"(Makers|Automation|Sequence|Segmentation)\*{0,2}(-\s+)(Qualifier|Triggered|For|Score|Create)",
                    "$1\n\n$2$3",
                ),
                Rule::new(
                    "helpful_bullet",
                    r"(Helpful Articles)(:\s*-\s*)([A-Za-z])",
                    "$1:\n\n- $3",
                ),
                Rule::new("helpful_dash", r"(Helpful Articles?):-[ \t]*", "$1:\n\n- "),
                Rule::new("helpful_space", r"(Helpful Articles?):([A-Za-z\[])", "$1: $2"),
            ],
        ),
        Pass::new(
            "numbers",
            [
                Rule::new(
                    "unit_spacing",
                    r"(?i)([a-z])([0-9]+\s+(?:days?|weeks?|hours?|minutes?|emails?))",
                    "$1 $2",
                ),
                Rule::new("preposition_digit", r"(?i)(over|after|in|for)([0-9])", "$1 $2"),
                Rule::new(
                    "keyword_digit",
                    r"(?i)(Persona|Campaign|Step|Stage|Process|Pipeline)([0-9])",
                    "$1 $2",
                ),
                Rule::new("period_range", r"(\.)([0-9]+-)", "$1 $2"),
            ],
        ),
        Pass::new(
            "line_breaks",
            [
                Rule::new(
                    "heading_after_text",
                    r"([a-zA-Z0-9.,!?:;\-)])(#{1,6}\s)",
                    "$1\n\n$2",
                ),
                Rule::new("heading_single_newline", r"([^\n])\n(#{1,6}\s)", "$1\n\n$2"),
                Rule::new(
                    "bold_label_break",
                    r"([a-zA-Z0-9])\*\*([A-Z][a-z]+.*?:)\*\*",
                    "$1\n\n**$2**",
                ),
                Rule::guarded(
                    "bold_section_break",
                    r"([a-z])\*\*",
                    "$1\n\n**",
                    starts_bold_section,
                ),
                Rule::new("bullet_glued", r"([a-zA-Z:.])([-*]\s+[A-Z*\[])", "$1\n$2"),
                Rule::new("bullet_dash_space", r"(?m)^-([A-Za-z*])", "- $1"),
            ],
        ),
        Pass::new(
            "collapse",
            [
                Rule::new("blank_lines", r"(?m)^[ \t]+$", ""),
                Rule::new("newline_runs", r"\n{3,}", "\n\n"),
            ],
        ),
        Pass::new("brand_final", [Rule::new("brand_split", BRAND, "HubSpot")]),
    ]
}

/// The normalizer's passes, in application order.
pub fn passes() -> &'static [Pass] {
    static PASSES: OnceLock<Vec<Pass>> = OnceLock::new();
    PASSES.get_or_init(build_passes)
}

/// Full runs of the pass list before giving up on a fixed point.
const MAX_ROUNDS: usize = 4;

fn run_passes(text: &str) -> String {
    passes().iter().fold(text.to_string(), |acc, pass| {
        let next = pass.apply(&acc);
        if next != acc {
            trace!(pass = pass.name, "normalize pass changed text");
        }
        next
    })
}

/// Repair model-written markdown so it renders the same in chat and in
/// the exported document.
///
/// A late pass can expose text an earlier pass repairs (a rejoined brand
/// name glued to the next word, a trailing empty heading split off), so
/// the pass list runs until the text stops changing.
pub fn normalize_markdown(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = run_passes(&current);
        if next == current {
            return current;
        }
        current = next;
    }
    trace!(rounds = MAX_ROUNDS, "normalize stopped before a fixed point");
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> &'static Rule {
        passes()
            .iter()
            .flat_map(|p| p.rules.iter())
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no rule named {name}"))
    }

    #[test]
    fn test_every_rule_compiles() {
        let counts: Vec<(&str, usize)> = passes().iter().map(|p| (p.name, p.rules.len())).collect();
        assert_eq!(
            counts,
            vec![
                ("brand", 1),
                ("empty_elements", 2),
                ("list_join", 2),
                ("glued_text", 7),
                ("bold_labels", 8),
                ("numbers", 4),
                ("line_breaks", 6),
                ("collapse", 2),
                ("brand_final", 1),
            ]
        );
    }

    #[test]
    fn test_brand_split() {
        let r = rule("brand_split");
        assert_eq!(r.apply("Welcome to Hub\nSpot"), "Welcome to HubSpot");
        assert_eq!(r.apply("hub  spot rocks"), "HubSpot rocks");
        assert_eq!(r.apply("Hub \n\n Spot."), "HubSpot.");
        assert_eq!(r.apply("Sales Hub setup"), "Sales Hub setup");
    }

    #[test]
    fn test_empty_heading() {
        assert_eq!(rule("empty_heading").apply("Intro\n###  \nBody"), "Intro\n\nBody");
    }

    #[test]
    fn test_bare_bullet_removed_only_without_continuation() {
        let r = rule("bare_bullet");
        assert_eq!(r.apply("- one\n-\n\n## Next"), "- one\n\n\n## Next");
        assert_eq!(r.apply("-\nCreate stages"), "-\nCreate stages");
        assert_eq!(r.apply("*  \n"), "\n");
    }

    #[test]
    fn test_bullet_and_number_join() {
        assert_eq!(rule("bullet_join").apply("-\n\n  Create stages"), "- Create stages");
        assert_eq!(rule("number_join").apply("1.\n[Guide](x)"), "1. [Guide](x)");
        assert_eq!(rule("number_join").apply("1. Done\n2. Next"), "1. Done\n2. Next");
    }

    #[test]
    fn test_heading_glued() {
        assert_eq!(
            rule("heading_glued").apply("## Pipeline SetupDeal stages come first"),
            "## Pipeline Setup\n\nDeal stages come first"
        );
        assert_eq!(rule("heading_glued").apply("## Sales Hub"), "## Sales Hub");
    }

    #[test]
    fn test_hub_glued_spares_brand() {
        let r = rule("hub_glued");
        assert_eq!(r.apply("Sales HubPipeline"), "Sales Hub\n\nPipeline");
        assert_eq!(r.apply("HubSpot and hubspot"), "HubSpot and hubspot");
        assert_eq!(r.apply("HubSp"), "Hub\n\nSp");
    }

    #[test]
    fn test_step_and_section_glued() {
        assert_eq!(rule("step_glued").apply("Lead StageQualified"), "Lead Stage\n\nQualified");
        assert_eq!(
            rule("section_glued").apply("demo bookedProposal Sent"),
            "demo booked\n\nProposal Sent"
        );
    }

    #[test]
    fn test_bold_glued() {
        assert_eq!(rule("bold_glued").apply("the pipeline**Deal Stages**"), "the pipeline\n\n**Deal Stages**");
    }

    #[test]
    fn test_keyword_glued_requires_separator() {
        let r = rule("keyword_glued");
        assert_eq!(r.apply("workflowsDeal: value"), "workflows\n\nDeal: value");
        assert_eq!(r.apply("idealDealer"), "idealDealer");
    }

    #[test]
    fn test_phrase_glued() {
        assert_eq!(
            rule("phrase_glued").apply("stages.Here are the steps"),
            "stages.Here are the steps"
        );
        assert_eq!(
            rule("phrase_glued").apply("stagesHere are the steps"),
            "stages\n\nHere are the steps"
        );
    }

    #[test]
    fn test_bold_label_rules() {
        assert_eq!(rule("bold_colon_next_line").apply("**Goal**\n: grow"), "**Goal**: grow");
        assert_eq!(rule("bold_colon_next_line").apply("**Phase 1**\n\nIntro"), "**Phase 1**\n\nIntro");
        assert_eq!(rule("bold_label_next_line").apply("**Goal:**\n\nGrow revenue"), "**Goal:** Grow revenue");
        assert_eq!(rule("bold_label_glued").apply("**Goal:**Grow"), "**Goal:** Grow");
        assert_eq!(rule("bold_label_bullet").apply("**Steps:**- Create"), "**Steps:**\n\n- Create");
    }

    #[test]
    fn test_feature_bullet() {
        assert_eq!(
            rule("feature_bullet").apply("Decision Makers**- Qualifier"),
            "Decision Makers\n\n- Qualifier"
        );
    }

    #[test]
    fn test_helpful_articles() {
        assert_eq!(
            rule("helpful_bullet").apply("Helpful Articles: - Pipelines"),
            "Helpful Articles:\n\n- Pipelines"
        );
        assert_eq!(rule("helpful_dash").apply("Helpful Article:-Forms"), "Helpful Article:\n\n- Forms");
        assert_eq!(rule("helpful_space").apply("Helpful Articles:[Guide](x)"), "Helpful Articles: [Guide](x)");
    }

    #[test]
    fn test_number_spacing() {
        assert_eq!(rule("unit_spacing").apply("within7 days"), "within 7 days");
        assert_eq!(rule("preposition_digit").apply("after3 emails"), "after 3 emails");
        assert_eq!(rule("keyword_digit").apply("Persona1 and Stage2"), "Persona 1 and Stage 2");
        assert_eq!(rule("period_range").apply("Done.2-3 weeks"), "Done. 2-3 weeks");
    }

    #[test]
    fn test_heading_breaks() {
        assert_eq!(rule("heading_after_text").apply("done.## Next"), "done.\n\n## Next");
        assert_eq!(rule("heading_single_newline").apply("Intro\n## Goals"), "Intro\n\n## Goals");
        assert_eq!(rule("heading_single_newline").apply("Intro\n\n## Goals"), "Intro\n\n## Goals");
    }

    #[test]
    fn test_bold_breaks() {
        assert_eq!(
            rule("bold_label_break").apply("ready**Where to find it:**"),
            "ready\n\n**Where to find it:**"
        );
        let r = rule("bold_section_break");
        assert_eq!(r.apply("setup**Helpful Articles**"), "setup\n\n**Helpful Articles**");
        assert_eq!(r.apply("setup**Other**"), "setup**Other**");
    }

    #[test]
    fn test_bullet_breaks() {
        assert_eq!(rule("bullet_glued").apply("Goals:- Grow revenue"), "Goals:\n- Grow revenue");
        assert_eq!(rule("bullet_dash_space").apply("-Item\n-**Bold**"), "- Item\n- **Bold**");
        assert_eq!(rule("bullet_dash_space").apply("-5 days"), "-5 days");
    }

    #[test]
    fn test_collapse() {
        assert_eq!(rule("blank_lines").apply("a\n   \nb"), "a\n\nb");
        assert_eq!(rule("newline_runs").apply("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_whitespace_only_lines_do_not_leave_long_runs() {
        assert_eq!(normalize_markdown("a\n\n  \n\nb"), "a\n\nb");
    }

    #[test]
    fn test_brand_survives_heading_split() {
        assert_eq!(normalize_markdown("## HubSpot Setup"), "## HubSpot Setup");
    }

    #[test]
    fn test_repairs_exposed_by_late_passes() {
        let once = run_passes("# Acme Implementation PlanHubSpot- Create deal stages## ");
        assert_ne!(run_passes(&once), once);
        assert_eq!(
            normalize_markdown("# Acme Implementation PlanHubSpot- Create deal stages## "),
            "# Acme Implementation Plan\n\nHubSpot\n- Create deal stages\n\n"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_markdown(""), "");
    }
}

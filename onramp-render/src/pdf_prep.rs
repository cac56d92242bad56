//! Export preparation: strip chat-only chrome from a plan and pull out the
//! summary pieces (hubs, objectives) shown ahead of the plan body.

use onramp_core::ImplementationPlan;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;

use crate::document::{normalize_url, render, Document, LayoutConfig};
use crate::normalize::normalize_markdown;

pub const DEFAULT_COMPANY: &str = "Your Company";

const COVER_TITLE: &str = "HubSpot Implementation Plan";
const COVER_SUBTITLE: &str = "AI-Assisted HubSpot Implementation for";

const RESOURCES: &str =
    "Relevant HubSpot Knowledge Base articles and navigation paths are included in the plan above.";

const NEXT_STEPS: &[&str] = &[
    "Our team will reach out shortly to request access to your account. Once access is confirmed, we'll complete the implementation steps outlined above within the included three (3) hours and then send you a summary of what's been set up.",
    "Depending on the complexity of your plan, some items may remain after those three hours. If that happens, we'll give you clear resources and a step-by-step plan so your team can move forward.",
    "If you'd like to go further with expert guidance, you can add more hands-on hours with our team.",
];

const DISCLAIMER: &str = "This Implementation Plan was generated with the assistance of artificial intelligence and is provided as a draft. It may contain errors, omissions or inconsistencies. As outlined in the Terms and Conditions agreed to at the start of this service, no guarantee is made regarding the accuracy or completeness of AI-generated output. The Client is solely responsible for reviewing and confirming the plan's suitability before implementation.";

const NOTE: &str = "This plan was AI-assisted and may contain errors. As per the Terms and Conditions already agreed, the Client is responsible for reviewing and confirming its suitability.";

struct PrepPatterns {
    title_line: Regex,
    closer: Regex,
    hub_name: Regex,
    objectives_block: Regex,
    hub_heading: Regex,
    need_objective: Regex,
    include_list: Regex,
}

fn prep_patterns() -> Option<&'static PrepPatterns> {
    static PATTERNS: OnceLock<Option<PrepPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(PrepPatterns {
                title_line: Regex::new(
                    r"(?im)^#{0,6}[ \t]*[A-Za-z0-9][A-Za-z0-9 \t\-]*[ \t]+Implementation[ \t]+Plan[ \t]*\n",
                )
                .ok()?,
                closer: Regex::new(r"(?i)Let me know if this plan works for you[^.!]*[.!]\s*").ok()?,
                hub_name: Regex::new(r"(?i)\b(SALES|MARKETING|SERVICE)\s+Hub\b").ok()?,
                objectives_block: Regex::new(
                    r"(?i)\n(?:\*\*Objectives:\*\*|Objectives:)[ \t]*\n(?:Need/Objective\s*#?[0-9]+[^\n]*\n?)+",
                )
                .ok()?,
                hub_heading: Regex::new(r"(?i)##\s+(SALES\s+HUB|MARKETING\s+HUB|SERVICE\s+HUB)").ok()?,
                need_objective: Regex::new(
                    r"(?i)(?:\*\*)?Need/Objective\s*#?[0-9]+\s*(?:\*\*)?:?\s*([^\n*]+)",
                )
                .ok()?,
                include_list: Regex::new(
                    r"(?i)objectives?\s+(?:you are looking to achieve[^.]*\.?\s*)?include\s*\[([^\]]+)\]",
                )
                .ok()?,
            })
        })
        .as_ref()
}

/// Remove the parts of a chat plan that do not belong in the document:
/// the title line, the closing question and the `Objectives:` block that
/// repeats the summary. Hub names are upper-cased to match section headings.
pub fn preprocess_plan_for_pdf(md: &str) -> String {
    let Some(p) = prep_patterns() else {
        return md.to_string();
    };
    let s = p.title_line.replace_all(md, "");
    let s = p.closer.replace_all(&s, "");
    let s = p
        .hub_name
        .replace_all(&s, |caps: &Captures<'_>| format!("{} HUB", caps[1].to_uppercase()));
    p.objectives_block.replace_all(&s, "\n").into_owned()
}

/// Hub section headings (`## SALES HUB`), first occurrence of each.
pub fn parse_hubs_from_plan(md: &str) -> Vec<String> {
    let Some(p) = prep_patterns() else {
        return Vec::new();
    };
    let mut seen: Vec<String> = Vec::new();
    let mut hubs = Vec::new();
    for caps in p.hub_heading.captures_iter(md) {
        let hub = caps[1].trim().to_string();
        let key = hub.to_uppercase();
        if !seen.contains(&key) {
            seen.push(key);
            hubs.push(hub);
        }
    }
    hubs
}

/// `Need/Objective #N: text` lines, else the `objectives ... include [a, b]`
/// sentence form.
pub fn parse_objectives_from_plan(md: &str) -> Vec<String> {
    let Some(p) = prep_patterns() else {
        return Vec::new();
    };
    let objectives: Vec<String> = p
        .need_objective
        .captures_iter(md)
        .map(|caps| caps[1].trim().replace("**", ""))
        .filter(|t| {
            let n = t.chars().count();
            n > 2 && n < 200
        })
        .collect();
    if !objectives.is_empty() {
        return objectives;
    }

    p.include_list
        .captures(md)
        .map(|caps| {
            caps[1]
                .split(',')
                .map(str::trim)
                .filter(|s| s.chars().count() > 2)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// First page: title, subtitle and the company, linked to its website
/// when one is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cover {
    pub title: String,
    pub subtitle: String,
    pub company: String,
    pub link: Option<String>,
}

/// Fixed text after the plan body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Closing {
    pub resources: String,
    pub next_steps: Vec<String>,
}

/// Page footers: the full disclaimer on the cover, the short note after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Footer {
    pub disclaimer: String,
    pub note: String,
}

/// Everything the PDF backend needs for one plan. `hubs` and `objectives`
/// make up the summary page ahead of the plan body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedPlan {
    pub company: String,
    pub cover: Cover,
    pub hubs: Vec<String>,
    pub objectives: Vec<String>,
    pub document: Document,
    pub closing: Closing,
    pub footer: Footer,
}

fn cover(company: &str, website: Option<&str>) -> Cover {
    Cover {
        title: COVER_TITLE.to_string(),
        subtitle: COVER_SUBTITLE.to_string(),
        company: company.to_string(),
        link: website
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(normalize_url),
    }
}

fn closing() -> Closing {
    Closing {
        resources: RESOURCES.to_string(),
        next_steps: NEXT_STEPS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Markdown used when no plan text was captured: objectives and
/// recommendations from the structured plan.
fn fallback_markdown(plan: &ImplementationPlan) -> String {
    let mut md = String::from("### Objectives\n");
    for o in &plan.objectives {
        md.push_str(&format!("- {o}\n"));
    }
    if !plan.recommendations.is_empty() {
        md.push_str("\n### Recommendations\n");
        for r in &plan.recommendations {
            md.push_str(&format!("- {r}\n"));
        }
    }
    md
}

/// Normalize, strip and lay out a plan for export.
pub fn export_plan(
    plan_text: &str,
    plan: &ImplementationPlan,
    website: Option<&str>,
    layout: &LayoutConfig,
) -> ExportedPlan {
    let company = if plan.company.trim().is_empty() {
        DEFAULT_COMPANY.to_string()
    } else {
        plan.company.clone()
    };

    let (body, hubs, parsed_objectives) = if plan_text.trim().is_empty() {
        (fallback_markdown(plan), Vec::new(), Vec::new())
    } else {
        let normalized = normalize_markdown(plan_text);
        (
            preprocess_plan_for_pdf(&normalized),
            parse_hubs_from_plan(plan_text),
            parse_objectives_from_plan(plan_text),
        )
    };

    let objectives = if plan.objectives.is_empty() {
        parsed_objectives
    } else {
        plan.objectives.clone()
    };
    let document = render(&body, layout);

    info!(
        %company,
        hubs = hubs.len(),
        objectives = objectives.len(),
        pages = document.pages.len(),
        "plan exported"
    );

    ExportedPlan {
        cover: cover(&company, website),
        company,
        hubs,
        objectives,
        document,
        closing: closing(),
        footer: Footer {
            disclaimer: DISCLAIMER.to_string(),
            note: NOTE.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "# Acme Implementation Plan\n\
## Summary\n\
Objectives:\n\
Need/Objective #1: Organize the sales pipeline\n\
Need/Objective #2: Automate follow-up\n\
## Sales Hub\n\
- Create deal stages\n\
## SALES HUB\n\
## Marketing Hub\n\
Let me know if this plan works for you or if you'd like changes!\n";

    #[test]
    fn test_preprocess_strips_chat_chrome() {
        let out = preprocess_plan_for_pdf(PLAN);
        assert!(!out.contains("Implementation Plan"));
        assert!(!out.contains("Need/Objective"));
        assert!(!out.contains("Let me know"));
        assert!(out.contains("## SALES HUB\n- Create deal stages"));
        assert!(out.contains("## MARKETING HUB"));
    }

    #[test]
    fn test_parse_hubs_dedupes_case_insensitively() {
        assert_eq!(parse_hubs_from_plan(PLAN), vec!["Sales Hub", "Marketing Hub"]);
        assert!(parse_hubs_from_plan("no headings").is_empty());
    }

    #[test]
    fn test_parse_objectives() {
        assert_eq!(
            parse_objectives_from_plan(PLAN),
            vec!["Organize the sales pipeline", "Automate follow-up"]
        );
    }

    #[test]
    fn test_parse_objectives_include_fallback() {
        let md = "The main objectives you are looking to achieve include [Pipeline hygiene, Faster follow-up, ok]";
        assert_eq!(
            parse_objectives_from_plan(md),
            vec!["Pipeline hygiene", "Faster follow-up"]
        );
    }

    #[test]
    fn test_export_prefers_plan_objectives() {
        let plan = ImplementationPlan {
            company: "Acme".into(),
            objectives: vec!["Track every deal".into()],
            ..Default::default()
        };
        let exported = export_plan(PLAN, &plan, None, &LayoutConfig::default());
        assert_eq!(exported.company, "Acme");
        assert_eq!(exported.objectives, vec!["Track every deal"]);
        assert_eq!(exported.hubs, vec!["Sales Hub", "Marketing Hub"]);
        assert!(!exported.document.pages.is_empty());
    }

    #[test]
    fn test_export_without_plan_text_uses_structured_plan() {
        let plan = ImplementationPlan {
            objectives: vec!["Clean up contacts".into()],
            recommendations: vec!["Import lists first".into()],
            ..Default::default()
        };
        let exported = export_plan("  ", &plan, None, &LayoutConfig::default());
        assert_eq!(exported.company, DEFAULT_COMPANY);
        assert_eq!(exported.cover.company, DEFAULT_COMPANY);
        assert_eq!(exported.cover.link, None);
        let texts: Vec<String> = exported.document.lines().map(|l| l.text()).collect();
        assert!(texts.contains(&"Objectives".to_string()));
        assert!(texts.contains(&"Import lists first".to_string()));
    }

    #[test]
    fn test_export_carries_cover_closing_and_footer() {
        let plan = ImplementationPlan {
            company: "Acme".into(),
            ..Default::default()
        };
        let exported = export_plan(PLAN, &plan, Some(" acme-sensors.io "), &LayoutConfig::default());
        assert_eq!(exported.cover.title, "HubSpot Implementation Plan");
        assert_eq!(exported.cover.company, "Acme");
        assert_eq!(exported.cover.link.as_deref(), Some("https://acme-sensors.io"));
        assert_eq!(exported.closing.next_steps.len(), 3);
        assert!(exported.footer.disclaimer.starts_with("This Implementation Plan"));
        assert!(!exported.footer.note.is_empty());

        let v = serde_json::to_value(&exported).unwrap();
        assert_eq!(v["closing"]["nextSteps"][0], exported.closing.next_steps[0].as_str());
        assert_eq!(v["cover"]["link"], "https://acme-sensors.io");
    }
}

//! Hub and subscription-level extraction from free text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Which product hubs are in scope for the implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHubs {
    pub sales: bool,
    pub marketing: bool,
    pub service: bool,
}

impl ActiveHubs {
    pub fn any(&self) -> bool {
        self.sales || self.marketing || self.service
    }

    /// Display names of the active hubs, in sales/marketing/service order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.sales {
            out.push("Sales Hub");
        }
        if self.marketing {
            out.push("Marketing Hub");
        }
        if self.service {
            out.push("Service Hub");
        }
        out
    }
}

struct HubPatterns {
    sales: Vec<Regex>,
    marketing: Vec<Regex>,
    service: Vec<Regex>,
    sales_excluded: Vec<Regex>,
    marketing_excluded: Vec<Regex>,
    service_excluded: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn hub_patterns() -> &'static HubPatterns {
    static PATTERNS: OnceLock<HubPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HubPatterns {
        sales: compile(&[r"(?i)\bsales\b"]),
        marketing: compile(&[r"(?i)\bmarketing\b"]),
        service: compile(&[r"(?i)\bservice\b"]),
        sales_excluded: compile(&[r"(?i)sales\s+(can\s+)?(come|wait|later|future|not\s+now)"]),
        marketing_excluded: compile(&[
            r"(?i)marketing\s+(can\s+)?(come|wait|later|future|not\s+now)",
        ]),
        // Service has the richer vocabulary: "isn't", "not in scope" and
        // "not planning/implementing/including ... service".
        service_excluded: compile(&[
            r"(?i)service\s+(can\s+)?(come|wait|later|future|not\s+now|isn't|not\s+in\s+scope)",
            r"(?i)not\s+(planning|implementing|including)\s+.*?service",
        ]),
    })
}

/// Parse which hubs are actively being implemented, not merely mentioned.
///
/// "Sales and Marketing, Service can come later" yields sales and
/// marketing only.
pub fn parse_active_hubs(text: &str) -> ActiveHubs {
    let p = hub_patterns();
    let hit = |patterns: &[Regex]| patterns.iter().any(|r| r.is_match(text));

    ActiveHubs {
        sales: hit(&p.sales) && !hit(&p.sales_excluded),
        marketing: hit(&p.marketing) && !hit(&p.marketing_excluded),
        service: hit(&p.service) && !hit(&p.service_excluded),
    }
}

/// Bare mention check used when building knowledge-base queries.
pub fn detect_mentioned_hubs(text: &str) -> ActiveHubs {
    let lower = text.to_lowercase();
    ActiveHubs {
        sales: lower.contains("sales"),
        marketing: lower.contains("marketing"),
        service: lower.contains("service"),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionLevel {
    Free,
    Starter,
    #[default]
    Professional,
    Enterprise,
}

impl SubscriptionLevel {
    /// Keyword scan order for `parse_subscription_level`.
    const SCAN_ORDER: [SubscriptionLevel; 4] = [
        SubscriptionLevel::Free,
        SubscriptionLevel::Starter,
        SubscriptionLevel::Professional,
        SubscriptionLevel::Enterprise,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            SubscriptionLevel::Free => "free",
            SubscriptionLevel::Starter => "starter",
            SubscriptionLevel::Professional => "professional",
            SubscriptionLevel::Enterprise => "enterprise",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionLevel::Free => "Free",
            SubscriptionLevel::Starter => "Starter",
            SubscriptionLevel::Professional => "Professional",
            SubscriptionLevel::Enterprise => "Enterprise",
        }
    }
}

impl fmt::Display for SubscriptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form answers longer than this are treated as unparseable.
const LEVEL_MAX_CHARS: usize = 50;

/// Parse a subscription tier from a short answer. Defaults to Professional.
pub fn parse_subscription_level(text: &str) -> SubscriptionLevel {
    let s = text.trim().to_lowercase();
    if s.chars().count() > LEVEL_MAX_CHARS {
        return SubscriptionLevel::Professional;
    }
    SubscriptionLevel::SCAN_ORDER
        .into_iter()
        .find(|level| s.contains(level.keyword()))
        .unwrap_or_default()
}

/// Highest tier mentioned anywhere in the text. Defaults to Professional.
pub fn extract_level(text: &str) -> SubscriptionLevel {
    let lower = text.to_lowercase();
    [
        SubscriptionLevel::Enterprise,
        SubscriptionLevel::Professional,
        SubscriptionLevel::Starter,
        SubscriptionLevel::Free,
    ]
    .into_iter()
    .find(|level| lower.contains(level.keyword()))
    .unwrap_or_default()
}

//! Discovery topics and the question classifier.
//!
//! Every assistant question in the interview is mapped to one topic by plain
//! substring matching. Topics then collapse onto the five pillars the
//! readiness gate checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fine-grained category of an interview question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryTopic {
    CompanyInfo,
    HubsIncluded,
    SubscriptionLevels,
    OverallGoals,
    HubSpecificGoals,
    SalesProcess,
    ServiceProcess,
    MarketingProcess,
}

impl DiscoveryTopic {
    pub fn pillar(self) -> Pillar {
        match self {
            DiscoveryTopic::CompanyInfo => Pillar::CompanyInfo,
            DiscoveryTopic::HubsIncluded => Pillar::HubsIncluded,
            DiscoveryTopic::SubscriptionLevels => Pillar::SubscriptionLevels,
            DiscoveryTopic::OverallGoals => Pillar::OverallGoals,
            DiscoveryTopic::HubSpecificGoals
            | DiscoveryTopic::SalesProcess
            | DiscoveryTopic::ServiceProcess
            | DiscoveryTopic::MarketingProcess => Pillar::HubSpecificDetails,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            DiscoveryTopic::CompanyInfo => "company_info",
            DiscoveryTopic::HubsIncluded => "hubs_included",
            DiscoveryTopic::SubscriptionLevels => "subscription_levels",
            DiscoveryTopic::OverallGoals => "overall_goals",
            DiscoveryTopic::HubSpecificGoals => "hub_specific_goals",
            DiscoveryTopic::SalesProcess => "sales_process",
            DiscoveryTopic::ServiceProcess => "service_process",
            DiscoveryTopic::MarketingProcess => "marketing_process",
        }
    }
}

impl fmt::Display for DiscoveryTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One of the five required discovery categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    CompanyInfo,
    HubsIncluded,
    SubscriptionLevels,
    OverallGoals,
    HubSpecificDetails,
}

impl Pillar {
    /// Required pillars, in the order they are reported as missing.
    pub const ALL: [Pillar; 5] = [
        Pillar::CompanyInfo,
        Pillar::HubsIncluded,
        Pillar::SubscriptionLevels,
        Pillar::OverallGoals,
        Pillar::HubSpecificDetails,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Pillar::CompanyInfo => "company_info",
            Pillar::HubsIncluded => "hubs_included",
            Pillar::SubscriptionLevels => "subscription_levels",
            Pillar::OverallGoals => "overall_goals",
            Pillar::HubSpecificDetails => "hub_specific_details",
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered topic → pattern table. Patterns are lowercase substrings.
///
/// Order matters: the first topic with a matching pattern wins. The
/// subscription step asks about hubs "not planning to implement right now",
/// so it sits ahead of the hubs step whose own question says "planning to
/// implement".
pub const TOPIC_PATTERNS: &[(DiscoveryTopic, &[&str])] = &[
    (
        DiscoveryTopic::CompanyInfo,
        &[
            "company's website",
            "domain",
            "business name",
            "what your business does",
            "what i understand about your business",
            "is this correct",
            "let's get started",
            "hi! let's get started",
        ],
    ),
    (
        DiscoveryTopic::SubscriptionLevels,
        &[
            "subscription level",
            "free, starter, professional, enterprise",
            "what subscription level",
            "hubs purchased",
            "not planning to implement right now",
        ],
    ),
    (
        DiscoveryTopic::HubsIncluded,
        &[
            "hubspot hubs",
            "marketing, sales, service",
            "which main hubspot hubs",
            "planning to implement",
            "hubs are you",
        ],
    ),
    (
        DiscoveryTopic::OverallGoals,
        &[
            "main goals with hubspot",
            "goals with hubspot",
            "what are your main goals",
            "organize your sales",
            "send better emails",
            "improve reporting",
            "reduce manual work",
        ],
    ),
    (
        DiscoveryTopic::HubSpecificGoals,
        &[
            "specific features",
            "goals you have in mind",
            "excited to use",
            "for each hub you're implementing",
        ],
    ),
    (
        DiscoveryTopic::SalesProcess,
        &[
            "let's talk sales",
            "who do you sell to",
            "sales team get their leads",
            "more than one sales team",
            "more than one sales process",
            "when is a deal created",
            "key steps your team takes",
            "what defines a 'won' deal",
            "pieces of info you always need to collect",
            "repetitive tasks",
            "like to automate",
        ],
    ),
    (
        DiscoveryTopic::ServiceProcess,
        &[
            "let's talk service",
            "service processes",
            "when should a ticket be created",
            "main steps each ticket",
            "knowledge base",
            "surveys",
            "customer satisfaction",
        ],
    ),
    (
        DiscoveryTopic::MarketingProcess,
        &[
            "let's talk about your audience",
            "kinds of people or companies",
            "good lead for your business",
            "how are people finding you",
            "stay in touch or promote",
            "marketing campaigns",
            "content hub",
            "welcome email",
        ],
    ),
];

/// Classify an assistant question into a discovery topic.
pub fn classify(question: &str) -> Option<DiscoveryTopic> {
    let text = question.to_lowercase();
    TOPIC_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| text.contains(p)))
        .map(|(topic, _)| *topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_company_opener() {
        let q = "👋 Hi! Let's get started. What's your company's website (domain)?";
        assert_eq!(classify(q), Some(DiscoveryTopic::CompanyInfo));
    }

    #[test]
    fn test_classify_hubs_question() {
        let q = "🚀 Which main HubSpot Hubs are you planning to implement?\n(Please reply with one or more of: Marketing, Sales, Service)";
        assert_eq!(classify(q), Some(DiscoveryTopic::HubsIncluded));
    }

    #[test]
    fn test_classify_subscription_question_wins_over_hubs() {
        let q = "📦 Great. For each Hub you're implementing, what subscription level do you have?\n\
(e.g., Free, Starter, Professional, Enterprise)\n\
Also, do you have any Hubs purchased that you're not planning to implement right now?";
        assert_eq!(classify(q), Some(DiscoveryTopic::SubscriptionLevels));
    }

    #[test]
    fn test_classify_hub_specific_goals() {
        let q = "🧭 For each Hub you're implementing (Marketing, Sales, or Service), are there any specific features you're excited to use?";
        assert_eq!(classify(q), Some(DiscoveryTopic::HubSpecificGoals));
        assert_eq!(DiscoveryTopic::HubSpecificGoals.pillar(), Pillar::HubSpecificDetails);
    }

    #[test]
    fn test_classify_process_topics() {
        assert_eq!(classify("Let's talk sales! Who do you sell to?"), Some(DiscoveryTopic::SalesProcess));
        assert_eq!(classify("When should a ticket be created?"), Some(DiscoveryTopic::ServiceProcess));
        assert_eq!(classify("How are people finding you right now?"), Some(DiscoveryTopic::MarketingProcess));
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("WHAT ARE YOUR MAIN GOALS?"), Some(DiscoveryTopic::OverallGoals));
    }

    #[test]
    fn test_classify_none() {
        assert_eq!(classify("Thanks for sharing that!"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_process_topics_collapse_into_hub_details() {
        for topic in [
            DiscoveryTopic::SalesProcess,
            DiscoveryTopic::ServiceProcess,
            DiscoveryTopic::MarketingProcess,
        ] {
            assert_eq!(topic.pillar(), Pillar::HubSpecificDetails);
        }
        assert_eq!(Pillar::ALL.len(), 5);
    }
}

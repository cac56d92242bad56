//! onramp-core: discovery state tracking for the onboarding assistant

pub mod topics;
pub mod history;
pub mod hubs;
pub mod readiness;
pub mod context;
pub mod knowledge;
pub mod plan;

pub use topics::{classify, DiscoveryTopic, Pillar, TOPIC_PATTERNS};
pub use history::{derive, merge_answers, clean_transcript, Answers, DerivedContext, Message, Role};
pub use hubs::{
    detect_mentioned_hubs, extract_level, parse_active_hubs, parse_subscription_level, ActiveHubs,
    SubscriptionLevel,
};
pub use readiness::{detect, ReadinessMetrics, ReadinessResult};
pub use context::{discovery_state_block, normalize_answers_to_pillars, ClientContext, RequestContext};
pub use knowledge::{
    build_queries, dedupe_snippets, extract_keywords, format_guidance, KnowledgeFallback,
    KnowledgeSnippet, SnippetCollector,
};
pub use plan::{draft_plan, extract_objectives, ImplementationPlan, PlanDraft, PlanModule, Priority, UserInfo};

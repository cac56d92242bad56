use onramp_render::normalize_markdown;

/// Plans as they come back from a streamed completion.
const STREAMED_PLANS: &[&str] = &[
    "## SALES HUB\n- Create deal stages\n-\nAdd a Proposal stage\nUse Hub Spot sequences over7 days.",
    "**Deal Stages:**Discovery call booked\n**Helpful Articles:**- Pipeline setup guide",
    "## Sales Hub\n\n- Create deal stages\n- Add a Proposal stage\n",
];

#[test]
fn test_streamed_plans_are_repaired() {
    assert_eq!(
        normalize_markdown(STREAMED_PLANS[0]),
        "## SALES HUB\n- Create deal stages\n- Add a Proposal stage\nUse HubSpot sequences over 7 days."
    );
    assert_eq!(
        normalize_markdown(STREAMED_PLANS[1]),
        "**Deal Stages:** Discovery call booked\n**Helpful Articles:**\n\n- Pipeline setup guide"
    );
}

#[test]
fn test_clean_plan_is_untouched() {
    assert_eq!(normalize_markdown(STREAMED_PLANS[2]), STREAMED_PLANS[2]);
}

#[test]
fn test_normalize_is_idempotent() {
    for plan in STREAMED_PLANS {
        let once = normalize_markdown(plan);
        assert_eq!(normalize_markdown(&once), once, "{plan:?}");
    }
}

/// Plan lines glued together in arbitrary order, the way chunk boundaries
/// of a stream can leave them.
const PLAN_FRAGMENTS: &[&str] = &[
    "## SALES HUB",
    "Timeline: 3 days",
    "Hub Spot",
    "- Create deal stages",
    "# Acme Implementation Plan",
    "HubSpot",
    "## ",
    "**Deal Stages:**",
    "Discovery call booked",
    "**Helpful Articles:**",
    "- Pipeline setup guide",
    "-",
    "over7 days",
    "Proposal Sent",
    "## Marketing Hub",
    "Sequences",
    "\n",
    "\n\n",
    " ",
    "Helpful Articles:-Forms",
    "1.",
    "Where to find it:",
    "**Goal**",
    ":",
];

/// Deterministic fragment sequences from a fixed-seed LCG.
fn glued_fragments(count: usize) -> Vec<String> {
    let mut state: u64 = 0x5eed;
    let mut next = |n: usize| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % n
    };
    (0..count)
        .map(|_| {
            let parts = 1 + next(8);
            (0..parts)
                .map(|_| PLAN_FRAGMENTS[next(PLAN_FRAGMENTS.len())])
                .collect()
        })
        .collect()
}

#[test]
fn test_glued_fragments_normalize_idempotently() {
    for text in glued_fragments(2000) {
        let once = normalize_markdown(&text);
        assert_eq!(normalize_markdown(&once), once, "{text:?}");
        assert!(!once.contains("Hub Spot"), "{text:?}");
    }
}

#[test]
fn test_brand_survives_any_whitespace_split() {
    for ws in [" ", "\n", "\n\n", "  \n\t"] {
        let text = format!("Welcome to Hub{ws}Spot onboarding");
        let out = normalize_markdown(&text);
        assert!(out.contains("HubSpot"), "{out:?}");
        assert!(!out.contains(&format!("Hub{ws}Spot")), "{out:?}");
    }
    assert_eq!(normalize_markdown("HUB spot"), "HubSpot");
}

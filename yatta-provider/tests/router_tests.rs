// ABOUTME: Tests for the first-success fallback router.
// ABOUTME: Covers short-circuiting, exhaustion degradation, and vision capability skipping.

use std::sync::Arc;

use yatta_provider::mock::MockProvider;
use yatta_provider::{FallbackRouter, DEGRADED_REPLY};

#[tokio::test]
async fn first_success_short_circuits() {
    let first = Arc::new(MockProvider::succeeding("cloud", "from cloud"));
    let second = Arc::new(MockProvider::succeeding("local", "from local"));
    let router = FallbackRouter::new(vec![first.clone(), second.clone()]);

    let reply = router.route("apa kabar?").await;

    assert_eq!(reply, "from cloud");
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 0);
}

#[tokio::test]
async fn failure_falls_through_to_next_provider() {
    let first = Arc::new(MockProvider::failing("cloud"));
    let second = Arc::new(MockProvider::succeeding("local", "from local"));
    let router = FallbackRouter::new(vec![first.clone(), second.clone()]);

    let reply = router.route("hi").await;

    assert_eq!(reply, "from local");
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
}

#[tokio::test]
async fn timeout_is_treated_like_any_other_failure() {
    let first = Arc::new(MockProvider::timing_out("cloud"));
    let second = Arc::new(MockProvider::succeeding("local", "slow but sure"));
    let router = FallbackRouter::new(vec![first, second]);

    assert_eq!(router.route("hi").await, "slow but sure");
}

#[tokio::test]
async fn exhaustion_yields_degraded_reply_for_any_provider_count() {
    // 0..N providers, all failing, must still produce a non-empty string.
    for n in 0..4 {
        let providers = (0..n)
            .map(|i| {
                let p: Arc<dyn yatta_provider::Provider> = if i % 2 == 0 {
                    Arc::new(MockProvider::failing("even"))
                } else {
                    Arc::new(MockProvider::timing_out("odd"))
                };
                p
            })
            .collect();
        let router = FallbackRouter::new(providers);

        let reply = router.route("anyone there?").await;
        assert_eq!(reply, DEGRADED_REPLY);
        assert!(!reply.is_empty());
    }
}

#[tokio::test]
async fn vision_path_skips_text_only_providers() {
    // Text-only provider has top priority, but an image request must jump
    // straight to a vision-capable provider.
    let text_only = Arc::new(MockProvider::succeeding("local", "text answer"));
    let vision = Arc::new(MockProvider::succeeding("cloud", "I see a cat").with_vision());
    let router = FallbackRouter::new(vec![text_only.clone(), vision.clone()]);

    let reply = router.route_vision("jelaskan ini", b"\xff\xd8\xff").await;

    assert_eq!(reply, "I see a cat");
    assert_eq!(text_only.call_count(), 0);
    assert_eq!(vision.call_count(), 1);
}

#[tokio::test]
async fn vision_exhaustion_degrades_without_touching_text_providers() {
    let text_only = Arc::new(MockProvider::succeeding("local", "text answer"));
    let vision = Arc::new(MockProvider::failing("cloud").with_vision());
    let router = FallbackRouter::new(vec![text_only.clone(), vision]);

    let reply = router.route_vision("what is this", b"bytes").await;

    assert_eq!(reply, DEGRADED_REPLY);
    assert_eq!(text_only.call_count(), 0);
}

#[tokio::test]
async fn provider_count_reports_chain_length() {
    let providers: Vec<Arc<dyn yatta_provider::Provider>> = vec![
        Arc::new(MockProvider::succeeding("cloud", "a")),
        Arc::new(MockProvider::succeeding("local", "b")),
    ];
    let router = FallbackRouter::new(providers);

    assert_eq!(router.provider_count(), 2);
    assert_eq!(FallbackRouter::new(Vec::new()).provider_count(), 0);
}

#[tokio::test]
async fn router_forwards_prompt_unchanged() {
    let provider = Arc::new(MockProvider::succeeding("cloud", "ok"));
    let router = FallbackRouter::new(vec![provider.clone()]);

    router.route("apa kabar?").await;

    assert_eq!(provider.prompts(), vec!["apa kabar?".to_string()]);
}

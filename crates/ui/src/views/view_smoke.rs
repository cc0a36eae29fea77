use serde_json::json;
use services::StaticEnvironment;
use storage::repository::{InMemoryRepository, KeyValueStore};

use super::test_harness::setup_landing;

fn global(config: serde_json::Value) -> StaticEnvironment {
    StaticEnvironment {
        global: Some(config),
        attribute: None,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn landing_renders_hidden_content_before_the_threshold() {
    let mut harness = setup_landing(StaticEnvironment::default(), InMemoryRepository::new());
    harness.rebuild();
    let html = harness.render();

    assert!(html.contains("atomicat-delay"), "missing delay class in {html}");
    assert!(html.contains(r#"aria-hidden="true""#), "content not hidden in {html}");
    assert!(html.contains("Loading player"), "missing player state in {html}");
    assert!(html.contains("28:49"), "missing threshold label in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn landing_reveals_immediately_without_discovery_budget() {
    let mut harness = setup_landing(global(json!({ "maxAttempts": 0, "storageKey": "promo" })), InMemoryRepository::new());
    harness.rebuild();
    let html = harness.render();

    assert!(html.contains("Revealed"), "controller not revealed in {html}");
    assert!(html.contains(r#"aria-hidden="false""#), "content still hidden in {html}");
    assert!(html.contains("Reason: "), "missing reveal reason in {html}");
    assert_eq!(harness.store.get("promo").unwrap().as_deref(), Some("true"));
}

#[tokio::test(flavor = "current_thread")]
async fn landing_reports_malformed_configuration() {
    let env = StaticEnvironment {
        global: None,
        attribute: Some("{ broken".into()),
    };
    let mut harness = setup_landing(env, InMemoryRepository::new());
    harness.rebuild();
    let html = harness.render();

    assert!(html.contains("Configuration error"), "missing error banner in {html}");
    assert!(!html.contains("player-panel"), "panel rendered for bad config in {html}");
}

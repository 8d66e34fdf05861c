mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use topic_helper_annotator::{
    AnnotatorConfig, PassOutcome, ReplayDriver, HEADING_MARKER, TITLE_MARKER,
};
use topic_helper_dom::{HostDocument, NodeSpec, VirtualDocument};
use topic_helper_lookup::fixture::{child_list_payload, FixtureTransport, Reply};
use topic_helper_protocol::{BadgeMode, HostMessage, StateResponse};

const SETTLE: Duration = Duration::from_secs(2);

fn single_page() -> VirtualDocument {
    VirtualDocument::with_body(
        page("topicId=42"),
        &[NodeSpec::element("main").with_child(NodeSpec::element("h1").with_text("Election Outcome"))],
    )
}

fn multi_page(topic_id: &str) -> VirtualDocument {
    VirtualDocument::with_body(
        page(&format!("topicId={topic_id}&type=multi")),
        &[
            NodeSpec::element("h1").with_text("Who wins?"),
            title("Yes"),
            title("No"),
        ],
    )
}

fn yes_no(transport: &FixtureTransport, topic_id: &str, yes: &str, no: &str) {
    transport.respond(
        &primary(topic_id),
        Reply::Json(child_list_payload(&[("Yes", yes), ("No", no)])),
    );
}

async fn started(
    doc: VirtualDocument,
    transport: &Arc<FixtureTransport>,
) -> ReplayDriver<VirtualDocument> {
    let mut driver = replay(doc, transport);
    driver.session_mut().start(None);
    driver.settle(SETTLE).await;
    driver
}

#[tokio::test]
async fn single_topic_heading_gets_badge() {
    let transport = Arc::new(FixtureTransport::new());
    let driver = started(single_page(), &transport).await;
    let doc = driver.session().document();

    assert_eq!(badge_texts(doc), vec!["TopicID: 42"]);
    let heading = doc.select_first("h1").unwrap();
    assert_eq!(doc.text_content(heading), "Election OutcomeTopicID: 42");
    assert_eq!(doc.attribute(heading, HEADING_MARKER).as_deref(), Some("true"));
    assert_eq!(doc.select("style#opinion-topic-helper-style").unwrap().len(), 1);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn own_writes_do_not_retrigger_reconciliation() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;
    assert_eq!(driver.session().stats().passes, 1);

    driver.advance(Duration::from_secs(5)).await;

    let stats = driver.session().stats();
    assert_eq!(stats.passes, 1);
    assert_eq!(stats.relevant_batches, 0);
    assert!(stats.ignored_batches >= 1);
    assert_eq!(badge_texts(driver.session().document()).len(), 1);
}

#[tokio::test]
async fn repeated_passes_leave_dom_unchanged() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;
    let body = driver.session().document().body();
    let before = driver.session().document().to_html(body);

    for _ in 0..3 {
        assert_eq!(
            driver.session_mut().run_pass(),
            PassOutcome::SingleApplied {
                topic_id: "42".to_string()
            }
        );
    }
    assert_eq!(driver.session().document().to_html(body), before);
}

#[tokio::test]
async fn multi_topic_titles_get_child_ids() {
    let transport = Arc::new(FixtureTransport::new());
    yes_no(&transport, "7", "101", "102");
    let driver = started(multi_page("7"), &transport).await;
    let doc = driver.session().document();

    assert_eq!(badge_texts(doc), vec!["(topicID: 101)", "(topicID: 102)"]);
    let yes = doc.select("p").unwrap()[0];
    assert_eq!(doc.attribute(yes, TITLE_MARKER).as_deref(), Some("Yes"));
    assert_eq!(transport.calls(), vec![primary("7")]);

    let report = driver.session().snapshot();
    assert!(report.badges.iter().all(|b| b.mode == BadgeMode::Multi && b.attached));
    assert_eq!(report.badges[1].target_text, "No");
}

#[tokio::test]
async fn unmatched_children_are_skipped() {
    let transport = Arc::new(FixtureTransport::new());
    transport.respond(
        &primary("7"),
        Reply::Json(child_list_payload(&[("Maybe", "100"), ("No", "102")])),
    );
    let driver = started(multi_page("7"), &transport).await;
    assert_eq!(badge_texts(driver.session().document()), vec!["(topicID: 102)"]);
}

#[tokio::test]
async fn failing_endpoints_leave_no_badges() {
    let transport = Arc::new(FixtureTransport::new());
    transport.respond(&primary("7"), Reply::Status(500));
    transport.respond(&secondary("7"), Reply::Status(500));
    let driver = started(multi_page("7"), &transport).await;

    assert!(badge_texts(driver.session().document()).is_empty());
    assert!(driver.outcomes().contains(&PassOutcome::LookupFailed {
        topic_id: "7".to_string()
    }));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn replaced_heading_ends_with_one_badge() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;
    let old = driver.session().document().select_first("h1").unwrap();

    driver
        .document_mut()
        .replace_with_spec(old, &NodeSpec::element("h1").with_text("Election Outcome"))
        .unwrap();
    driver.settle(SETTLE).await;

    let doc = driver.session().document();
    let new = doc.select_first("h1").unwrap();
    assert_ne!(old, new);
    assert_eq!(badge_texts(doc), vec!["TopicID: 42"]);
    assert_eq!(doc.attribute(new, HEADING_MARKER).as_deref(), Some("true"));
    assert_eq!(doc.attribute(old, HEADING_MARKER), None);
    assert_eq!(doc.text_content(old), "Election Outcome");
}

#[tokio::test]
async fn single_to_multi_navigation_leaves_no_residue() {
    let transport = Arc::new(FixtureTransport::new());
    yes_no(&transport, "7", "101", "102");
    let doc = VirtualDocument::with_body(
        page("topicId=42"),
        &[
            NodeSpec::element("h1").with_text("Election Outcome"),
            title("Yes"),
            title("No"),
        ],
    );
    let mut driver = started(doc, &transport).await;
    assert_eq!(badge_texts(driver.session().document()), vec!["TopicID: 42"]);

    driver.document_mut().push_state(page("topicId=7&type=multi"));
    driver.settle(SETTLE).await;

    let doc = driver.session().document();
    assert_eq!(badge_texts(doc), vec!["(topicID: 101)", "(topicID: 102)"]);
    let heading = doc.select_first("h1").unwrap();
    assert_eq!(doc.text_content(heading), "Election Outcome");
    assert_eq!(doc.attribute(heading, HEADING_MARKER), None);

    driver.document_mut().back();
    driver.settle(SETTLE).await;
    let doc = driver.session().document();
    assert_eq!(badge_texts(doc), vec!["TopicID: 42"]);
    assert!(doc.select("p").unwrap().iter().all(|p| doc.attribute(*p, TITLE_MARKER).is_none()));
}

#[tokio::test]
async fn navigation_burst_converges_on_last_location() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;

    for id in ["43", "44", "45"] {
        driver.document_mut().push_state(page(&format!("topicId={id}")));
        driver.advance(Duration::from_millis(20)).await;
    }
    assert!(badge_texts(driver.session().document()).is_empty());
    driver.settle(SETTLE).await;

    assert_eq!(badge_texts(driver.session().document()), vec!["TopicID: 45"]);
    let stats = driver.session().stats();
    assert_eq!(stats.navigations, 3);
    assert_eq!(stats.passes, 2);
}

#[tokio::test]
async fn navigation_without_topic_clears_badges() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;
    driver.document_mut().push_state("https://app.opinion.trade/");
    driver.settle(SETTLE).await;

    assert!(badge_texts(driver.session().document()).is_empty());
    assert_eq!(driver.outcomes().last(), Some(&PassOutcome::Cleared));
}

#[tokio::test]
async fn host_mutation_burst_is_debounced() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;
    let heading = driver.session().document().select_first("h1").unwrap();
    let text = driver.session().document().children(heading)[0];

    for round in 0..5 {
        driver
            .document_mut()
            .set_character_data(text, &format!("Election Outcome {round}"))
            .unwrap();
        driver.advance(Duration::from_millis(50)).await;
    }
    assert_eq!(driver.session().stats().passes, 1);

    driver.settle(SETTLE).await;
    assert_eq!(driver.session().stats().passes, 2);
    assert_eq!(badge_texts(driver.session().document()), vec!["TopicID: 42"]);
}

#[tokio::test]
async fn disabling_removes_every_injected_node_and_timer() {
    let transport = Arc::new(FixtureTransport::new());
    yes_no(&transport, "7", "101", "102");
    let pristine = multi_page("7");
    let expected = pristine.to_html(pristine.root());
    let mut driver = started(multi_page("7"), &transport).await;
    assert_eq!(badge_texts(driver.session().document()).len(), 2);

    driver
        .session_mut()
        .handle_message(&HostMessage::Toggle { enabled: false });

    let session = driver.session();
    assert!(!session.is_enabled());
    assert_eq!(session.next_deadline(), None);
    assert!(session.store().is_empty());
    let doc = session.document();
    assert_eq!(doc.to_html(doc.root()), expected);
    assert!(!doc.is_observing());
}

#[tokio::test]
async fn re_enabling_restores_badges_from_cache() {
    let transport = Arc::new(FixtureTransport::new());
    yes_no(&transport, "7", "101", "102");
    let mut driver = started(multi_page("7"), &transport).await;

    driver.session_mut().set_enabled(false);
    driver.session_mut().set_enabled(true);
    driver.settle(SETTLE).await;

    assert_eq!(badge_texts(driver.session().document()).len(), 2);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn stored_disabled_state_keeps_page_untouched() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = replay(single_page(), &transport);
    driver
        .session_mut()
        .start(Some(StateResponse { enabled: false }));
    driver.settle(SETTLE).await;

    assert!(badge_texts(driver.session().document()).is_empty());
    assert_eq!(driver.session().stats().passes, 0);
}

#[tokio::test]
async fn heal_reinserts_evicted_badge_without_network() {
    let transport = Arc::new(FixtureTransport::new());
    yes_no(&transport, "7", "101", "102");
    let mut driver = started(multi_page("7"), &transport).await;
    let passes = driver.session().stats().passes;

    let badge = driver.session().store().multi()[0].badge;
    driver.document_mut().remove(badge);
    driver.advance(Duration::from_millis(100)).await;
    assert_eq!(badge_texts(driver.session().document()).len(), 1);
    assert_eq!(driver.session().stats().passes, passes);

    driver.advance(Duration::from_secs(1)).await;

    assert_eq!(
        badge_texts(driver.session().document()),
        vec!["(topicID: 101)", "(topicID: 102)"]
    );
    assert_eq!(driver.session().stats().heals, 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn rerendered_title_row_is_annotated_from_cache() {
    let transport = Arc::new(FixtureTransport::new());
    yes_no(&transport, "7", "101", "102");
    let mut driver = started(multi_page("7"), &transport).await;

    let yes = driver.session().document().select("p").unwrap()[0];
    driver
        .document_mut()
        .replace_with_spec(yes, &title("Yes"))
        .unwrap();
    driver.settle(SETTLE).await;

    assert_eq!(
        badge_texts(driver.session().document()),
        vec!["(topicID: 101)", "(topicID: 102)"]
    );
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn loading_document_waits_for_ready() {
    let transport = Arc::new(FixtureTransport::new());
    let mut doc = VirtualDocument::loading(page("topicId=42"));
    let body = doc.body();
    doc.append_spec(body, &NodeSpec::element("h1").with_text("Election Outcome"))
        .unwrap();
    let mut driver = replay(doc, &transport);
    driver.session_mut().start(None);
    driver.advance(Duration::from_secs(1)).await;
    assert!(badge_texts(driver.session().document()).is_empty());

    driver.document_mut().finish_loading();
    driver.session_mut().document_ready();
    driver.settle(SETTLE).await;
    assert_eq!(badge_texts(driver.session().document()), vec!["TopicID: 42"]);
}

#[tokio::test]
async fn polling_strategy_sees_silent_navigation() {
    let transport = Arc::new(FixtureTransport::new());
    let config = AnnotatorConfig {
        navigation: topic_helper_annotator::NavigationStrategy::LocationPolling,
        ..AnnotatorConfig::default()
    };
    let mut driver = replay_with(single_page(), &transport, config);
    driver.session_mut().start(None);
    driver.settle(SETTLE).await;

    driver
        .document_mut()
        .set_location_silently(page("topicId=99"));
    driver.advance(Duration::from_secs(1)).await;
    driver.settle(SETTLE).await;

    assert_eq!(badge_texts(driver.session().document()), vec!["TopicID: 99"]);
}

#[tokio::test]
async fn missing_heading_retracts_single_badge() {
    let transport = Arc::new(FixtureTransport::new());
    let mut driver = started(single_page(), &transport).await;
    let heading = driver.session().document().select_first("h1").unwrap();
    let main = driver.session().document().select_first("main").unwrap();

    driver.document_mut().set_hidden(main, true).unwrap();
    assert!(matches!(
        driver.session_mut().run_pass(),
        PassOutcome::HeadingNotFound { .. }
    ));
    let doc = driver.session().document();
    assert!(badge_texts(doc).is_empty());
    assert_eq!(doc.attribute(heading, HEADING_MARKER), None);
}

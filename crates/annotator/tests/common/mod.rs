#![allow(dead_code)]

use std::sync::Arc;
use topic_helper_annotator::{
    AnnotationSession, AnnotatorConfig, ManualClock, ReplayDriver, TokioClock,
};
use topic_helper_dom::{NodeSpec, VirtualDocument};
use topic_helper_lookup::fixture::FixtureTransport;
use topic_helper_lookup::{default_endpoints, LookupClient};

pub const BADGE_SELECTOR: &str = ".opinion-topic-helper-badge";

pub fn primary(topic_id: &str) -> String {
    format!("https://proxy.opinion.trade:8443/api/bsc/api/v2/topic/multi/{topic_id}")
}

pub fn secondary(topic_id: &str) -> String {
    format!("https://proxy.opinion.trade:8443/api/bsc/api/v2/topic/mutil/{topic_id}")
}

pub fn page(query: &str) -> String {
    format!("https://app.opinion.trade/detail?{query}")
}

pub fn title(text: &str) -> NodeSpec {
    NodeSpec::element("p").with_class("text-bodyL").with_text(text)
}

pub fn lookup(transport: &Arc<FixtureTransport>) -> LookupClient {
    LookupClient::new(transport.clone(), default_endpoints())
}

pub fn replay(
    doc: VirtualDocument,
    transport: &Arc<FixtureTransport>,
) -> ReplayDriver<VirtualDocument> {
    replay_with(doc, transport, AnnotatorConfig::default())
}

pub fn replay_with(
    doc: VirtualDocument,
    transport: &Arc<FixtureTransport>,
    config: AnnotatorConfig,
) -> ReplayDriver<VirtualDocument> {
    let clock = ManualClock::new();
    let session = AnnotationSession::new(doc, config, lookup(transport), Arc::new(clock.clone()))
        .expect("session");
    ReplayDriver::new(session, clock)
}

pub fn tokio_session(
    doc: VirtualDocument,
    transport: &Arc<FixtureTransport>,
) -> AnnotationSession<VirtualDocument> {
    AnnotationSession::new(
        doc,
        AnnotatorConfig::default(),
        lookup(transport),
        Arc::new(TokioClock),
    )
    .expect("session")
}

pub fn badge_texts(doc: &VirtualDocument) -> Vec<String> {
    use topic_helper_dom::HostDocument;
    doc.select(BADGE_SELECTOR)
        .expect("selector")
        .into_iter()
        .map(|badge| doc.text_content(badge))
        .collect()
}

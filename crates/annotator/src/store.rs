use crate::config::BadgeConfig;
use crate::error::Result;
use crate::resolver::TitleMatch;
use crate::text::anchor_text;
use log::debug;
use std::collections::HashSet;
use topic_helper_dom::{HostDocument, NodeId};
use topic_helper_protocol::{BadgeMode, BadgeSnapshot};

/// Set on a heading while it carries the single-topic badge.
pub const HEADING_MARKER: &str = "data-opinion-topic-helper-has-badge";
/// Set on a child-topic title while it carries a badge; holds the title text.
pub const TITLE_MARKER: &str = "data-opinion-topic-helper-base";

pub fn single_badge_text(topic_id: &str) -> String {
    format!("TopicID: {topic_id}")
}

pub fn multi_badge_text(topic_id: &str) -> String {
    format!("(topicID: {topic_id})")
}

/// Class names and stylesheet of the injected badges.
#[derive(Debug, Clone)]
pub struct BadgeStyle {
    config: BadgeConfig,
}

impl BadgeStyle {
    pub fn new(config: BadgeConfig) -> Self {
        Self { config }
    }

    pub fn class(&self) -> &str {
        &self.config.class
    }

    pub fn style_id(&self) -> &str {
        &self.config.style_id
    }

    pub fn heading_class_name(&self) -> String {
        format!("{0} {0}--{1}", self.config.class, self.config.heading_modifier)
    }

    pub fn inline_class_name(&self) -> String {
        format!("{0} {0}--{1}", self.config.class, self.config.inline_modifier)
    }

    pub fn stylesheet(&self) -> String {
        let base = &self.config.class;
        let heading = &self.config.heading_modifier;
        let inline = &self.config.inline_modifier;
        format!(
            ".{base} {{ display: inline-flex; align-items: center; padding: 2px 8px; \
             border-radius: 999px; font-size: 12px; font-weight: 600; line-height: 1.4; \
             color: #1d4ed8; background: rgba(29, 78, 216, 0.12); white-space: nowrap; \
             vertical-align: middle; pointer-events: none; }}\n\
             .{base}--{heading} {{ margin-left: 12px; }}\n\
             .{base}--{inline} {{ margin-left: 8px; font-size: 11px; padding: 1px 6px; }}\n"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleAnnotation {
    pub target: NodeId,
    pub badge: NodeId,
    pub topic_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiAnnotation {
    pub target: NodeId,
    pub badge: NodeId,
    pub topic_id: String,
}

/// Every node this engine has injected, and where it lives.
///
/// At most one mode is populated at any time: applying one mode retracts
/// the other first.
#[derive(Debug)]
pub struct AnnotationStore {
    style: BadgeStyle,
    single: Option<SingleAnnotation>,
    /// Detached single badge kept for reuse.
    spare_single: Option<NodeId>,
    multi: Vec<MultiAnnotation>,
    multi_topic: Option<String>,
}

impl AnnotationStore {
    pub fn new(style: BadgeStyle) -> Self {
        Self {
            style,
            single: None,
            spare_single: None,
            multi: Vec::new(),
            multi_topic: None,
        }
    }

    pub fn style(&self) -> &BadgeStyle {
        &self.style
    }

    pub fn single(&self) -> Option<&SingleAnnotation> {
        self.single.as_ref()
    }

    pub fn multi(&self) -> &[MultiAnnotation] {
        &self.multi
    }

    /// Topic whose child list produced the current multi annotations.
    pub fn multi_topic(&self) -> Option<&str> {
        self.multi_topic.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_none() && self.multi.is_empty()
    }

    /// Inserts the stylesheet into the head unless it is already present.
    /// Returns true when a node was inserted.
    pub fn ensure_styles<D: HostDocument + ?Sized>(&self, doc: &mut D) -> Result<bool> {
        if doc.element_by_id(self.style.style_id()).is_some() {
            return Ok(false);
        }
        let node = doc.create_element("style");
        doc.set_attribute(node, "id", self.style.style_id());
        doc.set_text_content(node, &self.style.stylesheet());
        let head = doc.head();
        doc.append_child(head, node)?;
        Ok(true)
    }

    pub fn remove_styles<D: HostDocument + ?Sized>(&self, doc: &mut D) {
        if let Some(node) = doc.element_by_id(self.style.style_id()) {
            doc.remove(node);
        }
    }

    /// Shows `TopicID: <id>` at the end of `target`, moving the existing
    /// badge when the heading changed.
    pub fn apply_single<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        target: NodeId,
        topic_id: &str,
    ) -> Result<()> {
        self.retract_multi(doc);

        if self.single.as_ref().is_some_and(|s| s.target != target) {
            self.retract_single(doc);
        }

        let reusable = self.single.as_ref().map(|s| s.badge);
        let badge = match reusable.or_else(|| self.spare_single.take()) {
            Some(badge) => badge,
            None => self.create_badge(doc, &self.style.heading_class_name()),
        };

        self.single = Some(SingleAnnotation {
            target,
            badge,
            topic_id: topic_id.to_string(),
        });

        if doc.parent(badge) != Some(target) {
            doc.append_child(target, badge)?;
        }
        if doc.attribute(target, HEADING_MARKER).as_deref() != Some("true") {
            doc.set_attribute(target, HEADING_MARKER, "true");
        }
        write_text(doc, badge, &single_badge_text(topic_id));
        Ok(())
    }

    /// Makes the multi badges match `matches` exactly: existing badges are
    /// updated or re-attached, missing ones created, unmatched ones removed.
    /// Returns the number of live multi annotations.
    pub fn apply_multi<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        topic_id: &str,
        matches: &[TitleMatch],
    ) -> Result<usize> {
        self.retract_single(doc);

        let wanted: HashSet<NodeId> = matches.iter().map(|m| m.target).collect();
        let stale: Vec<MultiAnnotation> = self
            .multi
            .iter()
            .filter(|entry| !wanted.contains(&entry.target))
            .cloned()
            .collect();
        for entry in &stale {
            self.detach_entry(doc, entry);
        }
        self.multi.retain(|entry| wanted.contains(&entry.target));
        self.multi_topic = Some(topic_id.to_string());

        for m in matches {
            let index = match self.multi.iter().position(|e| e.target == m.target) {
                Some(index) => index,
                None => {
                    let badge = self.create_badge(doc, &self.style.inline_class_name());
                    self.multi.push(MultiAnnotation {
                        target: m.target,
                        badge,
                        topic_id: m.child.topic_id.clone(),
                    });
                    self.multi.len() - 1
                }
            };
            self.multi[index].topic_id = m.child.topic_id.clone();
            let badge = self.multi[index].badge;

            if doc.parent(badge) != Some(m.target) {
                doc.append_child(m.target, badge)?;
            }
            if doc.attribute(m.target, TITLE_MARKER).as_deref() != Some(m.text.as_str()) {
                doc.set_attribute(m.target, TITLE_MARKER, &m.text);
            }
            write_text(doc, badge, &multi_badge_text(&m.child.topic_id));
        }

        Ok(self.multi.len())
    }

    pub fn retract_single<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if let Some(single) = self.single.take() {
            debug!("retracting single badge from {}", single.target);
            doc.remove(single.badge);
            doc.remove_attribute(single.target, HEADING_MARKER);
            self.spare_single = Some(single.badge);
        }
    }

    pub fn retract_multi<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if !self.multi.is_empty() {
            debug!("retracting {} multi badges", self.multi.len());
        }
        for entry in std::mem::take(&mut self.multi) {
            self.detach_entry(doc, &entry);
        }
        self.multi_topic = None;
    }

    pub fn retract_all<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        self.retract_single(doc);
        self.retract_multi(doc);
    }

    /// True if `node` is a badge, lies inside one, or is a text node owned
    /// by one.
    pub fn is_badge_node<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        doc.closest_with_class(node, self.style.class()).is_some()
    }

    /// True when some multi badge is no longer attached to its live target.
    pub fn needs_repair<D: HostDocument + ?Sized>(&self, doc: &D) -> bool {
        self.multi
            .iter()
            .any(|entry| {
                doc.parent(entry.badge) != Some(entry.target) || !doc.is_connected(entry.target)
            })
    }

    pub fn snapshot<D: HostDocument + ?Sized>(&self, doc: &D) -> Vec<BadgeSnapshot> {
        let class = self.style.class();
        let describe = |mode, target: NodeId, badge: NodeId, topic_id: &str| BadgeSnapshot {
            mode,
            topic_id: topic_id.to_string(),
            text: doc.text_content(badge),
            target_text: anchor_text(doc, target, class),
            attached: doc.parent(badge) == Some(target) && doc.is_connected(target),
        };

        let mut out = Vec::new();
        if let Some(single) = &self.single {
            out.push(describe(BadgeMode::Single, single.target, single.badge, &single.topic_id));
        }
        for entry in &self.multi {
            out.push(describe(BadgeMode::Multi, entry.target, entry.badge, &entry.topic_id));
        }
        out
    }

    fn create_badge<D: HostDocument + ?Sized>(&self, doc: &mut D, class_name: &str) -> NodeId {
        let badge = doc.create_element("span");
        doc.set_attribute(badge, "class", class_name);
        badge
    }

    fn detach_entry<D: HostDocument + ?Sized>(&self, doc: &mut D, entry: &MultiAnnotation) {
        doc.remove(entry.badge);
        doc.remove_attribute(entry.target, TITLE_MARKER);
    }
}

fn write_text<D: HostDocument + ?Sized>(doc: &mut D, badge: NodeId, text: &str) {
    if doc.text_content(badge) != text {
        doc.set_text_content(badge, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use topic_helper_dom::{NodeSpec, VirtualDocument};
    use topic_helper_protocol::ChildTopic;

    fn store() -> AnnotationStore {
        AnnotationStore::new(BadgeStyle::new(BadgeConfig::default()))
    }

    fn badges(doc: &VirtualDocument) -> Vec<NodeId> {
        doc.select(".opinion-topic-helper-badge").unwrap()
    }

    fn title_match(doc: &VirtualDocument, index: usize, title: &str, id: &str) -> TitleMatch {
        TitleMatch {
            target: doc.select("p").unwrap()[index],
            child: ChildTopic::new(title, id),
            text: title.to_string(),
        }
    }

    #[test]
    fn styles_are_inserted_once() {
        let mut doc = VirtualDocument::new("https://example.com/");
        let store = store();
        assert!(store.ensure_styles(&mut doc).unwrap());
        assert!(!store.ensure_styles(&mut doc).unwrap());
        assert_eq!(doc.select("style").unwrap().len(), 1);
        store.remove_styles(&mut doc);
        assert!(doc.select("style").unwrap().is_empty());
    }

    #[test]
    fn single_apply_is_idempotent() {
        let mut doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("h1").with_text("Election Outcome")],
        );
        let heading = doc.select_first("h1").unwrap();
        let mut store = store();
        store.apply_single(&mut doc, heading, "42").unwrap();
        let first = doc.to_html(doc.body());
        store.apply_single(&mut doc, heading, "42").unwrap();

        assert_eq!(doc.to_html(doc.body()), first);
        assert_eq!(badges(&doc).len(), 1);
        assert_eq!(doc.text_content(heading), "Election OutcomeTopicID: 42");
        assert_eq!(doc.attribute(heading, HEADING_MARKER).as_deref(), Some("true"));
    }

    #[test]
    fn single_badge_moves_to_new_heading() {
        let mut doc = VirtualDocument::with_body(
            "https://example.com/",
            &[
                NodeSpec::element("h1").with_text("Old"),
                NodeSpec::element("h2").with_text("New"),
            ],
        );
        let old = doc.select_first("h1").unwrap();
        let new = doc.select_first("h2").unwrap();
        let mut store = store();
        store.apply_single(&mut doc, old, "1").unwrap();
        let badge = store.single().unwrap().badge;
        store.apply_single(&mut doc, new, "2").unwrap();

        assert_eq!(store.single().unwrap().badge, badge);
        assert_eq!(doc.parent(badge), Some(new));
        assert_eq!(doc.attribute(old, HEADING_MARKER), None);
        assert_eq!(doc.text_content(badge), "TopicID: 2");
        assert_eq!(badges(&doc).len(), 1);
    }

    #[test]
    fn multi_apply_replaces_single_and_drops_unmatched() {
        let mut doc = VirtualDocument::with_body(
            "https://example.com/",
            &[
                NodeSpec::element("h1").with_text("Topic"),
                NodeSpec::element("p").with_text("Yes"),
                NodeSpec::element("p").with_text("No"),
            ],
        );
        let heading = doc.select_first("h1").unwrap();
        let mut store = store();
        store.apply_single(&mut doc, heading, "7").unwrap();

        let both = [title_match(&doc, 0, "Yes", "101"), title_match(&doc, 1, "No", "102")];
        assert_eq!(store.apply_multi(&mut doc, "7", &both).unwrap(), 2);
        assert!(store.single().is_none());
        assert_eq!(doc.attribute(heading, HEADING_MARKER), None);
        let texts: Vec<_> = badges(&doc).iter().map(|b| doc.text_content(*b)).collect();
        assert_eq!(texts, vec!["(topicID: 101)", "(topicID: 102)"]);

        let only_no = [title_match(&doc, 1, "No", "102")];
        assert_eq!(store.apply_multi(&mut doc, "7", &only_no).unwrap(), 1);
        let yes = doc.select("p").unwrap()[0];
        assert_eq!(doc.text_content(yes), "Yes");
        assert_eq!(doc.attribute(yes, TITLE_MARKER), None);
        assert_eq!(store.multi_topic(), Some("7"));
    }

    #[test]
    fn detached_multi_badge_needs_repair_and_is_reattached() {
        let mut doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("p").with_text("Yes")],
        );
        let mut store = store();
        let matches = [title_match(&doc, 0, "Yes", "101")];
        store.apply_multi(&mut doc, "7", &matches).unwrap();
        assert!(!store.needs_repair(&doc));

        let badge = store.multi()[0].badge;
        doc.remove(badge);
        assert!(store.needs_repair(&doc));

        store.apply_multi(&mut doc, "7", &matches).unwrap();
        assert!(!store.needs_repair(&doc));
        assert_eq!(store.multi()[0].badge, badge);
    }

    #[test]
    fn retract_all_leaves_no_trace() {
        let mut doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("p").with_text("Yes")],
        );
        let before = doc.to_html(doc.body());
        let mut store = store();
        let matches = [title_match(&doc, 0, "Yes", "101")];
        store.apply_multi(&mut doc, "7", &matches).unwrap();
        store.retract_all(&mut doc);

        assert!(store.is_empty());
        assert_eq!(store.multi_topic(), None);
        assert_eq!(doc.to_html(doc.body()), before);
    }

    #[test]
    fn badge_nodes_are_recognised() {
        let mut doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("h1").with_text("Topic")],
        );
        let heading = doc.select_first("h1").unwrap();
        let mut store = store();
        store.apply_single(&mut doc, heading, "1").unwrap();
        let badge = store.single().unwrap().badge;
        let text = doc.children(badge)[0];

        assert!(store.is_badge_node(&doc, badge));
        assert!(store.is_badge_node(&doc, text));
        assert!(!store.is_badge_node(&doc, heading));
    }
}

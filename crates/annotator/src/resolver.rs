use crate::config::AnnotatorConfig;
use crate::error::Result;
use crate::text::{anchor_text, normalize};
use crate::visibility::is_renderable_anchor;
use topic_helper_dom::{HostDocument, NodeId, Selector};
use topic_helper_protocol::ChildTopic;

/// A child topic paired with the element showing its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub target: NodeId,
    pub child: ChildTopic,
    /// Normalized title text of `target`, badges excluded.
    pub text: String,
}

/// Finds the elements that badges attach to.
#[derive(Debug, Clone)]
pub struct AnchorResolver {
    headings: Vec<Selector>,
    fallback: Selector,
    titles: Selector,
    badge_class: String,
}

impl AnchorResolver {
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self> {
        let headings = config
            .heading_selectors
            .iter()
            .map(|s| Selector::parse(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            headings,
            fallback: Selector::parse(&config.heading_fallback_selector)?,
            titles: Selector::parse(&config.title_selector)?,
            badge_class: config.badge.class.clone(),
        })
    }

    /// The topic heading: the first renderable match with non-empty text,
    /// trying every selector in priority order before the generic fallback.
    pub fn resolve_heading<D: HostDocument + ?Sized>(&self, doc: &D) -> Option<NodeId> {
        self.headings
            .iter()
            .chain(std::iter::once(&self.fallback))
            .find_map(|selector| {
                doc.query_selector_all(selector)
                    .into_iter()
                    .find(|node| self.is_valid_heading(doc, *node))
            })
    }

    fn is_valid_heading<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        is_renderable_anchor(doc, node) && !anchor_text(doc, node, &self.badge_class).is_empty()
    }

    /// First title candidate whose text equals `title` after normalization.
    pub fn resolve_element_for_title<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        title: &str,
    ) -> Option<NodeId> {
        let wanted = normalize(title);
        if wanted.is_empty() {
            return None;
        }
        doc.query_selector_all(&self.titles)
            .into_iter()
            .find(|node| anchor_text(doc, *node, &self.badge_class) == wanted)
    }

    /// Resolves every child title with [`Self::resolve_element_for_title`].
    ///
    /// Children whose title is not on the page are skipped. When two children
    /// share a title they resolve to the same element and the later one wins,
    /// keeping the position of the first.
    pub fn resolve_titles<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        children: &[ChildTopic],
    ) -> Vec<TitleMatch> {
        let mut matches: Vec<TitleMatch> = Vec::new();
        for child in children {
            let Some(target) = self.resolve_element_for_title(doc, &child.title) else {
                continue;
            };
            match matches.iter_mut().find(|m| m.target == target) {
                Some(existing) => existing.child = child.clone(),
                None => matches.push(TitleMatch {
                    target,
                    child: child.clone(),
                    text: anchor_text(doc, target, &self.badge_class),
                }),
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use topic_helper_dom::{NodeSpec, VirtualDocument};

    fn resolver() -> AnchorResolver {
        AnchorResolver::from_config(&AnnotatorConfig::default()).unwrap()
    }

    fn title(text: &str) -> NodeSpec {
        NodeSpec::element("p").with_class("text-bodyL").with_text(text)
    }

    #[test]
    fn prefers_test_id_over_plain_heading() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[
                NodeSpec::element("h1").with_text("Site name"),
                NodeSpec::element("div")
                    .with_attribute("data-testid", "topic-title")
                    .with_text("Election Outcome"),
            ],
        );
        let heading = resolver().resolve_heading(&doc).unwrap();
        assert_eq!(doc.text_content(heading), "Election Outcome");
    }

    #[test]
    fn skips_hidden_and_empty_matches_of_the_same_selector() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("main").with_children([
                NodeSpec::element("h1").with_text("Stale").hidden(),
                NodeSpec::element("h1").with_text("   "),
                NodeSpec::element("h1").with_text("Current"),
            ])],
        );
        let heading = resolver().resolve_heading(&doc).unwrap();
        assert_eq!(doc.text_content(heading), "Current");
    }

    #[test]
    fn falls_back_to_h2() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("section").with_child(NodeSpec::element("h2").with_text("Topic"))],
        );
        let heading = resolver().resolve_heading(&doc).unwrap();
        assert_eq!(doc.text_content(heading), "Topic");
    }

    #[test]
    fn no_heading_at_all() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[NodeSpec::element("h1").with_text("Hidden").collapsed()],
        );
        assert_eq!(resolver().resolve_heading(&doc), None);
    }

    #[test]
    fn title_match_ignores_whitespace_and_badges() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[
                title("Yes"),
                NodeSpec::element("p")
                    .with_class("text-bodyL")
                    .with_text("  Will   it rain? ")
                    .with_child(
                        NodeSpec::element("span")
                            .with_class("opinion-topic-helper-badge")
                            .with_text("(topicID: 9)"),
                    ),
            ],
        );
        let resolver = resolver();
        let found = resolver.resolve_element_for_title(&doc, "Will it rain?").unwrap();
        assert_eq!(doc.select("p").unwrap()[1], found);
        assert_eq!(resolver.resolve_element_for_title(&doc, "Maybe"), None);
        assert_eq!(resolver.resolve_element_for_title(&doc, "  "), None);
    }

    #[test]
    fn resolve_titles_keeps_child_order_and_skips_missing() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[title("No"), title("Yes")],
        );
        let matches = resolver().resolve_titles(
            &doc,
            &[
                ChildTopic::new("Yes", "101"),
                ChildTopic::new("Maybe", "103"),
                ChildTopic::new("No", "102"),
            ],
        );
        let ids: Vec<_> = matches.iter().map(|m| m.child.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102"]);
        assert_eq!(matches[0].text, "Yes");
    }

    #[test]
    fn duplicate_titles_resolve_to_one_element_last_wins() {
        let doc = VirtualDocument::with_body("https://example.com/", &[title("Yes")]);
        let matches = resolver().resolve_titles(
            &doc,
            &[ChildTopic::new("Yes", "1"), ChildTopic::new("Yes", "2")],
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].child.topic_id, "2");
    }

    #[test]
    fn sweep_agrees_with_single_title_lookup() {
        let doc = VirtualDocument::with_body(
            "https://example.com/",
            &[
                title("Yes").hidden(),
                title(" Yes\u{feff}"),
                title("No"),
            ],
        );
        let resolver = resolver();
        let matches = resolver.resolve_titles(&doc, &[ChildTopic::new("Yes", "7")]);
        assert_eq!(matches.len(), 1);
        assert_eq!(
            Some(matches[0].target),
            resolver.resolve_element_for_title(&doc, "Yes")
        );
        assert_eq!(matches[0].target, doc.select("p").unwrap()[0]);
        assert_eq!(matches[0].text, "Yes");
    }
}

use topic_helper_dom::{HostDocument, MutationKind, MutationRecord, NodeId};

/// Separates host changes from the engine's own badge writes.
#[derive(Debug, Clone)]
pub struct MutationFilter {
    badge_class: String,
}

impl MutationFilter {
    pub fn new(badge_class: impl Into<String>) -> Self {
        Self {
            badge_class: badge_class.into(),
        }
    }

    pub fn is_relevant<D: HostDocument + ?Sized>(&self, doc: &D, record: &MutationRecord) -> bool {
        match &record.kind {
            MutationKind::CharacterData { .. } => !self.is_own(doc, record.target),
            MutationKind::ChildList { added, removed } => {
                // badge text rewrites swap the badge's own children
                if self.is_own(doc, record.target) {
                    return false;
                }
                added
                    .iter()
                    .chain(removed.iter())
                    .any(|node| !self.is_own(doc, *node) && !self.only_wraps_badges(doc, *node))
            }
            MutationKind::Attributes { .. } => true,
        }
    }

    pub fn any_relevant<D: HostDocument + ?Sized>(&self, doc: &D, records: &[MutationRecord]) -> bool {
        records.iter().any(|record| self.is_relevant(doc, record))
    }

    /// A node is ours when it is a badge or lives inside one.
    fn is_own<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        doc.closest_with_class(node, &self.badge_class).is_some()
    }

    /// An element whose entire content is badges.
    fn only_wraps_badges<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        let children = doc.children(node);
        !children.is_empty()
            && children
                .iter()
                .all(|child| self.is_own(doc, *child) || self.only_wraps_badges(doc, *child))
    }
}

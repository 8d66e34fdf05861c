use crate::error::Result;
use crate::{ComputedStyle, MutationRecord, NodeId, NodeKind, ObserveOptions, ReadyState, Selector};

/// The host page as seen by the annotation engine.
///
/// Reads never fail: unknown or detached handles answer with empty values.
/// Writes that would corrupt the tree return an error instead.
pub trait HostDocument {
    fn location(&self) -> String;
    fn ready_state(&self) -> ReadyState;

    fn head(&self) -> NodeId;
    fn body(&self) -> NodeId;

    /// All matching elements in document order.
    fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId>;

    fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    fn kind(&self, node: NodeId) -> Option<NodeKind>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Concatenated text of the node and all its descendants.
    fn text_content(&self, node: NodeId) -> String;

    fn is_connected(&self, node: NodeId) -> bool;
    fn client_rect_count(&self, node: NodeId) -> usize;
    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    fn create_element(&mut self, tag: &str) -> NodeId;
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()>;
    /// Detaches the node from its parent; a no-op for detached nodes.
    fn remove(&mut self, node: NodeId);
    fn set_text_content(&mut self, node: NodeId, text: &str);
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);

    fn observe(&mut self, root: NodeId, options: ObserveOptions);
    fn disconnect(&mut self);
    /// Drains the mutation records queued since the last call.
    fn take_records(&mut self) -> Vec<MutationRecord>;

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
            .filter(|parent| self.kind(*parent) == Some(NodeKind::Element))
    }

    /// Nearest inclusive ancestor element carrying `class`.
    fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let mut current = match self.kind(node)? {
            NodeKind::Element => Some(node),
            NodeKind::Text => self.parent_element(node),
        };
        while let Some(element) = current {
            if self.has_class(element, class) {
                return Some(element);
            }
            current = self.parent_element(element);
        }
        None
    }

    fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }
}

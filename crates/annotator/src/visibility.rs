use topic_helper_dom::{Display, HostDocument, NodeId, Visibility};

/// An element that can host a badge the user will actually see: attached to
/// the document, laid out with at least one box, not `display: none` and not
/// `visibility: hidden`.
pub fn is_renderable_anchor<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    if !doc.is_connected(node) || doc.client_rect_count(node) == 0 {
        return false;
    }
    let style = doc.computed_style(node);
    style.display != Display::None && style.visibility != Visibility::Hidden
}

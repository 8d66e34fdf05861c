use topic_helper_dom::{HostDocument, NodeId, NodeKind};

/// Collapses every whitespace run to a single space and trims the ends.
///
/// Whitespace is the set browsers match with `\s`, which differs from
/// [`char::is_whitespace`] (U+FEFF is included, U+0085 is not).
pub fn normalize(text: &str) -> String {
    text.split(is_page_whitespace)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_page_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\u{b}'
            | '\u{c}'
            | '\r'
            | ' '
            | '\u{a0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
            | '\u{feff}'
    )
}

/// Text content of `node` with every subtree carrying `badge_class` left out.
pub fn text_without_badges<D: HostDocument + ?Sized>(
    doc: &D,
    node: NodeId,
    badge_class: &str,
) -> String {
    let mut out = String::new();
    collect(doc, node, badge_class, &mut out);
    out
}

fn collect<D: HostDocument + ?Sized>(doc: &D, node: NodeId, badge_class: &str, out: &mut String) {
    match doc.kind(node) {
        Some(NodeKind::Text) => out.push_str(&doc.text_content(node)),
        Some(NodeKind::Element) if !doc.has_class(node, badge_class) => {
            for child in doc.children(node) {
                collect(doc, child, badge_class, out);
            }
        }
        _ => {}
    }
}

/// [`normalize`]d text of `node`, ignoring injected badges.
pub fn anchor_text<D: HostDocument + ?Sized>(doc: &D, node: NodeId, badge_class: &str) -> String {
    normalize(&text_without_badges(doc, node, badge_class))
}

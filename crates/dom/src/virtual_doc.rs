use crate::error::{DomError, Result};
use crate::history::{NavigationCallback, NavigationSignal, NavigationSource};
use crate::selector::MatchContext;
use crate::{
    ComputedStyle, Display, HostDocument, MutationKind, MutationRecord, NodeId, NodeKind,
    NodeSpec, ObserveOptions, ReadyState, Selector, Visibility,
};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    tag: String,
    attributes: BTreeMap<String, String>,
    data: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    display: Display,
    visibility: Option<Visibility>,
    rects: usize,
}

impl NodeData {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            data: String::new(),
            parent: None,
            children: Vec::new(),
            display: Display::Visible,
            visibility: None,
            rects: 1,
        }
    }

    fn text(data: &str) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: String::new(),
            attributes: BTreeMap::new(),
            data: data.to_string(),
            parent: None,
            children: Vec::new(),
            display: Display::Visible,
            visibility: None,
            rects: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Observer {
    root: NodeId,
    options: ObserveOptions,
}

/// Arena-backed in-memory document.
///
/// Mutations are queued exactly as a browser mutation observer would see
/// them, history entry points notify registered navigation callbacks, and a
/// minimal layout model answers the visibility questions.
pub struct VirtualDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    history: Vec<String>,
    history_index: usize,
    ready: ReadyState,
    observer: Option<Observer>,
    records: Vec<MutationRecord>,
    navigation_callbacks: Vec<NavigationCallback>,
}

impl fmt::Debug for VirtualDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualDocument")
            .field("location", &self.location())
            .field("nodes", &self.nodes.len())
            .field("ready", &self.ready)
            .field("observing", &self.observer.is_some())
            .field("queued_records", &self.records.len())
            .finish()
    }
}

impl VirtualDocument {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            history: vec![url.into()],
            history_index: 0,
            ready: ReadyState::Complete,
            observer: None,
            records: Vec::new(),
            navigation_callbacks: Vec::new(),
        };
        let root = doc.alloc(NodeData::element("html"));
        let head = doc.alloc(NodeData::element("head"));
        let body = doc.alloc(NodeData::element("body"));
        doc.link(root, head);
        doc.link(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    /// A document whose initial parse has not finished yet.
    #[must_use]
    pub fn loading(url: impl Into<String>) -> Self {
        let mut doc = Self::new(url);
        doc.ready = ReadyState::Loading;
        doc
    }

    /// Builds a document whose body holds `children`.
    pub fn with_body(url: impl Into<String>, children: &[NodeSpec]) -> Self {
        let mut doc = Self::new(url);
        for spec in children {
            let node = doc.instantiate(spec);
            doc.link(doc.body, node);
        }
        doc
    }

    pub fn finish_loading(&mut self) {
        self.ready = ReadyState::Complete;
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observer.is_some()
    }

    /// Builds `spec` and appends it to `parent` as one mutation.
    pub fn append_spec(&mut self, parent: NodeId, spec: &NodeSpec) -> Result<NodeId> {
        let node = self.instantiate(spec);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Swaps `old` for a freshly built subtree in the same position.
    pub fn replace_with_spec(&mut self, old: NodeId, spec: &NodeSpec) -> Result<NodeId> {
        self.check(old)?;
        let parent = self.nodes[old.index()]
            .parent
            .ok_or_else(|| DomError::HierarchyRequest(format!("{old} has no parent")))?;
        let node = self.instantiate(spec);
        let slot = self.nodes[parent.index()]
            .children
            .iter()
            .position(|child| *child == old)
            .ok_or(DomError::UnknownNode(old))?;
        self.nodes[parent.index()].children[slot] = node;
        self.nodes[old.index()].parent = None;
        self.nodes[node.index()].parent = Some(parent);
        self.record(MutationRecord::child_list(parent, vec![node], vec![old]));
        Ok(node)
    }

    /// Rewrites the data of a text node in place.
    pub fn set_character_data(&mut self, node: NodeId, data: &str) -> Result<()> {
        self.check(node)?;
        if self.nodes[node.index()].kind != NodeKind::Text {
            return Err(DomError::HierarchyRequest(format!("{node} is not a text node")));
        }
        let old = std::mem::replace(&mut self.nodes[node.index()].data, data.to_string());
        self.record(MutationRecord::character_data(node, Some(old)));
        Ok(())
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) -> Result<()> {
        self.check(node)?;
        self.nodes[node.index()].display = if hidden {
            Display::None
        } else {
            Display::Visible
        };
        self.record(MutationRecord::attributes(node, "style"));
        Ok(())
    }

    pub fn set_invisible(&mut self, node: NodeId, invisible: bool) -> Result<()> {
        self.check(node)?;
        self.nodes[node.index()].visibility = Some(if invisible {
            Visibility::Hidden
        } else {
            Visibility::Visible
        });
        self.record(MutationRecord::attributes(node, "style"));
        Ok(())
    }

    pub fn set_client_rects(&mut self, node: NodeId, rects: usize) -> Result<()> {
        self.check(node)?;
        self.nodes[node.index()].rects = rects;
        Ok(())
    }

    pub fn push_state(&mut self, url: impl Into<String>) {
        self.history.truncate(self.history_index + 1);
        self.history.push(url.into());
        self.history_index = self.history.len() - 1;
        self.notify(NavigationSignal::PushState);
    }

    pub fn replace_state(&mut self, url: impl Into<String>) {
        self.history[self.history_index] = url.into();
        self.notify(NavigationSignal::ReplaceState);
    }

    /// Returns false when there is no earlier entry.
    pub fn back(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.notify(NavigationSignal::PopState);
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.notify(NavigationSignal::PopState);
        true
    }

    /// Rewrites the location without going through the history API, the way
    /// some routers mutate state that only a poller can see.
    pub fn set_location_silently(&mut self, url: impl Into<String>) {
        self.history[self.history_index] = url.into();
    }

    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self.query_selector_all(&selector))
    }

    pub fn select_first(&self, selector: &str) -> Result<NodeId> {
        self.select(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| DomError::NoMatch(selector.to_string()))
    }

    /// Serializes a subtree, mostly for diagnostics.
    #[must_use]
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.index()) else {
            return;
        };
        match data.kind {
            NodeKind::Text => out.push_str(&data.data),
            NodeKind::Element => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &data.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(data);
        id
    }

    /// Attaches without recording; only used while building.
    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    fn instantiate(&mut self, spec: &NodeSpec) -> NodeId {
        let mut data = NodeData::element(&spec.tag);
        if let Some(id) = &spec.id {
            data.attributes.insert("id".to_string(), id.clone());
        }
        if !spec.classes.is_empty() {
            data.attributes
                .insert("class".to_string(), spec.classes.join(" "));
        }
        for (name, value) in &spec.attributes {
            data.attributes.insert(name.clone(), value.clone());
        }
        if spec.hidden {
            data.display = Display::None;
        }
        if spec.invisible {
            data.visibility = Some(Visibility::Hidden);
        }
        if spec.collapsed {
            data.rects = 0;
        }
        let node = self.alloc(data);
        if let Some(text) = spec.text.as_deref().filter(|t| !t.is_empty()) {
            let text_node = self.alloc(NodeData::text(text));
            self.link(node, text_node);
        }
        for child in &spec.children {
            let child_node = self.instantiate(child);
            self.link(node, child_node);
        }
        node
    }

    fn check(&self, node: NodeId) -> Result<()> {
        if node.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(DomError::UnknownNode(node))
        }
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.index()].parent.take()?;
        self.nodes[parent.index()]
            .children
            .retain(|child| *child != node);
        Some(parent)
    }

    fn record(&mut self, record: MutationRecord) {
        let Some(observer) = self.observer else {
            return;
        };
        let wanted = match &record.kind {
            MutationKind::ChildList { .. } => observer.options.child_list,
            MutationKind::CharacterData { .. } => observer.options.character_data,
            MutationKind::Attributes { .. } => observer.options.attributes,
        };
        if !wanted {
            return;
        }
        let in_scope = record.target == observer.root
            || (observer.options.subtree && self.is_descendant_of(record.target, observer.root));
        if in_scope {
            self.records.push(record);
        }
    }

    fn notify(&mut self, signal: NavigationSignal) {
        debug!("history {signal:?} -> {}", self.location());
        for callback in &mut self.navigation_callbacks {
            callback(signal);
        }
    }

    fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let data = &self.nodes[node.index()];
            if data.kind != NodeKind::Element {
                continue;
            }
            out.push(node);
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }
}

impl MatchContext for VirtualDocument {
    fn tag_name(&self, node: NodeId) -> Option<&str> {
        let data = self.nodes.get(node.index())?;
        (data.kind == NodeKind::Element).then_some(data.tag.as_str())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(node.index())?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes
            .get(node.index())?
            .parent
            .filter(|parent| self.nodes[parent.index()].kind == NodeKind::Element)
    }
}

impl HostDocument for VirtualDocument {
    fn location(&self) -> String {
        self.history[self.history_index].clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready
    }

    fn head(&self) -> NodeId {
        self.head
    }

    fn body(&self) -> NodeId {
        self.body
    }

    fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.preorder(self.root)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.preorder(self.root)
            .into_iter()
            .find(|node| MatchContext::attribute(self, *node, "id") == Some(id))
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node.index()).map(|data| data.kind)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.index())
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        MatchContext::attribute(self, node, name).map(str::to_string)
    }

    fn text_content(&self, node: NodeId) -> String {
        let Some(data) = self.nodes.get(node.index()) else {
            return String::new();
        };
        if data.kind == NodeKind::Text {
            return data.data.clone();
        }
        let mut out = String::new();
        for child in &data.children {
            out.push_str(&self.text_content(*child));
        }
        out
    }

    fn is_connected(&self, node: NodeId) -> bool {
        if node.index() >= self.nodes.len() {
            return false;
        }
        node == self.root || self.is_descendant_of(node, self.root)
    }

    fn client_rect_count(&self, node: NodeId) -> usize {
        if !self.is_connected(node) || self.kind(node) != Some(NodeKind::Element) {
            return 0;
        }
        let mut current = Some(node);
        while let Some(element) = current {
            if self.nodes[element.index()].display == Display::None {
                return 0;
            }
            current = self.nodes[element.index()].parent;
        }
        self.nodes[node.index()].rects
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        let Some(data) = self.nodes.get(node.index()) else {
            return ComputedStyle::default();
        };
        let mut visibility = Visibility::Visible;
        let mut current = Some(node);
        while let Some(element) = current {
            if let Some(explicit) = self.nodes[element.index()].visibility {
                visibility = explicit;
                break;
            }
            current = self.nodes[element.index()].parent;
        }
        ComputedStyle {
            display: data.display,
            visibility,
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::element(tag))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        if self.nodes[parent.index()].kind != NodeKind::Element {
            return Err(DomError::HierarchyRequest(format!(
                "{parent} cannot have children"
            )));
        }
        if parent == child || self.is_descendant_of(parent, child) {
            return Err(DomError::HierarchyRequest(format!(
                "{child} is an ancestor of {parent}"
            )));
        }
        if let Some(old_parent) = self.detach(child) {
            self.record(MutationRecord::child_list(old_parent, Vec::new(), vec![child]));
        }
        self.link(parent, child);
        self.record(MutationRecord::child_list(parent, vec![child], Vec::new()));
        Ok(())
    }

    fn remove(&mut self, node: NodeId) {
        if self.check(node).is_err() {
            return;
        }
        if let Some(parent) = self.detach(node) {
            self.record(MutationRecord::child_list(parent, Vec::new(), vec![node]));
        }
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        let Some(data) = self.nodes.get(node.index()) else {
            return;
        };
        if data.kind == NodeKind::Text {
            let _ = self.set_character_data(node, text);
            return;
        }
        let removed = std::mem::take(&mut self.nodes[node.index()].children);
        for child in &removed {
            self.nodes[child.index()].parent = None;
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_node = self.alloc(NodeData::text(text));
            self.link(node, text_node);
            added.push(text_node);
        }
        if !(removed.is_empty() && added.is_empty()) {
            self.record(MutationRecord::child_list(node, added, removed));
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(data) = self.nodes.get_mut(node.index()) else {
            return;
        };
        if data.kind != NodeKind::Element {
            return;
        }
        data.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self.record(MutationRecord::attributes(node, name.to_ascii_lowercase()));
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let Some(data) = self.nodes.get_mut(node.index()) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        if data.attributes.remove(&name).is_some() {
            self.record(MutationRecord::attributes(node, name));
        }
    }

    fn observe(&mut self, root: NodeId, options: ObserveOptions) {
        self.observer = Some(Observer { root, options });
    }

    fn disconnect(&mut self) {
        self.observer = None;
        self.records.clear();
    }

    fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

impl NavigationSource for VirtualDocument {
    fn on_navigation_changed(&mut self, callback: NavigationCallback) {
        self.navigation_callbacks.push(callback);
    }
}

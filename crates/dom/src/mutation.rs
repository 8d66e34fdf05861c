use crate::NodeId;

/// What a mutation observer is asked to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub character_data: bool,
    pub attributes: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            child_list: true,
            subtree: true,
            character_data: true,
            attributes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData {
        old_value: Option<String>,
    },
    Attributes {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    #[must_use]
    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList { added, removed },
        }
    }

    #[must_use]
    pub fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            target,
            kind: MutationKind::CharacterData { old_value },
        }
    }

    #[must_use]
    pub fn attributes(target: NodeId, name: impl Into<String>) -> Self {
        Self {
            target,
            kind: MutationKind::Attributes { name: name.into() },
        }
    }
}

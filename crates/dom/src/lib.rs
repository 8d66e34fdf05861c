//! # Topic Helper DOM
//!
//! The host-document seam of the annotator.
//!
//! ```text
//! HostDocument (trait)          NavigationSource (trait)
//!     │                              │
//!     └──> VirtualDocument <─────────┘
//!            ├─ arena of element/text nodes
//!            ├─ mutation records (observer semantics)
//!            ├─ history stack (push/replace/pop)
//!            └─ minimal layout (display, visibility, rects)
//! ```
//!
//! ## Example
//!
//! ```
//! use topic_helper_dom::{HostDocument, NodeSpec, VirtualDocument};
//!
//! let doc = VirtualDocument::with_body(
//!     "https://app.opinion.trade/detail?topicId=42",
//!     &[NodeSpec::element("h1").with_text("Election Outcome")],
//! );
//! let heading = doc.select_first("h1").unwrap();
//! assert_eq!(doc.text_content(heading), "Election Outcome");
//! ```

mod document;
mod error;
mod history;
mod mutation;
mod node;
pub mod selector;
mod spec;
mod virtual_doc;

pub use document::HostDocument;
pub use error::{DomError, Result};
pub use history::{NavigationCallback, NavigationSignal, NavigationSource};
pub use mutation::{MutationKind, MutationRecord, ObserveOptions};
pub use node::{ComputedStyle, Display, NodeId, NodeKind, ReadyState, Visibility};
pub use selector::Selector;
pub use spec::NodeSpec;
pub use virtual_doc::VirtualDocument;

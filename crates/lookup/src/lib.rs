//! # Topic Helper Lookup
//!
//! Remote lookup of the child topics that make up a multi-topic view.
//!
//! ```text
//! fetch_child_topics(topic_id, generation)
//!     │
//!     ├──> LookupCache hit? ──> return
//!     │
//!     └──> for each EndpointTemplate (in order)
//!            ├─ Transport::get_json   (errors: try next)
//!            ├─ generation superseded? ──> None
//!            └─ result.data.childList is an array? ──> cache + return
//! ```

mod cache;
mod client;
mod endpoint;
mod error;
pub mod fixture;
mod generation;
mod payload;
mod transport;

pub use cache::{ChildList, LookupCache};
pub use client::LookupClient;
pub use endpoint::{default_endpoints, EndpointTemplate, DEFAULT_ENDPOINTS, TOPIC_ID_PLACEHOLDER};
pub use error::{LookupError, Result};
pub use generation::FetchGeneration;
pub use payload::{parse_child_list, CHILD_LIST_POINTER};
pub use transport::{ReqwestTransport, Transport};

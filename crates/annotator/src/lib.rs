//! # Topic Helper Annotator
//!
//! Keeps topic-id badges attached to a host page that re-renders itself.
//!
//! ```text
//! host mutations ──> MutationFilter ──┐
//! navigation ──> NavigationWatcher ───┼──> Debouncer ──> reconciliation pass
//! toggle messages ──> set_enabled ────┘                     │
//!                                                           ├─ single: AnchorResolver::resolve_heading
//!                                                           │            └─> AnnotationStore::apply_single
//!                                                           └─ multi:  LookupClient (cache, generation)
//!                                                                        └─> resolve_titles ──> apply_multi
//! HealingMonitor (periodic) ──> re-attach evicted multi badges from cache
//! ```
//!
//! [`AnnotationSession`] is the synchronous core. [`AnnotatorService`] runs it
//! on tokio and [`ReplayDriver`] runs it on a manual clock.

mod clock;
mod config;
mod context;
mod debounce;
mod error;
mod filter;
mod healing;
mod navigation;
mod replay;
mod resolver;
mod service;
mod session;
mod store;
pub mod text;
mod visibility;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{AnnotatorConfig, BadgeConfig, QueryKeys, ENV_PREFIX};
pub use context::parse_url_context;
pub use debounce::Debouncer;
pub use error::{AnnotatorError, Result};
pub use filter::MutationFilter;
pub use healing::HealingMonitor;
pub use navigation::{NavigationStrategy, NavigationWatcher};
pub use replay::ReplayDriver;
pub use resolver::{AnchorResolver, TitleMatch};
pub use service::{AnnotatorService, HostEdit, SessionStatus};
pub use session::{AnnotationSession, LookupRequest, LoopState, PassOutcome, SessionStats};
pub use store::{
    multi_badge_text, single_badge_text, AnnotationStore, BadgeStyle, MultiAnnotation,
    SingleAnnotation, HEADING_MARKER, TITLE_MARKER,
};
pub use visibility::is_renderable_anchor;

//! Typed model of a live page: element arena, selectors, text helpers and the
//! snapshot format page hosts exchange.

mod document;
pub mod selector;
mod snapshot;
pub mod text;
mod types;

pub use document::{Ancestors, Document, Element, NodeId, OVERLAY_ATTR};
pub use selector::{query_selector_all, Selector, SelectorError};
pub use snapshot::{DomSnapshot, SnapshotNode};
pub use types::{BoundingBox, ComputedStyle, Quadrant, Viewport};

//! DOM fingerprinting: one full scan of the page into element descriptors
//! the step-planner can reason about.

pub mod classify;
mod descriptor;
mod extractor;
mod page_context;

pub use descriptor::{ElementDescriptor, ElementType, Extraction, Location, PageContext, PageType};
pub use extractor::{is_scan_id, Extractor, DEFAULT_MAX_ELEMENTS, SCAN_ID_ATTR};
pub use page_context::{detect_page_type, detect_platform, is_loading};

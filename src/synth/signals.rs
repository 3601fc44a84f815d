//! Heuristics for telling durable attribute values from generated ones.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::dom::{Document, NodeId};

/// Test-hook attributes, most conventional first.
pub const TEST_ID_ATTRS: &[&str] = &["data-testid", "data-test-id", "data-test", "data-cy", "data-qa"];

/// Id prefixes emitted by frameworks and widget libraries.
const GENERATED_ID_PREFIXES: &[&str] = &[
    "ember",
    "radix-",
    "headlessui-",
    "mui-",
    "downshift-",
    "react-select-",
    "rc_",
    "yui_",
    "ext-gen",
    "gwt-uid",
    "__",
];

/// Classes describing transient UI state rather than identity.
const STATE_CLASSES: &[&str] = &[
    "active", "selected", "open", "opened", "closed", "focus", "focused", "hover", "disabled",
    "checked", "expanded", "collapsed", "visible", "hidden", "show", "current",
];

pub fn test_id(doc: &Document, node: NodeId) -> Option<&str> {
    TEST_ID_ATTRS
        .iter()
        .find_map(|attr| doc.attr_trimmed(node, attr))
}

/// Leading digit, a colon (React `useId` emits `:r1:`) or a run of four digits.
static GENERATED_ID_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d|:|\d{4}").expect("generated id pattern"));

/// Hex run holding at least one digit, so plain words like `facade` pass.
static HEX_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f]*[0-9][0-9a-f]*$").expect("hex blob pattern"));

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").expect("uuid pattern")
});

static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("numeric segment pattern"));

fn is_hex_blob(value: &str, min_len: usize) -> bool {
    value.len() >= min_len && HEX_BLOB.is_match(value)
}

/// True when an `id` looks generated and would not survive a reload.
pub fn is_dynamic_id(id: &str) -> bool {
    let id = id.trim();
    if id.is_empty() {
        return true;
    }
    if GENERATED_ID_SHAPE.is_match(id) {
        return true;
    }
    if GENERATED_ID_PREFIXES.iter().any(|p| id.starts_with(p)) {
        return true;
    }
    id.split(['-', '_']).any(|part| is_hex_blob(part, 8))
}

/// True for class tokens that look emitted by a CSS-in-JS or module bundler.
pub fn is_generated_class(class: &str) -> bool {
    if class.is_empty() || class.len() > 40 {
        return true;
    }
    if class.starts_with('_') || class.starts_with("css-") || class.starts_with("sc-") || class.starts_with("jsx-") {
        return true;
    }
    // CSS modules: `Button_root__a1b2c`
    if let Some((_, hash)) = class.rsplit_once("__") {
        if hash.chars().any(|c| c.is_ascii_digit()) {
            return true;
        }
    }
    // unseparated letter/digit soup such as `e1x9fq2` or `kQzP3a`
    let alnum_only = class.chars().all(|c| c.is_ascii_alphanumeric());
    let has_digit = class.chars().any(|c| c.is_ascii_digit());
    let has_alpha = class.chars().any(|c| c.is_ascii_alphabetic());
    if alnum_only && has_digit && has_alpha && class.len() >= 6 {
        return true;
    }
    let mixed_case_after_start = class.chars().skip(1).any(|c| c.is_ascii_uppercase())
        && class.chars().any(|c| c.is_ascii_lowercase())
        && alnum_only
        && class.len() >= 6
        && class.len() <= 10;
    mixed_case_after_start && !class.starts_with(|c: char| c.is_ascii_uppercase())
}

pub fn is_state_class(class: &str) -> bool {
    let lower = class.to_ascii_lowercase();
    STATE_CLASSES.contains(&lower.as_str()) || lower.starts_with("is-") || lower.starts_with("has-")
}

/// First class token that can stand for the element in a structural path.
pub fn stable_class(doc: &Document, node: NodeId) -> Option<&str> {
    doc.element(node)
        .classes()
        .find(|c| !is_generated_class(c) && !is_state_class(c) && crate::dom::selector::is_plain_ident(c))
}

fn normalize_segment(segment: &str) -> String {
    if UUID_SEGMENT.is_match(segment) || is_hex_blob(segment, 12) {
        ":id".to_string()
    } else if NUMERIC_SEGMENT.is_match(segment) {
        ":num".to_string()
    } else {
        segment.to_string()
    }
}

/// Path of `href` resolved against `base`, with record ids replaced by
/// `:id` / `:num` placeholders.
pub fn normalize_href_path(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let resolved = match Url::parse(base) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    let segments: Vec<String> = resolved
        .path_segments()?
        .map(normalize_segment)
        .collect();
    Some(format!("/{}", segments.join("/")))
}

use url::Url;

use super::classify::is_modal_root;
use super::descriptor::{PageContext, PageType};
use crate::dom::{Document, NodeId};

/// Hostname suffix → platform name.
const PLATFORMS: &[(&str, &str)] = &[
    ("github.com", "github"),
    ("gitlab.com", "gitlab"),
    ("bitbucket.org", "bitbucket"),
    ("x.com", "x"),
    ("twitter.com", "x"),
    ("linkedin.com", "linkedin"),
    ("facebook.com", "facebook"),
    ("instagram.com", "instagram"),
    ("youtube.com", "youtube"),
    ("reddit.com", "reddit"),
    ("notion.so", "notion"),
    ("slack.com", "slack"),
    ("atlassian.net", "jira"),
    ("google.com", "google"),
    ("amazon.com", "amazon"),
];

/// Path keyword → page type, first hit wins.
const PAGE_TYPES: &[(&[&str], PageType)] = &[
    (&["settings", "preferences", "config"], PageType::Settings),
    (&["profile", "account", "user", "me"], PageType::Profile),
    (&["login", "signin", "sign-in", "auth"], PageType::Login),
    (&["signup", "sign-up", "register", "join"], PageType::Signup),
    (&["search", "results"], PageType::Search),
    (&["checkout", "cart", "basket"], PageType::Checkout),
    (&["dashboard", "home", "feed"], PageType::Dashboard),
    (&["new", "create", "edit", "compose"], PageType::Form),
    (&["pulls", "pull", "issues", "tree", "blob", "commits"], PageType::Repository),
];

const LOADING_MARKERS: &[&str] = &["spinner", "skeleton", "loading", "loader", "shimmer"];

pub fn detect_platform(url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();
    PLATFORMS
        .iter()
        .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{}", suffix)))
        .map(|(_, name)| name.to_string())
}

pub fn detect_page_type(url: &str) -> PageType {
    let Ok(parsed) = Url::parse(url) else {
        return PageType::Other;
    };
    let segments: Vec<String> = parsed
        .path_segments()
        .map(|s| s.map(|seg| seg.to_ascii_lowercase()).collect())
        .unwrap_or_default();
    for (keywords, page_type) in PAGE_TYPES {
        if segments.iter().any(|seg| keywords.contains(&seg.as_str())) {
            return *page_type;
        }
    }
    PageType::Other
}

fn is_loading_marker(doc: &Document, node: NodeId) -> bool {
    if doc.attr(node, "aria-busy") == Some("true") || doc.attr(node, "role") == Some("progressbar") {
        return true;
    }
    doc.element(node).classes().any(|c| {
        let c = c.to_ascii_lowercase();
        LOADING_MARKERS.iter().any(|m| c.contains(m))
    })
}

fn is_open_dropdown(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "aria-expanded") == Some("true")
        || matches!(doc.attr(node, "role"), Some("listbox" | "menu"))
}

fn visible_elements(doc: &Document) -> Vec<NodeId> {
    doc.all_elements()
        .into_iter()
        .filter(|&n| !doc.is_overlay(n) && doc.is_visible(n))
        .collect()
}

/// A visible spinner, skeleton or busy region is on the page.
pub fn is_loading(doc: &Document) -> bool {
    visible_elements(doc).into_iter().any(|n| is_loading_marker(doc, n))
}

pub fn page_context(doc: &Document, headings: Vec<String>) -> PageContext {
    let visible = visible_elements(doc);

    PageContext {
        platform: detect_platform(&doc.url),
        page_type: detect_page_type(&doc.url),
        has_open_modal: visible.iter().any(|&n| is_modal_root(doc, n)),
        has_open_dropdown: visible.iter().any(|&n| is_open_dropdown(doc, n)),
        is_loading: visible.iter().any(|&n| is_loading_marker(doc, n)),
        headings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    #[test]
    fn test_platform_and_page_type() {
        assert_eq!(detect_platform("https://github.com/rust-lang/rust").as_deref(), Some("github"));
        assert_eq!(detect_platform("https://gist.github.com/x").as_deref(), Some("github"));
        assert_eq!(detect_platform("https://notgithub.com/").as_deref(), None);
        assert_eq!(detect_page_type("https://example.com/settings/profile"), PageType::Settings);
        assert_eq!(detect_page_type("https://github.com/a/b/pulls"), PageType::Repository);
        assert_eq!(detect_page_type("not a url"), PageType::Other);
    }

    #[test]
    fn test_loading_and_modal_detection() {
        let mut doc = Document::new("https://example.com/", "Example");
        let body = doc.body();
        doc.append(body, Element::new("div").attr("class", "page-skeleton"));
        doc.append(body, Element::new("div").attr("role", "dialog").hidden());
        let ctx = page_context(&doc, Vec::new());
        assert!(ctx.is_loading);
        assert!(!ctx.has_open_modal, "hidden dialogs are not open");
        assert!(is_loading(&doc));

        let mut idle = Document::new("https://example.com/", "Example");
        let body = idle.body();
        idle.append(body, Element::new("div").attr("class", "spinner").hidden());
        idle.append(body, Element::new("div").attr("aria-busy", "false"));
        assert!(!is_loading(&idle), "hidden spinners do not count");
    }
}

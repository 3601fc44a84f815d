//! Category and tag inference from task text.

const CATEGORY_RULES: &[(&str, &[&str])] = &[
    (
        "development",
        &["pull request", "repository", "repo", "branch", "merge", "commit", "fork", "issue", "git"],
    ),
    (
        "account",
        &["profile", "avatar", "picture", "password", "account", "settings", "username", "email address"],
    ),
    ("social", &["post", "tweet", "share", "comment", "follow", "like"]),
    ("shopping", &["buy", "cart", "checkout", "order", "pay", "purchase"]),
    ("communication", &["email", "message", "inbox", "send", "reply"]),
    ("files", &["upload", "download", "file", "folder", "document"]),
];

const DEFAULT_CATEGORY: &str = "general";
const MAX_TAGS: usize = 5;

fn contains_term(words: &[&str], term: &str) -> bool {
    let needle: Vec<&str> = term.split_whitespace().collect();
    words.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn task_words(task: &str) -> Vec<String> {
    task.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Category whose rule matches the most terms; ties keep rule order.
pub fn infer_category(task: &str) -> String {
    let owned = task_words(task);
    let words: Vec<&str> = owned.iter().map(String::as_str).collect();
    let mut best: Option<(&str, usize)> = None;
    for (category, terms) in CATEGORY_RULES {
        let hits = terms.iter().filter(|t| contains_term(&words, t)).count();
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((category, hits));
        }
    }
    best.map(|(c, _)| c).unwrap_or(DEFAULT_CATEGORY).to_string()
}

/// Up to five matched rule terms, in order of appearance in the rules.
pub fn infer_tags(task: &str) -> Vec<String> {
    let owned = task_words(task);
    let words: Vec<&str> = owned.iter().map(String::as_str).collect();
    let mut tags: Vec<String> = Vec::new();
    for (_, terms) in CATEGORY_RULES {
        for term in terms.iter() {
            if contains_term(&words, term) {
                let tag = term.replace(' ', "-");
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
    }
    tags.truncate(MAX_TAGS);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_tags() {
        assert_eq!(infer_category("Open a pull request from my fork"), "development");
        assert_eq!(infer_tags("Open a pull request from my fork"), vec!["pull-request", "fork"]);
        assert_eq!(infer_category("change my profile picture"), "account");
        assert_eq!(infer_category("water the plants"), "general");
        assert!(infer_tags("upload file to repo, commit, merge branch, post comment").len() <= 5);
    }
}

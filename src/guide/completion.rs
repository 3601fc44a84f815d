//! Auto-completion heuristic for planner-driven guides.

use serde::{Deserialize, Serialize};

use super::step::Step;
use crate::dom::text::normalize_for_match;

/// Thresholds for one task class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionLimits {
    /// Completed steps required before a terminal phrase may end the guide.
    pub min_steps: usize,
    /// Absolute step ceiling.
    pub max_steps: usize,
    pub max_continuations: u32,
    pub terminal_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionPolicy {
    /// Task words marking a long, multi-page workflow.
    pub complex_keywords: Vec<String>,
    pub complex: CompletionLimits,
    pub simple: CompletionLimits,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            complex_keywords: strings(&[
                "pull request",
                "pull-request",
                "pr",
                "fork",
                "merge",
                "branch",
                "contribute",
                "rebase",
                "release",
                "deploy",
                "workflow",
            ]),
            complex: CompletionLimits {
                min_steps: 8,
                max_steps: 20,
                max_continuations: 12,
                terminal_phrases: strings(&[
                    "create pull request",
                    "open pull request",
                    "merge",
                    "publish",
                    "submit review",
                    "confirm merge",
                    "create release",
                    "deploy",
                ]),
            },
            simple: CompletionLimits {
                min_steps: 2,
                max_steps: 15,
                max_continuations: 8,
                terminal_phrases: strings(&[
                    "save",
                    "submit",
                    "confirm",
                    "done",
                    "finish",
                    "update",
                    "apply",
                    "send",
                    "publish",
                    "create",
                    "upload",
                    "delete",
                ]),
            },
        }
    }
}

fn contains_words(haystack: &str, phrase: &str) -> bool {
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle.as_slice())
}

impl CompletionPolicy {
    pub fn is_complex(&self, task: &str) -> bool {
        let task = normalize_for_match(task);
        self.complex_keywords
            .iter()
            .any(|k| contains_words(&task, &normalize_for_match(k)))
    }

    pub fn limits_for(&self, task: &str) -> &CompletionLimits {
        if self.is_complex(task) {
            &self.complex
        } else {
            &self.simple
        }
    }

    /// True when the guide should finish on its own.
    pub fn should_auto_complete(&self, task: &str, completed: &[Step]) -> bool {
        let limits = self.limits_for(task);
        if completed.len() >= limits.max_steps {
            log::info!("auto-completing: step ceiling {} reached", limits.max_steps);
            return true;
        }
        if completed.len() < limits.min_steps {
            return false;
        }
        let terminal = completed.iter().any(|step| {
            let description = normalize_for_match(&step.description);
            limits
                .terminal_phrases
                .iter()
                .any(|p| contains_words(&description, &normalize_for_match(p)))
        });
        if terminal {
            log::info!("auto-completing: terminal action after {} steps", completed.len());
        }
        terminal
    }

    /// No more continuation requests allowed.
    pub fn continuations_exhausted(&self, task: &str, continuation_count: u32) -> bool {
        continuation_count >= self.limits_for(task).max_continuations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::StepAction;

    fn steps(descriptions: &[&str]) -> Vec<Step> {
        descriptions
            .iter()
            .map(|d| Step::new(*d, StepAction::Click))
            .collect()
    }

    #[test]
    fn test_complex_task_needs_more_steps() {
        let policy = CompletionPolicy::default();
        let task = "open a pull request for my fix";
        assert!(policy.is_complex(task));

        let mut log = steps(&["Open repo", "Click Fork", "Edit file", "Commit", "Compare"]);
        log.push(Step::new("Click \"Create pull request\"", StepAction::Click));
        assert_eq!(log.len(), 6);
        assert!(!policy.should_auto_complete(task, &log));

        log.extend(steps(&["Fill title", "Fill body", "Review"]));
        assert_eq!(log.len(), 9);
        assert!(policy.should_auto_complete(task, &log));
    }

    #[test]
    fn test_simple_task_terminal_phrase() {
        let policy = CompletionPolicy::default();
        let task = "change my profile picture";
        assert!(!policy.is_complex(task));
        assert!(!policy.should_auto_complete(task, &steps(&["Click \"Save\""])));
        assert!(policy.should_auto_complete(task, &steps(&["Open settings", "Click \"Save\""])));
        assert!(!policy.should_auto_complete(task, &steps(&["Open settings", "Choose file"])));
    }

    #[test]
    fn test_ceilings() {
        let policy = CompletionPolicy::default();
        let many: Vec<Step> = (0..15).map(|i| Step::new(format!("Step {}", i), StepAction::Click)).collect();
        assert!(policy.should_auto_complete("rename a file", &many));
        assert!(!policy.should_auto_complete("merge the branch", &many));
        assert!(policy.continuations_exhausted("rename a file", 8));
        assert!(!policy.continuations_exhausted("merge the branch", 8));
        assert!(policy.continuations_exhausted("merge the branch", 12));
    }
}

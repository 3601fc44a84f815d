//! Guide steps, sessions and the progression state machine.

mod completion;
mod machine;
mod session;
mod step;

pub use completion::{CompletionLimits, CompletionPolicy};
pub use machine::{guide_name, GuideMachine, GuideMode, GuideState, Interrupt, RetryPolicy, StepView};
pub use session::{check_resume, revisit_guard, DiscardReason, GuideSession, ResumeDecision, ResumePolicy};
pub use step::{matches_page, page_pattern, Step, StepAction};

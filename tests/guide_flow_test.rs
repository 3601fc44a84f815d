//! Guide progression across re-scans, navigations and completion

mod common;

use common::{profile_page, Rig};
use guideme::dom::Document;
use guideme::guide::{CompletionPolicy, GuideMode, GuideSession, GuideState, Step, StepAction};
use guideme::host::NavigationType;
use guideme::resolver::MatchTier;
use guideme::storage::{keys, KeyValueStore};
use guideme::synth::SelectorBundle;

fn save_step() -> Step {
    Step::new("Click \"Save\"", StepAction::Click).with_bundle(SelectorBundle {
        data_test_id: Some("save-profile".into()),
        ..Default::default()
    })
}

const EDIT_PROFILE_PLAN: &str = r#"{"steps": [{"elementId": "gm-3", "action": "click", "description": "Click \"Edit profile\""}], "completed": false}"#;

#[tokio::test(start_paused = true)]
async fn test_rescan_keeps_step_resolvable_by_aria_label() {
    let rig = Rig::new(profile_page("https://example.com/profile"));
    rig.planner.push_raw(EDIT_PROFILE_PLAN);
    let mut machine = rig.machine();

    machine
        .start_guide("change my profile picture", vec![], GuideMode::Live, None)
        .await
        .unwrap();
    assert_eq!(machine.view().unwrap().tier, Some(MatchTier::ScanId));

    // re-scan clears gm-3; the step must still find its element
    let state = machine.rescan().await.unwrap();
    assert_eq!(state, GuideState::Active { page: 1 });
    let view = machine.view().unwrap();
    assert!(view.found);
    assert_eq!(view.tier, Some(MatchTier::AriaLabel));
}

#[tokio::test]
async fn test_stale_snapshot_is_never_resumed() {
    let rig = Rig::new(profile_page("https://example.com/next"));
    let mut session = GuideSession::new("change my profile picture", vec![Step::new("Click \"Save\"", StepAction::Click)]);
    session.record_visit("https://example.com/profile");
    session.saved_at = chrono::Utc::now().timestamp_millis() - 6 * 60 * 1000;
    rig.persistence().save_now(&session).await.unwrap();

    let mut machine = rig.machine();
    let state = machine.on_page_load().await.unwrap();
    assert_eq!(state, GuideState::Idle);
    assert!(machine.session().is_none());
    assert!(rig.durable.get(keys::ACTIVE_SESSION).await.unwrap().is_none());
}

#[tokio::test]
async fn test_back_forward_never_resumes_fresh_snapshot() {
    let rig = Rig::new(profile_page("https://example.com/next"));
    let mut session = GuideSession::replay("update profile", vec![save_step()], false);
    session.record_visit("https://example.com/profile");
    session.saved_at = chrono::Utc::now().timestamp_millis();
    rig.persistence().save_now(&session).await.unwrap();

    rig.page.load(profile_page("https://example.com/next"), NavigationType::BackForward);
    let mut machine = rig.machine();
    assert_eq!(machine.on_page_load().await.unwrap(), GuideState::Idle);
    // left in place for the tab that owns it
    assert!(rig.durable.get(keys::ACTIVE_SESSION).await.unwrap().is_some());

    rig.page.load(profile_page("https://example.com/next"), NavigationType::Navigate);
    let mut machine = rig.machine();
    let state = machine.on_page_load().await.unwrap();
    assert_eq!(state, GuideState::Active { page: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_replay_walks_steps_then_completes() {
    let rig = Rig::new(profile_page("https://example.com/profile"));
    let steps = vec![
        Step::new("Click \"Edit profile\"", StepAction::Click).with_bundle(SelectorBundle {
            aria_label: Some("Edit profile".into()),
            ..Default::default()
        }),
        save_step(),
    ];
    let mut machine = rig.machine();

    machine
        .start_guide("update profile", steps, GuideMode::Replay, None)
        .await
        .unwrap();
    assert!(machine.view().unwrap().found);

    assert_eq!(machine.click_step().await.unwrap(), GuideState::Active { page: 1 });
    assert_eq!(machine.view().unwrap().index, 1);
    let state = machine.click_step().await.unwrap();
    assert_eq!(state, GuideState::Completed);
    assert_eq!(rig.page.clicks().len(), 2);
    // replays are not re-saved automatically
    assert!(machine.archive().list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_planner_failure_leaves_guide_awaiting_continuation() {
    let rig = Rig::new(Document::new("https://example.com/profile", "Empty"));
    for _ in 0..3 {
        rig.planner.push_error(guideme::planner::PlannerError::Transport("offline".into()));
    }
    let mut machine = rig.machine();
    let result = machine
        .start_guide("change my profile picture", vec![], GuideMode::Live, None)
        .await;
    assert!(result.is_err());
    assert_eq!(machine.state(), &GuideState::AwaitingContinuation { page: 1 });
    assert!(machine.session().is_some(), "session kept for a retry");
}

#[tokio::test(start_paused = true)]
async fn test_client_side_route_change_enters_next_page() {
    let rig = Rig::new(profile_page("https://example.com/profile"));
    let mut machine = rig.machine();
    machine
        .start_guide("update profile", vec![save_step()], GuideMode::Replay, None)
        .await
        .unwrap();
    assert_eq!(machine.poll_url().await.unwrap(), GuideState::Active { page: 1 });

    rig.page.set_url("https://example.com/profile/edit");
    assert_eq!(machine.poll_url().await.unwrap(), GuideState::Active { page: 2 });
    // reported once
    assert_eq!(machine.poll_url().await.unwrap(), GuideState::Active { page: 2 });
    assert!(machine.view().unwrap().found);
}

#[tokio::test(start_paused = true)]
async fn test_history_traversal_and_revisits_never_replan() {
    let rig = Rig::new(profile_page("https://example.com/a"));
    rig.planner.push_raw(EDIT_PROFILE_PLAN);
    rig.planner.push_raw(
        r#"{"steps": [{"elementId": "Save", "action": "click", "description": "Click \"Save\""}], "completed": false}"#,
    );
    let mut machine = rig.machine();
    machine
        .start_guide("change my profile picture", vec![], GuideMode::Live, None)
        .await
        .unwrap();

    rig.page.load(profile_page("https://example.com/b"), NavigationType::Navigate);
    assert_eq!(machine.poll_url().await.unwrap(), GuideState::Active { page: 2 });
    assert_eq!(rig.planner.requests().len(), 2);

    rig.page.load(profile_page("https://example.com/a"), NavigationType::BackForward);
    assert_eq!(machine.poll_url().await.unwrap(), GuideState::Active { page: 2 });
    assert_eq!(rig.planner.requests().len(), 2, "back never asks for a new batch");

    // forward again onto a page the guide already went through
    rig.page.load(profile_page("https://example.com/b"), NavigationType::Navigate);
    assert_eq!(machine.poll_url().await.unwrap(), GuideState::Active { page: 2 });
    assert_eq!(rig.planner.requests().len(), 2);
    assert_eq!(machine.session().unwrap().visited_urls.len(), 2);
}

fn done(descriptions: &[&str]) -> Vec<Step> {
    descriptions
        .iter()
        .map(|d| Step::new(*d, StepAction::Click))
        .collect()
}

#[test]
fn test_completion_asymmetry_for_complex_tasks() {
    let policy = CompletionPolicy::default();
    let task = "open a pull request for my fix";

    let mut steps = vec!["Click \"Fork\"", "Click \"Code\"", "Click \"Branch\"", "Type the title", "Click \"Compare\""];
    steps.push("Click \"Create pull request\"");
    assert_eq!(steps.len(), 6);
    assert!(!policy.should_auto_complete(task, &done(&steps)));

    steps.extend(["Click \"Reviewers\"", "Click \"Labels\"", "Click \"Done\""]);
    assert_eq!(steps.len(), 9);
    assert!(policy.should_auto_complete(task, &done(&steps)));

    // a simple task finishes on the same terminal step much earlier
    assert!(policy.should_auto_complete("rename my repository", &done(&["Click \"Settings\"", "Click \"Save\""])));
}

//! Record a flow through the command surface, save it, replay it

mod common;

use common::{profile_page, Rig};
use guideme::controller::GuideCommand;
use guideme::dom::NodeId;
use guideme::recording::{EventKind, RecordedEvent};

// html, body, Home, Help, Edit profile, Save
const EDIT: NodeId = NodeId(4);
const SAVE: NodeId = NodeId(5);

#[tokio::test(start_paused = true)]
async fn test_recorded_flow_replays_to_completion() {
    let rig = Rig::new(profile_page("https://example.com/profile"));
    let controller = rig.controller();

    assert!(controller.dispatch(GuideCommand::StartRecording).await.ok);
    for node in [EDIT, SAVE] {
        let reply = controller
            .dispatch(GuideCommand::RecordEvent {
                event: RecordedEvent::click(node),
            })
            .await;
        assert!(reply.ok, "{:?}", reply.error);
    }

    let reply = controller
        .dispatch(GuideCommand::StopRecording {
            name: Some("Update profile".into()),
        })
        .await;
    let data = reply.data.expect("recording result");
    let steps = data["steps"].as_array().expect("steps");
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1]["selectorBundle"]["dataTestId"], "save-profile");
    let id = data["savedGuideId"].as_str().expect("saved").to_string();

    let reply = controller.dispatch(GuideCommand::ReplayGuide { id }).await;
    let data = reply.data.expect("status");
    assert_eq!(data["state"], "active");
    assert_eq!(data["step"]["found"], true);

    controller.dispatch(GuideCommand::ConfirmClick).await;
    let reply = controller.dispatch(GuideCommand::ConfirmClick).await;
    assert_eq!(reply.data.expect("status")["state"], "completed");
    assert_eq!(rig.page.clicks(), vec![EDIT, SAVE]);
}

#[tokio::test(start_paused = true)]
async fn test_events_outside_recording_are_ignored() {
    let rig = Rig::new(profile_page("https://example.com/profile"));
    let controller = rig.controller();

    let reply = controller
        .dispatch(GuideCommand::RecordEvent {
            event: RecordedEvent::input(EventKind::Input, SAVE, "x"),
        })
        .await;
    assert!(reply.ok);
    assert!(reply.data.expect("status")["index"].is_null());

    let reply = controller
        .dispatch(GuideCommand::StopRecording { name: None })
        .await;
    assert!(!reply.ok);
}

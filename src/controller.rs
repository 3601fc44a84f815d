//! Command surface: one message in, one reply out.
//!
//! The panel, the HTTP server and tests all drive the guide through
//! [`GuideCommand`]. Commands are serialized onto the machine by a mutex;
//! `stop-guide` first bumps the machine's interrupt so a resolution waiting
//! out its backoff gives up the lock promptly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::archive::{to_pretty_json, ArchiveEntry};
use crate::config::Settings;
use crate::error::{GuideError, Result};
use crate::guide::{GuideMachine, GuideMode, GuideState, Interrupt, Step, StepView};
use crate::host::PageHost;
use crate::recording::{RecordedEvent, Recorder, RecorderState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum GuideCommand {
    StartGuide {
        task: String,
        #[serde(default)]
        steps: Vec<Step>,
        #[serde(default)]
        mode: GuideMode,
        #[serde(default)]
        saved_guide_id: Option<String>,
    },
    AdvanceStep,
    RetreatStep,
    ConfirmClick,
    EditStep {
        index: usize,
        description: String,
    },
    DeleteStep {
        index: usize,
    },
    StopGuide {
        #[serde(default)]
        full: bool,
    },
    Rescan,
    StartRecording,
    StopRecording {
        /// Save the recording to the archive under this name.
        #[serde(default)]
        name: Option<String>,
    },
    PauseRecording,
    ResumeRecording,
    RecordEvent {
        event: RecordedEvent,
    },
    GetCurrentGuide,
    GetDomSnapshot,
    PageLoaded,
    UrlChanged {
        url: String,
    },
    SaveGuide {
        #[serde(default)]
        name: Option<String>,
    },
    ListGuides,
    ReplayGuide {
        id: String,
    },
    DeleteGuide {
        id: String,
    },
    ExportGuide {
        id: String,
    },
    ImportGuide {
        document: String,
    },
    GetSettings,
    SaveSettings {
        settings: Settings,
    },
}

impl GuideCommand {
    pub fn name(&self) -> &'static str {
        match self {
            GuideCommand::StartGuide { .. } => "start-guide",
            GuideCommand::AdvanceStep => "advance-step",
            GuideCommand::RetreatStep => "retreat-step",
            GuideCommand::ConfirmClick => "confirm-click",
            GuideCommand::EditStep { .. } => "edit-step",
            GuideCommand::DeleteStep { .. } => "delete-step",
            GuideCommand::StopGuide { .. } => "stop-guide",
            GuideCommand::Rescan => "rescan",
            GuideCommand::StartRecording => "start-recording",
            GuideCommand::StopRecording { .. } => "stop-recording",
            GuideCommand::PauseRecording => "pause-recording",
            GuideCommand::ResumeRecording => "resume-recording",
            GuideCommand::RecordEvent { .. } => "record-event",
            GuideCommand::GetCurrentGuide => "get-current-guide",
            GuideCommand::GetDomSnapshot => "get-dom-snapshot",
            GuideCommand::PageLoaded => "page-loaded",
            GuideCommand::UrlChanged { .. } => "url-changed",
            GuideCommand::SaveGuide { .. } => "save-guide",
            GuideCommand::ListGuides => "list-guides",
            GuideCommand::ReplayGuide { .. } => "replay-guide",
            GuideCommand::DeleteGuide { .. } => "delete-guide",
            GuideCommand::ExportGuide { .. } => "export-guide",
            GuideCommand::ImportGuide { .. } => "import-guide",
            GuideCommand::GetSettings => "get-settings",
            GuideCommand::SaveSettings { .. } => "save-settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GuideReply {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data).filter(|d| !d.is_null()),
            error: None,
        }
    }

    pub fn error(error: &GuideError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Panel view of the guide.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuideStatus<'a> {
    #[serde(flatten)]
    state: &'a GuideState,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<StepView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_saved_guide: Option<&'a str>,
}

fn status(machine: &GuideMachine) -> Result<Value> {
    let status = GuideStatus {
        state: machine.state(),
        task: machine.session().map(|s| s.original_task.as_str()),
        step: machine.view(),
        last_saved_guide: machine.last_saved_guide(),
    };
    Ok(serde_json::to_value(status)?)
}

fn recorder_status(recorder: &Recorder) -> Value {
    json!({
        "recorder": recorder.state(),
        "steps": recorder.steps(),
    })
}

pub struct GuideController {
    host: Arc<dyn PageHost>,
    machine: Mutex<GuideMachine>,
    recorder: Mutex<Recorder>,
    interrupt: Interrupt,
}

impl GuideController {
    pub fn new(host: Arc<dyn PageHost>, machine: GuideMachine, recorder: Recorder) -> Self {
        let interrupt = machine.interrupt();
        Self {
            host,
            machine: Mutex::new(machine),
            recorder: Mutex::new(recorder),
            interrupt,
        }
    }

    pub async fn dispatch(&self, command: GuideCommand) -> GuideReply {
        let name = command.name();
        log::debug!("command {}", name);
        match self.execute(command).await {
            Ok(data) => GuideReply::ok(data),
            Err(e) => {
                log::warn!("{} failed: {}", name, e);
                GuideReply::error(&e)
            }
        }
    }

    /// React to a URL change the page did not announce. Skipped while a
    /// command holds the machine.
    pub async fn poll_url(&self) -> Result<()> {
        let Ok(mut machine) = self.machine.try_lock() else {
            return Ok(());
        };
        machine.poll_url().await?;
        Ok(())
    }

    async fn execute(&self, command: GuideCommand) -> Result<Value> {
        match command {
            GuideCommand::StartGuide {
                task,
                steps,
                mode,
                saved_guide_id,
            } => {
                self.interrupt.bump();
                let mut machine = self.machine.lock().await;
                machine.start_guide(&task, steps, mode, saved_guide_id).await?;
                status(&machine)
            }
            GuideCommand::AdvanceStep => {
                let mut machine = self.machine.lock().await;
                machine.advance_step().await?;
                status(&machine)
            }
            GuideCommand::RetreatStep => {
                let mut machine = self.machine.lock().await;
                machine.retreat_step().await?;
                status(&machine)
            }
            GuideCommand::ConfirmClick => {
                let mut machine = self.machine.lock().await;
                machine.click_step().await?;
                status(&machine)
            }
            GuideCommand::Rescan => {
                let mut machine = self.machine.lock().await;
                machine.rescan().await?;
                status(&machine)
            }
            GuideCommand::PageLoaded => {
                let url = self.host.current_url().await?;
                let recording = self.recorder.lock().await.restore(&url).await?;
                let mut machine = self.machine.lock().await;
                machine.on_page_load().await?;
                let mut data = status(&machine)?;
                data["recorder"] = serde_json::to_value(recording)?;
                Ok(data)
            }
            GuideCommand::EditStep { index, description } => {
                let mut machine = self.machine.lock().await;
                machine.edit_step(index, &description).await?;
                status(&machine)
            }
            GuideCommand::DeleteStep { index } => {
                let mut machine = self.machine.lock().await;
                machine.delete_step(index).await?;
                status(&machine)
            }
            GuideCommand::StopGuide { full } => {
                self.interrupt.bump();
                let mut machine = self.machine.lock().await;
                machine.stop(full).await?;
                status(&machine)
            }
            GuideCommand::UrlChanged { url } => {
                self.recorder.lock().await.note_navigation(&url).await?;
                let mut machine = self.machine.lock().await;
                machine.on_url_changed(&url).await?;
                status(&machine)
            }
            GuideCommand::GetCurrentGuide => status(&*self.machine.lock().await),
            GuideCommand::GetDomSnapshot => {
                let mut machine = self.machine.lock().await;
                if machine.dom_snapshot().is_none() {
                    machine.extract().await?;
                }
                Ok(serde_json::to_value(machine.dom_snapshot())?)
            }
            GuideCommand::StartRecording => {
                let url = self.host.current_url().await?;
                let mut recorder = self.recorder.lock().await;
                if recorder.state() != RecorderState::Idle {
                    return Err(GuideError::Other("already recording".to_string()));
                }
                recorder.start(&url).await?;
                Ok(recorder_status(&recorder))
            }
            GuideCommand::PauseRecording => {
                let mut recorder = self.recorder.lock().await;
                recorder.pause().await?;
                Ok(recorder_status(&recorder))
            }
            GuideCommand::ResumeRecording => {
                let mut recorder = self.recorder.lock().await;
                recorder.resume().await?;
                Ok(recorder_status(&recorder))
            }
            GuideCommand::RecordEvent { event } => {
                let doc = self.host.capture().await?;
                let mut recorder = self.recorder.lock().await;
                let index = recorder.record(&doc, &event).await?;
                let mut data = recorder_status(&recorder);
                data["index"] = json!(index);
                Ok(data)
            }
            GuideCommand::StopRecording { name } => {
                let result = self.recorder.lock().await.stop().await?;
                let mut data = serde_json::to_value(&result)?;
                if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
                    let machine = self.machine.lock().await;
                    let entry = machine
                        .archive()
                        .save(&name, &name, result.steps.clone(), Some(result.start_url.clone()))
                        .await?;
                    data["savedGuideId"] = json!(entry.id);
                }
                Ok(data)
            }
            GuideCommand::SaveGuide { name } => {
                let mut machine = self.machine.lock().await;
                let entry = machine.save_guide(name.as_deref()).await?;
                Ok(json!({ "id": entry.id, "name": entry.name }))
            }
            GuideCommand::ListGuides => {
                let machine = self.machine.lock().await;
                let entries = machine.archive().list().await?;
                Ok(serde_json::to_value(entries)?)
            }
            GuideCommand::ReplayGuide { id } => {
                self.interrupt.bump();
                let mut machine = self.machine.lock().await;
                let entry: ArchiveEntry = machine
                    .archive()
                    .get(&id)
                    .await?
                    .ok_or_else(|| GuideError::GuideNotFound(id.clone()))?;
                machine
                    .start_guide(&entry.task, entry.steps, GuideMode::Replay, Some(entry.id))
                    .await?;
                status(&machine)
            }
            GuideCommand::DeleteGuide { id } => {
                let machine = self.machine.lock().await;
                let deleted = machine.archive().delete(&id).await?;
                Ok(json!({ "deleted": deleted }))
            }
            GuideCommand::ExportGuide { id } => {
                let machine = self.machine.lock().await;
                let document = machine.archive().export_entry(&id).await?;
                Ok(json!({ "document": to_pretty_json(&document)? }))
            }
            GuideCommand::ImportGuide { document } => {
                let machine = self.machine.lock().await;
                let imported = machine.archive().import_document(&document).await?;
                Ok(json!({
                    "id": imported.entry.id,
                    "name": imported.entry.name,
                    "warnings": imported.warnings,
                    "checksumOk": imported.checksum_ok,
                }))
            }
            GuideCommand::GetSettings => Ok(serde_json::to_value(self.machine.lock().await.settings())?),
            GuideCommand::SaveSettings { settings } => {
                let mut machine = self.machine.lock().await;
                machine.update_settings(settings).await?;
                Ok(serde_json::to_value(machine.settings())?)
            }
        }
    }
}

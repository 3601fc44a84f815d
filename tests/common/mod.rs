//! Shared fixtures for integration tests
//!
//! Pages are built in memory and hosted by `MemoryPage`; stores are
//! `MemoryStore`s so every test is isolated.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use guideme::archive::GuideArchive;
use guideme::config::GuideConfig;
use guideme::controller::GuideController;
use guideme::dom::{Document, Element};
use guideme::guide::GuideMachine;
use guideme::host::MemoryPage;
use guideme::planner::ScriptedPlanner;
use guideme::recording::Recorder;
use guideme::storage::{MemoryStore, SessionPersistence};

/// Profile page whose third interactive element is the "Edit profile" button.
pub fn profile_page(url: &str) -> Document {
    let mut doc = Document::new(url, "Your profile");
    let body = doc.body();
    doc.append(
        body,
        Element::new("button").text("Home").bounds(0.0, 0.0, 80.0, 30.0),
    );
    doc.append(
        body,
        Element::new("a")
            .attr("href", "/help")
            .text("Help")
            .bounds(90.0, 0.0, 80.0, 30.0),
    );
    doc.append(
        body,
        Element::new("button")
            .attr("aria-label", "Edit profile")
            .attr("class", "btn css-1x2y3z")
            .text("Edit")
            .bounds(0.0, 60.0, 120.0, 36.0),
    );
    doc.append(
        body,
        Element::new("button")
            .attr("data-testid", "save-profile")
            .text("Save")
            .bounds(0.0, 120.0, 120.0, 36.0),
    );
    doc
}

pub struct Rig {
    pub page: Arc<MemoryPage>,
    pub planner: Arc<ScriptedPlanner>,
    pub durable: MemoryStore,
    pub local: MemoryStore,
    pub config: GuideConfig,
}

impl Rig {
    pub fn new(doc: Document) -> Self {
        Self {
            page: Arc::new(MemoryPage::new(doc)),
            planner: Arc::new(ScriptedPlanner::new()),
            durable: MemoryStore::new(),
            local: MemoryStore::new(),
            config: GuideConfig::default(),
        }
    }

    pub fn persistence(&self) -> SessionPersistence {
        SessionPersistence::new(Arc::new(self.durable.clone()), Arc::new(self.local.clone()))
    }

    /// A fresh machine over the shared page and stores, as a new page load
    /// of the same tab would create.
    pub fn machine(&self) -> GuideMachine {
        GuideMachine::new(
            self.page.clone(),
            self.planner.clone(),
            self.persistence(),
            GuideArchive::new(Arc::new(self.durable.clone())),
            self.config.clone(),
        )
    }

    pub fn controller(&self) -> GuideController {
        let recorder = Recorder::new(Arc::new(self.durable.clone()), Duration::from_millis(750));
        GuideController::new(self.page.clone(), self.machine(), recorder)
    }
}

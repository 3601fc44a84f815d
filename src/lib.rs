pub mod archive;
pub mod browser;
pub mod config;
pub mod controller;
pub mod dom;
pub mod error;
pub mod fingerprint;
pub mod guide;
pub mod host;
pub mod planner;
pub mod recording;
pub mod resolver;
pub mod server;
pub mod storage;
pub mod synth;

//  Re-export commonly used items
pub use archive::{ArchiveDocument, ArchiveEntry, GuideArchive, ImportError, ImportedGuide};
pub use browser::{ChromeDriver, ConnectionMode};
pub use config::{GuideConfig, Settings};
pub use controller::{GuideCommand, GuideController, GuideReply};
pub use dom::{Document, DomSnapshot, Element, NodeId};
pub use error::{GuideError, Result};
pub use fingerprint::{ElementDescriptor, Extraction, Extractor};
pub use guide::{GuideMachine, GuideMode, GuideSession, GuideState, Step, StepAction};
pub use host::{MemoryPage, NavigationType, PageHost};
pub use planner::{ClaudeCliPlanner, PlannerError, ScriptedPlanner, StepPlanner};
pub use recording::{Recorder, RecordedEvent, RecordingResult};
pub use resolver::{MatchTier, Resolution, ResolveRequest, Resolver};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SessionPersistence, StorageError};
pub use synth::{synthesize, SelectorBundle};
